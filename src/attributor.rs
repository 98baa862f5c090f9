use geo::Geometry;
use tracing::{debug, info, warn};

use crate::config::WidthConfig;
use crate::error::{Result, WidthError};
use crate::model::{FieldValue, VectorLayer};
use crate::toolkit::GeometryToolkit;
use crate::validator::FeaturePair;

/// Width outcome of one segmented-centerline feature.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureWidth {
    pub fid: u64,
    pub length_m: f64,
    pub seg_area_m: Option<f64>,
    /// `None` when the width is undefined for this feature.
    pub int_width_m: Option<f64>,
}

impl FeatureWidth {
    pub fn is_flagged(&self) -> bool {
        self.int_width_m.is_none()
    }
}

/// Writes the planar area of every segment into the area field, adding the field if needed.
/// An existing integer area field is widened to real.
pub fn attribute_areas<T: GeometryToolkit>(
    toolkit: &T,
    segments: &mut VectorLayer,
    config: &WidthConfig,
) -> Result<()> {
    let field = config.area_field.as_str();
    segments.ensure_real_field(field)?;

    segments.edit(|session| {
        for (index, feature) in session.layer().features().iter().enumerate() {
            let area = toolkit.area(&feature.geometry);
            session.set_value(index, field, Some(FieldValue::Real(area)))?;
        }
        Ok(())
    })?;

    info!("Attributed {} on {} segments", field, segments.len());
    Ok(())
}

/// Intersects the centerline with the segments: one line feature per intersecting pair,
/// carrying the centerline's fields and the segment's fields under the segment prefix.
pub fn segment_centerline<T: GeometryToolkit>(
    toolkit: &T,
    centerline: &VectorLayer,
    segments: &VectorLayer,
    pairs: &[FeaturePair],
    config: &WidthConfig,
) -> Result<VectorLayer> {
    let mut output = VectorLayer::new(&config.output_table, centerline.crs.clone());
    for defn in centerline.fields() {
        output.ensure_field(&defn.name, defn.field_type)?;
    }

    let mut segment_columns = Vec::with_capacity(segments.fields().len());
    for defn in segments.fields() {
        let name = unique_field_name(&output, &format!("{}{}", config.segment_prefix, defn.name));
        output.ensure_field(&name, defn.field_type)?;
        segment_columns.push(name);
    }

    for (position, &(i, j)) in pairs.iter().enumerate() {
        let line = centerline.features().get(i).ok_or_else(|| {
            WidthError::invalid_layer(&centerline.name, format!("no feature at index {}", i))
        })?;
        let segment = segments.features().get(j).ok_or_else(|| {
            WidthError::invalid_layer(&segments.name, format!("no feature at index {}", j))
        })?;

        let clipped = toolkit.clip_line(&line.geometry, &segment.geometry)?;
        if clipped.0.len() > 1 {
            debug!(
                "Centerline {} crosses segment {} in {} parts",
                line.fid,
                segment.fid,
                clipped.0.len()
            );
        }

        let index = output.add_feature(position as u64 + 1, Geometry::MultiLineString(clipped));
        for (defn, value) in centerline.fields().iter().zip(line.values()) {
            output.set_value(index, &defn.name, value.clone())?;
        }
        for (name, value) in segment_columns.iter().zip(segment.values()) {
            output.set_value(index, name, value.clone())?;
        }
    }

    info!(
        "Segmented '{}' into {} features",
        centerline.name,
        output.len()
    );
    Ok(output)
}

fn unique_field_name(layer: &VectorLayer, base: &str) -> String {
    if layer.field_index(base).is_none() {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{}_{}", base, n))
        .find(|candidate| layer.field_index(candidate).is_none())
        .unwrap_or_else(|| base.to_string())
}

/// Width of one feature, or an arithmetic error when it is undefined.
pub fn integrated_width(fid: u64, area: Option<f64>, length: f64, min_length: f64) -> Result<f64> {
    match area {
        Some(area)
            if area.is_finite() && length.is_finite() && length > 0.0 && length > min_length =>
        {
            Ok(area / length)
        }
        _ => Err(WidthError::Arithmetic { fid, length, area }),
    }
}

/// Writes length and integrated width on every segmented-centerline feature.
/// Degenerate features keep a null width and are reported as flagged.
pub fn attribute_widths<T: GeometryToolkit>(
    toolkit: &T,
    layer: &mut VectorLayer,
    config: &WidthConfig,
) -> Result<Vec<FeatureWidth>> {
    let area_field = config.segment_area_field();
    if layer.field_index(&area_field).is_none() {
        return Err(WidthError::MissingField(area_field));
    }

    let length_field = config.length_field.as_str();
    let width_field = config.width_field.as_str();
    layer.ensure_real_field(length_field)?;
    layer.ensure_real_field(width_field)?;

    let widths = layer.edit(|session| {
        let source = session.layer();
        let mut widths = Vec::with_capacity(source.len());

        for (index, feature) in source.features().iter().enumerate() {
            let length = toolkit.length(&feature.geometry);
            let area = source.value(index, &area_field).and_then(FieldValue::as_f64);

            let width = match integrated_width(feature.fid, area, length, config.min_length) {
                Ok(width) => Some(width),
                Err(err) => {
                    warn!("Flagged: {}", err);
                    None
                }
            };

            session.set_value(index, length_field, Some(FieldValue::Real(length)))?;
            session.set_value(index, width_field, width.map(FieldValue::Real))?;
            widths.push(FeatureWidth {
                fid: feature.fid,
                length_m: length,
                seg_area_m: area,
                int_width_m: width,
            });
        }
        Ok(widths)
    })?;

    let flagged = widths.iter().filter(|w| w.is_flagged()).count();
    info!(
        "Attributed widths on {} features ({} flagged)",
        widths.len(),
        flagged
    );
    Ok(widths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldType;
    use crate::toolkit::PlanarToolkit;
    use crate::validator::intersecting_pairs;
    use geo::{line_string, polygon};

    fn inputs() -> (VectorLayer, VectorLayer) {
        let mut centerline = VectorLayer::new("centerline", None);
        centerline.ensure_field("name", FieldType::String).unwrap();
        let idx = centerline.add_feature(1, line_string![(x: -5.0, y: 5.0), (x: 25.0, y: 5.0)].into());
        centerline
            .set_value(idx, "name", Some(FieldValue::String("main".into())))
            .unwrap();

        let mut segments = VectorLayer::new("valley-bottom-segmented", None);
        segments.ensure_field("name", FieldType::String).unwrap();
        let a = segments.add_feature(
            1,
            polygon![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 50.0), (x: 0.0, y: 50.0)]
                .into(),
        );
        segments
            .set_value(a, "name", Some(FieldValue::String("a".into())))
            .unwrap();
        segments.add_feature(
            2,
            polygon![(x: 10.0, y: 0.0), (x: 20.0, y: 0.0), (x: 20.0, y: 30.0), (x: 10.0, y: 30.0)]
                .into(),
        );
        (centerline, segments)
    }

    #[test]
    fn test_attribute_areas_is_idempotent() {
        let (_, mut segments) = inputs();
        let config = WidthConfig::default();

        attribute_areas(&PlanarToolkit, &mut segments, &config).unwrap();
        let first = segments.clone();
        attribute_areas(&PlanarToolkit, &mut segments, &config).unwrap();

        assert_eq!(segments, first);
        assert_eq!(
            segments.fields().iter().filter(|f| f.name == "area_m").count(),
            1
        );
        assert_eq!(segments.value(0, "area_m"), Some(&FieldValue::Real(500.0)));
        assert_eq!(segments.value(1, "area_m"), Some(&FieldValue::Real(300.0)));
    }

    #[test]
    fn test_segment_centerline_schema_and_values() {
        let (centerline, mut segments) = inputs();
        let config = WidthConfig::default();
        attribute_areas(&PlanarToolkit, &mut segments, &config).unwrap();

        let pairs = intersecting_pairs(&PlanarToolkit, &centerline, &segments);
        let output =
            segment_centerline(&PlanarToolkit, &centerline, &segments, &pairs, &config).unwrap();

        let names: Vec<&str> = output.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["name", "seg_name", "seg_area_m"]);
        assert_eq!(output.len(), 2);
        assert_eq!(output.features()[0].fid, 1);
        assert_eq!(output.features()[1].fid, 2);
        assert_eq!(
            output.value(0, "name"),
            Some(&FieldValue::String("main".into()))
        );
        assert_eq!(
            output.value(0, "seg_name"),
            Some(&FieldValue::String("a".into()))
        );
        assert_eq!(output.value(1, "seg_name"), None);
        assert_eq!(output.value(1, "seg_area_m"), Some(&FieldValue::Real(300.0)));
    }

    #[test]
    fn test_unique_field_name() {
        let mut layer = VectorLayer::new("l", None);
        layer.ensure_field("seg_id", FieldType::Integer).unwrap();
        assert_eq!(unique_field_name(&layer, "seg_name"), "seg_name");
        assert_eq!(unique_field_name(&layer, "seg_id"), "seg_id_2");
        layer.ensure_field("seg_id_2", FieldType::Integer).unwrap();
        assert_eq!(unique_field_name(&layer, "seg_id"), "seg_id_3");
    }

    #[test]
    fn test_attribute_widths() {
        let (centerline, mut segments) = inputs();
        let config = WidthConfig::default();
        attribute_areas(&PlanarToolkit, &mut segments, &config).unwrap();
        let pairs = intersecting_pairs(&PlanarToolkit, &centerline, &segments);
        let mut output =
            segment_centerline(&PlanarToolkit, &centerline, &segments, &pairs, &config).unwrap();

        let widths = attribute_widths(&PlanarToolkit, &mut output, &config).unwrap();
        assert_eq!(widths.len(), 2);
        for width in &widths {
            assert!((width.length_m - 10.0).abs() < 1e-6);
            let w = width.int_width_m.unwrap();
            assert!((w * width.length_m - width.seg_area_m.unwrap()).abs() < 1e-6);
        }
        assert!((widths[0].int_width_m.unwrap() - 50.0).abs() < 1e-6);
        assert!((widths[1].int_width_m.unwrap() - 30.0).abs() < 1e-6);

        // second run adds nothing and recomputes the same values
        let before = output.clone();
        let again = attribute_widths(&PlanarToolkit, &mut output, &config).unwrap();
        assert_eq!(again, widths);
        assert_eq!(output, before);
    }

    #[test]
    fn test_attribute_widths_requires_segment_area() {
        let (centerline, segments) = inputs();
        let config = WidthConfig::default();
        let pairs = intersecting_pairs(&PlanarToolkit, &centerline, &segments);
        let mut output =
            segment_centerline(&PlanarToolkit, &centerline, &segments, &pairs, &config).unwrap();
        assert!(matches!(
            attribute_widths(&PlanarToolkit, &mut output, &config),
            Err(WidthError::MissingField(_))
        ));
        assert!(output.field_index("length_m").is_none());
    }

    #[test]
    fn test_integrated_width_edge_cases() {
        assert_eq!(integrated_width(1, Some(1000.0), 50.0, 1e-9).unwrap(), 20.0);
        assert!(matches!(
            integrated_width(2, Some(1000.0), 0.0, 1e-9),
            Err(WidthError::Arithmetic { fid: 2, .. })
        ));
        assert!(integrated_width(3, None, 10.0, 1e-9).is_err());
        assert!(integrated_width(4, Some(f64::NAN), 10.0, 1e-9).is_err());
        assert!(integrated_width(5, Some(10.0), 1e-12, 1e-9).is_err());
        // a negative threshold still never divides by zero
        assert!(integrated_width(6, Some(100.0), 0.0, -1.0).is_err());
        assert_eq!(integrated_width(7, Some(100.0), 4.0, -1.0).unwrap(), 25.0);
    }

    #[test]
    fn test_attribute_areas_widens_integer_area() {
        let (_, mut segments) = inputs();
        segments.ensure_field("area_m", FieldType::Integer).unwrap();
        segments
            .set_value(0, "area_m", Some(FieldValue::Integer(499)))
            .unwrap();

        attribute_areas(&PlanarToolkit, &mut segments, &WidthConfig::default()).unwrap();

        let area = segments.field_index("area_m").unwrap();
        assert_eq!(segments.fields()[area].field_type, FieldType::Real);
        assert_eq!(segments.value(0, "area_m"), Some(&FieldValue::Real(500.0)));
        assert_eq!(segments.value(1, "area_m"), Some(&FieldValue::Real(300.0)));
    }

    #[test]
    fn test_segment_centerline_rejects_unknown_pair() {
        let (centerline, segments) = inputs();
        let config = WidthConfig::default();
        let result = segment_centerline(&PlanarToolkit, &centerline, &segments, &[(0, 5)], &config);
        assert!(matches!(result, Err(WidthError::InvalidLayer { .. })));
    }
}
