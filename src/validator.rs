use tracing::{debug, info};

use crate::error::{Result, WidthError};
use crate::model::VectorLayer;
use crate::toolkit::GeometryToolkit;

/// A (centerline feature index, segment feature index) pair whose geometries intersect.
pub type FeaturePair = (usize, usize);

/// Both layers must carry the same CRS description. Reprojection is never attempted.
pub fn check_crs(centerline: &VectorLayer, segments: &VectorLayer) -> Result<()> {
    let left = centerline.crs.as_deref().map(str::trim);
    let right = segments.crs.as_deref().map(str::trim);
    if left != right {
        return Err(WidthError::CrsMismatch {
            left: describe_crs(centerline),
            right: describe_crs(segments),
        });
    }
    Ok(())
}

fn describe_crs(layer: &VectorLayer) -> String {
    match &layer.crs {
        Some(wkt) => format!("{}: {}", layer.name, wkt.lines().next().unwrap_or_default()),
        None => format!("{}: <none>", layer.name),
    }
}

pub fn check_non_empty(layer: &VectorLayer) -> Result<()> {
    if layer.is_empty() {
        return Err(WidthError::invalid_layer(&layer.name, "layer has no features"));
    }
    Ok(())
}

/// Every intersecting (centerline, segment) pair, in centerline-then-segment order.
pub fn intersecting_pairs<T: GeometryToolkit>(
    toolkit: &T,
    centerline: &VectorLayer,
    segments: &VectorLayer,
) -> Vec<FeaturePair> {
    let mut pairs = Vec::new();
    for (i, line) in centerline.features().iter().enumerate() {
        for (j, segment) in segments.features().iter().enumerate() {
            if toolkit.intersects(&line.geometry, &segment.geometry) {
                pairs.push((i, j));
            }
        }
    }
    pairs
}

/// Runs every precondition check and returns the intersecting pairs.
pub fn validate<T: GeometryToolkit>(
    toolkit: &T,
    centerline: &VectorLayer,
    segments: &VectorLayer,
) -> Result<Vec<FeaturePair>> {
    check_crs(centerline, segments)?;
    debug!("CRS check passed");

    check_non_empty(centerline)?;
    check_non_empty(segments)?;

    let pairs = intersecting_pairs(toolkit, centerline, segments);
    if pairs.is_empty() {
        return Err(WidthError::NoIntersection {
            centerline: centerline.name.clone(),
            segments: segments.name.clone(),
        });
    }

    info!(
        "{} intersecting pairs between '{}' and '{}'",
        pairs.len(),
        centerline.name,
        segments.name
    );
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolkit::PlanarToolkit;
    use geo::{line_string, polygon};

    fn layers(crs_a: Option<&str>, crs_b: Option<&str>) -> (VectorLayer, VectorLayer) {
        let mut centerline = VectorLayer::new("centerline", crs_a.map(String::from));
        centerline.add_feature(1, line_string![(x: -1.0, y: 5.0), (x: 21.0, y: 5.0)].into());
        let mut segments = VectorLayer::new("segments", crs_b.map(String::from));
        segments.add_feature(
            1,
            polygon![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0)]
                .into(),
        );
        segments.add_feature(
            2,
            polygon![(x: 10.0, y: 0.0), (x: 20.0, y: 0.0), (x: 20.0, y: 10.0), (x: 10.0, y: 10.0)]
                .into(),
        );
        (centerline, segments)
    }

    #[test]
    fn test_crs_match() {
        let (a, b) = layers(Some("EPSG:32633"), Some(" EPSG:32633\n"));
        assert!(check_crs(&a, &b).is_ok());
        let (a, b) = layers(None, None);
        assert!(check_crs(&a, &b).is_ok());
    }

    #[test]
    fn test_crs_mismatch() {
        let (a, b) = layers(Some("EPSG:32633"), Some("EPSG:4326"));
        assert!(matches!(
            validate(&PlanarToolkit, &a, &b),
            Err(WidthError::CrsMismatch { .. })
        ));
        let (a, b) = layers(Some("EPSG:32633"), None);
        assert!(check_crs(&a, &b).is_err());
    }

    #[test]
    fn test_pairs() {
        let (a, b) = layers(None, None);
        let pairs = validate(&PlanarToolkit, &a, &b).unwrap();
        assert_eq!(pairs, vec![(0, 0), (0, 1)]);
    }

    #[test]
    fn test_no_intersection() {
        let (_, b) = layers(None, None);
        let mut far = VectorLayer::new("centerline", None);
        far.add_feature(1, line_string![(x: 100.0, y: 100.0), (x: 200.0, y: 100.0)].into());
        assert!(matches!(
            validate(&PlanarToolkit, &far, &b),
            Err(WidthError::NoIntersection { .. })
        ));
    }

    #[test]
    fn test_empty_layer() {
        let (_, b) = layers(None, None);
        let empty = VectorLayer::new("centerline", None);
        assert!(matches!(
            validate(&PlanarToolkit, &empty, &b),
            Err(WidthError::InvalidLayer { .. })
        ));
    }
}
