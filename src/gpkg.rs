use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use gdal::spatial_ref::SpatialRef;
use gdal::vector::{
    FieldValue as OgrFieldValue, LayerAccess, LayerOptions, OGRFieldType, OGRwkbGeometryType,
    ToGdal,
};
use gdal::{Dataset, DatasetOptions, DriverManager, GdalOpenFlags};
use geo::Geometry;
use tracing::{debug, warn};

use crate::error::{Result, WidthError};
use crate::model::{FieldType, FieldValue, VectorLayer};
use crate::store::VectorStore;

const GPKG_DRIVER: &str = "GPKG";

/// [`VectorStore`] over GeoPackage containers through GDAL/OGR.
#[derive(Debug, Default, Clone, Copy)]
pub struct GpkgStore {}

impl GpkgStore {
    pub fn new() -> Self {
        Self {}
    }

    /// Whether the linked GDAL build carries the GeoPackage driver.
    pub fn is_available() -> bool {
        DriverManager::get_driver_by_name(GPKG_DRIVER).is_ok()
    }

    /// Writes several tables into one new container, replacing any file at `path`.
    pub fn write_tables(&self, path: &Path, layers: &[&VectorLayer]) -> Result<()> {
        let staging = staging_path(path);
        if staging.exists() {
            fs::remove_file(&staging).map_err(|e| WidthError::io(&staging, e))?;
        }

        if let Err(err) = self.write_container(&staging, layers) {
            if let Err(cleanup) = fs::remove_file(&staging) {
                warn!("Could not remove partial output {:?}: {}", staging, cleanup);
            }
            return Err(err);
        }

        if let Err(err) = fs::rename(&staging, path) {
            if let Err(cleanup) = fs::remove_file(&staging) {
                warn!("Could not remove partial output {:?}: {}", staging, cleanup);
            }
            return Err(WidthError::io(path, err));
        }
        Ok(())
    }

    fn write_container(&self, path: &Path, layers: &[&VectorLayer]) -> Result<()> {
        let driver = DriverManager::get_driver_by_name(GPKG_DRIVER)?;
        let mut dataset = driver.create_vector_only(path)?;
        let mut txn = dataset.start_transaction()?;

        for layer in layers {
            let srs = layer
                .crs
                .as_deref()
                .map(SpatialRef::from_wkt)
                .transpose()?;

            let mut table = txn.create_layer(LayerOptions {
                name: &layer.name,
                srs: srs.as_ref(),
                ty: layer_geometry_type(layer),
                options: None,
            })?;

            let defs: Vec<(&str, OGRFieldType::Type)> = layer
                .fields()
                .iter()
                .map(|f| (f.name.as_str(), ogr_field_type(f.field_type)))
                .collect();
            table.create_defn_fields(&defs)?;

            for feature in layer.features() {
                // OGR has no per-call null, so null attributes are simply left unset
                let mut names = Vec::new();
                let mut values = Vec::new();
                for (defn, value) in layer.fields().iter().zip(feature.values()) {
                    if let Some(value) = value {
                        names.push(defn.name.as_str());
                        values.push(to_ogr(value));
                    }
                }
                table.create_feature_fields(feature.geometry.to_gdal()?, &names, &values)?;
            }
            debug!("Wrote {} features to '{}'", layer.len(), layer.name);
        }

        txn.commit()?;
        Ok(())
    }
}

impl VectorStore for GpkgStore {
    fn list_tables(&self, path: &Path) -> Result<Vec<String>> {
        let dataset = Dataset::open(path)?;
        Ok(dataset.layers().map(|layer| layer.name()).collect())
    }

    fn load_table(&self, path: &Path, name: &str) -> Result<VectorLayer> {
        let dataset = Dataset::open(path)?;
        let mut table = dataset
            .layer_by_name(name)
            .map_err(|e| WidthError::invalid_layer(name, e.to_string()))?;

        let crs = match table.spatial_ref() {
            Some(srs) => Some(srs.to_wkt()?),
            None => None,
        };

        let mut layer = VectorLayer::new(name, crs);
        let schema: Vec<(String, FieldType)> = table
            .defn()
            .fields()
            .map(|f| (f.name(), field_type_from_ogr(f.field_type())))
            .collect();
        for (field_name, field_type) in &schema {
            layer.ensure_field(field_name, *field_type)?;
        }

        for (position, feature) in table.features().enumerate() {
            let fid = feature.fid().unwrap_or(position as u64 + 1);
            let geometry: Geometry<f64> = feature
                .geometry()
                .ok_or_else(|| {
                    WidthError::invalid_layer(name, format!("feature {} has no geometry", fid))
                })?
                .to_geo()?;

            let index = layer.add_feature(fid, geometry);
            for ((field_name, field_type), (_, value)) in schema.iter().zip(feature.fields()) {
                let value = value.and_then(|v| from_ogr(v, *field_type));
                layer.set_value(index, field_name, value)?;
            }
        }

        debug!("Loaded {} features from '{}'", layer.len(), name);
        Ok(layer)
    }

    fn write_table(&self, path: &Path, layer: &VectorLayer) -> Result<()> {
        self.write_tables(path, &[layer])
    }

    fn update_table(&self, path: &Path, layer: &VectorLayer) -> Result<()> {
        let options = DatasetOptions {
            open_flags: GdalOpenFlags::GDAL_OF_UPDATE | GdalOpenFlags::GDAL_OF_VECTOR,
            ..DatasetOptions::default()
        };
        let mut dataset = Dataset::open_ex(path, options)?;
        let txn = dataset.start_transaction()?;

        {
            let mut table = txn
                .layer_by_name(&layer.name)
                .map_err(|e| WidthError::invalid_layer(&layer.name, e.to_string()))?;

            let stored: Vec<(String, FieldType)> = table
                .defn()
                .fields()
                .map(|f| (f.name(), field_type_from_ogr(f.field_type())))
                .collect();
            let mut missing = Vec::new();
            for defn in layer.fields() {
                match stored.iter().find(|(name, _)| *name == defn.name) {
                    Some((_, ty)) if *ty != defn.field_type => warn!(
                        "Field '{}' of '{}' is stored as {:?}, values are converted from {:?}",
                        defn.name, layer.name, ty, defn.field_type
                    ),
                    Some(_) => {}
                    None => missing.push((defn.name.as_str(), ogr_field_type(defn.field_type))),
                }
            }
            if !missing.is_empty() {
                table.create_defn_fields(&missing)?;
            }

            for feature in layer.features() {
                let mut target = table.feature(feature.fid).ok_or_else(|| {
                    WidthError::invalid_layer(
                        &layer.name,
                        format!("feature {} not found in {:?}", feature.fid, path),
                    )
                })?;
                for (defn, value) in layer.fields().iter().zip(feature.values()) {
                    let index = target.field_index(&defn.name)?;
                    match value {
                        Some(value) => target.set_field(index, &to_ogr(value))?,
                        None => target.set_field_null(index)?,
                    }
                }
                table.set_feature(target)?;
            }
        }

        txn.commit()?;
        debug!("Updated {} features of '{}' in {:?}", layer.len(), layer.name, path);
        Ok(())
    }
}

/// Sibling path the container is built at before it is moved into place.
fn staging_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(path.file_name().unwrap_or_default());
    name.push(".partial.gpkg");
    path.with_file_name(name)
}

fn field_type_from_ogr(ty: OGRFieldType::Type) -> FieldType {
    match ty {
        OGRFieldType::OFTInteger | OGRFieldType::OFTInteger64 => FieldType::Integer,
        OGRFieldType::OFTReal => FieldType::Real,
        _ => FieldType::String,
    }
}

fn ogr_field_type(ty: FieldType) -> OGRFieldType::Type {
    match ty {
        FieldType::Integer => OGRFieldType::OFTInteger64,
        FieldType::Real => OGRFieldType::OFTReal,
        FieldType::String => OGRFieldType::OFTString,
    }
}

fn from_ogr(value: OgrFieldValue, ty: FieldType) -> Option<FieldValue> {
    match ty {
        FieldType::Integer => value.into_int64().map(FieldValue::Integer),
        FieldType::Real => value.into_real().map(FieldValue::Real),
        FieldType::String => value.into_string().map(FieldValue::String),
    }
}

fn to_ogr(value: &FieldValue) -> OgrFieldValue {
    match value {
        FieldValue::Integer(v) => OgrFieldValue::Integer64Value(*v),
        FieldValue::Real(v) => OgrFieldValue::RealValue(*v),
        FieldValue::String(s) => OgrFieldValue::StringValue(s.clone()),
    }
}

/// Declared table geometry type: the shared concrete type, or unknown when features differ.
fn layer_geometry_type(layer: &VectorLayer) -> OGRwkbGeometryType::Type {
    let mut types = layer.features().iter().map(|f| wkb_type(&f.geometry));
    match types.next() {
        Some(first) if types.all(|t| t == first) => first,
        _ => OGRwkbGeometryType::wkbUnknown,
    }
}

fn wkb_type(geometry: &Geometry<f64>) -> OGRwkbGeometryType::Type {
    match geometry {
        Geometry::Point(_) => OGRwkbGeometryType::wkbPoint,
        Geometry::MultiPoint(_) => OGRwkbGeometryType::wkbMultiPoint,
        Geometry::Line(_) | Geometry::LineString(_) => OGRwkbGeometryType::wkbLineString,
        Geometry::MultiLineString(_) => OGRwkbGeometryType::wkbMultiLineString,
        Geometry::Polygon(_) | Geometry::Rect(_) | Geometry::Triangle(_) => {
            OGRwkbGeometryType::wkbPolygon
        }
        Geometry::MultiPolygon(_) => OGRwkbGeometryType::wkbMultiPolygon,
        Geometry::GeometryCollection(_) => OGRwkbGeometryType::wkbGeometryCollection,
    }
}
