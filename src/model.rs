use geo::Geometry;
use tracing::debug;

use crate::error::{Result, WidthError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Integer,
    Real,
    String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Integer(i64),
    Real(f64),
    String(String),
}

impl FieldValue {
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValue::Integer(_) => FieldType::Integer,
            FieldValue::Real(_) => FieldType::Real,
            FieldValue::String(_) => FieldType::String,
        }
    }

    /// Numeric view of the value. Text is parsed, so areas stored as text still work.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(v) => Some(*v as f64),
            FieldValue::Real(v) => Some(*v),
            FieldValue::String(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDefn {
    pub name: String,
    pub field_type: FieldType,
}

impl FieldDefn {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }
}

/// Coarse geometry family of a feature or a whole layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryKind {
    Point,
    Line,
    Polygon,
    Empty,
    Mixed,
}

impl GeometryKind {
    pub fn of(geometry: &Geometry<f64>) -> Self {
        match geometry {
            Geometry::Point(_) | Geometry::MultiPoint(_) => GeometryKind::Point,
            Geometry::Line(_) | Geometry::LineString(_) | Geometry::MultiLineString(_) => {
                GeometryKind::Line
            }
            Geometry::Polygon(_)
            | Geometry::MultiPolygon(_)
            | Geometry::Rect(_)
            | Geometry::Triangle(_) => GeometryKind::Polygon,
            Geometry::GeometryCollection(collection) => collection
                .iter()
                .map(GeometryKind::of)
                .fold(GeometryKind::Empty, GeometryKind::merge),
        }
    }

    fn merge(self, other: Self) -> Self {
        match (self, other) {
            (GeometryKind::Empty, kind) | (kind, GeometryKind::Empty) => kind,
            (a, b) if a == b => a,
            _ => GeometryKind::Mixed,
        }
    }
}

/// A geometry plus one value slot per field of the owning layer's schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub fid: u64,
    pub geometry: Geometry<f64>,
    values: Vec<Option<FieldValue>>,
}

impl Feature {
    pub fn values(&self) -> &[Option<FieldValue>] {
        &self.values
    }
}

/// A named, CRS-tagged collection of features sharing one schema.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorLayer {
    pub name: String,
    /// CRS description as WKT.
    pub crs: Option<String>,
    fields: Vec<FieldDefn>,
    features: Vec<Feature>,
}

impl VectorLayer {
    pub fn new(name: impl Into<String>, crs: Option<String>) -> Self {
        Self {
            name: name.into(),
            crs,
            fields: Vec::new(),
            features: Vec::new(),
        }
    }

    pub fn fields(&self) -> &[FieldDefn] {
        &self.fields
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn geometry_kind(&self) -> GeometryKind {
        self.features
            .iter()
            .map(|f| GeometryKind::of(&f.geometry))
            .fold(GeometryKind::Empty, GeometryKind::merge)
    }

    /// Adds `name` unless it is already in the schema. Returns whether a field was added.
    pub fn ensure_field(&mut self, name: &str, field_type: FieldType) -> Result<bool> {
        if let Some(existing) = self.fields.iter().find(|f| f.name == name) {
            if existing.field_type != field_type {
                return Err(WidthError::invalid_layer(
                    &self.name,
                    format!(
                        "field '{}' already exists as {:?}, expected {:?}",
                        name, existing.field_type, field_type
                    ),
                ));
            }
            debug!("Field '{}' already present on '{}'", name, self.name);
            return Ok(false);
        }

        self.fields.push(FieldDefn::new(name, field_type));
        for feature in &mut self.features {
            feature.values.push(None);
        }
        debug!("Added field '{}' to '{}'", name, self.name);
        Ok(true)
    }

    /// Like [`ensure_field`](Self::ensure_field) for a `Real` field, but an existing
    /// `Integer` field of that name is widened to `Real` in place, values included.
    pub fn ensure_real_field(&mut self, name: &str) -> Result<bool> {
        if let Some(column) = self.field_index(name) {
            if self.fields[column].field_type == FieldType::Integer {
                for feature in &mut self.features {
                    if let Some(FieldValue::Integer(v)) = feature.values[column] {
                        feature.values[column] = Some(FieldValue::Real(v as f64));
                    }
                }
                self.fields[column].field_type = FieldType::Real;
                debug!("Widened field '{}' on '{}' to Real", name, self.name);
                return Ok(false);
            }
        }
        self.ensure_field(name, FieldType::Real)
    }

    /// Appends a feature with every attribute null and returns its index.
    pub fn add_feature(&mut self, fid: u64, geometry: Geometry<f64>) -> usize {
        self.features.push(Feature {
            fid,
            geometry,
            values: vec![None; self.fields.len()],
        });
        self.features.len() - 1
    }

    pub fn value(&self, feature: usize, field: &str) -> Option<&FieldValue> {
        let column = self.field_index(field)?;
        self.features.get(feature)?.values[column].as_ref()
    }

    /// Writes one attribute directly, outside any edit session.
    pub fn set_value(
        &mut self,
        feature: usize,
        field: &str,
        value: Option<FieldValue>,
    ) -> Result<()> {
        let column = self.check_write(feature, field, value.as_ref())?;
        self.features[feature].values[column] = value;
        Ok(())
    }

    fn check_write(
        &self,
        feature: usize,
        field: &str,
        value: Option<&FieldValue>,
    ) -> Result<usize> {
        let column = self
            .field_index(field)
            .ok_or_else(|| WidthError::MissingField(field.to_string()))?;
        if feature >= self.features.len() {
            return Err(WidthError::invalid_layer(
                &self.name,
                format!("feature index {} out of range", feature),
            ));
        }
        if let Some(value) = value {
            let expected = self.fields[column].field_type;
            if value.field_type() != expected {
                return Err(WidthError::invalid_layer(
                    &self.name,
                    format!(
                        "field '{}' is {:?}, got {:?}",
                        field,
                        expected,
                        value.field_type()
                    ),
                ));
            }
        }
        Ok(column)
    }

    /// Runs `edits` inside one edit session. Buffered writes are applied together when it
    /// returns `Ok` and discarded when it returns `Err`.
    pub fn edit<T, F>(&mut self, edits: F) -> Result<T>
    where
        F: FnOnce(&mut EditSession<'_>) -> Result<T>,
    {
        let mut session = EditSession {
            layer: self,
            pending: Vec::new(),
        };
        let outcome = edits(&mut session);
        let pending = session.pending;

        match outcome {
            Ok(result) => {
                let count = pending.len();
                for (feature, column, value) in pending {
                    self.features[feature].values[column] = value;
                }
                debug!("Committed {} edits on '{}'", count, self.name);
                Ok(result)
            }
            Err(err) => {
                debug!(
                    "Rolled back {} edits on '{}': {}",
                    pending.len(),
                    self.name,
                    err
                );
                Err(err)
            }
        }
    }
}

/// Read access to a layer plus a buffer of pending attribute writes.
pub struct EditSession<'a> {
    layer: &'a VectorLayer,
    pending: Vec<(usize, usize, Option<FieldValue>)>,
}

impl<'a> EditSession<'a> {
    /// The layer as it was when the session opened. Pending writes are not visible here.
    pub fn layer(&self) -> &'a VectorLayer {
        self.layer
    }

    pub fn set_value(
        &mut self,
        feature: usize,
        field: &str,
        value: Option<FieldValue>,
    ) -> Result<()> {
        let column = self.layer.check_write(feature, field, value.as_ref())?;
        self.pending.push((feature, column, value));
        Ok(())
    }
}
