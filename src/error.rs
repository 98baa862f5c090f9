use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, WidthError>;

#[derive(Debug, Error)]
pub enum WidthError {
    #[error("invalid input {path:?}: {reason}")]
    InvalidInput { path: PathBuf, reason: String },

    #[error("invalid layer '{layer}': {reason}")]
    InvalidLayer { layer: String, reason: String },

    #[error("CRS mismatch between '{left}' and '{right}'; reproject one layer first")]
    CrsMismatch { left: String, right: String },

    #[error("no feature of '{centerline}' intersects any feature of '{segments}'")]
    NoIntersection { centerline: String, segments: String },

    #[error("feature {fid}: width undefined (length {length}, area {area:?})")]
    Arithmetic {
        fid: u64,
        length: f64,
        area: Option<f64>,
    },

    #[error("unsupported geometry: {0}")]
    Geometry(String),

    #[error("field '{0}' not found")]
    MissingField(String),

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Gdal(#[from] gdal::errors::GdalError),
}

impl WidthError {
    pub(crate) fn invalid_input(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_layer(layer: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidLayer {
            layer: layer.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
