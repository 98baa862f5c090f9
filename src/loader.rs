use std::path::Path;

use tracing::info;

use crate::config::WidthConfig;
use crate::error::{Result, WidthError};
use crate::model::{GeometryKind, VectorLayer};
use crate::store::VectorStore;

/// The two input tables of one run.
#[derive(Debug, Clone)]
pub struct InputLayers {
    pub tables: Vec<String>,
    pub centerline: VectorLayer,
    pub segments: VectorLayer,
}

/// Fails unless `path` is an existing regular file with the expected extension.
pub fn check_input_path(path: &Path, extension: &str) -> Result<()> {
    if !path.exists() {
        return Err(WidthError::invalid_input(path, "path does not exist"));
    }
    if !path.is_file() {
        return Err(WidthError::invalid_input(path, "not a regular file"));
    }
    let matches = path
        .extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
    if !matches {
        return Err(WidthError::invalid_input(
            path,
            format!("expected a .{} file", extension),
        ));
    }
    Ok(())
}

pub fn load_inputs<S: VectorStore>(
    store: &S,
    path: &Path,
    config: &WidthConfig,
) -> Result<InputLayers> {
    check_input_path(path, &config.input_extension)?;

    let tables = store.list_tables(path)?;
    info!("Found {} tables in {:?}", tables.len(), path);
    for table in &tables {
        info!("  {}", table);
    }

    let centerline = load_layer(store, path, &config.centerline_table, GeometryKind::Line)?;
    let segments = load_layer(store, path, &config.segments_table, GeometryKind::Polygon)?;

    Ok(InputLayers {
        tables,
        centerline,
        segments,
    })
}

fn load_layer<S: VectorStore>(
    store: &S,
    path: &Path,
    name: &str,
    expected: GeometryKind,
) -> Result<VectorLayer> {
    let layer = store
        .load_table(path, name)
        .map_err(|e| match e {
            WidthError::InvalidLayer { .. } => e,
            other => WidthError::invalid_layer(name, other.to_string()),
        })?;

    if layer.is_empty() {
        return Err(WidthError::invalid_layer(name, "layer has no features"));
    }
    let kind = layer.geometry_kind();
    if kind != expected {
        return Err(WidthError::invalid_layer(
            name,
            format!("expected {:?} geometries, found {:?}", expected, kind),
        ));
    }

    info!("Loaded '{}' ({} features)", name, layer.len());
    Ok(layer)
}
