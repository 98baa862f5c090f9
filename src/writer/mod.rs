use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::WidthConfig;
use crate::error::{Result, WidthError};
use crate::model::VectorLayer;
use crate::store::VectorStore;

/// Where the segmented centerline ended up, and the table as read back from there.
#[derive(Debug, Clone)]
pub struct WrittenOutput {
    pub path: PathBuf,
    pub layer: VectorLayer,
}

pub struct OutputWriter<'a, S: VectorStore> {
    store: &'a S,
    config: &'a WidthConfig,
}

impl<'a, S: VectorStore> OutputWriter<'a, S> {
    pub fn new(store: &'a S, config: &'a WidthConfig) -> Self {
        Self { store, config }
    }

    /// `<output_dir>/<outputs_dir>/<output_file>`
    pub fn output_path(&self, output_dir: &Path) -> PathBuf {
        output_dir
            .join(&self.config.outputs_dir)
            .join(&self.config.output_file)
    }

    /// Writes `layer` and reads it back. The in-memory layer is consumed.
    pub fn write(&self, layer: VectorLayer, output_dir: &Path) -> Result<WrittenOutput> {
        let outputs = output_dir.join(&self.config.outputs_dir);
        fs::create_dir_all(&outputs).map_err(|e| WidthError::io(&outputs, e))?;

        let path = outputs.join(&self.config.output_file);
        self.store.write_table(&path, &layer)?;
        info!("Written {} features to {:?}", layer.len(), path);

        let name = layer.name.clone();
        drop(layer);
        debug!("Discarded temporary layer '{}'", name);

        let reloaded = self.store.load_table(&path, &name)?;
        Ok(WrittenOutput {
            path,
            layer: reloaded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldType, FieldValue};
    use crate::store::MemoryStore;
    use geo::{line_string, MultiLineString};
    use tempfile::TempDir;

    fn output_layer() -> VectorLayer {
        let mut layer = VectorLayer::new("integrated_line", None);
        layer.ensure_field("int_width_m", FieldType::Real).unwrap();
        let line = line_string![(x: 0.0, y: 0.0), (x: 50.0, y: 0.0)];
        let idx = layer.add_feature(1, MultiLineString::new(vec![line]).into());
        layer
            .set_value(idx, "int_width_m", Some(FieldValue::Real(20.0)))
            .unwrap();
        layer
    }

    #[test]
    fn test_write_creates_outputs_dir() {
        let temp_dir = TempDir::new().unwrap();
        let store = MemoryStore::new();
        let config = WidthConfig::default();
        let writer = OutputWriter::new(&store, &config);

        let written = writer.write(output_layer(), temp_dir.path()).unwrap();
        assert!(temp_dir.path().join("outputs").is_dir());
        assert_eq!(
            written.path,
            temp_dir.path().join("outputs").join("integrated_line.gpkg")
        );
        assert_eq!(written.path, writer.output_path(temp_dir.path()));
        assert_eq!(written.layer, output_layer());
    }

    #[test]
    fn test_existing_outputs_dir_is_fine() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("outputs")).unwrap();
        let store = MemoryStore::new();
        let config = WidthConfig::default();
        let writer = OutputWriter::new(&store, &config);

        writer.write(output_layer(), temp_dir.path()).unwrap();
        writer.write(output_layer(), temp_dir.path()).unwrap();
        assert!(store.contains(&writer.output_path(temp_dir.path())));
    }

    #[test]
    fn test_unwritable_output_dir() {
        let temp_dir = TempDir::new().unwrap();
        // a regular file where the directory should go
        let blocker = temp_dir.path().join("not-a-dir");
        fs::write(&blocker, b"").unwrap();

        let store = MemoryStore::new();
        let config = WidthConfig::default();
        let writer = OutputWriter::new(&store, &config);
        assert!(matches!(
            writer.write(output_layer(), &blocker),
            Err(WidthError::Io { .. })
        ));
    }
}
