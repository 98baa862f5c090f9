use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{Result, WidthError};
use crate::model::VectorLayer;

/// Vector I/O the pipeline delegates to an external toolkit.
pub trait VectorStore {
    /// Names of every table in the container at `path`.
    fn list_tables(&self, path: &Path) -> Result<Vec<String>>;

    fn load_table(&self, path: &Path, name: &str) -> Result<VectorLayer>;

    /// Writes `layer` as a table named after it, replacing any existing container at `path`.
    fn write_table(&self, path: &Path, layer: &VectorLayer) -> Result<()>;

    /// Saves the attributes of `layer` onto the existing table of the same name in `path`,
    /// matching features by fid and adding any missing fields. Other tables are left as is.
    fn update_table(&self, path: &Path, layer: &VectorLayer) -> Result<()>;
}

/// In-memory [`VectorStore`], keyed by container path.
#[derive(Debug, Default)]
pub struct MemoryStore {
    containers: RefCell<HashMap<PathBuf, Vec<VectorLayer>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces one table of the container at `path`.
    pub fn insert(&self, path: impl Into<PathBuf>, layer: VectorLayer) {
        let mut containers = self.containers.borrow_mut();
        let tables = containers.entry(path.into()).or_default();
        tables.retain(|t| t.name != layer.name);
        tables.push(layer);
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.containers.borrow().contains_key(path)
    }
}

impl VectorStore for MemoryStore {
    fn list_tables(&self, path: &Path) -> Result<Vec<String>> {
        let containers = self.containers.borrow();
        let tables = containers
            .get(path)
            .ok_or_else(|| WidthError::invalid_input(path, "no such container"))?;
        Ok(tables.iter().map(|t| t.name.clone()).collect())
    }

    fn load_table(&self, path: &Path, name: &str) -> Result<VectorLayer> {
        let containers = self.containers.borrow();
        containers
            .get(path)
            .and_then(|tables| tables.iter().find(|t| t.name == name))
            .cloned()
            .ok_or_else(|| WidthError::invalid_layer(name, "table not found"))
    }

    fn write_table(&self, path: &Path, layer: &VectorLayer) -> Result<()> {
        self.containers
            .borrow_mut()
            .insert(path.to_path_buf(), vec![layer.clone()]);
        Ok(())
    }

    fn update_table(&self, path: &Path, layer: &VectorLayer) -> Result<()> {
        let mut containers = self.containers.borrow_mut();
        let table = containers
            .get_mut(path)
            .ok_or_else(|| WidthError::invalid_input(path, "no such container"))?
            .iter_mut()
            .find(|t| t.name == layer.name)
            .ok_or_else(|| WidthError::invalid_layer(&layer.name, "table not found"))?;
        *table = layer.clone();
        Ok(())
    }
}
