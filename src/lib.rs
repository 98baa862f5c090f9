pub mod attributor;
pub mod config;
pub mod error;
pub mod gpkg;
pub mod loader;
pub mod model;
pub mod pipeline;
pub mod store;
pub mod toolkit;
pub mod validator;
pub mod writer;

pub use config::WidthConfig;
pub use error::{Result, WidthError};
pub use gpkg::GpkgStore;
pub use model::{FieldType, FieldValue, VectorLayer};
pub use pipeline::{run, WidthReport};
pub use store::{MemoryStore, VectorStore};
pub use toolkit::{GeometryToolkit, PlanarToolkit};
pub use writer::OutputWriter;
