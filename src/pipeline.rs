//! Loader → Validator → Attributor → Writer, wired together with explicit inputs.

use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::attributor::{attribute_areas, attribute_widths, segment_centerline, FeatureWidth};
use crate::config::WidthConfig;
use crate::error::Result;
use crate::loader::load_inputs;
use crate::model::VectorLayer;
use crate::store::VectorStore;
use crate::toolkit::GeometryToolkit;
use crate::validator::validate;
use crate::writer::OutputWriter;

/// Summary of one completed run.
#[derive(Debug, Clone)]
pub struct WidthReport {
    pub tables: Vec<String>,
    pub centerline_features: usize,
    pub segment_features: usize,
    pub widths: Vec<FeatureWidth>,
    pub output_path: PathBuf,
    /// The written table, read back from `output_path`.
    pub output: VectorLayer,
}

impl WidthReport {
    pub fn flagged(&self) -> Vec<u64> {
        self.widths
            .iter()
            .filter(|w| w.is_flagged())
            .map(|w| w.fid)
            .collect()
    }
}

/// Runs the whole workflow. Any failure aborts the run and is logged before it is returned.
pub fn run<S, T>(
    store: &S,
    toolkit: &T,
    input: &Path,
    output_dir: &Path,
    config: &WidthConfig,
) -> Result<WidthReport>
where
    S: VectorStore,
    T: GeometryToolkit,
{
    run_stages(store, toolkit, input, output_dir, config).inspect_err(|e| {
        error!("Integrated width run failed: {}", e);
    })
}

fn run_stages<S, T>(
    store: &S,
    toolkit: &T,
    input: &Path,
    output_dir: &Path,
    config: &WidthConfig,
) -> Result<WidthReport>
where
    S: VectorStore,
    T: GeometryToolkit,
{
    info!("Processing {:?}", input);
    let inputs = load_inputs(store, input, config)?;
    let centerline = inputs.centerline;
    let mut segments = inputs.segments;

    // all checks run before either layer is touched
    let pairs = validate(toolkit, &centerline, &segments)?;

    attribute_areas(toolkit, &mut segments, config)?;
    let mut segmented = segment_centerline(toolkit, &centerline, &segments, &pairs, config)?;
    let widths = attribute_widths(toolkit, &mut segmented, config)?;

    let written = OutputWriter::new(store, config).write(segmented, output_dir)?;

    // input is saved last, after the output exists
    store.update_table(input, &segments)?;
    info!(
        "Saved {} on {} segments of '{}'",
        config.area_field,
        segments.len(),
        segments.name
    );

    Ok(WidthReport {
        tables: inputs.tables,
        centerline_features: centerline.len(),
        segment_features: segments.len(),
        widths,
        output_path: written.path,
        output: written.layer,
    })
}
