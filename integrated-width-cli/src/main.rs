use anyhow::Result;
use clap::Parser;
use integrated_width::{GpkgStore, PlanarToolkit, WidthConfig, WidthReport};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input GeoPackage holding the centerline and the segmented valley bottom
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output directory; the result is written to <DIR>/outputs/integrated_line.gpkg
    #[arg(short, long, value_name = "DIR")]
    output: PathBuf,

    /// Name of the centerline table
    #[arg(long, default_value = "centerline")]
    centerline_table: String,

    /// Name of the segmented valley-bottom table
    #[arg(long, default_value = "valley-bottom-segmented")]
    segments_table: String,

    /// Centerline pieces at or below this length get no width
    #[arg(long, default_value_t = 1e-9)]
    min_length: f64,
}

impl Args {
    fn config(&self) -> WidthConfig {
        WidthConfig {
            centerline_table: self.centerline_table.clone(),
            segments_table: self.segments_table.clone(),
            min_length: self.min_length,
            ..WidthConfig::default()
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let start_time = std::time::Instant::now();

    if !GpkgStore::is_available() {
        error!("GDAL was built without the GPKG driver");
        anyhow::bail!("GeoPackage support is not available");
    }

    let config = args.config();
    let report = integrated_width::run(
        &GpkgStore::new(),
        &PlanarToolkit::new(),
        &args.input,
        &args.output,
        &config,
    )?;

    print_summary(&report);

    let elapsed = start_time.elapsed();
    info!("Total processing time: {:?}", elapsed);

    Ok(())
}

fn print_summary(report: &WidthReport) {
    println!("{:>6} {:>12} {:>12} {:>12}", "fid", "seg_area_m", "length_m", "int_width_m");
    for width in &report.widths {
        let area = width
            .seg_area_m
            .map(|a| format!("{:.2}", a))
            .unwrap_or_else(|| "-".to_string());
        let int_width = width
            .int_width_m
            .map(|w| format!("{:.2}", w))
            .unwrap_or_else(|| "undefined".to_string());
        println!(
            "{:>6} {:>12} {:>12.2} {:>12}",
            width.fid, area, width.length_m, int_width
        );
    }

    let flagged = report.flagged();
    println!(
        "Wrote {} features to {} ({} flagged)",
        report.output.len(),
        report.output_path.display(),
        flagged.len()
    );
    if !flagged.is_empty() {
        println!("Undefined width for fids: {:?}", flagged);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_config() {
        let args = Args::try_parse_from(["integrated-width", "reach.gpkg", "-o", "out"]).unwrap();
        let config = args.config();
        let defaults = WidthConfig::default();
        assert_eq!(config.centerline_table, defaults.centerline_table);
        assert_eq!(config.segments_table, defaults.segments_table);
        assert_eq!(config.min_length, defaults.min_length);
    }

    #[test]
    fn test_table_overrides() {
        let args = Args::try_parse_from([
            "integrated-width",
            "reach.gpkg",
            "--output",
            "out",
            "--centerline-table",
            "thalweg",
            "--segments-table",
            "vb",
            "--min-length",
            "0.01",
        ])
        .unwrap();
        let config = args.config();
        assert_eq!(config.centerline_table, "thalweg");
        assert_eq!(config.segments_table, "vb");
        assert_eq!(config.min_length, 0.01);
        assert_eq!(config.output_file, "integrated_line.gpkg");
    }

    #[test]
    fn test_output_is_required() {
        assert!(Args::try_parse_from(["integrated-width", "reach.gpkg"]).is_err());
    }
}
