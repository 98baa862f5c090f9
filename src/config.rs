/// Names and thresholds used by every stage of the pipeline.
#[derive(Debug, Clone)]
pub struct WidthConfig {
    pub centerline_table: String,
    pub segments_table: String,
    /// Required input extension, compared case-insensitively.
    pub input_extension: String,
    pub area_field: String,
    pub length_field: String,
    pub width_field: String,
    /// Prefix applied to segment fields copied onto the segmented centerline.
    pub segment_prefix: String,
    pub outputs_dir: String,
    pub output_file: String,
    pub output_table: String,
    /// Lengths at or below this are treated as degenerate.
    pub min_length: f64,
}

impl Default for WidthConfig {
    fn default() -> Self {
        Self {
            centerline_table: "centerline".to_string(),
            segments_table: "valley-bottom-segmented".to_string(),
            input_extension: "gpkg".to_string(),
            area_field: "area_m".to_string(),
            length_field: "length_m".to_string(),
            width_field: "int_width_m".to_string(),
            segment_prefix: "seg_".to_string(),
            outputs_dir: "outputs".to_string(),
            output_file: "integrated_line.gpkg".to_string(),
            output_table: "integrated_line".to_string(),
            min_length: 1e-9,
        }
    }
}

impl WidthConfig {
    /// Name of the segment area field as it appears on the segmented centerline.
    pub fn segment_area_field(&self) -> String {
        format!("{}{}", self.segment_prefix, self.area_field)
    }
}
