use serde::{Deserialize, Serialize};

/// Summary written next to the results of a run.
///
/// Serializes to a JSON object with exactly these five keys. Counts are zero
/// for artifacts that were not present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    /// The `YYYYMMDD_HHMMSS` token shared by the output files.
    pub processing_date: String,
    pub original_points: usize,
    pub final_points: usize,
    pub mesh_vertices: usize,
    pub mesh_faces: usize,
}

impl ProcessingMetadata {
    /// Pretty-printed JSON with two-space indentation.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
