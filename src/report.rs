use serde::{Deserialize, Serialize};

/// Written next to the output when [output].write_report_json is enabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionReport {
    pub input: String,
    pub input_sha256: String,
    pub output: String,
    pub format: String,
    pub filter_options: String,
    pub output_bytes: u64,
    pub duration_ms: u64,
    pub finished: String,
}
