use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineDiag {
    pub program: String,
    pub install_path: String,
    pub profile_dir: String,
    pub version: Option<String>,
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// One document render, staged into a private directory. The facade moves the
/// artifact to its final location only after the engine reports success.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub input: PathBuf,
    pub staging_dir: PathBuf,
    pub format: String,
    /// Opaque engine-specific tuning, forwarded verbatim. May be empty.
    pub filter_options: String,
}

#[derive(Debug, Clone)]
pub struct RenderedDoc {
    pub path: PathBuf,
    pub bytes: u64,
}
