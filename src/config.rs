use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: Engine,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub security: Security,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: Default::default(),
            paths: Default::default(),
            limits: Default::default(),
            output: Default::default(),
            logging: Default::default(),
            security: Default::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Engine {
    /// Engine installation root. "auto" probes SOFFICE_INSTALL_PATH and the
    /// usual distro locations.
    pub install_path: String,
    /// Explicit converter binary. Empty means discover under install_path.
    pub program: String,
    pub convert_timeout_seconds: u64,
    pub version_probe_timeout_seconds: u64,
    /// Per-handle user profile dir. Empty means a fresh dir under work_dir.
    pub profile_dir: String,
    #[serde(default)]
    pub env: std::collections::BTreeMap<String, String>,
}
impl Default for Engine {
    fn default() -> Self {
        Self {
            install_path: "auto".into(),
            program: "".into(),
            convert_timeout_seconds: 600,
            version_probe_timeout_seconds: 20,
            profile_dir: "".into(),
            env: Default::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paths {
    pub out_dir: String,
    pub work_dir: String,
}
impl Default for Paths {
    fn default() -> Self {
        Self {
            out_dir: "out".into(),
            work_dir: ".office-convert-work".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Limits {
    pub max_input_file_bytes: u64,
}
impl Default for Limits {
    fn default() -> Self {
        Self {
            max_input_file_bytes: 2 * 1024 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Output {
    pub print_summary: bool,
    pub write_report_json: bool,
    /// Empty means "<output file name>.report.json" next to the output.
    pub report_filename: String,
}
impl Default for Output {
    fn default() -> Self {
        Self {
            print_summary: true,
            write_report_json: true,
            report_filename: "".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: true,
            file_path: "".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Security {
    pub reject_url_inputs: bool,
}
impl Default for Security {
    fn default() -> Self {
        Self {
            reject_url_inputs: true,
        }
    }
}
