use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InitError {
    #[error("install path is empty")]
    EmptyInstallPath,

    #[error("engine program not found under {install_path}")]
    ProgramNotFound { install_path: PathBuf },

    #[error("engine profile setup failed: {0}")]
    Profile(String),

    #[error("engine probe failed: {0}")]
    Probe(String),
}

/// Every failure a convert call can surface. All variants render a non-empty,
/// cause-specific diagnostic through `Display`.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("engine not ready: {0}")]
    NotReady(String),

    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("conversion failed: {0}")]
    Conversion(String),

    /// Unrecoverable engine condition. The owning handle is poisoned and
    /// further calls short-circuit with `NotReady`.
    #[error("engine fault: {0}")]
    Fault(String),
}

impl ConvertError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, ConvertError::Fault(_))
    }
}
