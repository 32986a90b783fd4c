pub mod soffice;
pub mod types;

use crate::error::ConvertError;
use anyhow::Result;

pub use types::{EngineDiag, RenderRequest, RenderedDoc};

/// Capability interface to the external conversion engine. `render` failures
/// are typed so the owning handle can tell recoverable conversion errors from
/// faults that poison the engine.
pub trait Engine: Send {
    fn diagnose(&self) -> Result<EngineDiag>;
    fn render(&self, req: &RenderRequest) -> Result<RenderedDoc, ConvertError>;
    fn shutdown(&mut self) -> Result<()>;
}
