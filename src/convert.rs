use crate::config::Config;
use crate::engine::{soffice::SofficeEngine, Engine, RenderRequest};
use crate::error::{ConvertError, InitError};
use crate::formats;
use crate::handle::EngineHandle;
use crate::util::sha256_hex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

static STAGE_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Output format token, extension-like ("pdf", "odt").
    pub format: String,
    /// Opaque engine-specific options, forwarded verbatim. May be empty.
    pub filter_options: String,
}

/// Explicit success value. Returned only once the output file is complete and
/// sitting at the requested path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversion {
    pub output_path: PathBuf,
    pub output_bytes: u64,
    pub duration_ms: u64,
}

pub struct Converter<E: Engine> {
    cfg: Config,
    handle: EngineHandle<E>,
}

impl Converter<SofficeEngine> {
    pub fn new(cfg: &Config) -> Result<Self, InitError> {
        let handle = EngineHandle::create(cfg)?;
        Ok(Self::from_handle(cfg, handle))
    }
}

impl<E: Engine> Converter<E> {
    pub fn from_handle(cfg: &Config, handle: EngineHandle<E>) -> Self {
        Self {
            cfg: cfg.clone(),
            handle,
        }
    }

    pub fn handle(&self) -> &EngineHandle<E> {
        &self.handle
    }

    /// Convert one document. All-or-nothing: on success the complete artifact
    /// is at `req.output`; on any failure nothing is left there and the
    /// diagnostic names the cause. The handle serializes concurrent calls.
    pub fn convert(&self, req: &ConversionRequest) -> Result<Conversion, ConvertError> {
        let started = Instant::now();
        self.validate(req)?;

        if !formats::is_known(&req.format) {
            warn!("unknown output format token '{}', forwarding verbatim", req.format);
        }

        // Path only; the dir is created under the lock, after the ready
        // check, so a dead handle performs no filesystem writes at all.
        let staging_dir = self.staging_path(&req.input);
        let render = RenderRequest {
            input: req.input.clone(),
            staging_dir: staging_dir.clone(),
            format: req.format.clone(),
            filter_options: req.filter_options.clone(),
        };

        let result = self.handle.with_engine(|engine| {
            std::fs::create_dir_all(&staging_dir).map_err(|e| {
                ConvertError::Conversion(format!(
                    "create staging dir {}: {e}",
                    staging_dir.display()
                ))
            })?;
            let doc = engine.render(&render)?;
            place_output(&doc.path, &req.output)?;
            Ok(doc.bytes)
        });

        // Staging is discarded on every exit path; a failed call must not
        // leave a partial artifact anywhere, least of all at the output path.
        if staging_dir.exists() {
            if let Err(err) = std::fs::remove_dir_all(&staging_dir) {
                debug!("remove staging dir {}: {err}", staging_dir.display());
            }
        }

        let output_bytes = result?;
        let duration_ms = started.elapsed().as_millis() as u64;
        info!(
            "converted {} -> {} format={} bytes={} in {}ms",
            req.input.display(),
            req.output.display(),
            req.format,
            output_bytes,
            duration_ms
        );

        Ok(Conversion {
            output_path: req.output.clone(),
            output_bytes,
            duration_ms,
        })
    }

    pub fn close(&self) -> anyhow::Result<()> {
        self.handle.close()
    }

    fn validate(&self, req: &ConversionRequest) -> Result<(), ConvertError> {
        if req.input.as_os_str().is_empty() {
            return Err(ConvertError::Invalid("input path is empty".into()));
        }
        if req.output.as_os_str().is_empty() {
            return Err(ConvertError::Invalid("output path is empty".into()));
        }
        if req.format.trim().is_empty() {
            return Err(ConvertError::Invalid("output format is empty".into()));
        }

        let input_str = req.input.display().to_string();
        if self.cfg.security.reject_url_inputs && looks_like_url(&input_str) {
            return Err(ConvertError::Invalid(format!(
                "URL inputs are disabled: {input_str}"
            )));
        }

        let meta = std::fs::metadata(&req.input).map_err(|_| {
            ConvertError::Invalid(format!("input file not found: {}", req.input.display()))
        })?;
        if !meta.is_file() {
            return Err(ConvertError::Invalid(format!(
                "input is not a regular file: {}",
                req.input.display()
            )));
        }
        if meta.len() > self.cfg.limits.max_input_file_bytes {
            return Err(ConvertError::Invalid(format!(
                "input exceeds max_input_file_bytes: {}",
                meta.len()
            )));
        }

        if let Some(parent) = req.output.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                return Err(ConvertError::Invalid(format!(
                    "output directory does not exist: {}",
                    parent.display()
                )));
            }
        }

        Ok(())
    }

    fn staging_path(&self, input: &Path) -> PathBuf {
        let n = STAGE_COUNTER.fetch_add(1, Ordering::Relaxed);
        let tag = sha256_hex(
            format!("{}:{}:{n}", input.display(), std::process::id()).as_bytes(),
        );
        PathBuf::from(&self.cfg.paths.work_dir).join(format!("stage-{}", &tag[..12]))
    }
}

/// Resolve where the artifact should land: an explicit output path wins, then
/// a caller-supplied stem under out_dir, then a generated name under out_dir.
pub fn resolve_output_path(
    cfg: &Config,
    input: &Path,
    format: &str,
    out: Option<&Path>,
    name: Option<&str>,
) -> PathBuf {
    if let Some(out) = out {
        if !out.as_os_str().is_empty() {
            return out.to_path_buf();
        }
    }
    let ext = formats::extension_for(format);
    if let Some(name) = name {
        if !name.is_empty() {
            return PathBuf::from(&cfg.paths.out_dir).join(format!("{name}.{ext}"));
        }
    }
    let tag = sha256_hex(format!("{}:{}", input.display(), std::process::id()).as_bytes());
    PathBuf::from(&cfg.paths.out_dir).join(format!("converted-{}.{ext}", &tag[..12]))
}

// Move the staged artifact into place. rename keeps the placement atomic; the
// cross-device fallback copies to a dot-tmp sibling first so a torn copy can
// never sit at the final path.
fn place_output(staged: &Path, output: &Path) -> Result<(), ConvertError> {
    if std::fs::rename(staged, output).is_ok() {
        return Ok(());
    }

    let file_name = output
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .ok_or_else(|| {
            ConvertError::Invalid(format!("output path has no file name: {}", output.display()))
        })?;
    let tmp = output
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!(".{file_name}.{}.part", std::process::id()));

    std::fs::copy(staged, &tmp).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        ConvertError::Conversion(format!("writing output {}: {e}", output.display()))
    })?;
    std::fs::rename(&tmp, output).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        ConvertError::Conversion(format!("placing output {}: {e}", output.display()))
    })
}

fn looks_like_url(s: &str) -> bool {
    let s = s.to_ascii_lowercase();
    s.starts_with("http://") || s.starts_with("https://") || s.starts_with("file://")
}
