use super::{Engine, EngineDiag, RenderRequest, RenderedDoc};
use crate::config::Config;
use crate::error::{ConvertError, InitError};
use crate::formats;
use anyhow::{anyhow, Context, Result};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

static PROFILE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Headless soffice converter, one instance per handle. The engine resource is
/// the resolved binary plus a private user profile directory; the profile
/// keeps independent handles from fighting over the shared default profile.
pub struct SofficeEngine {
    cfg: Config,
    install_path: PathBuf,
    program: PathBuf,
    profile_dir: PathBuf,
}

impl SofficeEngine {
    pub fn initialize(cfg: &Config) -> Result<Self, InitError> {
        let install_path = resolve_install_path(&cfg.engine.install_path)?;
        let program = resolve_program(&cfg.engine.program, &install_path)?;
        let profile_dir = prepare_profile_dir(cfg)?;

        let engine = Self {
            cfg: cfg.clone(),
            install_path,
            program,
            profile_dir,
        };

        // Construction is fail-safe: a handle only escapes once the binary has
        // answered a version probe, and the profile dir is torn down otherwise.
        match engine.probe_version() {
            Ok(version) => {
                debug!("engine ready: {} ({})", engine.program.display(), version);
                Ok(engine)
            }
            Err(err) => {
                let _ = std::fs::remove_dir_all(&engine.profile_dir);
                Err(InitError::Probe(format!("{err:#}")))
            }
        }
    }

    pub fn install_path(&self) -> &Path {
        &self.install_path
    }

    fn probe_version(&self) -> Result<String> {
        let timeout = Duration::from_secs(self.cfg.engine.version_probe_timeout_seconds);
        let output = self
            .run_engine(&["--version".to_string()], timeout)
            .map_err(|e| anyhow!("{e}"))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "version probe exited with {:?}: {}",
                output.status.code(),
                stderr.trim()
            ));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let line = stdout.lines().next().unwrap_or("").trim().to_string();
        if line.is_empty() {
            return Err(anyhow!("version probe produced no output"));
        }
        Ok(line)
    }

    fn run_engine(&self, args: &[String], timeout: Duration) -> Result<Output, ConvertError> {
        debug!("engine run {} {:?} timeout={:?}", self.program.display(), args, timeout);
        let mut cmd = Command::new(&self.program);
        cmd.arg(format!(
            "-env:UserInstallation=file://{}",
            self.profile_dir.display()
        ));
        cmd.args(args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        for (k, v) in &self.cfg.engine.env {
            cmd.env(k, v);
        }

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                // The binary answered the create-time probe, so a missing
                // program now means the installation vanished mid-session.
                ConvertError::Fault(format!(
                    "engine program no longer launchable: {}: {e}",
                    self.program.display()
                ))
            } else {
                ConvertError::Conversion(format!(
                    "spawning engine {}: {e}",
                    self.program.display()
                ))
            }
        })?;

        wait_with_timeout(&mut child, timeout)
    }
}

impl Engine for SofficeEngine {
    fn diagnose(&self) -> Result<EngineDiag> {
        let mut diag = EngineDiag {
            program: self.program.display().to_string(),
            install_path: self.install_path.display().to_string(),
            profile_dir: self.profile_dir.display().to_string(),
            version: None,
            ok: false,
            error: None,
        };
        match self.probe_version() {
            Ok(version) => {
                diag.version = Some(version);
                diag.ok = true;
            }
            Err(err) => diag.error = Some(format!("{err:#}")),
        }
        Ok(diag)
    }

    fn render(&self, req: &RenderRequest) -> Result<RenderedDoc, ConvertError> {
        let convert_to = if req.filter_options.is_empty() {
            req.format.clone()
        } else {
            format!("{}:{}", req.format, req.filter_options)
        };

        let args = vec![
            "--headless".to_string(),
            "--norestore".to_string(),
            "--convert-to".to_string(),
            convert_to,
            "--outdir".to_string(),
            req.staging_dir.display().to_string(),
            req.input.display().to_string(),
        ];

        let timeout = Duration::from_secs(self.cfg.engine.convert_timeout_seconds);
        let output = self.run_engine(&args, timeout)?;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !output.status.success() {
            return Err(ConvertError::Conversion(match output.status.code() {
                Some(code) => format!("engine exited with code {code}: {stderr}"),
                None => format!("engine terminated by signal: {stderr}"),
            }));
        }

        // soffice exits 0 on some filter failures; the artifact is the truth.
        let stem = req
            .input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "document".to_string());
        let artifact = req
            .staging_dir
            .join(format!("{stem}.{}", formats::extension_for(&req.format)));

        let meta = std::fs::metadata(&artifact).map_err(|_| {
            ConvertError::Conversion(format!(
                "engine produced no output artifact for format '{}': {stderr}",
                req.format
            ))
        })?;
        if meta.len() == 0 {
            return Err(ConvertError::Conversion(format!(
                "engine produced an empty artifact: {}",
                artifact.display()
            )));
        }

        Ok(RenderedDoc {
            path: artifact,
            bytes: meta.len(),
        })
    }

    fn shutdown(&mut self) -> Result<()> {
        if self.profile_dir.exists() {
            std::fs::remove_dir_all(&self.profile_dir)
                .with_context(|| format!("remove profile dir {}", self.profile_dir.display()))?;
        }
        Ok(())
    }
}

fn resolve_install_path(raw: &str) -> Result<PathBuf, InitError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(InitError::EmptyInstallPath);
    }
    if raw.eq_ignore_ascii_case("auto") {
        if let Ok(env_val) = std::env::var("SOFFICE_INSTALL_PATH") {
            let p = expand_tilde(&env_val);
            if p.exists() {
                return Ok(p);
            }
        }
        for cand in [
            "/usr/lib/libreoffice",
            "/usr/lib64/libreoffice",
            "/opt/libreoffice",
        ] {
            let p = PathBuf::from(cand);
            if p.exists() {
                return Ok(p);
            }
        }
        return Ok(PathBuf::from("/usr/lib/libreoffice"));
    }
    Ok(expand_tilde(raw))
}

fn resolve_program(raw: &str, install_path: &Path) -> Result<PathBuf, InitError> {
    let raw = raw.trim();
    if !raw.is_empty() {
        return Ok(expand_tilde(raw));
    }
    for cand in ["program/soffice", "soffice", "program/soffice.bin"] {
        let p = install_path.join(cand);
        if p.exists() {
            return Ok(p);
        }
    }
    if install_path.is_file() {
        return Ok(install_path.to_path_buf());
    }
    Err(InitError::ProgramNotFound {
        install_path: install_path.to_path_buf(),
    })
}

fn prepare_profile_dir(cfg: &Config) -> Result<PathBuf, InitError> {
    let dir = if cfg.engine.profile_dir.trim().is_empty() {
        let n = PROFILE_COUNTER.fetch_add(1, Ordering::Relaxed);
        PathBuf::from(&cfg.paths.work_dir)
            .join("profiles")
            .join(format!("profile-{}-{n}", std::process::id()))
    } else {
        expand_tilde(&cfg.engine.profile_dir)
    };
    std::fs::create_dir_all(&dir)
        .map_err(|e| InitError::Profile(format!("create {}: {e}", dir.display())))?;
    // UserInstallation wants an absolute file URL.
    dir.canonicalize()
        .map_err(|e| InitError::Profile(format!("canonicalize {}: {e}", dir.display())))
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<Output, ConvertError> {
    // Drain pipes while waiting so a chatty engine can't deadlock the child
    // on a full stdout/stderr buffer.
    let stdout_reader = child.stdout.take();
    let stderr_reader = child.stderr.take();

    let stdout_thread = std::thread::spawn(move || -> std::io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut out) = stdout_reader {
            out.read_to_end(&mut buf)?;
        }
        Ok(buf)
    });

    let stderr_thread = std::thread::spawn(move || -> std::io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut err) = stderr_reader {
            err.read_to_end(&mut buf)?;
        }
        Ok(buf)
    });

    let join = |handle: std::thread::JoinHandle<std::io::Result<Vec<u8>>>, name: &str| {
        handle
            .join()
            .map_err(|_| ConvertError::Conversion(format!("{name} reader thread panicked")))?
            .map_err(|e| ConvertError::Conversion(format!("read engine {name}: {e}")))
    };

    let start = Instant::now();
    loop {
        let status = child
            .try_wait()
            .map_err(|e| ConvertError::Conversion(format!("waiting for engine: {e}")))?;

        if let Some(status) = status {
            let stdout = join(stdout_thread, "stdout")?;
            let stderr = join(stderr_thread, "stderr")?;
            return Ok(Output {
                status,
                stdout,
                stderr,
            });
        }

        if start.elapsed() > timeout {
            warn!("engine process timed out after {:?}", timeout);
            let _ = child.kill();
            let _ = child.wait();
            let stderr = join(stderr_thread, "stderr").unwrap_or_default();
            let _ = join(stdout_thread, "stdout");
            return Err(ConvertError::Conversion(format!(
                "engine timed out after {}s; stderr: {}",
                timeout.as_secs(),
                String::from_utf8_lossy(&stderr).trim()
            )));
        }

        std::thread::sleep(Duration::from_millis(50));
    }
}
