use crate::{
    config::Config,
    convert::{self, ConversionRequest, Converter},
    formats,
    report::ConversionReport,
    util::{ensure_dir, hash_file, now_rfc3339},
};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "office-convert")]
#[command(about = "Headless office document conversion front-end (soffice engine + atomic outputs)")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./office-convert.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize the engine and report its version.
    Doctor {},
    /// List the known output format tokens.
    Formats {},
    Convert {
        #[arg(long)]
        input: PathBuf,
        /// Explicit output file path. Wins over --name.
        #[arg(long)]
        out: Option<PathBuf>,
        /// Output file stem, placed under [paths].out_dir.
        #[arg(long)]
        name: Option<String>,
        /// Output format token, e.g. pdf or odt.
        #[arg(long)]
        to: String,
        /// Opaque engine filter options, forwarded verbatim.
        #[arg(long)]
        filter_options: Option<String>,
    },
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg_path = resolve_config_path(args.config.as_deref())?;
    let cfg = Config::load(&cfg_path)?;

    let _guard = init_logging(&args, &cfg, resolve_log_path(&cfg).as_deref())?;

    match &args.cmd {
        Command::Doctor {} => doctor(&cfg),
        Command::Formats {} => list_formats(),
        Command::Convert {
            input,
            out,
            name,
            to,
            filter_options,
        } => run_convert(
            &cfg,
            input,
            out.as_deref(),
            name.as_deref(),
            to,
            filter_options.as_deref().unwrap_or(""),
        ),
    }
}

fn resolve_config_path(user: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = user {
        return Ok(p.to_path_buf());
    }
    let default = PathBuf::from("office-convert.toml");
    if default.exists() {
        Ok(default)
    } else {
        Ok(PathBuf::from("office-convert.example.toml"))
    }
}

fn init_logging(args: &Args, cfg: &Config, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stdout_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::File::create(path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn resolve_log_path(cfg: &Config) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }
    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }
    Some(PathBuf::from(&cfg.paths.out_dir).join("office-convert.log"))
}

fn doctor(cfg: &Config) -> Result<()> {
    ensure_dir(Path::new(&cfg.paths.work_dir))?;
    let converter = Converter::new(cfg)?;
    let diag = converter.handle().diagnose()?;
    println!("{}", serde_json::to_string_pretty(&diag)?);
    Ok(())
}

fn list_formats() -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(
            &formats::KNOWN_FORMATS
                .iter()
                .map(|f| {
                    serde_json::json!({
                        "token": f.token,
                        "extension": f.extension,
                        "description": f.description,
                    })
                })
                .collect::<Vec<_>>()
        )?
    );
    Ok(())
}

fn run_convert(
    cfg: &Config,
    input: &Path,
    out: Option<&Path>,
    name: Option<&str>,
    to: &str,
    filter_options: &str,
) -> Result<()> {
    ensure_dir(Path::new(&cfg.paths.work_dir))?;
    ensure_dir(Path::new(&cfg.paths.out_dir))?;

    let converter = Converter::new(cfg)?;
    let output = convert::resolve_output_path(cfg, input, to, out, name);

    let req = ConversionRequest {
        input: input.to_path_buf(),
        output,
        format: to.to_string(),
        filter_options: filter_options.to_string(),
    };

    let conv = converter
        .convert(&req)
        .with_context(|| format!("converting {}", input.display()))?;

    if cfg.output.write_report_json {
        let report = ConversionReport {
            input: input.display().to_string(),
            input_sha256: hash_file(input)?,
            output: conv.output_path.display().to_string(),
            format: to.to_string(),
            filter_options: filter_options.to_string(),
            output_bytes: conv.output_bytes,
            duration_ms: conv.duration_ms,
            finished: now_rfc3339(),
        };
        let report_path = report_path_for(cfg, &conv.output_path);
        std::fs::write(&report_path, serde_json::to_string_pretty(&report)?)
            .with_context(|| format!("write report: {}", report_path.display()))?;
    }

    if cfg.output.print_summary {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "input": input,
                "output": conv.output_path,
                "format": to,
                "output_bytes": conv.output_bytes,
                "duration_ms": conv.duration_ms,
                "status": "ok",
            }))?
        );
    }

    Ok(())
}

fn report_path_for(cfg: &Config, output: &Path) -> PathBuf {
    let parent = output.parent().unwrap_or_else(|| Path::new("."));
    if !cfg.output.report_filename.is_empty() {
        return parent.join(&cfg.output.report_filename);
    }
    let file_name = output
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    parent.join(format!("{file_name}.report.json"))
}
