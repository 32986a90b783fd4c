use office_convert::{
    config::Config,
    convert::{ConversionRequest, Converter},
    engine::{Engine, EngineDiag, RenderRequest, RenderedDoc},
    error::{ConvertError, InitError},
    formats,
    handle::EngineHandle,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

const PAYLOAD: &[u8] = b"%PDF-1.7 rendered by mock engine";

#[derive(Clone, Copy)]
enum Mode {
    Succeed,
    FailConversion,
    Fatal,
}

struct MockEngine {
    mode: Mode,
    renders: Arc<AtomicUsize>,
    shutdowns: Arc<AtomicUsize>,
}

impl MockEngine {
    fn new(mode: Mode) -> (Self, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let renders = Arc::new(AtomicUsize::new(0));
        let shutdowns = Arc::new(AtomicUsize::new(0));
        (
            Self {
                mode,
                renders: renders.clone(),
                shutdowns: shutdowns.clone(),
            },
            renders,
            shutdowns,
        )
    }
}

impl Engine for MockEngine {
    fn diagnose(&self) -> anyhow::Result<EngineDiag> {
        Ok(EngineDiag {
            program: "mock".into(),
            install_path: "/opt/engine".into(),
            profile_dir: String::new(),
            version: Some("mock 1.0".into()),
            ok: true,
            error: None,
        })
    }

    fn render(&self, req: &RenderRequest) -> Result<RenderedDoc, ConvertError> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            Mode::Succeed => {
                let stem = req
                    .input
                    .file_stem()
                    .expect("test inputs have stems")
                    .to_string_lossy()
                    .to_string();
                let path = req
                    .staging_dir
                    .join(format!("{stem}.{}", formats::extension_for(&req.format)));
                std::fs::write(&path, PAYLOAD).expect("write staged artifact");
                Ok(RenderedDoc {
                    path,
                    bytes: PAYLOAD.len() as u64,
                })
            }
            Mode::FailConversion => {
                Err(ConvertError::Conversion("simulated filter failure".into()))
            }
            Mode::Fatal => Err(ConvertError::Fault("engine went away".into())),
        }
    }

    fn shutdown(&mut self) -> anyhow::Result<()> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn test_config(tmp: &TempDir) -> Config {
    let mut cfg = Config::default();
    cfg.paths.out_dir = tmp.path().join("out").display().to_string();
    cfg.paths.work_dir = tmp.path().join("work").display().to_string();
    cfg
}

fn write_input(tmp: &TempDir, name: &str) -> PathBuf {
    let path = tmp.path().join(name);
    std::fs::write(&path, b"fake document body").expect("write input fixture");
    path
}

fn converter(
    tmp: &TempDir,
    mode: Mode,
) -> (Converter<MockEngine>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let cfg = test_config(tmp);
    let (engine, renders, shutdowns) = MockEngine::new(mode);
    let handle = EngineHandle::from_engine("/opt/engine", engine);
    (Converter::from_handle(&cfg, handle), renders, shutdowns)
}

fn req(input: &Path, output: &Path, format: &str) -> ConversionRequest {
    ConversionRequest {
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        format: format.to_string(),
        filter_options: String::new(),
    }
}

#[test]
fn success_places_complete_output() {
    let tmp = TempDir::new().unwrap();
    let (conv, renders, _) = converter(&tmp, Mode::Succeed);
    let input = write_input(&tmp, "doc.docx");
    let output = tmp.path().join("doc.pdf");

    let result = conv.convert(&req(&input, &output, "pdf")).expect("convert");
    assert_eq!(result.output_path, output);
    assert_eq!(result.output_bytes, PAYLOAD.len() as u64);
    assert_eq!(std::fs::read(&output).unwrap(), PAYLOAD);
    assert_eq!(renders.load(Ordering::SeqCst), 1);

    // staging is cleaned up after a successful placement
    let work = PathBuf::from(tmp.path().join("work"));
    let leftovers: Vec<_> = std::fs::read_dir(&work)
        .map(|rd| rd.filter_map(|e| e.ok()).collect())
        .unwrap_or_default();
    assert!(leftovers.is_empty(), "staging left behind: {leftovers:?}");
}

#[test]
fn failure_leaves_no_output_and_handle_stays_usable() {
    let tmp = TempDir::new().unwrap();
    let (conv, _, _) = converter(&tmp, Mode::FailConversion);
    let input = write_input(&tmp, "doc.docx");
    let output = tmp.path().join("doc.pdf");

    let err = conv.convert(&req(&input, &output, "pdf")).unwrap_err();
    assert!(matches!(err, ConvertError::Conversion(_)));
    assert!(!err.to_string().is_empty());
    assert!(!output.exists(), "failed conversion must not leave an output file");

    // a conversion failure does not invalidate the handle
    assert!(conv.handle().is_ready());
    let err = conv.convert(&req(&input, &output, "pdf")).unwrap_err();
    assert!(matches!(err, ConvertError::Conversion(_)));
}

#[test]
fn missing_input_is_rejected_before_the_engine_runs() {
    let tmp = TempDir::new().unwrap();
    let (conv, renders, _) = converter(&tmp, Mode::Succeed);
    let input = tmp.path().join("missing.docx");
    let output = tmp.path().join("out.pdf");

    let err = conv.convert(&req(&input, &output, "pdf")).unwrap_err();
    assert!(matches!(err, ConvertError::Invalid(_)));
    assert!(err.to_string().contains("not found"));
    assert!(!output.exists());
    assert_eq!(renders.load(Ordering::SeqCst), 0);
}

#[test]
fn empty_format_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let (conv, renders, _) = converter(&tmp, Mode::Succeed);
    let input = write_input(&tmp, "doc.docx");
    let output = tmp.path().join("out.pdf");

    let err = conv.convert(&req(&input, &output, "")).unwrap_err();
    assert!(matches!(err, ConvertError::Invalid(_)));
    assert_eq!(renders.load(Ordering::SeqCst), 0);
}

#[test]
fn released_handle_rejects_converts_without_writes() {
    let tmp = TempDir::new().unwrap();
    let (conv, renders, shutdowns) = converter(&tmp, Mode::Succeed);
    let input = write_input(&tmp, "doc.docx");
    let output = tmp.path().join("doc.pdf");

    conv.handle().close().expect("close");
    assert!(!conv.handle().is_ready());
    assert_eq!(shutdowns.load(Ordering::SeqCst), 1);

    let err = conv.convert(&req(&input, &output, "pdf")).unwrap_err();
    assert!(matches!(err, ConvertError::NotReady(_)));
    assert!(!output.exists());
    assert_eq!(renders.load(Ordering::SeqCst), 0);
    // not even staging was created
    assert!(!tmp.path().join("work").exists());
}

#[test]
fn fatal_fault_poisons_the_handle() {
    let tmp = TempDir::new().unwrap();
    let (conv, renders, shutdowns) = converter(&tmp, Mode::Fatal);
    let input = write_input(&tmp, "doc.docx");
    let output = tmp.path().join("doc.pdf");

    let err = conv.convert(&req(&input, &output, "pdf")).unwrap_err();
    assert!(matches!(err, ConvertError::Fault(_)));
    assert!(!output.exists());
    assert!(!conv.handle().is_ready());
    // the engine resource is released when the handle poisons itself
    assert_eq!(shutdowns.load(Ordering::SeqCst), 1);

    // subsequent calls short-circuit without touching the engine
    let err = conv.convert(&req(&input, &output, "pdf")).unwrap_err();
    assert!(matches!(err, ConvertError::NotReady(_)));
    assert_eq!(renders.load(Ordering::SeqCst), 1);
}

#[test]
fn sequential_heterogeneous_formats_share_one_handle() {
    let tmp = TempDir::new().unwrap();
    let (conv, renders, _) = converter(&tmp, Mode::Succeed);
    let input = write_input(&tmp, "doc.docx");

    let pdf = tmp.path().join("doc.pdf");
    let odt = tmp.path().join("doc.odt");
    conv.convert(&req(&input, &pdf, "pdf")).expect("pdf");
    conv.convert(&req(&input, &odt, "odt")).expect("odt");

    assert_eq!(std::fs::read(&pdf).unwrap(), PAYLOAD);
    assert_eq!(std::fs::read(&odt).unwrap(), PAYLOAD);
    assert_eq!(renders.load(Ordering::SeqCst), 2);
}

#[test]
fn repeat_conversion_is_stable() {
    let tmp = TempDir::new().unwrap();
    let (conv, _, _) = converter(&tmp, Mode::Succeed);
    let input = write_input(&tmp, "doc.docx");
    let output = tmp.path().join("doc.pdf");
    let r = req(&input, &output, "pdf");

    let first = conv.convert(&r).expect("first");
    let first_bytes = std::fs::read(&output).unwrap();
    let second = conv.convert(&r).expect("second");
    let second_bytes = std::fs::read(&output).unwrap();

    assert_eq!(first.output_bytes, second.output_bytes);
    assert_eq!(first_bytes, second_bytes);
}

#[test]
fn release_happens_exactly_once() {
    let tmp = TempDir::new().unwrap();
    let (conv, _, shutdowns) = converter(&tmp, Mode::Succeed);

    conv.handle().close().expect("first close");
    conv.handle().close().expect("second close is a no-op");
    drop(conv);
    assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
}

#[test]
fn drop_releases_the_engine() {
    let tmp = TempDir::new().unwrap();
    let (conv, _, shutdowns) = converter(&tmp, Mode::Succeed);
    drop(conv);
    assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
}

#[test]
fn create_fails_when_no_engine_is_installed() {
    let tmp = TempDir::new().unwrap();
    let mut cfg = test_config(&tmp);
    cfg.engine.install_path = tmp.path().join("empty-install").display().to_string();
    std::fs::create_dir_all(&cfg.engine.install_path).unwrap();

    let err = EngineHandle::create(&cfg).unwrap_err();
    assert!(matches!(err, InitError::ProgramNotFound { .. }));
}

#[test]
fn create_rejects_an_empty_install_path() {
    let tmp = TempDir::new().unwrap();
    let mut cfg = test_config(&tmp);
    cfg.engine.install_path = "".into();

    let err = EngineHandle::create(&cfg).unwrap_err();
    assert!(matches!(err, InitError::EmptyInstallPath));
}
