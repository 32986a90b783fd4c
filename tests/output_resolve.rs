use office_convert::{config::Config, convert::resolve_output_path};
use std::path::{Path, PathBuf};

#[test]
fn explicit_output_path_wins() {
    let cfg = Config::default();
    let out = PathBuf::from("/tmp/result.pdf");
    let resolved = resolve_output_path(
        &cfg,
        Path::new("doc.docx"),
        "pdf",
        Some(&out),
        Some("ignored"),
    );
    assert_eq!(resolved, out);
}

#[test]
fn named_output_lands_in_out_dir_with_format_extension() {
    let cfg = Config::default();
    let resolved = resolve_output_path(&cfg, Path::new("doc.docx"), "odt", None, Some("report"));
    assert_eq!(resolved, Path::new(&cfg.paths.out_dir).join("report.odt"));
}

#[test]
fn default_output_gets_a_generated_name() {
    let cfg = Config::default();
    let resolved = resolve_output_path(&cfg, Path::new("doc.docx"), "pdf", None, None);
    assert!(resolved.starts_with(&cfg.paths.out_dir));
    let name = resolved.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("converted-"));
    assert!(name.ends_with(".pdf"));

    // stable for the same input within one process
    let again = resolve_output_path(&cfg, Path::new("doc.docx"), "pdf", None, None);
    assert_eq!(resolved, again);
}

#[test]
fn filter_suffix_in_the_token_does_not_leak_into_the_name() {
    let cfg = Config::default();
    let resolved = resolve_output_path(
        &cfg,
        Path::new("doc.docx"),
        "pdf:writer_pdf_Export",
        None,
        Some("report"),
    );
    assert_eq!(resolved, Path::new(&cfg.paths.out_dir).join("report.pdf"));
}
