use office_convert::formats;

#[test]
fn known_tokens_resolve() {
    assert!(formats::is_known("pdf"));
    assert!(formats::is_known("odt"));
    assert_eq!(formats::extension_for("pdf"), "pdf");
    assert_eq!(formats::lookup("docx").unwrap().extension, "docx");
}

#[test]
fn tokens_are_case_insensitive() {
    assert!(formats::is_known("PDF"));
    assert_eq!(formats::extension_for("Odt"), "odt");
}

#[test]
fn unknown_tokens_pass_through_as_their_own_extension() {
    assert!(!formats::is_known("vtfx"));
    assert_eq!(formats::extension_for("vtfx"), "vtfx");
}

#[test]
fn embedded_filter_suffix_does_not_reach_the_extension() {
    assert_eq!(formats::extension_for("pdf:writer_pdf_Export"), "pdf");
    assert!(formats::is_known("pdf:writer_pdf_Export"));
}
