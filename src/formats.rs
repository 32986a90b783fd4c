//! Format-negotiation metadata. Output format tokens are forwarded to the
//! engine verbatim; this table only supplies extensions and display names for
//! the tokens we know about.

#[derive(Debug, Clone, Copy)]
pub struct FormatInfo {
    pub token: &'static str,
    pub extension: &'static str,
    pub description: &'static str,
}

pub const KNOWN_FORMATS: &[FormatInfo] = &[
    FormatInfo { token: "pdf", extension: "pdf", description: "Portable Document Format" },
    FormatInfo { token: "odt", extension: "odt", description: "OpenDocument Text" },
    FormatInfo { token: "ods", extension: "ods", description: "OpenDocument Spreadsheet" },
    FormatInfo { token: "odp", extension: "odp", description: "OpenDocument Presentation" },
    FormatInfo { token: "docx", extension: "docx", description: "Word 2007-365 document" },
    FormatInfo { token: "xlsx", extension: "xlsx", description: "Excel 2007-365 workbook" },
    FormatInfo { token: "pptx", extension: "pptx", description: "PowerPoint 2007-365 presentation" },
    FormatInfo { token: "rtf", extension: "rtf", description: "Rich Text Format" },
    FormatInfo { token: "txt", extension: "txt", description: "Plain text" },
    FormatInfo { token: "html", extension: "html", description: "HTML document" },
    FormatInfo { token: "csv", extension: "csv", description: "Comma-separated values" },
    FormatInfo { token: "epub", extension: "epub", description: "EPUB e-book" },
    FormatInfo { token: "png", extension: "png", description: "PNG image rendering" },
];

pub fn lookup(token: &str) -> Option<&'static FormatInfo> {
    let bare = bare_token(token);
    KNOWN_FORMATS.iter().find(|f| f.token.eq_ignore_ascii_case(bare))
}

pub fn is_known(token: &str) -> bool {
    lookup(token).is_some()
}

/// Extension the engine will put on the artifact. Unknown tokens map to
/// themselves; an embedded export-filter suffix ("pdf:writer_pdf_Export")
/// does not reach the extension.
pub fn extension_for(token: &str) -> &str {
    let bare = bare_token(token);
    match lookup(bare) {
        Some(info) => info.extension,
        None => bare,
    }
}

fn bare_token(token: &str) -> &str {
    token.split(':').next().unwrap_or(token).trim()
}
