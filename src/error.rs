//! Error types for the figscribe library.
//!
//! Three error types reflect the three failure scopes of the pipeline:
//!
//! * [`FigscribeError`] — **Fatal**: the stage cannot run at all (figures
//!   directory missing, PDFium cannot be bound, invalid configuration).
//!   Returned as `Err(FigscribeError)` from [`crate::extract_all`] and
//!   [`crate::caption_all`].
//!
//! * [`DocumentError`] — **Per document**: one PDF could not be converted or
//!   its outputs could not be written. The extractor logs it, records it in
//!   [`crate::output::ExtractionSummary`] and moves on to the next file.
//!
//! * [`CaptionError`] — **Per (image, model) pair**: the inference request
//!   failed. Stored inside [`crate::output::CaptionResult`]; the remaining
//!   pairs of the matrix are still processed.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the figscribe library.
#[derive(Debug, Error)]
pub enum FigscribeError {
    // ── Directory errors ──────────────────────────────────────────────────
    /// A directory the stage reads from does not exist.
    #[error("Input directory '{path}' does not exist.\n{hint}")]
    InputDirMissing { path: PathBuf, hint: String },

    /// A directory could not be created or listed.
    #[error("Cannot access directory '{path}': {source}")]
    DirectoryAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
You can:\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n\
  • Place libpdfium next to the working directory.\n\
  • Use --backend docling to convert through a docling-serve instance.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Inference server errors ───────────────────────────────────────────
    /// The inference server could not be queried (used by `models`).
    #[error("Inference server error: {0}")]
    Inference(#[from] CaptionError),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single PDF document.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// The file could not be opened or read.
    #[error("Cannot read '{path}': {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// The conversion backend failed on this document.
    #[error("Conversion of '{path}' failed: {detail}")]
    ConversionFailed { path: PathBuf, detail: String },

    /// A region image could not be encoded or decoded.
    #[error("Image export failed for '{path}': {detail}")]
    ImageExport { path: PathBuf, detail: String },

    /// Could not write one of the document's outputs.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A fatal condition surfaced while processing a single document.
    #[error(transparent)]
    Fatal(#[from] FigscribeError),
}

/// A non-fatal error for a single (image, model) inference request.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum CaptionError {
    /// The server refused the connection or is not running.
    #[error("Could not connect to the inference server at {url}. Ensure it is running.")]
    Connection { url: String },

    /// The requested model is not available on the server.
    #[error("Model '{model}' is not available on the server. Pull it first (e.g. `ollama pull {model}`).")]
    ModelNotFound { model: String },

    /// The request exceeded the configured timeout.
    #[error("Request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The server answered with a non-success status.
    #[error("Inference server returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    /// The response body could not be decoded.
    #[error("Could not parse inference response: {0}")]
    ResponseParsing(String),

    /// The model returned no usable text.
    #[error("Model '{model}' returned an empty response")]
    EmptyResponse { model: String },

    /// Any other transport-level failure.
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    /// The report pair could not be written.
    #[error("Failed to write report '{path}': {detail}")]
    ReportWriteFailed { path: PathBuf, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_a_pdf_display_shows_magic() {
        let e = DocumentError::NotAPdf {
            path: "broken.pdf".into(),
            magic: *b"GIF8",
        };
        let msg = e.to_string();
        assert!(msg.contains("broken.pdf"), "got: {msg}");
        assert!(msg.contains("71"), "got: {msg}");
    }

    #[test]
    fn model_not_found_suggests_pull() {
        let e = CaptionError::ModelNotFound {
            model: "llama3.2-vision".into(),
        };
        assert!(e.to_string().contains("ollama pull llama3.2-vision"));
    }

    #[test]
    fn connection_display_names_url() {
        let e = CaptionError::Connection {
            url: "http://localhost:11434".into(),
        };
        assert!(e.to_string().contains("http://localhost:11434"));
    }

    #[test]
    fn caption_error_lifts_into_fatal() {
        let e: FigscribeError = CaptionError::Timeout { secs: 5 }.into();
        assert!(e.to_string().contains("5s"));
    }

    #[test]
    fn fatal_lifts_into_document_error() {
        let e: DocumentError = FigscribeError::PdfiumBindingFailed("missing".into()).into();
        assert!(e.to_string().contains("PDFIUM_LIB_PATH"));
    }
}
