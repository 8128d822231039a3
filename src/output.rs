//! Output types produced by the two stages.
//!
//! Every value here is created once by a stage and only read afterwards:
//! a [`Figure`] written by the extractor is consumed by the captioner through
//! the file system, never through shared memory.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// One input PDF found by the directory scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub path: PathBuf,
    pub discovered_at: DateTime<Local>,
}

impl Document {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            discovered_at: Local::now(),
        }
    }

    /// File name used in logs and reports.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// The JSON + Markdown pair written for one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredOutput {
    /// Timestamp-qualified name shared by both files and all figures.
    pub name: String,
    pub json_path: PathBuf,
    pub markdown_path: PathBuf,
    pub created_at: DateTime<Local>,
}

/// What an exported region depicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FigureKind {
    /// A picture, chart or diagram.
    Figure,
    /// A table rendered as an image.
    Table,
    /// A whole page without a text layer, exported for OCR.
    Page,
}

impl FigureKind {
    /// Token used in the exported file name.
    pub fn as_str(&self) -> &'static str {
        match self {
            FigureKind::Figure => "figure",
            FigureKind::Table => "table",
            FigureKind::Page => "page",
        }
    }
}

impl fmt::Display for FigureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One exported image region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Figure {
    /// File name of the originating PDF.
    pub source_document: String,
    pub kind: FigureKind,
    /// 1-based index, counted per kind within the document.
    pub index: usize,
    /// 1-based page number, when the backend reports it.
    pub page: Option<usize>,
    pub path: PathBuf,
    pub size_bytes: usize,
    pub created_at: DateTime<Local>,
}

/// Everything produced for one successfully extracted document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentReport {
    pub document: Document,
    pub output: StructuredOutput,
    pub figures: Vec<Figure>,
    pub duration_ms: u64,
}

/// A document the extractor gave up on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Aggregate of one extractor run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionSummary {
    pub documents: Vec<DocumentReport>,
    pub failures: Vec<DocumentFailure>,
    pub total_duration_ms: u64,
}

impl ExtractionSummary {
    /// Total number of figures written across all documents.
    pub fn figure_count(&self) -> usize {
        self.documents.iter().map(|d| d.figures.len()).sum()
    }
}

/// Outcome of one (figure, model) request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionResult {
    pub image_path: PathBuf,
    pub model: String,
    /// Cleaned model output; empty on failure.
    pub text: String,
    pub duration_ms: u64,
    pub success: bool,
    pub error: Option<String>,
    pub json_path: Option<PathBuf>,
    pub markdown_path: Option<PathBuf>,
}

impl CaptionResult {
    /// Wall-clock latency in seconds, rounded to two decimals.
    pub fn duration_secs(&self) -> f64 {
        (self.duration_ms as f64 / 10.0).round() / 100.0
    }
}

/// On-disk JSON form of a successful [`CaptionResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionReport {
    pub original_image_path: String,
    pub extracted_text: String,
    pub model_used: String,
    pub processing_time_seconds: f64,
    pub timestamp: String,
}

/// An image the captioner could not read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedImage {
    pub path: PathBuf,
    pub error: String,
}

/// Aggregate of one captioner run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaptionSummary {
    pub results: Vec<CaptionResult>,
    pub skipped_images: Vec<SkippedImage>,
    pub total_duration_ms: u64,
}

impl CaptionSummary {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }
}
