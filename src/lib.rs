//! # figscribe
//!
//! Extract figures and tables from PDF documents, then caption them with
//! Vision Language Models served by a local Ollama instance.
//!
//! ## Why two stages?
//!
//! Layout analysis and image export are cheap and deterministic; VLM
//! inference is slow and depends on which models are pulled. Splitting them
//! lets you extract once and caption many times (new models, new prompts)
//! without touching the PDFs again. The stages share nothing but a
//! directory of PNGs.
//!
//! ## Pipeline Overview
//!
//! ```text
//! input/*.pdf
//!  │
//!  ├─ Stage 1: extract   convert (pdfium or docling-serve)
//!  │                     → output/<stem>_<ts>.{json,md}
//!  │                     → output_figures/<stem>_<ts>-{figure,table,page}-N.png
//!  │
//!  └─ Stage 2: caption   every PNG × every model → Ollama
//!                        → figures_results/<figure>_<ts>_<model>.{json,md}
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use figscribe::{
//!     caption_all, extract_all, CaptionConfig, ExtractConfig, OllamaClient, PdfiumConverter,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let extract = ExtractConfig::default();
//!     let converter = PdfiumConverter::new(&extract);
//!     let summary = extract_all(&extract, &converter).await?;
//!     eprintln!("{} figures exported", summary.figure_count());
//!
//!     let caption = CaptionConfig::default();
//!     let client = OllamaClient::default_local()?;
//!     let summary = caption_all(&caption, &client).await?;
//!     eprintln!("{} captions written", summary.succeeded());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `figscribe` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! figscribe = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod caption;
pub mod config;
pub mod converter;
pub mod demo;
pub mod error;
pub mod extract;
pub mod ollama;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use caption::{caption_all, caption_pair, find_images};
pub use config::{
    CaptionConfig, CaptionConfigBuilder, ExtractConfig, ExtractConfigBuilder, ImageRefMode,
    OllamaApi,
};
pub use converter::{ConvertedDocument, DocumentConverter, DoclingConverter, PdfiumConverter};
pub use demo::{analyze_figures, mock_extraction, DemoFigureResult, MockExtraction};
pub use error::{CaptionError, DocumentError, FigscribeError};
pub use extract::{extract_all, extract_document, find_pdfs, setup_directories};
pub use ollama::{OllamaClient, VisionClient};
pub use output::{
    CaptionReport, CaptionResult, CaptionSummary, DocumentReport, ExtractionSummary, Figure,
    FigureKind,
};
pub use progress::{NoopProgress, PipelineProgress, ProgressCallback, Stage};
