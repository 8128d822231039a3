//! Configuration types for the two pipeline stages.
//!
//! Each stage is controlled by one struct built through a builder:
//! [`ExtractConfig`] for the PDF extractor and [`CaptionConfig`] for the
//! figure captioner. The directory defaults reproduce the shared convention
//! between the stages:
//!
//! ```text
//! input/ ──extract──▶ output/          (JSON + Markdown per document)
//!                  └▶ output_figures/  (PNG per figure) ──caption──▶ figures_results/
//! ```

use crate::error::FigscribeError;
use crate::progress::ProgressCallback;
use crate::prompts::DEFAULT_OCR_PROMPT;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Default directory scanned for source PDFs.
pub const DEFAULT_INPUT_DIR: &str = "./input";
/// Default directory receiving JSON + Markdown per document.
pub const DEFAULT_OUTPUT_DIR: &str = "./output";
/// Default directory receiving exported figures; read by the captioner.
pub const DEFAULT_FIGURES_DIR: &str = "./output_figures";
/// Default directory receiving caption reports.
pub const DEFAULT_RESULTS_DIR: &str = "./figures_results";
/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
/// Default docling-serve endpoint.
pub const DEFAULT_DOCLING_URL: &str = "http://localhost:5001";
/// Vision models queried when none are configured.
pub const DEFAULT_MODELS: &[&str] = &["granite3.2-vision", "llama3.2-vision"];

// ── Extractor ────────────────────────────────────────────────────────────

/// Configuration for the extraction stage.
///
/// # Example
/// ```rust
/// use figscribe::{ExtractConfig, ImageRefMode};
///
/// let config = ExtractConfig::builder()
///     .input_dir("./papers")
///     .image_ref_mode(ImageRefMode::Referenced)
///     .images_scale(3.0)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractConfig {
    /// Directory scanned recursively for `.pdf` files. Default: `./input`.
    pub input_dir: PathBuf,

    /// Directory receiving `<stem>_<ts>.json` and `.md`. Default: `./output`.
    pub output_dir: PathBuf,

    /// Directory receiving exported region PNGs. Default: `./output_figures`.
    pub figures_dir: PathBuf,

    /// Page rasterisation scale for exported page regions. Range: 0.5–8.0. Default: 2.0.
    ///
    /// 1.0 renders at 72 DPI; 2.0 gives 144 DPI, enough for a VLM to read
    /// body text of scanned pages.
    pub images_scale: f32,

    /// Export text-less pages as page regions so the captioner OCRs them. Default: true.
    pub ocr: bool,

    /// How image placeholders in the Markdown output are resolved. Default: embedded.
    pub image_ref_mode: ImageRefMode,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Optional progress sink.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from(DEFAULT_INPUT_DIR),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            figures_dir: PathBuf::from(DEFAULT_FIGURES_DIR),
            images_scale: 2.0,
            ocr: true,
            image_ref_mode: ImageRefMode::default(),
            password: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractConfig")
            .field("input_dir", &self.input_dir)
            .field("output_dir", &self.output_dir)
            .field("figures_dir", &self.figures_dir)
            .field("images_scale", &self.images_scale)
            .field("ocr", &self.ocr)
            .field("image_ref_mode", &self.image_ref_mode)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn PipelineProgress>"),
            )
            .finish()
    }
}

impl ExtractConfig {
    /// Create a new builder for `ExtractConfig`.
    pub fn builder() -> ExtractConfigBuilder {
        ExtractConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractConfig`].
#[derive(Debug)]
pub struct ExtractConfigBuilder {
    config: ExtractConfig,
}

impl ExtractConfigBuilder {
    pub fn input_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.input_dir = dir.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn figures_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.figures_dir = dir.into();
        self
    }

    pub fn images_scale(mut self, scale: f32) -> Self {
        self.config.images_scale = scale;
        self
    }

    pub fn ocr(mut self, v: bool) -> Self {
        self.config.ocr = v;
        self
    }

    pub fn image_ref_mode(mut self, mode: ImageRefMode) -> Self {
        self.config.image_ref_mode = mode;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractConfig, FigscribeError> {
        let c = &self.config;
        if !(0.5..=8.0).contains(&c.images_scale) {
            return Err(FigscribeError::InvalidConfig(format!(
                "images scale must be 0.5–8.0, got {}",
                c.images_scale
            )));
        }
        if c.output_dir == c.figures_dir {
            return Err(FigscribeError::InvalidConfig(
                "output and figures directories must differ".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Captioner ────────────────────────────────────────────────────────────

/// Configuration for the captioning stage.
///
/// # Example
/// ```rust
/// use figscribe::CaptionConfig;
///
/// let config = CaptionConfig::builder()
///     .models(["granite3.2-vision"])
///     .prompt("Describe this chart.")
///     .build()
///     .unwrap();
/// assert_eq!(config.models.len(), 1);
/// ```
#[derive(Clone)]
pub struct CaptionConfig {
    /// Directory scanned recursively for images. Default: `./output_figures`.
    pub figures_dir: PathBuf,

    /// Directory receiving caption reports. Default: `./figures_results`.
    pub results_dir: PathBuf,

    /// Models queried for every image, in order.
    pub models: Vec<String>,

    /// Instruction sent with every image. Default: [`DEFAULT_OCR_PROMPT`].
    pub prompt: String,

    /// Optional progress sink.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            figures_dir: PathBuf::from(DEFAULT_FIGURES_DIR),
            results_dir: PathBuf::from(DEFAULT_RESULTS_DIR),
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
            prompt: DEFAULT_OCR_PROMPT.to_string(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for CaptionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptionConfig")
            .field("figures_dir", &self.figures_dir)
            .field("results_dir", &self.results_dir)
            .field("models", &self.models)
            .field("prompt", &self.prompt)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn PipelineProgress>"),
            )
            .finish()
    }
}

impl CaptionConfig {
    /// Create a new builder for `CaptionConfig`.
    pub fn builder() -> CaptionConfigBuilder {
        CaptionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`CaptionConfig`].
#[derive(Debug)]
pub struct CaptionConfigBuilder {
    config: CaptionConfig,
}

impl CaptionConfigBuilder {
    pub fn figures_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.figures_dir = dir.into();
        self
    }

    pub fn results_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.results_dir = dir.into();
        self
    }

    /// Replace the model list. Blank entries are dropped.
    pub fn models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.models = models
            .into_iter()
            .map(Into::into)
            .map(|m: String| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = prompt.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<CaptionConfig, FigscribeError> {
        let c = &self.config;
        if c.models.is_empty() {
            return Err(FigscribeError::InvalidConfig(
                "at least one model must be configured".into(),
            ));
        }
        if c.prompt.trim().is_empty() {
            return Err(FigscribeError::InvalidConfig("prompt must not be empty".into()));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How `<!-- image -->` placeholders in the Markdown output are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImageRefMode {
    /// Inline the PNG as a base64 data URI. (default)
    #[default]
    Embedded,
    /// Link to the exported PNG, relative to the Markdown file.
    Referenced,
    /// Leave the placeholder comment untouched.
    Placeholder,
}

/// Which Ollama endpoint carries the image request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OllamaApi {
    /// `POST /api/chat` with a single user message. (default)
    #[default]
    Chat,
    /// `POST /api/generate` with a bare prompt.
    Generate,
}
