//! PDFium backend: text layer, metadata and image objects via pdfium-render.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and blocks for the whole parse. Each conversion therefore runs on
//! tokio's blocking pool and is awaited before the next document starts.
//!
//! ## OCR
//!
//! PDFium has no OCR engine. A page without a text layer (a scan) is instead
//! rasterised at `images_scale` and exported as a `page` region, so the
//! captioning stage reads it with a vision model. Image objects on such a
//! page are not exported separately; the page raster already contains them.

use crate::config::ExtractConfig;
use crate::converter::{ConvertedDocument, DocumentConverter, VisualRegion, IMAGE_PLACEHOLDER};
use crate::error::{DocumentError, FigscribeError};
use crate::output::FigureKind;
use crate::pipeline::encode::encode_png;
use pdfium_render::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Image objects smaller than this on either side (masks, bullets, rules)
/// are not exported.
const MIN_REGION_PX: u32 = 16;

/// Environment variable naming an existing pdfium library.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Converter backed by a locally bound PDFium library.
#[derive(Debug, Clone)]
pub struct PdfiumConverter {
    library_path: Option<PathBuf>,
    images_scale: f32,
    ocr: bool,
    password: Option<String>,
}

impl PdfiumConverter {
    /// Build a converter from the extractor configuration. The library
    /// location is taken from `PDFIUM_LIB_PATH` when set.
    pub fn new(config: &ExtractConfig) -> Self {
        Self {
            library_path: std::env::var_os(PDFIUM_LIB_PATH_ENV).map(PathBuf::from),
            images_scale: config.images_scale,
            ocr: config.ocr,
            password: config.password.clone(),
        }
    }

    /// Use the pdfium library at `path` instead of searching for one.
    pub fn with_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_path = Some(path.into());
        self
    }

    /// Bind and immediately release the library, so a missing pdfium is
    /// reported once instead of once per document.
    pub fn check_binding(&self) -> Result<(), FigscribeError> {
        bind_pdfium(self.library_path.as_deref()).map(|_| ())
    }
}

impl DocumentConverter for PdfiumConverter {
    fn name(&self) -> &'static str {
        "pdfium"
    }

    async fn convert(&self, pdf_path: &Path) -> Result<ConvertedDocument, DocumentError> {
        let path = pdf_path.to_path_buf();
        let converter = self.clone();

        tokio::task::spawn_blocking(move || converter.convert_blocking(&path))
            .await
            .map_err(|e| FigscribeError::Internal(format!("Conversion task panicked: {e}")))?
    }
}

/// Bind pdfium: explicit path first, then the working directory, then the
/// system library search path.
fn bind_pdfium(library_path: Option<&Path>) -> Result<Pdfium, FigscribeError> {
    let bindings = match library_path {
        Some(path) => Pdfium::bind_to_library(path),
        None => Pdfium::bind_to_library(&Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| FigscribeError::PdfiumBindingFailed(format!("{e:?}")))?;

    Ok(Pdfium::new(bindings))
}

// ── Structured JSON ──────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct PdfDocumentJson {
    schema: &'static str,
    source: SourceJson,
    metadata: MetadataJson,
    pages: Vec<PageJson>,
    pictures: Vec<PictureJson>,
}

#[derive(Debug, Serialize)]
struct SourceJson {
    path: String,
    filename: String,
}

#[derive(Debug, Default, Serialize)]
struct MetadataJson {
    title: Option<String>,
    author: Option<String>,
    subject: Option<String>,
    creator: Option<String>,
    producer: Option<String>,
    creation_date: Option<String>,
    modification_date: Option<String>,
    page_count: usize,
    pdf_version: String,
}

#[derive(Debug, Serialize)]
struct PageJson {
    page_no: usize,
    width: f32,
    height: f32,
    has_text_layer: bool,
    text: String,
}

#[derive(Debug, Serialize)]
struct PictureJson {
    kind: FigureKind,
    page_no: usize,
    width: u32,
    height: u32,
}

impl PdfiumConverter {
    fn convert_blocking(&self, path: &Path) -> Result<ConvertedDocument, DocumentError> {
        let pdfium = bind_pdfium(self.library_path.as_deref())?;
        let password = self.password.as_deref();

        let document = pdfium
            .load_pdf_from_file(path, password)
            .map_err(|e| classify_load_error(path, password.is_some(), e))?;

        let metadata = read_metadata(&document);
        info!("PDF loaded: {} pages", metadata.page_count);

        let render_config = PdfRenderConfig::new().scale_page_by_factor(self.images_scale);

        let mut markdown = String::new();
        if let Some(ref title) = metadata.title {
            markdown.push_str(&format!("# {title}\n\n"));
        }

        let mut pages = Vec::new();
        let mut pictures = Vec::new();
        let mut regions = Vec::new();

        for (idx, page) in document.pages().iter().enumerate() {
            let page_no = idx + 1;
            let text = page
                .text()
                .map(|t| t.all())
                .unwrap_or_default()
                .replace("\r\n", "\n");
            let has_text_layer = !text.trim().is_empty();

            if has_text_layer {
                markdown.push_str(text.trim());
                markdown.push_str("\n\n");
            }

            if !has_text_layer && self.ocr {
                let image = page
                    .render_with_config(&render_config)
                    .map_err(|e| DocumentError::ImageExport {
                        path: path.to_path_buf(),
                        detail: format!("page {page_no}: {e:?}"),
                    })?
                    .as_image();
                debug!(
                    "Page {} has no text layer; rendered {}x{} px for OCR",
                    page_no,
                    image.width(),
                    image.height()
                );
                pictures.push(PictureJson {
                    kind: FigureKind::Page,
                    page_no,
                    width: image.width(),
                    height: image.height(),
                });
                regions.push(VisualRegion {
                    kind: FigureKind::Page,
                    page: Some(page_no),
                    png: png_or_export_error(path, &image)?,
                });
                markdown.push_str(IMAGE_PLACEHOLDER);
                markdown.push_str("\n\n");
            } else {
                for object in page.objects().iter() {
                    let Some(image_object) = object.as_image_object() else {
                        continue;
                    };
                    let image = match image_object.get_raw_image() {
                        Ok(img) => img,
                        Err(e) => {
                            warn!("Page {}: skipping unreadable image object: {:?}", page_no, e);
                            continue;
                        }
                    };
                    if image.width() < MIN_REGION_PX || image.height() < MIN_REGION_PX {
                        debug!(
                            "Page {}: skipping {}x{} image object",
                            page_no,
                            image.width(),
                            image.height()
                        );
                        continue;
                    }
                    pictures.push(PictureJson {
                        kind: FigureKind::Figure,
                        page_no,
                        width: image.width(),
                        height: image.height(),
                    });
                    regions.push(VisualRegion {
                        kind: FigureKind::Figure,
                        page: Some(page_no),
                        png: png_or_export_error(path, &image)?,
                    });
                    markdown.push_str(IMAGE_PLACEHOLDER);
                    markdown.push_str("\n\n");
                }
            }

            pages.push(PageJson {
                page_no,
                width: page.width().value,
                height: page.height().value,
                has_text_layer,
                text,
            });
        }

        let json_doc = PdfDocumentJson {
            schema: "figscribe.pdfium/1",
            source: SourceJson {
                path: path.display().to_string(),
                filename: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            },
            metadata,
            pages,
            pictures,
        };
        let json = serde_json::to_value(&json_doc)
            .map_err(|e| FigscribeError::Internal(format!("JSON serialisation failed: {e}")))?;

        Ok(ConvertedDocument {
            json,
            markdown: format!("{}\n", markdown.trim_end()),
            regions,
        })
    }
}

fn png_or_export_error(path: &Path, image: &image::DynamicImage) -> Result<Vec<u8>, DocumentError> {
    encode_png(image).map_err(|e| DocumentError::ImageExport {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}

fn classify_load_error(path: &Path, had_password: bool, e: PdfiumError) -> DocumentError {
    let detail = format!("{e:?}");
    if detail.contains("Password") || detail.contains("password") {
        if had_password {
            DocumentError::WrongPassword {
                path: path.to_path_buf(),
            }
        } else {
            DocumentError::PasswordRequired {
                path: path.to_path_buf(),
            }
        }
    } else {
        DocumentError::CorruptPdf {
            path: path.to_path_buf(),
            detail,
        }
    }
}

fn read_metadata(document: &PdfDocument<'_>) -> MetadataJson {
    let metadata = document.metadata();
    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata.get(tag).and_then(|t| {
            let v = t.value().trim().to_string();
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        })
    };

    MetadataJson {
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        subject: get_meta(PdfDocumentMetadataTagType::Subject),
        creator: get_meta(PdfDocumentMetadataTagType::Creator),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        creation_date: get_meta(PdfDocumentMetadataTagType::CreationDate),
        modification_date: get_meta(PdfDocumentMetadataTagType::ModificationDate),
        page_count: document.pages().len() as usize,
        pdf_version: format!("{:?}", document.version()),
    }
}
