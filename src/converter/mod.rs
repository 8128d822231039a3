//! Document conversion backends.
//!
//! The extractor never parses PDFs itself: it hands each file to a
//! [`DocumentConverter`] and persists whatever comes back. Two backends ship
//! with the crate:
//!
//! | Backend | Structured JSON | Figures | Tables | OCR |
//! |---------|-----------------|---------|--------|-----|
//! | [`PdfiumConverter`] (default) | pages, text layer, metadata | embedded image objects | as text | text-less pages exported as page images |
//! | [`DoclingConverter`] | docling `DoclingDocument` | picture items | table items with images | server-side |
//!
//! Both return Markdown in which images are either already embedded or
//! marked with [`IMAGE_PLACEHOLDER`]; [`resolve_image_refs`] turns the
//! placeholders into links once the extractor knows the figure file names.

pub mod docling;
pub mod pdfium;

pub use docling::DoclingConverter;
pub use pdfium::PdfiumConverter;

use crate::config::ImageRefMode;
use crate::error::DocumentError;
use crate::output::FigureKind;
use crate::pipeline::encode::png_data_uri;
use std::future::Future;
use std::path::Path;

/// Marker left in converter Markdown where a picture belongs.
pub const IMAGE_PLACEHOLDER: &str = "<!-- image -->";

/// A visual region found by a converter, not yet written to disk.
#[derive(Debug, Clone)]
pub struct VisualRegion {
    pub kind: FigureKind,
    /// 1-based page number, when known.
    pub page: Option<usize>,
    /// PNG-encoded pixels.
    pub png: Vec<u8>,
}

/// Everything a backend produced for one PDF.
#[derive(Debug, Clone)]
pub struct ConvertedDocument {
    /// Structured representation written as `<prefix>.json`.
    pub json: serde_json::Value,
    /// Markdown rendering, possibly containing [`IMAGE_PLACEHOLDER`]s.
    pub markdown: String,
    /// Regions in page order; regions without a page come last.
    pub regions: Vec<VisualRegion>,
}

/// A PDF → structured output conversion capability.
pub trait DocumentConverter: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Convert one PDF. An error aborts this document only.
    fn convert(
        &self,
        pdf_path: &Path,
    ) -> impl Future<Output = Result<ConvertedDocument, DocumentError>> + Send;
}

/// Replace each [`IMAGE_PLACEHOLDER`] in `markdown`, in order, with the next
/// non-table region.
///
/// `figures` pairs every region with the file name it was exported under
/// (relative to `figures_rel_dir`). Placeholders beyond the number of
/// regions are left untouched.
pub fn resolve_image_refs(
    markdown: &str,
    figures: &[(&VisualRegion, String)],
    mode: ImageRefMode,
    figures_rel_dir: &str,
) -> String {
    if mode == ImageRefMode::Placeholder {
        return markdown.to_string();
    }

    let mut pictures = figures.iter().filter(|(r, _)| r.kind != FigureKind::Table);
    let mut out = String::with_capacity(markdown.len());
    let mut rest = markdown;

    while let Some(pos) = rest.find(IMAGE_PLACEHOLDER) {
        out.push_str(&rest[..pos]);
        match pictures.next() {
            Some((region, file_name)) => {
                let alt = match region.page {
                    Some(p) => format!("{} (page {p})", region.kind),
                    None => region.kind.to_string(),
                };
                let target = match mode {
                    ImageRefMode::Embedded => png_data_uri(&region.png),
                    _ => {
                        let dir = figures_rel_dir.trim_end_matches('/');
                        if dir.is_empty() {
                            file_name.clone()
                        } else {
                            format!("{dir}/{file_name}")
                        }
                    }
                };
                out.push_str(&format!("![{alt}]({target})"));
            }
            None => out.push_str(IMAGE_PLACEHOLDER),
        }
        rest = &rest[pos + IMAGE_PLACEHOLDER.len()..];
    }
    out.push_str(rest);
    out
}
