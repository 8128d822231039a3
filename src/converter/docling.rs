//! docling-serve backend: layout analysis, table detection and OCR done by a
//! docling server, reached over HTTP.
//!
//! The PDF is posted as multipart to `POST /v1/convert/file` with OCR on and
//! images embedded. The response carries the `DoclingDocument` as
//! `json_content`, the Markdown rendering as `md_content`, and every picture
//! and table item with an `image.uri` holding a base64 `data:` URI.

use crate::config::DEFAULT_DOCLING_URL;
use crate::converter::{ConvertedDocument, DocumentConverter, VisualRegion};
use crate::error::DocumentError;
use crate::output::FigureKind;
use crate::pipeline::encode::{decode_data_uri, ensure_png};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Converter that delegates to a docling-serve instance.
#[derive(Debug, Clone)]
pub struct DoclingConverter {
    base_url: String,
    client: reqwest::Client,
    ocr: bool,
    images_scale: f32,
}

impl DoclingConverter {
    /// Create a converter for the server at `base_url`.
    ///
    /// `timeout_secs = None` leaves requests unbounded; conversions of long
    /// scanned documents can take minutes.
    pub fn new(base_url: &str, timeout_secs: Option<u64>) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: builder.build()?,
            ocr: true,
            images_scale: 2.0,
        })
    }

    /// Server at [`DEFAULT_DOCLING_URL`] without a timeout.
    pub fn default_local() -> Result<Self, reqwest::Error> {
        Self::new(DEFAULT_DOCLING_URL, None)
    }

    pub fn ocr(mut self, v: bool) -> Self {
        self.ocr = v;
        self
    }

    pub fn images_scale(mut self, scale: f32) -> Self {
        self.images_scale = scale;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Response body of `/v1/convert/file`.
#[derive(Debug, Deserialize)]
struct ConvertResponse {
    document: ConvertedContent,
    #[serde(default)]
    status: String,
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ConvertedContent {
    #[serde(default)]
    md_content: Option<String>,
    #[serde(default)]
    json_content: Option<serde_json::Value>,
}

impl DocumentConverter for DoclingConverter {
    fn name(&self) -> &'static str {
        "docling"
    }

    async fn convert(&self, pdf_path: &Path) -> Result<ConvertedDocument, DocumentError> {
        let failed = |detail: String| DocumentError::ConversionFailed {
            path: pdf_path.to_path_buf(),
            detail,
        };

        let bytes = tokio::fs::read(pdf_path)
            .await
            .map_err(|source| DocumentError::Unreadable {
                path: pdf_path.to_path_buf(),
                source,
            })?;
        let file_name = pdf_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/pdf")
            .map_err(|e| failed(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .part("files", part)
            .text("to_formats", "md")
            .text("to_formats", "json")
            .text("do_ocr", self.ocr.to_string())
            .text("image_export_mode", "embedded")
            .text("include_images", "true")
            .text("images_scale", self.images_scale.to_string());

        let url = format!("{}/v1/convert/file", self.base_url);
        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    failed(format!("cannot connect to docling at {}", self.base_url))
                } else if e.is_timeout() {
                    failed("docling request timed out".into())
                } else {
                    failed(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(failed(format!("docling returned HTTP {}: {}", status.as_u16(), body)));
        }

        let body = response.text().await.map_err(|e| failed(e.to_string()))?;
        parse_convert_response(pdf_path, &body)
    }
}

/// Turn a `/v1/convert/file` response body into a [`ConvertedDocument`].
fn parse_convert_response(path: &Path, body: &str) -> Result<ConvertedDocument, DocumentError> {
    let failed = |detail: String| DocumentError::ConversionFailed {
        path: path.to_path_buf(),
        detail,
    };

    let parsed: ConvertResponse =
        serde_json::from_str(body).map_err(|e| failed(format!("invalid docling response: {e}")))?;

    if parsed.status == "failure" {
        return Err(failed(format!("docling reported failure: {:?}", parsed.errors)));
    }
    if !parsed.errors.is_empty() {
        warn!("docling reported {} non-fatal errors", parsed.errors.len());
    }

    let json = parsed
        .document
        .json_content
        .ok_or_else(|| failed("response has no json_content".into()))?;
    let markdown = parsed.document.md_content.unwrap_or_default();

    let mut regions = Vec::new();
    collect_regions(path, &json, "tables", FigureKind::Table, &mut regions)?;
    collect_regions(path, &json, "pictures", FigureKind::Figure, &mut regions)?;
    // docling lists tables and pictures separately; interleave them by page.
    // The sort is stable, so document order is kept within a page.
    regions.sort_by_key(|r| r.page.unwrap_or(usize::MAX));

    Ok(ConvertedDocument {
        json,
        markdown,
        regions,
    })
}

fn collect_regions(
    path: &Path,
    json: &serde_json::Value,
    key: &str,
    kind: FigureKind,
    regions: &mut Vec<VisualRegion>,
) -> Result<(), DocumentError> {
    let Some(items) = json.get(key).and_then(|v| v.as_array()) else {
        return Ok(());
    };

    for (i, item) in items.iter().enumerate() {
        let Some(uri) = item.pointer("/image/uri").and_then(|u| u.as_str()) else {
            debug!("{} {} has no embedded image", kind, i + 1);
            continue;
        };
        let Some(bytes) = decode_data_uri(uri) else {
            warn!("{} {}: image is not a base64 data URI, skipping", kind, i + 1);
            continue;
        };
        let png = ensure_png(bytes).map_err(|e| DocumentError::ImageExport {
            path: path.to_path_buf(),
            detail: format!("{kind} {}: {e}", i + 1),
        })?;
        let page = item
            .pointer("/prov/0/page_no")
            .and_then(|p| p.as_u64())
            .map(|p| p as usize);

        regions.push(VisualRegion { kind, page, png });
    }
    Ok(())
}
