//! Walkthrough of both stages without a real PDF conversion.
//!
//! [`mock_extraction`] stands in for the extractor: it accepts a `.pdf`
//! name and returns fixed sample text plus two placeholder figures, each
//! with its own question. [`analyze_figures`] then sends the figures to a
//! real inference server. Request failures do not abort the walkthrough;
//! they become `ERROR: …` answers.

use crate::error::{CaptionError, FigscribeError};
use crate::ollama::VisionClient;
use crate::pipeline::encode::{encode_png, to_base64};
use crate::prompts::{DEMO_FIGURE_PROMPT, DEMO_TABLE_PROMPT};
use image::{DynamicImage, Rgb, RgbImage};
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// Body text returned by every mock extraction.
pub const SAMPLE_TEXT: &str = "The primary finding of this study confirms the effectiveness of the \
proposed model (Figure 1). Data preprocessing steps, as detailed in Section 3.1, involved scaling \
and normalization. The experimental results, showing an 87% accuracy rate (Table 1), surpassed \
previous benchmarks. Future work will focus on integrating multi-modal inputs, leveraging the \
figure analysis provided below.";

const PLACEHOLDER_WIDTH: u32 = 400;
const PLACEHOLDER_HEIGHT: u32 = 300;
const PLACEHOLDER_BG: Rgb<u8> = Rgb([0x1e, 0x29, 0x3b]);
const PLACEHOLDER_FG: Rgb<u8> = Rgb([0xf1, 0xf5, 0xf9]);

/// A placeholder figure with the question asked about it.
#[derive(Debug, Clone, Serialize)]
pub struct MockFigure {
    pub id: String,
    pub prompt: String,
    #[serde(skip)]
    pub png: Vec<u8>,
}

/// Result of [`mock_extraction`].
#[derive(Debug, Clone, Serialize)]
pub struct MockExtraction {
    pub file_name: String,
    pub text: String,
    pub figures: Vec<MockFigure>,
}

/// The model's answer for one mock figure.
#[derive(Debug, Clone, Serialize)]
pub struct DemoFigureResult {
    pub id: String,
    pub prompt: String,
    pub response: String,
}

/// Pretend to extract `file_name`. Only the extension is checked; the file
/// is never opened.
pub fn mock_extraction(file_name: &str) -> Result<MockExtraction, FigscribeError> {
    let is_pdf = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);
    if !is_pdf {
        return Err(FigscribeError::InvalidConfig(format!(
            "the demo accepts PDF documents only, got '{file_name}'"
        )));
    }
    info!("Simulating extraction of {}", file_name);

    let figures = [("Figure 1", DEMO_FIGURE_PROMPT), ("Table 1", DEMO_TABLE_PROMPT)]
        .into_iter()
        .map(|(id, prompt)| {
            Ok(MockFigure {
                id: id.to_string(),
                prompt: prompt.to_string(),
                png: placeholder_png()?,
            })
        })
        .collect::<Result<Vec<_>, FigscribeError>>()?;

    Ok(MockExtraction {
        file_name: file_name.to_string(),
        text: SAMPLE_TEXT.to_string(),
        figures,
    })
}

/// Ask `model` the question of every figure in `extraction`, in order.
pub async fn analyze_figures<C: VisionClient>(
    client: &C,
    extraction: &MockExtraction,
    model: &str,
) -> Vec<DemoFigureResult> {
    let mut results = Vec::with_capacity(extraction.figures.len());
    for figure in &extraction.figures {
        info!("Analyzing {} with {}", figure.id, model);
        let response = match client
            .describe(model, &figure.prompt, &to_base64(&figure.png))
            .await
        {
            Ok(text) if text.trim().is_empty() => "VLM response was empty.".to_string(),
            Ok(text) => text,
            Err(CaptionError::Connection { .. }) => {
                "ERROR: Could not connect to the VLM server.".to_string()
            }
            Err(e) => format!("ERROR: VLM request failed ({e})."),
        };
        results.push(DemoFigureResult {
            id: figure.id.clone(),
            prompt: figure.prompt.clone(),
            response,
        });
    }
    results
}

/// A dark 400×300 card with a light 4 px frame.
fn placeholder_png() -> Result<Vec<u8>, FigscribeError> {
    let img = RgbImage::from_fn(PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT, |x, y| {
        let edge = x < 4 || y < 4 || x >= PLACEHOLDER_WIDTH - 4 || y >= PLACEHOLDER_HEIGHT - 4;
        if edge {
            PLACEHOLDER_FG
        } else {
            PLACEHOLDER_BG
        }
    });
    encode_png(&DynamicImage::ImageRgb8(img))
        .map_err(|e| FigscribeError::Internal(format!("placeholder encoding failed: {e}")))
}
