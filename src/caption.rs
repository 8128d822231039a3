//! Stage 2: every figure × every model → one JSON + Markdown report each.
//!
//! ```text
//! output_figures/paper_20261019_101500-figure-1.png
//!   ├─▶ figures_results/paper_20261019_101500-figure-1_20261019_102000_granite3.2_vision.json
//!   ├─▶ figures_results/paper_20261019_101500-figure-1_20261019_102000_granite3.2_vision.md
//!   ├─▶ figures_results/paper_20261019_101500-figure-1_20261019_102004_llama3.2_vision.json
//!   └─▶ figures_results/paper_20261019_101500-figure-1_20261019_102004_llama3.2_vision.md
//! ```
//!
//! Images are the outer loop and models the inner one, so each image is
//! read and encoded once. Reports are written only for successful pairs.

use crate::config::CaptionConfig;
use crate::error::{CaptionError, FigscribeError};
use crate::ollama::VisionClient;
use crate::output::{CaptionReport, CaptionResult, CaptionSummary, SkippedImage};
use crate::pipeline::encode::to_base64;
use crate::pipeline::naming::{caption_stem, timestamp, unique_stem};
use crate::pipeline::write::{caption_markdown, write_atomic, write_json};
use crate::progress::{NoopProgress, ProgressCallback, Stage};
use chrono::Local;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

pub use crate::pipeline::llm::caption_pair;
pub use crate::pipeline::scan::find_images;

/// Caption every image under `config.figures_dir` with every configured
/// model.
///
/// # Errors
/// Returns `Err(FigscribeError)` only when the figures directory does not
/// exist or the results directory cannot be created. Failed requests and
/// unreadable images are recorded in the [`CaptionSummary`].
pub async fn caption_all<C: VisionClient>(
    config: &CaptionConfig,
    client: &C,
) -> Result<CaptionSummary, FigscribeError> {
    let total_start = Instant::now();

    if !config.figures_dir.is_dir() {
        return Err(FigscribeError::InputDirMissing {
            path: config.figures_dir.clone(),
            hint: "Run `figscribe extract` first, or point --figures-dir at a directory of images."
                .into(),
        });
    }
    tokio::fs::create_dir_all(&config.results_dir)
        .await
        .map_err(|source| FigscribeError::DirectoryAccess {
            path: config.results_dir.clone(),
            source,
        })?;

    let images = find_images(&config.figures_dir)?;
    if images.is_empty() {
        warn!("No images found in {}", config.figures_dir.display());
        return Ok(CaptionSummary::default());
    }
    info!(
        "Captioning {} image(s) with {} model(s): {}",
        images.len(),
        config.models.len(),
        config.models.join(", ")
    );

    let progress: ProgressCallback = config
        .progress_callback
        .clone()
        .unwrap_or_else(|| Arc::new(NoopProgress));
    let total_units = images.len() * config.models.len();
    progress.on_stage_start(Stage::Caption, total_units);

    let mut summary = CaptionSummary::default();
    for image_path in &images {
        let image_name = image_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| image_path.display().to_string());

        let bytes = match tokio::fs::read(image_path).await {
            Ok(b) => b,
            Err(e) => {
                warn!("Skipping unreadable image {}: {}", image_path.display(), e);
                for model in &config.models {
                    progress.on_unit_error(&format!("{image_name} × {model}"), &e.to_string());
                }
                summary.skipped_images.push(SkippedImage {
                    path: image_path.clone(),
                    error: e.to_string(),
                });
                continue;
            }
        };
        let image_b64 = to_base64(&bytes);

        for model in &config.models {
            let unit = format!("{image_name} × {model}");
            progress.on_unit_start(&unit);

            let mut result = caption_pair(client, image_path, &image_b64, model, config).await;
            if result.success {
                if let Err(e) = write_report(&config.results_dir, &mut result).await {
                    warn!("{}: {}", unit, e);
                    result.success = false;
                    result.error = Some(e.to_string());
                }
            }

            match (&result.error, &result.json_path) {
                (None, Some(json_path)) => {
                    info!(
                        "{}: {:.2}s → {}",
                        unit,
                        result.duration_secs(),
                        json_path.display()
                    );
                    progress.on_unit_complete(&unit, result.duration_ms);
                }
                (error, _) => {
                    let msg = error.as_deref().unwrap_or("unknown error");
                    progress.on_unit_error(&unit, msg);
                }
            }
            summary.results.push(result);
        }
    }

    summary.total_duration_ms = total_start.elapsed().as_millis() as u64;
    progress.on_stage_complete(Stage::Caption, total_units, summary.succeeded());
    info!(
        "Captioning complete: {} succeeded, {} failed, {} image(s) skipped, {}ms",
        summary.succeeded(),
        summary.failed(),
        summary.skipped_images.len(),
        summary.total_duration_ms
    );

    Ok(summary)
}

/// Write the JSON + Markdown report pair for a successful result and record
/// the paths on it.
async fn write_report(results_dir: &Path, result: &mut CaptionResult) -> Result<(), CaptionError> {
    let ts = timestamp(&Local::now());
    let base = caption_stem(&result.image_path, &ts, &result.model);
    let stem = unique_stem(results_dir, &base, &["json", "md"]);
    let json_path = results_dir.join(format!("{stem}.json"));
    let markdown_path = results_dir.join(format!("{stem}.md"));

    let report = CaptionReport {
        original_image_path: result.image_path.display().to_string(),
        extracted_text: result.text.clone(),
        model_used: result.model.clone(),
        processing_time_seconds: result.duration_secs(),
        timestamp: ts,
    };

    let failed = |path: &Path, e: std::io::Error| CaptionError::ReportWriteFailed {
        path: path.to_path_buf(),
        detail: e.to_string(),
    };
    write_json(&json_path, &report)
        .await
        .map_err(|e| failed(json_path.as_path(), e))?;
    write_atomic(&markdown_path, caption_markdown(&report))
        .await
        .map_err(|e| failed(markdown_path.as_path(), e))?;

    result.json_path = Some(json_path);
    result.markdown_path = Some(markdown_path);
    Ok(())
}
