//! One (image, model) inference request.
//!
//! [`caption_pair`] is the only place the captioner touches the network.
//! It never propagates an error: a failed request becomes a
//! [`CaptionResult`] with `success == false`, so one unreachable model or
//! one rejected image does not stop the rest of the matrix.

use crate::config::CaptionConfig;
use crate::error::CaptionError;
use crate::ollama::VisionClient;
use crate::output::CaptionResult;
use crate::pipeline::postprocess::clean_response;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, warn};

/// Ask `model` to describe the image at `image_path`, whose bytes are
/// already base64-encoded in `image_base64`.
///
/// The elapsed time covers the request only, not reading the image. The
/// returned text is cleaned with [`clean_response`]; a response that is
/// empty after cleanup counts as a failure.
pub async fn caption_pair<C: VisionClient>(
    client: &C,
    image_path: &Path,
    image_base64: &str,
    model: &str,
    config: &CaptionConfig,
) -> CaptionResult {
    let start = Instant::now();
    let outcome = client.describe(model, &config.prompt, image_base64).await;
    let duration_ms = start.elapsed().as_millis() as u64;

    let outcome = outcome.and_then(|raw| {
        let text = clean_response(&raw);
        if text.is_empty() {
            Err(CaptionError::EmptyResponse {
                model: model.to_string(),
            })
        } else {
            Ok(text)
        }
    });

    match outcome {
        Ok(text) => {
            debug!(
                "{} × {}: {} chars in {}ms",
                image_path.display(),
                model,
                text.len(),
                duration_ms
            );
            CaptionResult {
                image_path: image_path.to_path_buf(),
                model: model.to_string(),
                text,
                duration_ms,
                success: true,
                error: None,
                json_path: None,
                markdown_path: None,
            }
        }
        Err(e) => {
            warn!("{} × {}: {}", image_path.display(), model, e);
            CaptionResult {
                image_path: image_path.to_path_buf(),
                model: model.to_string(),
                text: String::new(),
                duration_ms,
                success: false,
                error: Some(e.to_string()),
                json_path: None,
                markdown_path: None,
            }
        }
    }
}
