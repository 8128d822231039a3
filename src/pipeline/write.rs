//! Writing outputs to disk.
//!
//! Every file goes through [`write_atomic`]: the bytes land in a sibling
//! `*.tmp` file which is then renamed into place, so a crash mid-write never
//! leaves a truncated JSON or PNG that the next stage would pick up.

use crate::output::CaptionReport;
use serde::Serialize;
use std::path::Path;

/// Write `contents` to `path` via a temporary file and a rename.
pub async fn write_atomic(path: &Path, contents: impl AsRef<[u8]>) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let tmp_path = match path.extension() {
        Some(ext) => path.with_extension(format!("{}.tmp", ext.to_string_lossy())),
        None => path.with_extension("tmp"),
    };
    tokio::fs::write(&tmp_path, contents.as_ref()).await?;
    tokio::fs::rename(&tmp_path, path).await
}

/// Serialise `value` as pretty JSON and write it atomically.
pub async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> std::io::Result<()> {
    let json = serde_json::to_vec_pretty(value)?;
    write_atomic(path, json).await
}

/// Render the Markdown report for one caption.
pub fn caption_markdown(report: &CaptionReport) -> String {
    let mut md = String::from("# OCR Extraction Report\n\n");
    md.push_str(&format!("- **Image:** `{}`\n", report.original_image_path));
    md.push_str(&format!("- **Model:** `{}`\n", report.model_used));
    md.push_str(&format!(
        "- **Processing time:** {:.2} s\n",
        report.processing_time_seconds
    ));
    md.push_str(&format!("- **Timestamp:** {}\n\n", report.timestamp));
    md.push_str("## Extracted Text\n\n");
    md.push_str(report.extracted_text.trim_end());
    md.push('\n');
    md
}
