//! Output file naming.
//!
//! Every output name starts with the name of what it was derived from:
//!
//! ```text
//! input/Annual Report.pdf
//!   → output/Annual_Report_20261019_101500.json
//!   → output_figures/Annual_Report_20261019_101500-figure-1.png
//!     → figures_results/Annual_Report_20261019_101500-figure-1_20261019_102000_granite3.2_vision.json
//! ```
//!
//! Timestamps have one-second resolution, so two runs within the same second
//! would collide. [`unique_stem`] and [`unique_document_prefix`] append
//! `_1`, `_2`, … until no file with the candidate stem exists; outputs are
//! never overwritten.

use crate::output::FigureKind;
use chrono::{DateTime, Local};
use std::path::Path;

/// Format used for every timestamp embedded in a file name.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Render `at` with [`TIMESTAMP_FORMAT`].
pub fn timestamp(at: &DateTime<Local>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// File stem of `path` with spaces replaced by underscores.
pub fn document_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().replace(' ', "_"))
        .unwrap_or_else(|| "document".to_string())
}

/// Make a model identifier safe for use in a file name.
///
/// `qwen3-vl:235b-cloud` → `qwen3_vl_235b_cloud`,
/// `library/llava:13b` → `library_llava_13b`.
pub fn sanitize_model_name(model: &str) -> String {
    model
        .chars()
        .map(|c| match c {
            ':' | '-' | '/' | '\\' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect()
}

/// File name of an exported region: `<prefix>-<kind>-<n>.png`.
pub fn figure_file_name(prefix: &str, kind: FigureKind, index: usize) -> String {
    format!("{prefix}-{}-{index}.png", kind.as_str())
}

/// Stem of a caption report: `<image_stem>_<ts>_<model>`.
pub fn caption_stem(image_path: &Path, ts: &str, model: &str) -> String {
    let image_stem = image_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    format!("{image_stem}_{ts}_{}", sanitize_model_name(model))
}

/// Return `base`, or `base_N` for the smallest N ≥ 1, such that no
/// `dir/<stem>.<ext>` exists for any of `extensions`.
pub fn unique_stem(dir: &Path, base: &str, extensions: &[&str]) -> String {
    first_free(base, |stem| {
        extensions
            .iter()
            .any(|ext| dir.join(format!("{stem}.{ext}")).exists())
    })
}

/// Like [`unique_stem`] for a document's `json`/`md` pair in `output_dir`,
/// but a candidate is also taken while `figures_dir` holds any
/// `<candidate>-*` region file.
pub fn unique_document_prefix(output_dir: &Path, figures_dir: &Path, base: &str) -> String {
    let region_names: Vec<String> = std::fs::read_dir(figures_dir)
        .map(|entries| {
            entries
                .flatten()
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();

    first_free(base, |stem| {
        let dash = format!("{stem}-");
        ["json", "md"]
            .iter()
            .any(|ext| output_dir.join(format!("{stem}.{ext}")).exists())
            || region_names.iter().any(|name| name.starts_with(&dash))
    })
}

fn first_free(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_string();
    }
    let mut n = 1usize;
    loop {
        let candidate = format!("{base}_{n}");
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamp_format() {
        let at = Local.with_ymd_and_hms(2026, 10, 19, 9, 5, 7).unwrap();
        assert_eq!(timestamp(&at), "20261019_090507");
    }

    #[test]
    fn document_stem_replaces_spaces() {
        assert_eq!(
            document_stem(Path::new("input/Annual Report 2024.pdf")),
            "Annual_Report_2024"
        );
    }

    #[test]
    fn model_names_are_sanitised() {
        assert_eq!(sanitize_model_name("granite3.2-vision"), "granite3.2_vision");
        assert_eq!(sanitize_model_name("qwen3-vl:235b-cloud"), "qwen3_vl_235b_cloud");
        assert_eq!(sanitize_model_name("library/llava:13b"), "library_llava_13b");
    }

    #[test]
    fn figure_names_count_per_kind() {
        assert_eq!(
            figure_file_name("doc_20261019_090507", FigureKind::Table, 2),
            "doc_20261019_090507-table-2.png"
        );
    }

    #[test]
    fn caption_stem_is_prefixed_by_image_stem() {
        let stem = caption_stem(
            Path::new("output_figures/doc_20261019_090507-figure-1.png"),
            "20261019_091000",
            "llama3.2-vision",
        );
        assert!(stem.starts_with("doc_20261019_090507-figure-1_"));
        assert!(stem.ends_with("_llama3.2_vision"));
    }

    #[test]
    fn unique_stem_appends_counter() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(unique_stem(dir.path(), "doc_ts", &["json", "md"]), "doc_ts");

        std::fs::write(dir.path().join("doc_ts.md"), "x").unwrap();
        assert_eq!(unique_stem(dir.path(), "doc_ts", &["json", "md"]), "doc_ts_1");

        std::fs::write(dir.path().join("doc_ts_1.json"), "x").unwrap();
        assert_eq!(unique_stem(dir.path(), "doc_ts", &["json", "md"]), "doc_ts_2");
    }

    #[test]
    fn document_prefix_checks_figures_dir() {
        let out = tempfile::tempdir().unwrap();
        let figs = tempfile::tempdir().unwrap();
        assert_eq!(unique_document_prefix(out.path(), figs.path(), "doc_ts"), "doc_ts");

        // Output cleaned, figures kept.
        std::fs::write(figs.path().join("doc_ts-figure-1.png"), "x").unwrap();
        assert_eq!(unique_document_prefix(out.path(), figs.path(), "doc_ts"), "doc_ts_1");

        std::fs::write(out.path().join("doc_ts_1.json"), "x").unwrap();
        assert_eq!(unique_document_prefix(out.path(), figs.path(), "doc_ts"), "doc_ts_2");
    }

    #[test]
    fn document_prefix_ignores_longer_stems() {
        let out = tempfile::tempdir().unwrap();
        let figs = tempfile::tempdir().unwrap();
        std::fs::write(figs.path().join("doc_ts_extra-figure-1.png"), "x").unwrap();
        assert_eq!(unique_document_prefix(out.path(), figs.path(), "doc_ts"), "doc_ts");
    }
}
