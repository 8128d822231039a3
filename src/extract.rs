//! Stage 1: PDFs → structured JSON + Markdown + one PNG per visual region.
//!
//! ```text
//! input/paper.pdf
//!   ├─▶ output/paper_20261019_101500.json
//!   ├─▶ output/paper_20261019_101500.md
//!   └─▶ output_figures/paper_20261019_101500-figure-1.png
//!       output_figures/paper_20261019_101500-table-1.png
//!       output_figures/paper_20261019_101500-page-4.png
//! ```
//!
//! Documents are processed one at a time in sorted order. A document that
//! fails is logged, recorded in the [`ExtractionSummary`] and skipped; only
//! problems with the directories themselves (or a backend that cannot run
//! at all) end the stage early.

use crate::config::ExtractConfig;
use crate::converter::{resolve_image_refs, DocumentConverter, VisualRegion};
use crate::error::{DocumentError, FigscribeError};
use crate::output::{
    Document, DocumentFailure, DocumentReport, ExtractionSummary, Figure, FigureKind,
    StructuredOutput,
};
use crate::pipeline::naming::{document_stem, figure_file_name, timestamp, unique_document_prefix};
use crate::pipeline::scan::check_pdf_magic;
use crate::pipeline::write::{write_atomic, write_json};
use crate::progress::{NoopProgress, ProgressCallback, Stage};
use chrono::Local;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub use crate::pipeline::scan::find_pdfs;

/// Create the input, output and figures directories if they are missing.
pub async fn setup_directories(config: &ExtractConfig) -> Result<(), FigscribeError> {
    for dir in [&config.input_dir, &config.output_dir, &config.figures_dir] {
        if dir.is_dir() {
            continue;
        }
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| FigscribeError::DirectoryAccess {
                path: dir.clone(),
                source,
            })?;
        info!("Created directory {}", dir.display());
    }
    Ok(())
}

/// Run every PDF under `config.input_dir` through `converter`.
///
/// # Errors
/// Returns `Err(FigscribeError)` only when the directories cannot be
/// created or scanned, or when the converter reports a condition that
/// would fail every document (e.g. PDFium cannot be bound). Per-document
/// failures are in [`ExtractionSummary::failures`].
pub async fn extract_all<C: DocumentConverter>(
    config: &ExtractConfig,
    converter: &C,
) -> Result<ExtractionSummary, FigscribeError> {
    let total_start = Instant::now();
    setup_directories(config).await?;

    let pdfs = find_pdfs(&config.input_dir)?;
    if pdfs.is_empty() {
        warn!(
            "No PDF files found in {}. Place PDFs there and run again.",
            config.input_dir.display()
        );
        return Ok(ExtractionSummary::default());
    }
    info!(
        "Found {} PDF(s) in {} (backend: {})",
        pdfs.len(),
        config.input_dir.display(),
        converter.name()
    );

    let progress: ProgressCallback = config
        .progress_callback
        .clone()
        .unwrap_or_else(|| Arc::new(NoopProgress));
    progress.on_stage_start(Stage::Extract, pdfs.len());

    let mut summary = ExtractionSummary::default();
    for path in &pdfs {
        let unit = path.display().to_string();
        progress.on_unit_start(&unit);

        match extract_document(path, config, converter).await {
            Ok(report) => {
                info!(
                    "{}: {} figure(s) → {}",
                    report.document.name(),
                    report.figures.len(),
                    report.output.markdown_path.display()
                );
                progress.on_unit_complete(&unit, report.duration_ms);
                summary.documents.push(report);
            }
            Err(DocumentError::Fatal(e)) => return Err(e),
            Err(e) => {
                warn!("Skipping {}: {}", unit, e);
                progress.on_unit_error(&unit, &e.to_string());
                summary.failures.push(DocumentFailure {
                    path: path.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    summary.total_duration_ms = total_start.elapsed().as_millis() as u64;
    progress.on_stage_complete(Stage::Extract, pdfs.len(), summary.documents.len());
    info!(
        "Extraction complete: {}/{} document(s), {} figure(s), {}ms",
        summary.documents.len(),
        pdfs.len(),
        summary.figure_count(),
        summary.total_duration_ms
    );

    Ok(summary)
}

/// Convert one PDF and write its outputs.
///
/// The output and figures directories must exist. Nothing already on disk
/// is overwritten: the `<stem>_<ts>` prefix gets a `_N` suffix when a
/// previous run in the same second used it in either directory.
pub async fn extract_document<C: DocumentConverter>(
    path: &Path,
    config: &ExtractConfig,
    converter: &C,
) -> Result<DocumentReport, DocumentError> {
    let start = Instant::now();
    let document = Document::new(path);
    info!("Extracting {}", path.display());

    // ── Step 1: Validate ─────────────────────────────────────────────────
    check_pdf_magic(path)?;

    // ── Step 2: Convert ──────────────────────────────────────────────────
    let converted = converter.convert(path).await?;
    debug!(
        "{}: {} region(s), {} Markdown bytes",
        document.name(),
        converted.regions.len(),
        converted.markdown.len()
    );

    // ── Step 3: Name ─────────────────────────────────────────────────────
    let created_at = Local::now();
    let base = format!("{}_{}", document_stem(path), timestamp(&created_at));
    let prefix = unique_document_prefix(&config.output_dir, &config.figures_dir, &base);
    let json_path = config.output_dir.join(format!("{prefix}.json"));
    let markdown_path = config.output_dir.join(format!("{prefix}.md"));

    // ── Step 4: Structured JSON ──────────────────────────────────────────
    write_json(&json_path, &converted.json)
        .await
        .map_err(|source| DocumentError::OutputWriteFailed {
            path: json_path.clone(),
            source,
        })?;

    // ── Step 5: Regions ──────────────────────────────────────────────────
    let mut figures = Vec::with_capacity(converted.regions.len());
    let mut named: Vec<(&VisualRegion, String)> = Vec::with_capacity(converted.regions.len());
    let mut figure_count = 0usize;
    let mut table_count = 0usize;

    for region in &converted.regions {
        let index = match region.kind {
            FigureKind::Figure => {
                figure_count += 1;
                figure_count
            }
            FigureKind::Table => {
                table_count += 1;
                table_count
            }
            FigureKind::Page => region.page.unwrap_or(named.len() + 1),
        };
        let file_name = figure_file_name(&prefix, region.kind, index);
        let figure_path = config.figures_dir.join(&file_name);

        write_atomic(&figure_path, &region.png)
            .await
            .map_err(|source| DocumentError::OutputWriteFailed {
                path: figure_path.clone(),
                source,
            })?;
        debug!("Saved {} {} to {}", region.kind, index, figure_path.display());

        figures.push(Figure {
            source_document: document.name(),
            kind: region.kind,
            index,
            page: region.page,
            path: figure_path,
            size_bytes: region.png.len(),
            created_at,
        });
        named.push((region, file_name));
    }

    // ── Step 6: Markdown ─────────────────────────────────────────────────
    let figures_rel = relative_dir(&config.output_dir, &config.figures_dir);
    let markdown = resolve_image_refs(
        &converted.markdown,
        &named,
        config.image_ref_mode,
        &figures_rel.to_string_lossy(),
    );
    write_atomic(&markdown_path, markdown)
        .await
        .map_err(|source| DocumentError::OutputWriteFailed {
            path: markdown_path.clone(),
            source,
        })?;

    Ok(DocumentReport {
        document,
        output: StructuredOutput {
            name: prefix,
            json_path,
            markdown_path,
            created_at,
        },
        figures,
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

/// Path of `to` as seen from inside `from`, e.g. `./output` →
/// `./output_figures` gives `../output_figures`.
///
/// When the two cannot be related lexically (one absolute, one relative,
/// or `..` in `from`), `to` is returned unchanged.
fn relative_dir(from: &Path, to: &Path) -> PathBuf {
    fn parts(p: &Path) -> Vec<Component<'_>> {
        p.components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect()
    }
    let from_parts = parts(from);
    let to_parts = parts(to);

    if from.is_absolute() != to.is_absolute()
        || from_parts.iter().any(|c| matches!(c, Component::ParentDir))
    {
        return to.to_path_buf();
    }

    let common = from_parts
        .iter()
        .zip(&to_parts)
        .take_while(|(a, b)| a == b)
        .count();

    let mut rel = PathBuf::new();
    for _ in common..from_parts.len() {
        rel.push("..");
    }
    for part in &to_parts[common..] {
        rel.push(part.as_os_str());
    }
    rel
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImageRefMode;
    use crate::converter::{ConvertedDocument, IMAGE_PLACEHOLDER};
    use std::fs;

    struct FixedConverter;

    impl DocumentConverter for FixedConverter {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn convert(&self, _pdf_path: &Path) -> Result<ConvertedDocument, DocumentError> {
            let png = b"\x89PNG\r\n\x1a\nfake".to_vec();
            Ok(ConvertedDocument {
                json: serde_json::json!({ "pages": 2 }),
                markdown: format!("# Title\n\n{IMAGE_PLACEHOLDER}\n"),
                regions: vec![
                    VisualRegion {
                        kind: FigureKind::Figure,
                        page: Some(1),
                        png: png.clone(),
                    },
                    VisualRegion {
                        kind: FigureKind::Table,
                        page: Some(2),
                        png: png.clone(),
                    },
                    VisualRegion {
                        kind: FigureKind::Table,
                        page: Some(2),
                        png,
                    },
                ],
            })
        }
    }

    fn config_in(root: &Path) -> ExtractConfig {
        ExtractConfig::builder()
            .input_dir(root.join("input"))
            .output_dir(root.join("output"))
            .figures_dir(root.join("output_figures"))
            .image_ref_mode(ImageRefMode::Referenced)
            .build()
            .unwrap()
    }

    #[test]
    fn relative_dir_between_siblings() {
        assert_eq!(
            relative_dir(Path::new("./output"), Path::new("./output_figures")),
            PathBuf::from("../output_figures")
        );
        assert_eq!(
            relative_dir(Path::new("/data/out/md"), Path::new("/data/figs")),
            PathBuf::from("../../figs")
        );
        assert_eq!(
            relative_dir(Path::new("out"), Path::new("/abs/figs")),
            PathBuf::from("/abs/figs")
        );
    }

    #[tokio::test]
    async fn setup_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        setup_directories(&config).await.unwrap();
        assert!(config.input_dir.is_dir());
        assert!(config.output_dir.is_dir());
        assert!(config.figures_dir.is_dir());
    }

    #[tokio::test]
    async fn document_outputs_share_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        setup_directories(&config).await.unwrap();
        let pdf = config.input_dir.join("Annual Report.pdf");
        fs::write(&pdf, b"%PDF-1.7\n").unwrap();

        let report = extract_document(&pdf, &config, &FixedConverter).await.unwrap();

        assert!(report.output.name.starts_with("Annual_Report_"));
        assert!(report.output.json_path.exists());
        assert!(report.output.markdown_path.exists());

        let names: Vec<String> = report
            .figures
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        let prefix = &report.output.name;
        assert_eq!(
            names,
            vec![
                format!("{prefix}-figure-1.png"),
                format!("{prefix}-table-1.png"),
                format!("{prefix}-table-2.png"),
            ]
        );

        let md = fs::read_to_string(&report.output.markdown_path).unwrap();
        assert!(md.contains(&format!("](../output_figures/{prefix}-figure-1.png)")));
    }

    #[tokio::test]
    async fn rerun_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        setup_directories(&config).await.unwrap();
        let pdf = config.input_dir.join("doc.pdf");
        fs::write(&pdf, b"%PDF-1.7\n").unwrap();

        let first = extract_document(&pdf, &config, &FixedConverter).await.unwrap();
        let second = extract_document(&pdf, &config, &FixedConverter).await.unwrap();

        assert_ne!(first.output.json_path, second.output.json_path);
        assert!(first.output.json_path.exists());
        assert!(second.output.json_path.exists());
    }

    #[tokio::test]
    async fn cleaned_output_dir_keeps_old_figures() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        setup_directories(&config).await.unwrap();
        let pdf = config.input_dir.join("doc.pdf");
        fs::write(&pdf, b"%PDF-1.7\n").unwrap();

        let first = extract_document(&pdf, &config, &FixedConverter).await.unwrap();
        fs::remove_file(&first.output.json_path).unwrap();
        fs::remove_file(&first.output.markdown_path).unwrap();
        let second = extract_document(&pdf, &config, &FixedConverter).await.unwrap();

        assert_ne!(first.output.name, second.output.name);
        assert_eq!(
            fs::read_dir(&config.figures_dir).unwrap().count(),
            first.figures.len() + second.figures.len()
        );
    }

    #[tokio::test]
    async fn non_pdf_is_rejected_before_conversion() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        setup_directories(&config).await.unwrap();
        let fake = config.input_dir.join("fake.pdf");
        fs::write(&fake, b"GIF89a....").unwrap();

        let err = extract_document(&fake, &config, &FixedConverter)
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::NotAPdf { .. }));
        assert_eq!(fs::read_dir(&config.output_dir).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn empty_input_dir_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let summary = extract_all(&config_in(dir.path()), &FixedConverter)
            .await
            .unwrap();
        assert!(summary.documents.is_empty());
        assert!(summary.failures.is_empty());
    }
}
