//! CLI binary for figscribe.
//!
//! A thin shim over the library crate that maps subcommands and flags to
//! `ExtractConfig` / `CaptionConfig` and prints summaries.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use figscribe::{
    analyze_figures, caption_all, extract_all, mock_extraction, CaptionConfig, CaptionSummary,
    DoclingConverter, ExtractConfig, ExtractionSummary, ImageRefMode, OllamaApi, OllamaClient,
    PdfiumConverter, PipelineProgress, ProgressCallback, Stage,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::warn;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar per stage plus a log line per unit.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<String, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_stage_start` tells us the unit count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Scanning…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, stage: Stage, total: usize) {
        let noun = match stage {
            Stage::Extract => "documents",
            Stage::Caption => "captions",
        };
        let template = format!(
            "{{spinner:.cyan}} {{prefix:.bold}}  \
             [{{bar:42.green/238}}] {{pos:>3}}/{{len}} {noun}  \
             ⏱ {{elapsed_precise}}  ETA {{eta_precise}}"
        );
        let progress_style = ProgressStyle::with_template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS);

        self.bar.reset();
        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix(match stage {
            Stage::Extract => "Extracting",
            Stage::Caption => "Captioning",
        });
        self.bar.enable_steady_tick(Duration::from_millis(80));
    }

    fn elapsed_secs(&self, unit: &str) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(unit))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl PipelineProgress for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage, total_units: usize) {
        self.activate_bar(stage, total_units);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Stage {stage}: {total_units} unit(s)…"))
        ));
    }

    fn on_unit_start(&self, unit: &str) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(unit.to_string(), Instant::now());
        }
        self.bar.set_message(unit.to_string());
    }

    fn on_unit_complete(&self, unit: &str, _duration_ms: u64) {
        let secs = self.elapsed_secs(unit);
        self.bar.println(format!(
            "  {} {}  {}",
            green("✓"),
            unit,
            dim(&format!("{secs:.1}s"))
        ));
        self.bar.inc(1);
    }

    fn on_unit_error(&self, unit: &str, error: &str) {
        let secs = self.elapsed_secs(unit);
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Keep one line per unit.
        let first_line = error.lines().next().unwrap_or_default();
        let msg = if first_line.chars().count() > 80 {
            format!("{}\u{2026}", first_line.chars().take(79).collect::<String>())
        } else {
            first_line.to_string()
        };

        self.bar.println(format!(
            "  {} {}  {}  {}",
            red("✗"),
            unit,
            red(&msg),
            dim(&format!("{secs:.1}s"))
        ));
        self.bar.inc(1);
    }

    fn on_stage_complete(&self, stage: Stage, total_units: usize, success_count: usize) {
        let failed = total_units.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} {stage} unit(s) succeeded",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} {stage} unit(s) succeeded  ({} failed)",
                if failed == total_units {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_units,
                red(&failed.to_string()),
            );
        }
    }
}

// A stage that returns before `on_stage_start` (nothing to do, or a fatal
// error) would otherwise leave the spinner ticking.
impl Drop for CliProgressCallback {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Stage 1: PDFs in ./input → ./output (JSON + Markdown) and ./output_figures (PNG)
  figscribe extract

  # Use docling-serve for table detection and OCR
  figscribe extract --backend docling --docling-url http://localhost:5001

  # Stage 2: caption every figure with two models
  figscribe caption --model granite3.2-vision --model llama3.2-vision

  # Both stages
  figscribe run

  # Walk through the flow with placeholder figures
  figscribe demo paper.pdf --model granite3.2-vision

  # Which models are pulled?
  figscribe models

DIRECTORIES:
  input/            source PDFs (scanned recursively)
  output/           <stem>_<ts>.json and <stem>_<ts>.md per document
  output_figures/   <stem>_<ts>-figure-N.png, -table-N.png, -page-N.png
  figures_results/  <figure>_<ts>_<model>.json and .md per caption

ENVIRONMENT VARIABLES:
  OLLAMA_HOST         Ollama base URL (default http://localhost:11434)
  FIGSCRIBE_MODELS    Comma-separated model list
  DOCLING_URL         docling-serve base URL (default http://localhost:5001)
  PDFIUM_LIB_PATH     Path to an existing libpdfium
  RUST_LOG            Log filter, overrides -v / -q

SETUP:
  1. Start Ollama and pull a vision model:  ollama pull granite3.2-vision
  2. Drop PDFs into ./input
  3. figscribe run
"#;

/// Extract figures from PDFs and caption them with local vision models.
#[derive(Parser, Debug)]
#[command(
    name = "figscribe",
    version,
    about = "Extract figures and tables from PDFs and caption them with local vision models",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "FIGSCRIBE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "FIGSCRIBE_QUIET")]
    quiet: bool,

    /// Disable progress bars.
    #[arg(long, global = true, env = "FIGSCRIBE_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stage 1: convert PDFs and export figures.
    Extract(ExtractArgs),
    /// Stage 2: caption every exported figure with every model.
    Caption {
        /// Directory scanned for images.
        #[arg(long, env = "FIGSCRIBE_FIGURES_DIR", default_value = figscribe::config::DEFAULT_FIGURES_DIR)]
        figures_dir: PathBuf,
        #[command(flatten)]
        args: CaptionArgs,
    },
    /// Stage 1 followed by stage 2.
    Run {
        #[command(flatten)]
        extract: ExtractArgs,
        #[command(flatten)]
        caption: CaptionArgs,
    },
    /// Mocked extraction of one PDF, then real figure analysis.
    Demo(DemoArgs),
    /// List models pulled on the Ollama server.
    Models(ServerArgs),
}

#[derive(Args, Debug, Clone)]
struct ExtractArgs {
    /// Directory scanned for PDFs.
    #[arg(long, env = "FIGSCRIBE_INPUT_DIR", default_value = figscribe::config::DEFAULT_INPUT_DIR)]
    input_dir: PathBuf,

    /// Directory receiving JSON + Markdown.
    #[arg(long, env = "FIGSCRIBE_OUTPUT_DIR", default_value = figscribe::config::DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// Directory receiving exported figures.
    #[arg(long, env = "FIGSCRIBE_FIGURES_DIR", default_value = figscribe::config::DEFAULT_FIGURES_DIR)]
    figures_dir: PathBuf,

    /// Conversion backend.
    #[arg(long, env = "FIGSCRIBE_BACKEND", value_enum, default_value = "pdfium")]
    backend: BackendArg,

    /// docling-serve base URL (backend docling).
    #[arg(long, env = "DOCLING_URL", default_value = figscribe::config::DEFAULT_DOCLING_URL)]
    docling_url: String,

    /// Page/picture scale factor (0.5–8.0).
    #[arg(long, env = "FIGSCRIBE_IMAGES_SCALE", default_value_t = 2.0)]
    images_scale: f32,

    /// Do not export text-less pages for OCR.
    #[arg(long, env = "FIGSCRIBE_NO_OCR")]
    no_ocr: bool,

    /// How images appear in the Markdown output.
    #[arg(long, env = "FIGSCRIBE_IMAGE_REFS", value_enum, default_value = "embedded")]
    image_refs: ImageRefArg,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "FIGSCRIBE_PASSWORD")]
    password: Option<String>,
}

#[derive(Args, Debug, Clone)]
struct ServerArgs {
    /// Ollama base URL.
    #[arg(long, env = "OLLAMA_HOST", default_value = figscribe::config::DEFAULT_OLLAMA_URL)]
    ollama_url: String,

    /// Per-request timeout in seconds. Unbounded when unset.
    #[arg(long, env = "FIGSCRIBE_TIMEOUT")]
    timeout: Option<u64>,
}

#[derive(Args, Debug, Clone)]
struct CaptionArgs {
    #[command(flatten)]
    server: ServerArgs,

    /// Vision model; repeat for several. Default: granite3.2-vision, llama3.2-vision.
    #[arg(short, long = "model", env = "FIGSCRIBE_MODELS", value_delimiter = ',')]
    models: Vec<String>,

    /// Instruction sent with every image.
    #[arg(long, env = "FIGSCRIBE_PROMPT")]
    prompt: Option<String>,

    /// Ollama endpoint used for requests.
    #[arg(long, env = "FIGSCRIBE_OLLAMA_API", value_enum, default_value = "chat")]
    api: ApiArg,

    /// Directory receiving caption reports.
    #[arg(long, env = "FIGSCRIBE_RESULTS_DIR", default_value = figscribe::config::DEFAULT_RESULTS_DIR)]
    results_dir: PathBuf,

    /// Skip the check for models that are not pulled.
    #[arg(long, env = "FIGSCRIBE_NO_PREFLIGHT")]
    no_preflight: bool,
}

#[derive(Args, Debug, Clone)]
struct DemoArgs {
    /// Name of the PDF to pretend to process.
    file: String,

    #[command(flatten)]
    server: ServerArgs,

    /// Vision model used for the analysis.
    #[arg(short, long, env = "FIGSCRIBE_DEMO_MODEL", default_value = "granite3.2-vision")]
    model: String,

    /// Print results as JSON.
    #[arg(long, env = "FIGSCRIBE_DEMO_JSON")]
    json: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum BackendArg {
    Pdfium,
    Docling,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ImageRefArg {
    Embedded,
    Referenced,
    Placeholder,
}

impl From<ImageRefArg> for ImageRefMode {
    fn from(v: ImageRefArg) -> Self {
        match v {
            ImageRefArg::Embedded => ImageRefMode::Embedded,
            ImageRefArg::Referenced => ImageRefMode::Referenced,
            ImageRefArg::Placeholder => ImageRefMode::Placeholder,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ApiArg {
    Chat,
    Generate,
}

impl From<ApiArg> for OllamaApi {
    fn from(v: ApiArg) -> Self {
        match v {
            ApiArg::Chat => OllamaApi::Chat,
            ApiArg::Generate => OllamaApi::Generate,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; -v always wins.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else if show_progress {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress_cb = || -> Option<ProgressCallback> {
        show_progress.then(|| CliProgressCallback::new_dynamic() as Arc<dyn PipelineProgress>)
    };

    match &cli.command {
        Command::Extract(args) => {
            let summary = run_extract(args, progress_cb()).await?;
            print_extract_summary(&cli, &summary);
        }
        Command::Caption { figures_dir, args } => {
            let summary = run_caption(args, figures_dir, progress_cb()).await?;
            print_caption_summary(&cli, &summary);
        }
        Command::Run { extract, caption } => {
            let summary = run_extract(extract, progress_cb()).await?;
            print_extract_summary(&cli, &summary);

            let summary = run_caption(caption, &extract.figures_dir, progress_cb()).await?;
            print_caption_summary(&cli, &summary);
        }
        Command::Demo(args) => run_demo(&cli, args).await?,
        Command::Models(args) => {
            let client = ollama_client(args, OllamaApi::default())?;
            let models = client
                .list_models()
                .await
                .with_context(|| format!("Failed to list models on {}", client.base_url()))?;
            if models.is_empty() {
                eprintln!("No models pulled on {}", client.base_url());
            }
            for m in models {
                println!("{m}");
            }
        }
    }

    Ok(())
}

async fn run_extract(
    args: &ExtractArgs,
    progress: Option<ProgressCallback>,
) -> Result<ExtractionSummary> {
    let mut builder = ExtractConfig::builder()
        .input_dir(&args.input_dir)
        .output_dir(&args.output_dir)
        .figures_dir(&args.figures_dir)
        .images_scale(args.images_scale)
        .ocr(!args.no_ocr)
        .image_ref_mode(args.image_refs.into());
    if let Some(ref pwd) = args.password {
        builder = builder.password(pwd);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    let config = builder.build().context("Invalid configuration")?;

    let summary = match args.backend {
        BackendArg::Pdfium => {
            let converter = PdfiumConverter::new(&config);
            converter
                .check_binding()
                .context("PDFium is not available")?;
            extract_all(&config, &converter).await
        }
        BackendArg::Docling => {
            let converter = DoclingConverter::new(&args.docling_url, None)
                .context("Failed to create HTTP client")?
                .ocr(config.ocr)
                .images_scale(config.images_scale);
            extract_all(&config, &converter).await
        }
    };
    summary.context("Extraction failed")
}

async fn run_caption(
    args: &CaptionArgs,
    figures_dir: &Path,
    progress: Option<ProgressCallback>,
) -> Result<CaptionSummary> {
    let mut builder = CaptionConfig::builder()
        .figures_dir(figures_dir)
        .results_dir(&args.results_dir);
    if !args.models.is_empty() {
        builder = builder.models(args.models.iter().cloned());
    }
    if let Some(ref prompt) = args.prompt {
        builder = builder.prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    let config = builder.build().context("Invalid configuration")?;
    let client = ollama_client(&args.server, args.api.into())?;

    // ── Preflight: warn about models that are not pulled ────────────────
    if !args.no_preflight {
        match client.missing_models(&config.models).await {
            Ok(missing) => {
                for model in missing {
                    warn!(
                        "Model '{}' is not pulled on {}; its requests will fail. Run `ollama pull {}`.",
                        model,
                        client.base_url(),
                        model
                    );
                }
            }
            Err(e) => warn!("Preflight skipped: {}", e),
        }
    }

    caption_all(&config, &client)
        .await
        .context("Captioning failed")
}

async fn run_demo(cli: &Cli, args: &DemoArgs) -> Result<()> {
    let extraction = mock_extraction(&args.file).context("Demo extraction failed")?;
    let client = ollama_client(
        &ServerArgs {
            ollama_url: args.server.ollama_url.clone(),
            timeout: args.server.timeout.or(Some(60)),
        },
        OllamaApi::Generate,
    )?;

    if !cli.quiet && !args.json {
        eprintln!("{} {}", cyan("◆"), bold("Extracted Document Text"));
        println!("{}\n", extraction.text);
        eprintln!(
            "{} Sending {} figure(s) to {}…",
            cyan("◆"),
            extraction.figures.len(),
            bold(&args.model)
        );
    }

    let results = analyze_figures(&client, &extraction, &args.model).await;

    if args.json {
        let json = serde_json::to_string_pretty(&serde_json::json!({
            "file": extraction.file_name,
            "text": extraction.text,
            "figures": results,
        }))
        .context("Failed to serialise demo results")?;
        println!("{json}");
        return Ok(());
    }

    for r in &results {
        println!("## {}\n", r.id);
        println!("**Prompt:** {}\n", r.prompt);
        println!("**Result:**\n\n{}\n", r.response);
    }
    if !cli.quiet {
        let failed = results
            .iter()
            .filter(|r| r.response.starts_with("ERROR:"))
            .count();
        if failed == 0 {
            eprintln!("{} Demo complete", green("✔"));
        } else {
            eprintln!(
                "{} Demo complete with {} failed request(s)",
                cyan("⚠"),
                red(&failed.to_string())
            );
        }
    }
    Ok(())
}

fn ollama_client(args: &ServerArgs, api: OllamaApi) -> Result<OllamaClient> {
    OllamaClient::new(&args.ollama_url, api, args.timeout).context("Failed to create HTTP client")
}

fn print_extract_summary(cli: &Cli, summary: &ExtractionSummary) {
    if cli.quiet {
        return;
    }
    let total = summary.documents.len() + summary.failures.len();
    eprintln!(
        "{}  {}/{} document(s)  {} figure(s)  {}ms",
        if summary.failures.is_empty() {
            green("✔")
        } else {
            cyan("⚠")
        },
        summary.documents.len(),
        total,
        summary.figure_count(),
        summary.total_duration_ms,
    );
    for f in &summary.failures {
        eprintln!("   {} {}", red("✗"), dim(&f.path.display().to_string()));
    }
}

fn print_caption_summary(cli: &Cli, summary: &CaptionSummary) {
    if cli.quiet {
        return;
    }
    eprintln!(
        "{}  {} caption(s) written  {} failed  {} image(s) skipped  {}ms",
        if summary.failed() == 0 && summary.skipped_images.is_empty() {
            green("✔")
        } else {
            cyan("⚠")
        },
        summary.succeeded(),
        summary.failed(),
        summary.skipped_images.len(),
        summary.total_duration_ms,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unstarted_spinner_is_cleared_on_drop() {
        let cb = CliProgressCallback::new_dynamic();
        let bar = cb.bar.clone();
        assert!(!bar.is_finished());

        drop(cb);
        assert!(bar.is_finished());
    }

    #[test]
    fn finished_stage_stays_finished() {
        let cb = CliProgressCallback::new_dynamic();
        let bar = cb.bar.clone();
        cb.on_stage_start(Stage::Caption, 1);
        cb.on_unit_start("fig.png");
        cb.on_unit_complete("fig.png", 10);
        cb.on_stage_complete(Stage::Caption, 1, 1);
        assert!(bar.is_finished());

        drop(cb);
        assert_eq!(bar.position(), 1);
    }
}
