//! CLI binary for pantheon-ocr.
//!
//! A thin shim over the library crate: maps subcommands and flags onto the
//! batch and assemble workflows and renders their progress events.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pantheon_ocr::pipeline::compile::compiler_available;
use pantheon_ocr::{
    collect_items, spawn_assemble, spawn_batch, BatchSummary, CompileConfig, ItemStatus,
    MistralOcrClient, OcrService, PantheonError, PipelineConfig, ProgressEvent, ResultStore,
    WorkflowHandle, WorkspaceLayout,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # OCR every image in a folder; records land in scans/json/
  pantheon ocr scans/

  # OCR selected files into an explicit workspace
  pantheon ocr page_01.png page_02.jpg --workspace book/

  # Stitch records into markdown and compile a PDF
  pantheon stitch --workspace scans/

  # Stitch only
  pantheon stitch --workspace scans/ --no-compile

  # Check API key and compiler
  pantheon check

WORKSPACE LAYOUT:
  <workspace>/json/                          one record per image
  <workspace>/markdown/stitched_document.md  merged document
  <workspace>/images/                        extracted images
  <workspace>/final_output/final_document.pdf

ENVIRONMENT VARIABLES:
  MISTRAL_API_KEY    Mistral API key (also read from .env)
  PANTHEON_MODEL     Override OCR model ID
  RUST_LOG           Override log filter
"#;

/// Batch-OCR images and stitch the results into one document.
#[derive(Parser, Debug)]
#[command(
    name = "pantheon",
    version,
    about = "Batch-OCR images with Mistral OCR and stitch the results into one document",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PANTHEON_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PANTHEON_QUIET")]
    quiet: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "PANTHEON_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// OCR images and save one JSON record per image.
    Ocr(OcrArgs),
    /// Stitch saved records into Markdown and compile it.
    Stitch(StitchArgs),
    /// Report whether OCR and compilation are available.
    Check(CheckArgs),
}

#[derive(Args, Debug)]
struct OcrArgs {
    /// Image files or folders (png, jpg, jpeg, bmp, gif, jp2).
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Workspace folder. Default: the first input folder, or the folder of
    /// the first input file.
    #[arg(short, long, env = "PANTHEON_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// OCR model ID.
    #[arg(long, env = "PANTHEON_MODEL", default_value = pantheon_ocr::config::DEFAULT_MODEL)]
    model: String,

    /// OCR API base URL.
    #[arg(long, env = "PANTHEON_API_BASE_URL", default_value = pantheon_ocr::config::DEFAULT_API_BASE_URL)]
    api_base_url: String,

    /// Per-request OCR timeout in seconds.
    #[arg(long, env = "PANTHEON_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Print the batch summary as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct CompileArgs {
    /// Document compiler executable.
    #[arg(long, env = "PANTHEON_COMPILER", default_value = "pandoc")]
    compiler: String,

    /// PDF engine passed to the compiler.
    #[arg(long, env = "PANTHEON_PDF_ENGINE", default_value = "tectonic")]
    pdf_engine: String,
}

impl From<&CompileArgs> for CompileConfig {
    fn from(args: &CompileArgs) -> Self {
        CompileConfig {
            program: args.compiler.clone(),
            pdf_engine: Some(args.pdf_engine.clone()).filter(|e| !e.is_empty()),
        }
    }
}

#[derive(Args, Debug)]
struct StitchArgs {
    /// Workspace folder holding json/.
    #[arg(short, long, env = "PANTHEON_WORKSPACE", default_value = ".")]
    workspace: PathBuf,

    /// Write the stitched Markdown only; skip the compiler.
    #[arg(long)]
    no_compile: bool,

    #[command(flatten)]
    compile: CompileArgs,
}

#[derive(Args, Debug)]
struct CheckArgs {
    #[command(flatten)]
    compile: CompileArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar carries the user-facing feedback; library logs only
    // surface at warn level unless asked for.
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

    match &cli.command {
        Command::Ocr(args) => run_ocr(&cli, args).await,
        Command::Stitch(args) => run_stitch(&cli, args).await,
        Command::Check(args) => run_check(args).await,
    }
}

async fn run_ocr(cli: &Cli, args: &OcrArgs) -> Result<()> {
    let config = PipelineConfig::builder()
        .model(&args.model)
        .api_base_url(&args.api_base_url)
        .api_timeout_secs(args.api_timeout)
        .build()
        .context("Invalid configuration")?;
    let client = MistralOcrClient::from_env(&config)?;

    let items = collect_items(&args.inputs).context("Failed to resolve inputs")?;
    let workspace = match &args.workspace {
        Some(w) => w.clone(),
        None => default_workspace(&args.inputs[0]),
    };
    let layout = WorkspaceLayout::new(workspace);
    let store = ResultStore::new(layout.records_dir());

    let service: Arc<dyn OcrService> = Arc::new(client);
    let handle = spawn_batch(items, service, store);
    let summary = drive(cli, handle, "OCR").await.context("OCR batch failed")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
        );
    } else if !cli.quiet {
        print_summary(&summary, &layout);
    }
    Ok(())
}

async fn run_stitch(cli: &Cli, args: &StitchArgs) -> Result<()> {
    let layout = WorkspaceLayout::new(&args.workspace);
    let compiler = (!args.no_compile).then(|| CompileConfig::from(&args.compile));

    let handle = spawn_assemble(layout, compiler);
    let output = match drive(cli, handle, "Stitch").await {
        Ok(output) => output,
        Err(e) => {
            // Compiler stderr can run to pages; show the head only.
            if let Some(diagnostic) = e.display_diagnostic() {
                anyhow::bail!("PDF conversion failed: {diagnostic}");
            }
            return Err(e).context("Stitching failed");
        }
    };

    if !cli.quiet {
        let report = &output.stitch;
        eprintln!(
            "{}  {} records  {} pages  {} images  →  {}",
            if report.issues.is_empty() {
                green("✔")
            } else {
                yellow("⚠")
            },
            report.records_merged,
            report.pages_written,
            report.assets_written,
            bold(&output.document.display().to_string()),
        );
        if !report.issues.is_empty() {
            eprintln!(
                "   {} records skipped, {} images skipped",
                report.records_skipped(),
                report.images_skipped()
            );
        }
        if let Some(ref pdf) = output.compiled {
            eprintln!("{}  PDF created: {}", green("✔"), bold(&pdf.display().to_string()));
        }
    }
    Ok(())
}

async fn run_check(args: &CheckArgs) -> Result<()> {
    let config = PipelineConfig::default();
    match MistralOcrClient::from_env(&config) {
        Ok(_) => println!("{} OCR: {} is set", green("✔"), config.api_key_env),
        Err(e) => println!("{} OCR: {}", red("✘"), e),
    }

    let compile = CompileConfig::from(&args.compile);
    if compiler_available(&compile.program).await {
        println!("{} Compiler: {} found", green("✔"), compile.program);
    } else {
        println!(
            "{} Compiler: {} not found on PATH",
            red("✘"),
            compile.program
        );
    }
    if let Some(ref engine) = compile.pdf_engine {
        if compiler_available(engine).await {
            println!("{} PDF engine: {} found", green("✔"), engine);
        } else {
            println!("{} PDF engine: {} not found on PATH", yellow("⚠"), engine);
        }
    }
    Ok(())
}

/// Folder the first input lives in (or is).
fn default_workspace(first: &Path) -> PathBuf {
    if first.is_dir() {
        return first.to_path_buf();
    }
    first
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Render events until the workflow finishes, then return its result.
async fn drive<T: Send + 'static>(
    cli: &Cli,
    mut handle: WorkflowHandle<T>,
    prefix: &'static str,
) -> Result<T, PantheonError> {
    let bar = if !cli.quiet && !cli.no_progress {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%  {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix(prefix);
        bar.enable_steady_tick(Duration::from_millis(80));
        Some(bar)
    } else {
        None
    };

    while let Some(event) = handle.events.recv().await {
        match (&bar, event) {
            (Some(bar), ProgressEvent::Progress { percent, message }) => {
                bar.set_position(u64::from(percent));
                bar.set_message(message);
            }
            (Some(bar), ProgressEvent::Status(message)) => bar.set_message(message),
            (Some(bar), ProgressEvent::Warning(message)) => {
                bar.println(format!("  {} {}", red("✗"), message));
            }
            (None, ProgressEvent::Warning(message)) if !cli.quiet => {
                eprintln!("  {} {}", red("✗"), message);
            }
            (None, _) => {}
        }
    }

    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
    handle.finish().await
}

fn print_summary(summary: &BatchSummary, layout: &WorkspaceLayout) {
    for outcome in &summary.outcomes {
        match &outcome.status {
            ItemStatus::Succeeded { .. } => {
                eprintln!("  {} {}", green("✓"), outcome.name);
            }
            ItemStatus::Degraded { detail, .. } => {
                eprintln!("  {} {}  {}", yellow("⚠"), outcome.name, dim(detail));
            }
            ItemStatus::Failed(e) => eprintln!("  {} {}", red("✗"), e),
        }
    }
    eprintln!(
        "{}  {}/{} records written  ({} degraded, {} failed)  →  {}",
        if summary.failed == 0 {
            green("✔")
        } else {
            yellow("⚠")
        },
        bold(&summary.records_written().to_string()),
        summary.total,
        summary.degraded,
        summary.failed,
        bold(&layout.records_dir().display().to_string()),
    );
}
