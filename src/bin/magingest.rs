//! CLI binary for magazine-ingest.
//!
//! A thin shim over the library crate that maps CLI flags to `IngestConfig`
//! and prints the resulting manifest.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use magazine_ingest::{
    delete_document, ingest, replace_document, slugify, FailurePolicy, IngestConfig,
    IngestProgressCallback, ProgressCallback,
};
use std::io;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
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
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress bar; pages may complete out of order within a batch.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_prefix("Preparing");
        bar.set_message("Reading PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Self::with_bar(bar)
    }

    fn with_bar(bar: ProgressBar) -> Arc<Self> {
        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }

    /// Stop the spinner so an error report is not drawn underneath it.
    fn abandon(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

impl IngestProgressCallback for CliProgressCallback {
    fn on_ingest_start(&self, total_pages: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");

        self.bar.set_length(total_pages as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Rendering");
        self.bar.reset_eta();
    }

    fn on_batch_start(&self, batch_index: usize, pages: RangeInclusive<usize>) {
        self.bar.set_message(format!(
            "batch {} (pages {}–{})",
            batch_index + 1,
            pages.start(),
            pages.end()
        ));
    }

    fn on_page_complete(&self, _page_num: usize, _total_pages: usize) {
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            red("✗"),
            page_num,
            total_pages,
            red(error)
        ));
        self.bar.inc(1);
    }

    fn on_ingest_complete(&self, total_pages: usize, success_count: usize) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!("{} {} pages ingested", green("✔"), bold(&success_count.to_string()));
        } else {
            eprintln!(
                "{} {}/{} pages ingested  ({} failed)",
                red("⚠"),
                bold(&success_count.to_string()),
                total_pages,
                red(&failed.to_string())
            );
        }
    }
}

/// Ingest magazine PDFs into web-ready page images.
#[derive(Parser, Debug)]
#[command(
    name = "magingest",
    version,
    about = "Rasterise magazine PDFs into WebP page images for a flipbook viewer",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "MAGINGEST_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "MAGINGEST_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rasterise a PDF into {root}/magazines/{id}/pages/.
    Ingest(IngestArgs),

    /// Remove every file of a document.
    Delete {
        /// Document id.
        #[arg(long)]
        id: String,

        /// Destination root directory.
        #[arg(long, env = "UPLOAD_DIR", default_value = "./public/uploads")]
        root: PathBuf,
    },

    /// Print the URL slug for a title.
    Slug {
        /// Issue title.
        title: String,
    },
}

#[derive(Args, Debug)]
struct IngestArgs {
    /// PDF file to ingest.
    input: PathBuf,

    /// Document id. Defaults to the slug of the file name.
    #[arg(long)]
    id: Option<String>,

    /// Destination root directory.
    #[arg(long, env = "UPLOAD_DIR", default_value = "./public/uploads")]
    root: PathBuf,

    /// Delete the existing document with this id first.
    #[arg(long)]
    replace: bool,

    /// Rendering DPI (72–600).
    #[arg(long, env = "MAGINGEST_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Maximum page width in pixels.
    #[arg(long, env = "MAGINGEST_MAX_WIDTH", default_value_t = 1920)]
    max_width: u32,

    /// Maximum page height in pixels.
    #[arg(long, env = "MAGINGEST_MAX_HEIGHT", default_value_t = 2560)]
    max_height: u32,

    /// WebP quality (1–100).
    #[arg(long, env = "MAGINGEST_QUALITY", default_value_t = 78,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Pages rendered concurrently per batch.
    #[arg(long, env = "MAGINGEST_BATCH_SIZE", default_value_t = 5)]
    batch_size: usize,

    /// Keep going when a page fails instead of aborting the document.
    #[arg(long, env = "MAGINGEST_BEST_EFFORT")]
    best_effort: bool,

    /// Prefix for manifest paths, e.g. /uploads/magazines.
    #[arg(long, env = "MAGINGEST_URL_PREFIX")]
    url_prefix: Option<String>,

    /// Path to the pdfium library or its directory.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium: Option<PathBuf>,

    /// Print the manifest as JSON.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "MAGINGEST_NO_PROGRESS")]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless --verbose is set.
    let show_progress = match &cli.command {
        Command::Ingest(args) => !cli.quiet && !args.no_progress && !args.json,
        _ => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Slug { title } => {
            println!("{}", slugify(&title));
        }
        Command::Delete { id, root } => {
            delete_document(&id, &root).await;
            if !cli.quiet {
                eprintln!("{} removed {}", green("✔"), bold(&id));
            }
        }
        Command::Ingest(args) => run_ingest(args, cli.quiet, show_progress).await?,
    }

    Ok(())
}

async fn run_ingest(args: IngestArgs, quiet: bool, show_progress: bool) -> Result<()> {
    let bytes = tokio::fs::read(&args.input)
        .await
        .with_context(|| format!("Failed to read {}", args.input.display()))?;

    let id = match args.id.clone() {
        Some(id) => id,
        None => default_id(&args.input)?,
    };

    let bar = show_progress.then(CliProgressCallback::new);
    let progress = bar
        .clone()
        .map(|cb| cb as Arc<dyn IngestProgressCallback>);
    let config = build_config(&args, progress)?;

    let outcome = if args.replace {
        replace_document(&bytes, &id, &args.root, &config).await
    } else {
        ingest(&bytes, &id, &args.root, &config).await
    };
    if outcome.is_err() {
        if let Some(ref bar) = bar {
            bar.abandon();
        }
    }
    let result = outcome.with_context(|| format!("Ingestion of '{}' failed", id))?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("Failed to serialise manifest")?
        );
    } else {
        for page in &result.pages {
            println!("{page}");
        }
        if !quiet {
            eprintln!(
                "{}  {}/{} pages  cover {}",
                if result.is_complete() { green("✔") } else { red("⚠") },
                result.pages.len(),
                result.total_pages,
                dim(if result.cover_image.is_empty() {
                    "<none>"
                } else {
                    &result.cover_image
                }),
            );
        }
    }

    Ok(())
}

/// Map CLI args to `IngestConfig`.
fn build_config(args: &IngestArgs, progress: Option<ProgressCallback>) -> Result<IngestConfig> {
    let mut builder = IngestConfig::builder()
        .dpi(args.dpi)
        .max_width(args.max_width)
        .max_height(args.max_height)
        .quality(args.quality)
        .batch_size(args.batch_size)
        .failure_policy(if args.best_effort {
            FailurePolicy::BestEffort
        } else {
            FailurePolicy::FailFast
        });

    if let Some(ref prefix) = args.url_prefix {
        builder = builder.url_prefix(prefix.clone());
    }
    if let Some(ref lib) = args.pdfium {
        builder = builder.pdfium_library_path(lib.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Slug of the input file stem, e.g. `Edisi Januari 2025.pdf` → `edisi-januari-2025`.
fn default_id(input: &std::path::Path) -> Result<String> {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let id = slugify(stem);
    if id.is_empty() {
        anyhow::bail!(
            "Cannot derive a document id from '{}'; pass --id",
            input.display()
        );
    }
    Ok(id)
}
