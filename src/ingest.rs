//! Ingestion entry points: ingest, replace and delete a document.
//!
//! ## Batching
//!
//! Pages are split into fixed-size chunks of `config.batch_size`. Every page
//! of a chunk runs rasterise → optimise concurrently; the chunk is joined
//! completely before the next one starts. Results land in a slot vector at
//! `page - 1`, so completion order inside a batch never affects the manifest.
//!
//! ## Failure
//!
//! Input and storage errors abort before any page work. Page errors follow
//! [`FailurePolicy`]: fail-fast stops after the failing batch, removes the
//! document directory and returns the page error; best-effort drops the page.
//! A cleanup failure is only logged, never returned in place of the error
//! that caused it.

use crate::config::{FailurePolicy, IngestConfig, RenderSettings};
use crate::error::{IngestError, PageError};
use crate::layout::DocumentLayout;
use crate::output::ProcessingResult;
use crate::pipeline::load::SourceDocument;
use crate::pipeline::optimize::{optimize_page, Optimizer, WebpOptimizer};
use crate::pipeline::rasterize::{rasterize_page, PdfiumRasterizer, Rasterizer};
use crate::progress::ProgressCallback;
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Ingest an uploaded PDF.
///
/// # Arguments
/// * `bytes`       — the raw upload
/// * `document_id` — stable id namespacing every artifact of this document
/// * `root`        — destination root; files go under `{root}/magazines/{id}`
/// * `config`      — ingestion configuration
///
/// # Returns
/// The page manifest. Under [`FailurePolicy::FailFast`] it always lists every
/// page.
///
/// # Errors
/// - [`IngestError::EmptyDocument`], [`IngestError::InvalidDocument`],
///   [`IngestError::MissingIdentifier`], [`IngestError::InvalidIdentifier`]:
///   nothing was written
/// - [`IngestError::DirectoryError`]: the tree could not be created
/// - [`IngestError::PageProcessing`]: a page failed (fail-fast); the document
///   directory has been removed
/// - [`IngestError::AllPagesFailed`]: no page succeeded (best-effort); the
///   document directory has been removed
///
/// # Example
/// ```rust,no_run
/// use magazine_ingest::{ingest, IngestConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes = std::fs::read("issue-01.pdf")?;
/// let config = IngestConfig::builder().url_prefix("/uploads/magazines").build()?;
/// let result = ingest(&bytes, "clx42", "./public/uploads", &config).await?;
/// println!("{} pages, cover {}", result.total_pages, result.cover_image);
/// # Ok(())
/// # }
/// ```
pub async fn ingest(
    bytes: &[u8],
    document_id: &str,
    root: impl AsRef<Path>,
    config: &IngestConfig,
) -> Result<ProcessingResult, IngestError> {
    let layout = DocumentLayout::new(document_id, root.as_ref())?;
    let source = SourceDocument::parse(bytes).await?;
    ingest_source(&source, &layout, config).await
}

/// Replace a document's content with a new upload under the same id.
///
/// The new upload is validated first; only then is the existing directory
/// deleted and the new document ingested. A rejected upload therefore leaves
/// the current issue untouched.
pub async fn replace_document(
    bytes: &[u8],
    document_id: &str,
    root: impl AsRef<Path>,
    config: &IngestConfig,
) -> Result<ProcessingResult, IngestError> {
    let layout = DocumentLayout::new(document_id, root.as_ref())?;
    let source = SourceDocument::parse(bytes).await?;
    info!("Replacing document {}", layout.document_id());
    remove_document_dir(&layout).await;
    ingest_source(&source, &layout, config).await
}

/// Delete every artifact of a document.
///
/// Never fails: a missing directory is fine, and any other error is logged.
/// An empty or unsafe id is refused with a warning so the `magazines`
/// directory itself can never be removed.
pub async fn delete_document(document_id: &str, root: impl AsRef<Path>) {
    match DocumentLayout::new(document_id, root.as_ref()) {
        Ok(layout) => remove_document_dir(&layout).await,
        Err(e) => warn!("Not deleting document files: {}", e),
    }
}

/// Synchronous wrapper around [`ingest`].
///
/// Creates a temporary tokio runtime internally.
pub fn ingest_sync(
    bytes: &[u8],
    document_id: &str,
    root: impl AsRef<Path>,
    config: &IngestConfig,
) -> Result<ProcessingResult, IngestError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| IngestError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(ingest(bytes, document_id, root, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Everything a page task needs, shared by reference across a batch.
struct PageContext {
    layout: DocumentLayout,
    original: PathBuf,
    total_pages: usize,
    settings: Arc<RenderSettings>,
    quality: u8,
    url_prefix: Option<String>,
    rasterizer: Arc<dyn Rasterizer>,
    optimizer: Arc<dyn Optimizer>,
    progress: Option<ProgressCallback>,
}

async fn ingest_source(
    source: &SourceDocument,
    layout: &DocumentLayout,
    config: &IngestConfig,
) -> Result<ProcessingResult, IngestError> {
    let start = Instant::now();
    let total_pages = source.page_count();
    info!(
        "Ingesting document {}: {} pages, batch size {}",
        layout.document_id(),
        total_pages,
        config.batch_size
    );

    // Bind backends before writing anything: a missing pdfium library
    // must not leave an orphaned directory behind.
    let (rasterizer, optimizer) = resolve_backends(config).await?;

    let original = source.persist(layout).await?;

    if let Some(ref cb) = config.progress_callback {
        cb.on_ingest_start(total_pages);
    }

    let ctx = PageContext {
        layout: layout.clone(),
        original,
        total_pages,
        settings: Arc::new(config.render_settings()),
        quality: config.quality,
        url_prefix: config.url_prefix.clone(),
        rasterizer,
        optimizer,
        progress: config.progress_callback.clone(),
    };

    let result = match process_batches(&ctx, config).await {
        Ok(result) => result,
        Err(e) => {
            warn!(
                "Ingestion of {} failed, rolling back: {}",
                layout.document_id(),
                e
            );
            remove_document_dir(layout).await;
            return Err(e);
        }
    };

    info!(
        "Ingested {}: {}/{} pages in {}ms",
        layout.document_id(),
        result.pages.len(),
        total_pages,
        start.elapsed().as_millis()
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_ingest_complete(total_pages, result.pages.len());
    }

    Ok(result)
}

/// Pick the configured backends, falling back to the process-wide pdfium
/// rasteriser and WebP.
async fn resolve_backends(
    config: &IngestConfig,
) -> Result<(Arc<dyn Rasterizer>, Arc<dyn Optimizer>), IngestError> {
    let rasterizer: Arc<dyn Rasterizer> = match config.rasterizer {
        Some(ref r) => Arc::clone(r),
        None => PdfiumRasterizer::shared(config.pdfium_library_path.as_deref()).await?,
    };

    let optimizer: Arc<dyn Optimizer> = match config.optimizer {
        Some(ref o) => Arc::clone(o),
        None => Arc::new(WebpOptimizer),
    };

    Ok((rasterizer, optimizer))
}

/// Run every batch and assemble the manifest.
async fn process_batches(
    ctx: &PageContext,
    config: &IngestConfig,
) -> Result<ProcessingResult, IngestError> {
    let mut slots: Vec<Option<String>> = vec![None; ctx.total_pages];
    let mut first_error: Option<PageError> = None;

    // Fields are public, so a struct literal can bypass the builder's clamp.
    let batch_size = config.batch_size.max(1);
    let page_numbers: Vec<usize> = (1..=ctx.total_pages).collect();
    for (batch_index, batch) in page_numbers.chunks(batch_size).enumerate() {
        let (first, last) = (batch[0], batch[batch.len() - 1]);
        debug!("Batch {}: pages {}–{}", batch_index, first, last);
        if let Some(ref cb) = ctx.progress {
            cb.on_batch_start(batch_index, first..=last);
        }

        let outcomes = join_all(batch.iter().map(|&page_num| process_page(ctx, page_num))).await;

        for (&page_num, outcome) in batch.iter().zip(outcomes) {
            match outcome {
                Ok(image_path) => slots[page_num - 1] = Some(image_path),
                Err(e) => {
                    warn!("{}", e);
                    first_error.get_or_insert(e);
                }
            }
        }

        if config.failure_policy == FailurePolicy::FailFast {
            if let Some(e) = first_error.take() {
                return Err(e.into());
            }
        }
    }

    let cover_image = slots[0].clone().unwrap_or_default();
    let missing_pages: Vec<usize> = slots
        .iter()
        .enumerate()
        .filter(|(_, slot)| slot.is_none())
        .map(|(idx, _)| idx + 1)
        .collect();
    let pages: Vec<String> = slots.into_iter().flatten().collect();

    if pages.is_empty() {
        return Err(IngestError::AllPagesFailed {
            total: ctx.total_pages,
            first_error: first_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string()),
        });
    }
    if !missing_pages.is_empty() {
        warn!(
            "Document {} published without pages {:?}",
            ctx.layout.document_id(),
            missing_pages
        );
    }

    Ok(ProcessingResult {
        total_pages: ctx.total_pages,
        cover_image,
        pages,
        original_document: ctx.layout.original_image_path(ctx.url_prefix.as_deref()),
        missing_pages,
    })
}

/// Rasterise and optimise one page, reporting the outcome to the callback.
async fn process_page(ctx: &PageContext, page_num: usize) -> Result<String, PageError> {
    let outcome = render_and_optimize(ctx, page_num).await;

    if let Some(ref cb) = ctx.progress {
        match &outcome {
            Ok(_) => cb.on_page_complete(page_num, ctx.total_pages),
            Err(e) => cb.on_page_error(page_num, ctx.total_pages, &e.to_string()),
        }
    }
    outcome
}

/// Returns the page's manifest path once its final image is in place.
async fn render_and_optimize(ctx: &PageContext, page_num: usize) -> Result<String, PageError> {
    let raw = rasterize_page(
        Arc::clone(&ctx.rasterizer),
        ctx.original.clone(),
        page_num,
        ctx.layout.raw_page_path(page_num),
        Arc::clone(&ctx.settings),
    )
    .await?;

    optimize_page(
        Arc::clone(&ctx.optimizer),
        page_num,
        raw,
        ctx.layout.page_path(page_num),
        ctx.quality,
    )
    .await?;

    Ok(ctx
        .layout
        .page_image_path(page_num, ctx.url_prefix.as_deref()))
}

/// Remove a document directory, logging instead of failing.
async fn remove_document_dir(layout: &DocumentLayout) {
    let dir = layout.document_dir();
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => info!("Deleted {}", dir.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("Nothing to delete at {}", dir.display())
        }
        Err(e) => warn!("Error deleting document files at {}: {}", dir.display(), e),
    }
}
