//! Page rasterisation: render one PDF page to a raw PNG bitmap.
//!
//! The pipeline only depends on the [`Rasterizer`] trait; [`PdfiumRasterizer`]
//! is the production implementation.
//!
//! ## Why a dedicated render thread?
//!
//! pdfium keeps process-global state: a second bound instance shares it and
//! dropping either tears it down. [`PdfiumRasterizer`] therefore owns exactly
//! one `Pdfium` on a private thread and receives render jobs over a channel.
//! Page tasks block on their reply inside `spawn_blocking`, so the Tokio
//! workers never stall and the batch size still caps how many jobs are queued.
//!
//! The rasteriser is process-wide: [`PdfiumRasterizer::shared`] binds it on
//! first use and every later ingestion, concurrent or not, gets a clone of
//! the same `Arc`. It is never dropped, so pdfium is never torn down while
//! another document is rendering.

use crate::config::RenderSettings;
use crate::error::{IngestError, PageError};
use image::ImageFormat;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Error type returned by pluggable backends.
pub type BackendError = Box<dyn std::error::Error + Send + Sync>;

/// Renders a single page of a PDF on disk to a raw bitmap file.
///
/// Implementations are called from the blocking thread pool, possibly for
/// several pages of the same document at once.
pub trait Rasterizer: Send + Sync {
    /// Render 1-indexed `page_num` of `pdf_path` into `raw_path`.
    ///
    /// Returns the path actually written, normally `raw_path`.
    fn rasterize(
        &self,
        pdf_path: &Path,
        page_num: usize,
        raw_path: &Path,
        settings: &RenderSettings,
    ) -> Result<PathBuf, BackendError>;
}

/// Run a rasteriser for one page on the blocking pool and tag failures with
/// the page number.
pub async fn rasterize_page(
    rasterizer: Arc<dyn Rasterizer>,
    pdf_path: PathBuf,
    page_num: usize,
    raw_path: PathBuf,
    settings: Arc<RenderSettings>,
) -> Result<PathBuf, PageError> {
    tokio::task::spawn_blocking(move || {
        rasterizer.rasterize(&pdf_path, page_num, &raw_path, &settings)
    })
    .await
    .map_err(|e| PageError::RasterFailed {
        page: page_num,
        detail: format!("render task panicked: {e}"),
    })?
    .map_err(|e| PageError::RasterFailed {
        page: page_num,
        detail: e.to_string(),
    })
}

// ── pdfium backend ───────────────────────────────────────────────────────

struct RenderJob {
    pdf_path: PathBuf,
    page_num: usize,
    raw_path: PathBuf,
    settings: RenderSettings,
    reply: mpsc::SyncSender<Result<PathBuf, String>>,
}

/// [`Rasterizer`] backed by a single pdfium instance on its own thread.
///
/// Obtained through [`PdfiumRasterizer::shared`]; the instance lives for the
/// rest of the process.
#[derive(Debug)]
pub struct PdfiumRasterizer {
    jobs: mpsc::Sender<RenderJob>,
    library_path: Option<PathBuf>,
}

static SHARED_PDFIUM: SharedBackend<PdfiumRasterizer> = SharedBackend::new();

impl PdfiumRasterizer {
    /// The process-wide pdfium rasteriser, bound on first call.
    ///
    /// `library_path` may point at the library file or at the directory that
    /// contains it. Without one, `PDFIUM_LIB_PATH`, the working directory and
    /// the system library path are tried in turn. Only the first successful
    /// call binds; a later call asking for a different library gets the one
    /// already loaded. A failed bind is not cached.
    pub async fn shared(library_path: Option<&Path>) -> Result<Arc<Self>, IngestError> {
        let requested = library_path.map(Path::to_path_buf);
        let start_path = requested.clone();
        let rasterizer = SHARED_PDFIUM
            .get_or_start(move || Self::start(start_path))
            .await?;

        if requested.is_some() && rasterizer.library_path != requested {
            warn!(
                "pdfium already bound from {:?}, ignoring {:?}",
                rasterizer.library_path, requested
            );
        }
        Ok(rasterizer)
    }

    /// Bind pdfium and start the render thread. Blocks until binding has
    /// succeeded or failed.
    fn start(library_path: Option<PathBuf>) -> Result<Self, IngestError> {
        let (jobs, job_rx) = mpsc::channel::<RenderJob>();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), IngestError>>(1);
        let thread_library_path = library_path.clone();

        std::thread::Builder::new()
            .name("pdfium-render".into())
            .spawn(move || {
                let pdfium = match bind_pdfium(thread_library_path.as_deref()) {
                    Ok(pdfium) => {
                        let _ = ready_tx.send(Ok(()));
                        pdfium
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                while let Ok(job) = job_rx.recv() {
                    let result = render_job(&pdfium, &job);
                    let _ = job.reply.send(result);
                }
                debug!("pdfium render thread exiting");
            })
            .map_err(|e| IngestError::Internal(format!("Failed to start render thread: {e}")))?;

        ready_rx
            .recv()
            .map_err(|_| IngestError::Internal("Render thread exited during startup".into()))??;

        Ok(Self { jobs, library_path })
    }
}

/// A backend slot initialised at most once per process.
///
/// Concurrent callers wait for the same initialisation; a failed start
/// leaves the slot empty so the next caller retries.
pub(crate) struct SharedBackend<T> {
    cell: OnceCell<Arc<T>>,
}

impl<T: Send + Sync + 'static> SharedBackend<T> {
    pub(crate) const fn new() -> Self {
        Self {
            cell: OnceCell::const_new(),
        }
    }

    /// Return the backend, running the blocking `start` on first use.
    pub(crate) async fn get_or_start<F>(&self, start: F) -> Result<Arc<T>, IngestError>
    where
        F: FnOnce() -> Result<T, IngestError> + Send + 'static,
    {
        let backend = self
            .cell
            .get_or_try_init(|| async move {
                tokio::task::spawn_blocking(start)
                    .await
                    .map_err(|e| IngestError::Internal(format!("backend startup panicked: {e}")))?
                    .map(Arc::new)
            })
            .await?;
        Ok(Arc::clone(backend))
    }
}

impl Rasterizer for PdfiumRasterizer {
    fn rasterize(
        &self,
        pdf_path: &Path,
        page_num: usize,
        raw_path: &Path,
        settings: &RenderSettings,
    ) -> Result<PathBuf, BackendError> {
        let (reply, reply_rx) = mpsc::sync_channel(1);
        self.jobs
            .send(RenderJob {
                pdf_path: pdf_path.to_path_buf(),
                page_num,
                raw_path: raw_path.to_path_buf(),
                settings: settings.clone(),
                reply,
            })
            .map_err(|_| "pdfium render thread has stopped")?;

        let path = reply_rx
            .recv()
            .map_err(|_| "pdfium render thread dropped the job")??;
        Ok(path)
    }
}

/// Load the pdfium shared library.
pub fn bind_pdfium(library_path: Option<&Path>) -> Result<Pdfium, IngestError> {
    let bindings = match library_path {
        Some(path) => Pdfium::bind_to_library(library_file(path)),
        None => match std::env::var_os("PDFIUM_LIB_PATH") {
            Some(env_path) => Pdfium::bind_to_library(library_file(Path::new(&env_path))),
            None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library()),
        },
    }
    .map_err(|e| IngestError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

fn library_file(path: &Path) -> PathBuf {
    if path.is_dir() {
        Pdfium::pdfium_platform_library_name_at_path(path)
    } else {
        path.to_path_buf()
    }
}

/// pdfium's 0-based page index for a 1-indexed page number.
fn page_index(page_num: usize) -> Result<u16, String> {
    page_num
        .checked_sub(1)
        .and_then(|idx| u16::try_from(idx).ok())
        .ok_or_else(|| format!("page {page_num} is outside pdfium's page index range"))
}

/// Render one job on the pdfium thread.
///
/// The document is reopened per page: an id may be re-ingested in place, and
/// a cached handle would keep serving the replaced file.
fn render_job(pdfium: &Pdfium, job: &RenderJob) -> Result<PathBuf, String> {
    let document = pdfium
        .load_pdf_from_file(&job.pdf_path, None)
        .map_err(|e| format!("open failed: {:?}", e))?;

    let page = document
        .pages()
        .get(page_index(job.page_num)?)
        .map_err(|e| format!("page lookup failed: {:?}", e))?;

    let (width, height) = job
        .settings
        .target_size(page.width().value, page.height().value);
    let render_config = PdfRenderConfig::new()
        .set_target_width(width as i32)
        .set_maximum_height(height as i32);

    let bitmap = page
        .render_with_config(&render_config)
        .map_err(|e| format!("render failed: {:?}", e))?;

    let image = bitmap.as_image();
    debug!(
        "Rendered page {} → {}x{} px",
        job.page_num,
        image.width(),
        image.height()
    );

    image
        .save_with_format(&job.raw_path, ImageFormat::Png)
        .map_err(|e| format!("writing {} failed: {e}", job.raw_path.display()))?;

    Ok(job.raw_path.clone())
}
