//! Error types for the magazine-ingest library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`IngestError`] — **Fatal**: the document cannot be ingested (empty or
//!   corrupt upload, bad identifier, unwritable destination). Returned as
//!   `Err(IngestError)` from [`crate::ingest::ingest`].
//!
//! * [`PageError`] — a single page failed to rasterise or re-encode. Under
//!   [`crate::config::FailurePolicy::FailFast`] the first one aborts the
//!   document and is wrapped in [`IngestError::PageProcessing`]; under
//!   [`crate::config::FailurePolicy::BestEffort`] it is logged, reported to
//!   the progress callback and the page is dropped from the manifest.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the magazine-ingest library.
#[derive(Debug, Error)]
pub enum IngestError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The upload was zero bytes long, or the PDF parsed but has no pages.
    #[error("Document is empty: {detail}")]
    EmptyDocument { detail: String },

    /// No document identifier was supplied.
    #[error("A document identifier is required")]
    MissingIdentifier,

    /// The identifier cannot be used as a single directory name.
    #[error("Invalid document identifier '{id}': must be a single path component")]
    InvalidIdentifier { id: String },

    /// The buffer is not a parseable PDF.
    #[error("Upload is not a valid PDF: {detail}")]
    InvalidDocument { detail: String },

    /// The upload was refused before any parsing (size or media type).
    #[error("Upload rejected: {reason}")]
    UploadRejected { reason: String },

    // ── Storage errors ────────────────────────────────────────────────────
    /// Creating the document tree or archiving the original failed.
    #[error("Failed to prepare '{path}': {source}")]
    DirectoryError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Page errors ───────────────────────────────────────────────────────
    /// A page failed and the failure policy is fail-fast.
    #[error(transparent)]
    PageProcessing(#[from] PageError),

    /// Best-effort ingestion finished without a single usable page.
    #[error("All {total} pages failed.\nFirst error: {first_error}")]
    AllPagesFailed { total: usize, first_error: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium, place the library next to the\n\
binary, or install it system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IngestError {
    /// The page number this error is tagged with, if it is page-level.
    pub fn page(&self) -> Option<usize> {
        match self {
            IngestError::PageProcessing(e) => Some(e.page()),
            _ => None,
        }
    }

    /// `true` for errors caused by the upload itself rather than the host.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            IngestError::EmptyDocument { .. }
                | IngestError::MissingIdentifier
                | IngestError::InvalidIdentifier { .. }
                | IngestError::InvalidDocument { .. }
                | IngestError::UploadRejected { .. }
        )
    }
}

/// An error for a single page.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The page could not be rendered to a raw bitmap.
    #[error("Page {page}: rasterisation failed: {detail}")]
    RasterFailed { page: usize, detail: String },

    /// The raw bitmap could not be re-encoded; the raw file is kept.
    #[error("Page {page}: image optimisation failed: {detail}")]
    OptimizeFailed { page: usize, detail: String },
}

impl PageError {
    /// 1-indexed page number the failure belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::RasterFailed { page, .. } | PageError::OptimizeFailed { page, .. } => *page,
        }
    }
}
