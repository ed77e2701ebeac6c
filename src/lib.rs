//! # magazine-ingest
//!
//! Turn an uploaded PDF magazine issue into web-ready page images.
//!
//! Flipbook viewers need one image per page, at a predictable path, and a
//! manifest telling them which image is the cover. This crate renders every
//! page of the upload, re-encodes it as lossy WebP and returns that manifest,
//! cleaning up after itself when a page fails.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF bytes
//!  │
//!  ├─ 1. Load      validate, count pages (lopdf), archive original.pdf
//!  ├─ 2. Render    page → PNG via pdfium, batches of N pages at a time
//!  ├─ 3. Optimise  PNG → WebP (q=78), raw PNG removed once WebP is on disk
//!  └─ 4. Output    ProcessingResult { totalPages, coverImage, pages }
//! ```
//!
//! Files are laid out as:
//!
//! ```text
//! {root}/magazines/{id}/original.pdf
//! {root}/magazines/{id}/pages/page-{N}.webp
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use magazine_ingest::{delete_document, ingest, slugify, IngestConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bytes = std::fs::read("edisi-januari.pdf")?;
//!     let slug = slugify("Tada Todays Edisi Januari 2025");
//!     let config = IngestConfig::default();
//!
//!     match ingest(&bytes, &slug, "./public/uploads", &config).await {
//!         Ok(result) => println!("{} pages, cover {}", result.total_pages, result.cover_image),
//!         Err(e) => {
//!             // The pipeline already removed its own files; a caller that
//!             // created other state for this id rolls it back here.
//!             delete_document(&slug, "./public/uploads").await;
//!             return Err(e.into());
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `magingest` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! magazine-ingest = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod ingest;
pub mod layout;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod slug;
pub mod upload;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{FailurePolicy, IngestConfig, IngestConfigBuilder, RenderSettings};
pub use error::{IngestError, PageError};
pub use ingest::{delete_document, ingest, ingest_sync, replace_document};
pub use layout::DocumentLayout;
pub use output::{PageArtifact, ProcessingResult};
pub use pipeline::optimize::{Optimizer, WebpOptimizer};
pub use pipeline::rasterize::{BackendError, PdfiumRasterizer, Rasterizer};
pub use progress::{IngestProgressCallback, NoopProgressCallback, ProgressCallback};
pub use slug::slugify;
pub use upload::{content_type_for, validate_upload};
