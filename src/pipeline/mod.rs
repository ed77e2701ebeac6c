//! Pipeline stages for PDF ingestion.
//!
//! Each submodule implements exactly one transformation step, so stages can
//! be tested on their own and backends swapped without touching the
//! orchestration in [`crate::ingest`].
//!
//! ## Data Flow
//!
//! ```text
//! load ──▶ rasterize ──▶ optimize
//! (lopdf)   (pdfium)     (libwebp)
//! ```
//!
//! 1. [`load`]      — validate the upload, count pages, archive `original.pdf`
//! 2. [`rasterize`] — render one page to a raw PNG; pdfium lives on its own
//!    thread because it is not safe to share across threads
//! 3. [`optimize`]  — re-encode the PNG as lossy WebP and drop the raw file
//!    once the final image is confirmed on disk

pub mod load;
pub mod optimize;
pub mod rasterize;
