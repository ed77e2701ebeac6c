//! Image optimisation: raw bitmap → lossy WebP at its final path.
//!
//! The [`Optimizer`] trait only encodes. Confirming the output and removing
//! the raw intermediate happens in [`optimize_page`], so every backend gets
//! the same ordering: the raw file is deleted only after a non-empty final
//! file exists, and it is kept whenever encoding fails.

use crate::error::PageError;
use crate::pipeline::rasterize::BackendError;
use image::DynamicImage;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Re-encodes a raw page bitmap into its final web format.
pub trait Optimizer: Send + Sync {
    /// Encode `raw_path` into `dest_path` at `quality` (1–100).
    ///
    /// Must not delete `raw_path`.
    fn optimize(&self, raw_path: &Path, dest_path: &Path, quality: u8) -> Result<(), BackendError>;
}

/// Optimise one page on the blocking pool, confirm the output, then remove
/// the raw file.
pub async fn optimize_page(
    optimizer: Arc<dyn Optimizer>,
    page_num: usize,
    raw_path: PathBuf,
    dest_path: PathBuf,
    quality: u8,
) -> Result<(), PageError> {
    let fail = |detail: String| PageError::OptimizeFailed {
        page: page_num,
        detail,
    };

    let (raw, dest) = (raw_path.clone(), dest_path.clone());
    tokio::task::spawn_blocking(move || optimizer.optimize(&raw, &dest, quality))
        .await
        .map_err(|e| fail(format!("optimiser task panicked: {e}")))?
        .map_err(|e| fail(e.to_string()))?;

    let written = tokio::fs::metadata(&dest_path)
        .await
        .map_err(|e| fail(format!("{} was not written: {e}", dest_path.display())))?;
    if written.len() == 0 {
        return Err(fail(format!("{} is empty", dest_path.display())));
    }

    if raw_path != dest_path {
        tokio::fs::remove_file(&raw_path)
            .await
            .map_err(|e| fail(format!("could not remove {}: {e}", raw_path.display())))?;
    }

    debug!(
        "Page {} optimised → {} ({} bytes)",
        page_num,
        dest_path.display(),
        written.len()
    );
    Ok(())
}

// ── WebP backend ─────────────────────────────────────────────────────────

/// [`Optimizer`] producing lossy WebP through libwebp.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebpOptimizer;

impl Optimizer for WebpOptimizer {
    fn optimize(&self, raw_path: &Path, dest_path: &Path, quality: u8) -> Result<(), BackendError> {
        let img = image::open(raw_path)?;
        let data = encode_webp(&img, quality)?;
        write_atomic(dest_path, &data)
    }
}

/// Encode an image as lossy WebP.
///
/// Pages are opaque, so the alpha channel is dropped before encoding.
pub fn encode_webp(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, BackendError> {
    let rgb = match img {
        DynamicImage::ImageRgb8(_) => None,
        other => Some(DynamicImage::ImageRgb8(other.to_rgb8())),
    };
    let source = rgb.as_ref().unwrap_or(img);

    let encoder = webp::Encoder::from_image(source).map_err(|e| e.to_string())?;
    let encoded = encoder.encode(f32::from(quality.clamp(1, 100)));
    Ok(encoded.to_vec())
}

/// Write through a sibling temp file and rename, so an interrupted run
/// never leaves a truncated image at `dest`.
fn write_atomic(dest: &Path, data: &[u8]) -> Result<(), BackendError> {
    let dir = dest.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest)?;
    Ok(())
}
