//! Configuration types for PDF ingestion.
//!
//! All ingestion behaviour is controlled through [`IngestConfig`], built via
//! its [`IngestConfigBuilder`]. Every knob lives in one struct so a config can
//! be shared across page tasks and logged as a whole.

use crate::error::IngestError;
use crate::pipeline::optimize::Optimizer;
use crate::pipeline::rasterize::Rasterizer;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default upload ceiling: 50 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Configuration for ingesting one PDF document.
///
/// Built via [`IngestConfig::builder()`] or using [`IngestConfig::default()`].
///
/// # Example
/// ```rust
/// use magazine_ingest::{FailurePolicy, IngestConfig};
///
/// let config = IngestConfig::builder()
///     .dpi(150)
///     .quality(80)
///     .batch_size(4)
///     .failure_policy(FailurePolicy::BestEffort)
///     .url_prefix("/uploads/magazines")
///     .build()
///     .unwrap();
/// assert_eq!(config.batch_size, 4);
/// ```
#[derive(Clone)]
pub struct IngestConfig {
    /// Rendering density in DPI. Range: 72–600. Default: 200.
    pub dpi: u32,

    /// Maximum raster width in pixels. Default: 1920.
    pub max_width: u32,

    /// Maximum raster height in pixels. Default: 2560.
    ///
    /// Together with `max_width` this bounds the bitmap of an oversized page
    /// regardless of `dpi`; the page is scaled to fit, keeping its aspect.
    pub max_height: u32,

    /// Lossy WebP quality, 1–100. Default: 78.
    pub quality: u8,

    /// Pages rasterised concurrently per batch. Default: 5.
    ///
    /// Each batch is joined completely before the next one starts, so this is
    /// also the cap on pdfium work and in-flight bitmaps.
    pub batch_size: usize,

    /// What a single failed page does to the document. Default: fail-fast.
    pub failure_policy: FailurePolicy,

    /// Prefix prepended to every manifest path, e.g. `/uploads/magazines`.
    /// If None, paths are relative to the `magazines` directory.
    pub url_prefix: Option<String>,

    /// Largest upload accepted by [`crate::upload::validate_upload`].
    pub max_upload_bytes: u64,

    /// Directory holding the pdfium shared library.
    /// If None, `PDFIUM_LIB_PATH`, the working directory and the system
    /// library path are tried in that order.
    pub pdfium_library_path: Option<PathBuf>,

    /// Pre-constructed rasteriser. If None, uses pdfium.
    pub rasterizer: Option<Arc<dyn Rasterizer>>,

    /// Pre-constructed optimiser. If None, uses the lossy WebP encoder.
    pub optimizer: Option<Arc<dyn Optimizer>>,

    /// Receives per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            dpi: 200,
            max_width: 1920,
            max_height: 2560,
            quality: 78,
            batch_size: 5,
            failure_policy: FailurePolicy::default(),
            url_prefix: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            pdfium_library_path: None,
            rasterizer: None,
            optimizer: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for IngestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestConfig")
            .field("dpi", &self.dpi)
            .field("max_width", &self.max_width)
            .field("max_height", &self.max_height)
            .field("quality", &self.quality)
            .field("batch_size", &self.batch_size)
            .field("failure_policy", &self.failure_policy)
            .field("url_prefix", &self.url_prefix)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("pdfium_library_path", &self.pdfium_library_path)
            .field("rasterizer", &self.rasterizer.as_ref().map(|_| "<dyn Rasterizer>"))
            .field("optimizer", &self.optimizer.as_ref().map(|_| "<dyn Optimizer>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn IngestProgressCallback>"),
            )
            .finish()
    }
}

impl IngestConfig {
    /// Create a new builder for `IngestConfig`.
    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder {
            config: Self::default(),
        }
    }

    /// The rendering parameters handed to a [`Rasterizer`].
    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            dpi: self.dpi,
            max_width: self.max_width,
            max_height: self.max_height,
            pdfium_library_path: self.pdfium_library_path.clone(),
        }
    }
}

/// Builder for [`IngestConfig`].
#[derive(Debug)]
pub struct IngestConfigBuilder {
    config: IngestConfig,
}

impl IngestConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn max_width(mut self, px: u32) -> Self {
        self.config.max_width = px.max(16);
        self
    }

    pub fn max_height(mut self, px: u32) -> Self {
        self.config.max_height = px.max(16);
        self
    }

    pub fn quality(mut self, quality: u8) -> Self {
        self.config.quality = quality.clamp(1, 100);
        self
    }

    pub fn batch_size(mut self, n: usize) -> Self {
        self.config.batch_size = n.max(1);
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    pub fn url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.url_prefix = Some(prefix.into());
        self
    }

    pub fn max_upload_bytes(mut self, bytes: u64) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    pub fn rasterizer(mut self, rasterizer: Arc<dyn Rasterizer>) -> Self {
        self.config.rasterizer = Some(rasterizer);
        self
    }

    pub fn optimizer(mut self, optimizer: Arc<dyn Optimizer>) -> Self {
        self.config.optimizer = Some(optimizer);
        self
    }

    pub fn progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.config.progress_callback = Some(callback);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<IngestConfig, IngestError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 600 {
            return Err(IngestError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if c.quality == 0 || c.quality > 100 {
            return Err(IngestError::InvalidConfig(format!(
                "Quality must be 1–100, got {}",
                c.quality
            )));
        }
        if c.batch_size == 0 {
            return Err(IngestError::InvalidConfig("Batch size must be ≥ 1".into()));
        }
        if c.max_upload_bytes == 0 {
            return Err(IngestError::InvalidConfig(
                "Upload limit must be greater than zero".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Settings & enums ─────────────────────────────────────────────────────

/// Fixed rendering parameters for every page of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderSettings {
    pub dpi: u32,
    pub max_width: u32,
    pub max_height: u32,
    pub pdfium_library_path: Option<PathBuf>,
}

impl RenderSettings {
    /// Pixel size of a page of `width_pt × height_pt` points.
    ///
    /// The page is rendered at `dpi` and then shrunk, aspect preserved, until
    /// it fits inside `max_width × max_height`. Never returns a zero edge.
    pub fn target_size(&self, width_pt: f32, height_pt: f32) -> (u32, u32) {
        let scale = self.dpi as f32 / 72.0;
        let mut w = (width_pt.max(1.0) * scale).round();
        let mut h = (height_pt.max(1.0) * scale).round();

        let fit = (self.max_width as f32 / w).min(self.max_height as f32 / h);
        if fit < 1.0 {
            w = (w * fit).round().min(self.max_width as f32);
            h = (h * fit).round().min(self.max_height as f32);
        }
        ((w as u32).max(1), (h as u32).max(1))
    }
}

/// How a page-level failure affects the rest of the document.
///
/// | Policy | On page error | Manifest |
/// |--------|---------------|----------|
/// | `FailFast` | stop after the current batch, delete the document directory, return the error | always complete |
/// | `BestEffort` | log and skip the page | `pages.len() ≤ total_pages` |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Abort the whole document on the first failed page. (default)
    #[default]
    FailFast,
    /// Drop failed pages and publish the rest.
    BestEffort,
}
