//! Output types returned to the caller after ingestion.

use serde::{Deserialize, Serialize};

/// Manifest of an ingested document.
///
/// Serialises with camelCase keys (`totalPages`, `coverImage`, `pages`,
/// `originalDocument`) so it can be stored or returned as-is by a web layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResult {
    /// Page count reported by the PDF.
    pub total_pages: usize,

    /// Image path of page 1, or empty when page 1 produced no image.
    pub cover_image: String,

    /// Image paths in page order. Failed pages (best-effort only) are absent.
    pub pages: Vec<String>,

    /// Path of the archived upload.
    pub original_document: String,

    /// 1-indexed pages dropped under best-effort ingestion. Always empty
    /// under fail-fast.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_pages: Vec<usize>,
}

impl ProcessingResult {
    /// `true` when every page of the PDF has an image.
    pub fn is_complete(&self) -> bool {
        self.pages.len() == self.total_pages && self.missing_pages.is_empty()
    }

    /// One record per published page, with its real page number.
    ///
    /// Page numbers skip entries listed in `missing_pages`, so a record's
    /// number always matches the PDF page the image came from.
    pub fn page_artifacts(&self) -> Vec<PageArtifact> {
        (1..=self.total_pages)
            .filter(|n| !self.missing_pages.contains(n))
            .zip(&self.pages)
            .map(|(page_number, image_path)| PageArtifact {
                page_number,
                image_path: image_path.clone(),
            })
            .collect()
    }
}

/// One rasterised-then-optimised page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageArtifact {
    /// 1-indexed, matches PDF page order.
    pub page_number: usize,
    pub image_path: String,
}
