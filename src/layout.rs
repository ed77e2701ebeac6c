//! On-disk layout of an ingested document.
//!
//! ```text
//! {root}/magazines/{id}/original.pdf
//! {root}/magazines/{id}/pages/page-{N}.png    (raw, transient)
//! {root}/magazines/{id}/pages/page-{N}.webp   (final)
//! ```
//!
//! Viewers resolve the manifest paths over HTTP, so this layout and the
//! relative path format are a compatibility contract.

use crate::error::IngestError;
use std::path::{Component, Path, PathBuf};

/// Directory under the destination root that holds every document.
pub const MAGAZINES_DIR: &str = "magazines";
/// Subdirectory of a document holding page images.
pub const PAGES_DIR: &str = "pages";
/// File name of the archived upload.
pub const ORIGINAL_FILE: &str = "original.pdf";
/// Extension of the raw rasteriser output.
pub const RAW_EXTENSION: &str = "png";
/// Extension of the optimised page image.
pub const PAGE_EXTENSION: &str = "webp";

/// Path helper for one document id under one destination root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentLayout {
    document_id: String,
    document_dir: PathBuf,
}

impl DocumentLayout {
    /// Validate `document_id` and compute the document directory.
    ///
    /// The id must be non-empty and usable as exactly one directory name.
    pub fn new(document_id: &str, root: impl AsRef<Path>) -> Result<Self, IngestError> {
        validate_document_id(document_id)?;
        Ok(Self {
            document_id: document_id.to_string(),
            document_dir: root.as_ref().join(MAGAZINES_DIR).join(document_id),
        })
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    /// `{root}/magazines/{id}`
    pub fn document_dir(&self) -> &Path {
        &self.document_dir
    }

    /// `{root}/magazines/{id}/original.pdf`
    pub fn original_path(&self) -> PathBuf {
        self.document_dir.join(ORIGINAL_FILE)
    }

    /// `{root}/magazines/{id}/pages`
    pub fn pages_dir(&self) -> PathBuf {
        self.document_dir.join(PAGES_DIR)
    }

    /// Raw bitmap for a 1-indexed page.
    pub fn raw_page_path(&self, page_num: usize) -> PathBuf {
        self.pages_dir()
            .join(format!("page-{page_num}.{RAW_EXTENSION}"))
    }

    /// Final image for a 1-indexed page.
    pub fn page_path(&self, page_num: usize) -> PathBuf {
        self.pages_dir()
            .join(format!("page-{page_num}.{PAGE_EXTENSION}"))
    }

    /// Manifest path of a page: `{prefix}/{id}/pages/page-{N}.webp`.
    pub fn page_image_path(&self, page_num: usize, prefix: Option<&str>) -> String {
        with_prefix(
            prefix,
            format!(
                "{}/{PAGES_DIR}/page-{page_num}.{PAGE_EXTENSION}",
                self.document_id
            ),
        )
    }

    /// Manifest path of the archived upload: `{prefix}/{id}/original.pdf`.
    pub fn original_image_path(&self, prefix: Option<&str>) -> String {
        with_prefix(prefix, format!("{}/{ORIGINAL_FILE}", self.document_id))
    }
}

fn with_prefix(prefix: Option<&str>, relative: String) -> String {
    match prefix.map(|p| p.trim_end_matches('/')) {
        Some(p) if !p.is_empty() => format!("{p}/{relative}"),
        // "/" alone trims to empty: keep the leading slash
        Some(_) => format!("/{relative}"),
        None => relative,
    }
}

/// Reject ids that are empty or would not land in exactly one directory.
pub fn validate_document_id(document_id: &str) -> Result<(), IngestError> {
    if document_id.is_empty() {
        return Err(IngestError::MissingIdentifier);
    }

    let invalid = || IngestError::InvalidIdentifier {
        id: document_id.to_string(),
    };

    if document_id.contains(['/', '\\', '\0']) {
        return Err(invalid());
    }
    let mut components = Path::new(document_id).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_follow_magazine_layout() {
        let layout = DocumentLayout::new("clx42", "/srv/uploads").unwrap();
        assert_eq!(
            layout.document_dir(),
            Path::new("/srv/uploads/magazines/clx42")
        );
        assert_eq!(
            layout.original_path(),
            PathBuf::from("/srv/uploads/magazines/clx42/original.pdf")
        );
        assert_eq!(
            layout.raw_page_path(3),
            PathBuf::from("/srv/uploads/magazines/clx42/pages/page-3.png")
        );
        assert_eq!(
            layout.page_path(12),
            PathBuf::from("/srv/uploads/magazines/clx42/pages/page-12.webp")
        );
    }

    #[test]
    fn manifest_paths_with_and_without_prefix() {
        let layout = DocumentLayout::new("abc", "root").unwrap();
        assert_eq!(layout.page_image_path(1, None), "abc/pages/page-1.webp");
        assert_eq!(
            layout.page_image_path(2, Some("/uploads/magazines/")),
            "/uploads/magazines/abc/pages/page-2.webp"
        );
        assert_eq!(layout.page_image_path(1, Some("/")), "/abc/pages/page-1.webp");
        assert_eq!(
            layout.original_image_path(Some("/uploads/magazines")),
            "/uploads/magazines/abc/original.pdf"
        );
    }

    #[test]
    fn empty_id_is_missing() {
        assert!(matches!(
            DocumentLayout::new("", "root"),
            Err(IngestError::MissingIdentifier)
        ));
    }

    #[test]
    fn traversal_ids_are_rejected() {
        for id in ["..", ".", "a/b", "../etc", "a\\b", "nul\0byte", "/abs"] {
            assert!(
                matches!(
                    validate_document_id(id),
                    Err(IngestError::InvalidIdentifier { .. })
                ),
                "id {id:?} should be rejected"
            );
        }
    }

    #[test]
    fn ordinary_ids_are_accepted() {
        for id in ["clx9k2m0p0000", "issue-2025-01", "a.b", "Édition"] {
            assert!(validate_document_id(id).is_ok(), "id {id:?}");
        }
    }
}
