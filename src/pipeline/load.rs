//! Document loading: validate the upload, count its pages, archive it.
//!
//! Validation runs entirely in memory before anything touches the
//! destination root, so a rejected upload never leaves a directory behind.
//! Only once the page count is known do we create
//! `{root}/magazines/{id}/pages/` and write `original.pdf`.

use crate::error::IngestError;
use crate::layout::DocumentLayout;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How far into the buffer the `%PDF-` header may appear.
///
/// Readers tolerate leading garbage (mail gateways, BOMs) up to 1 KiB.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// A validated upload: the immutable bytes and their page count.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    bytes: Arc<[u8]>,
    page_count: usize,
}

impl SourceDocument {
    /// Parse `bytes` as a PDF and count its pages.
    ///
    /// Parsing is CPU-bound and runs on the blocking pool.
    ///
    /// # Errors
    /// - [`IngestError::EmptyDocument`] for a zero-length buffer or a PDF
    ///   without pages
    /// - [`IngestError::InvalidDocument`] when the buffer is not a PDF
    pub async fn parse(bytes: &[u8]) -> Result<Self, IngestError> {
        if bytes.is_empty() {
            return Err(IngestError::EmptyDocument {
                detail: "upload is 0 bytes".into(),
            });
        }
        check_header(bytes)?;

        let bytes: Arc<[u8]> = Arc::from(bytes);
        let shared = Arc::clone(&bytes);
        let page_count = tokio::task::spawn_blocking(move || count_pages(&shared))
            .await
            .map_err(|e| IngestError::Internal(format!("PDF parse task panicked: {e}")))??;

        if page_count == 0 {
            return Err(IngestError::EmptyDocument {
                detail: "PDF has no pages".into(),
            });
        }

        debug!("Parsed PDF: {} bytes, {} pages", bytes.len(), page_count);
        Ok(Self { bytes, page_count })
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Create the document tree and write the upload verbatim to
    /// `original.pdf`. Returns the archived path.
    ///
    /// If the write fails after the directories were created, the document
    /// directory is removed again before the error is returned.
    pub async fn persist(&self, layout: &DocumentLayout) -> Result<PathBuf, IngestError> {
        let pages_dir = layout.pages_dir();
        tokio::fs::create_dir_all(&pages_dir)
            .await
            .map_err(|source| IngestError::DirectoryError {
                path: pages_dir.clone(),
                source,
            })?;

        let original = layout.original_path();
        if let Err(source) = tokio::fs::write(&original, &self.bytes[..]).await {
            if let Err(e) = tokio::fs::remove_dir_all(layout.document_dir()).await {
                warn!(
                    "Could not remove '{}' after failed write: {}",
                    layout.document_dir().display(),
                    e
                );
            }
            return Err(IngestError::DirectoryError {
                path: original,
                source,
            });
        }

        info!(
            "Archived {} ({} bytes, {} pages)",
            original.display(),
            self.bytes.len(),
            self.page_count
        );
        Ok(original)
    }
}

/// Reject buffers without a `%PDF-` header near the start.
fn check_header(bytes: &[u8]) -> Result<(), IngestError> {
    let window = &bytes[..bytes.len().min(HEADER_SEARCH_WINDOW)];
    if window.windows(5).any(|w| w == b"%PDF-") {
        return Ok(());
    }
    let head: Vec<u8> = bytes.iter().take(8).copied().collect();
    Err(IngestError::InvalidDocument {
        detail: format!("missing %PDF header, first bytes: {head:?}"),
    })
}

/// Blocking page count via lopdf.
fn count_pages(bytes: &[u8]) -> Result<usize, IngestError> {
    let document =
        lopdf::Document::load_mem(bytes).map_err(|e| IngestError::InvalidDocument {
            detail: e.to_string(),
        })?;
    Ok(document.get_pages().len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Document, Object};

    fn pdf_with_pages(n: usize) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let kids: Vec<Object> = (0..n)
            .map(|_| {
                doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
                })
                .into()
            })
            .collect();
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => n as i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let mut buf = Vec::new();
        doc.save_to(&mut buf).expect("save in-memory PDF");
        buf
    }

    #[tokio::test]
    async fn counts_pages() {
        let source = SourceDocument::parse(&pdf_with_pages(4)).await.unwrap();
        assert_eq!(source.page_count(), 4);
    }

    #[tokio::test]
    async fn empty_buffer_is_empty_document() {
        let err = SourceDocument::parse(&[]).await.unwrap_err();
        assert!(matches!(err, IngestError::EmptyDocument { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn zero_page_pdf_is_empty_document() {
        let err = SourceDocument::parse(&pdf_with_pages(0)).await.unwrap_err();
        assert!(matches!(err, IngestError::EmptyDocument { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn random_bytes_are_invalid() {
        let junk: Vec<u8> = (0..4096u32).map(|i| (i * 31 % 251) as u8).collect();
        let err = SourceDocument::parse(&junk).await.unwrap_err();
        assert!(matches!(err, IngestError::InvalidDocument { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn header_without_body_is_invalid() {
        let err = SourceDocument::parse(b"%PDF-1.7\n%%EOF\n").await.unwrap_err();
        assert!(matches!(err, IngestError::InvalidDocument { .. }), "{err:?}");
    }

    #[test]
    fn header_may_follow_leading_garbage() {
        let mut bytes = vec![b' '; 100];
        bytes.extend_from_slice(b"%PDF-1.4");
        assert!(check_header(&bytes).is_ok());
        assert!(check_header(b"GIF89a").is_err());
    }

    #[tokio::test]
    async fn persist_writes_original_verbatim() {
        let tmp = tempfile::tempdir().unwrap();
        let bytes = pdf_with_pages(2);
        let source = SourceDocument::parse(&bytes).await.unwrap();
        let layout = DocumentLayout::new("doc-1", tmp.path()).unwrap();

        let original = source.persist(&layout).await.unwrap();

        assert_eq!(original, tmp.path().join("magazines/doc-1/original.pdf"));
        assert_eq!(std::fs::read(&original).unwrap(), bytes);
        assert!(layout.pages_dir().is_dir());
    }

    #[tokio::test]
    async fn persist_is_idempotent_on_existing_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let source = SourceDocument::parse(&pdf_with_pages(1)).await.unwrap();
        let layout = DocumentLayout::new("doc-2", tmp.path()).unwrap();
        source.persist(&layout).await.unwrap();
        source.persist(&layout).await.unwrap();
        assert!(layout.original_path().is_file());
    }

    #[tokio::test]
    async fn unwritable_root_is_directory_error() {
        let tmp = tempfile::tempdir().unwrap();
        // A regular file where the root directory should be.
        let blocker = tmp.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();
        let source = SourceDocument::parse(&pdf_with_pages(1)).await.unwrap();
        let layout = DocumentLayout::new("doc-3", &blocker).unwrap();

        let err = source.persist(&layout).await.unwrap_err();
        assert!(matches!(err, IngestError::DirectoryError { .. }), "{err:?}");
    }
}
