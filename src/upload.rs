//! Helpers for the web layer around ingestion: pre-validating an upload
//! before its body is buffered, and labelling stored artifacts when they are
//! served back.

use crate::config::IngestConfig;
use crate::error::IngestError;
use std::path::Path;

/// The only media type accepted for uploads.
pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// Check an upload's declared media type and size against `config`.
///
/// `content_type` may carry parameters (`application/pdf; charset=binary`);
/// only the essence is compared, case-insensitively.
pub fn validate_upload(
    content_type: Option<&str>,
    byte_len: u64,
    config: &IngestConfig,
) -> Result<(), IngestError> {
    let essence = content_type
        .and_then(|ct| ct.split(';').next())
        .map(str::trim)
        .unwrap_or_default();

    if !essence.eq_ignore_ascii_case(PDF_MEDIA_TYPE) {
        return Err(IngestError::UploadRejected {
            reason: if essence.is_empty() {
                "missing content type, only PDF files are allowed".to_string()
            } else {
                format!("'{essence}' is not allowed, only PDF files are allowed")
            },
        });
    }

    if byte_len == 0 {
        return Err(IngestError::EmptyDocument {
            detail: "upload is 0 bytes".into(),
        });
    }

    if byte_len > config.max_upload_bytes {
        return Err(IngestError::UploadRejected {
            reason: format!(
                "file is {} bytes, limit is {} MB",
                byte_len,
                config.max_upload_bytes / (1024 * 1024)
            ),
        });
    }

    Ok(())
}

/// Media type to serve a stored artifact with, by file extension.
pub fn content_type_for(path: impl AsRef<Path>) -> &'static str {
    let ext = path
        .as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("pdf") => PDF_MEDIA_TYPE,
        _ => "application/octet-stream",
    }
}
