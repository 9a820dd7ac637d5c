//! Plain-text extraction from uploaded files.

use crate::core::errors::ApiError;

const PDF_MAGIC: &[u8] = b"%PDF";

/// A file received through the upload endpoint.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn is_pdf(&self) -> bool {
        self.content_type.as_deref() == Some("application/pdf")
            || self.file_name.to_ascii_lowercase().ends_with(".pdf")
            || self.bytes.starts_with(PDF_MAGIC)
    }
}

/// PDFs go through `pdf_extract`; everything else is read as UTF-8, lossily.
pub fn extract_text(file: &UploadedFile) -> Result<String, ApiError> {
    if file.is_pdf() {
        // The PDF parser panics on some malformed inputs.
        let bytes = file.bytes.as_slice();
        match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(ApiError::BadRequest(format!(
                "could not read PDF '{}': {}",
                file.file_name, e
            ))),
            Err(_) => Err(ApiError::BadRequest(format!(
                "could not read PDF '{}': malformed document",
                file.file_name
            ))),
        }
    } else {
        Ok(String::from_utf8_lossy(&file.bytes).into_owned())
    }
}

/// [`extract_text`] on the blocking thread pool; PDF parsing is CPU-bound.
pub async fn extract_text_blocking(file: UploadedFile) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || extract_text(&file))
        .await
        .map_err(|e| ApiError::Internal(format!("text extraction task failed: {}", e)))?
}
