//! Document preprocessing: uploaded resume PDF → one base64 JPEG of page one.
//!
//! Rasterization sits behind the `Rasterizer` trait. The default backend is
//! poppler's `pdftoppm`; see `rasterizer.rs`.

use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use thiserror::Error;
use tracing::debug;

pub mod rasterizer;

pub use rasterizer::PdftoppmRasterizer;

pub const JPEG_MIME_TYPE: &str = "image/jpeg";

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("No file is uploaded")]
    MissingInput,

    #[error("PDF rasterization failed: {0}")]
    Rasterize(String),

    #[error("PDF rendered no pages")]
    NoPages,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A resume as uploaded by the user.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub file_name: String,
    pub bytes: Bytes,
}

impl UploadedDocument {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Base64 image payload plus its MIME tag, ready for an inline-data part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub mime_type: &'static str,
    pub data: String,
}

impl EncodedImage {
    pub fn jpeg(data: String) -> Self {
        Self {
            mime_type: JPEG_MIME_TYPE,
            data,
        }
    }
}

/// Renders a page range of a PDF to JPEG bytes, one entry per page.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    async fn render_pages(
        &self,
        pdf: &[u8],
        first_page: u32,
        last_page: u32,
    ) -> Result<Vec<Bytes>, DocumentError>;
}

#[derive(Clone)]
pub struct DocumentPreprocessor {
    rasterizer: Arc<dyn Rasterizer>,
}

impl DocumentPreprocessor {
    pub fn new(rasterizer: Arc<dyn Rasterizer>) -> Self {
        Self { rasterizer }
    }

    /// Encodes the first page of `file`. Everything past page one is ignored,
    /// even if the backend hands back more.
    pub async fn prepare(
        &self,
        file: Option<&UploadedDocument>,
    ) -> Result<EncodedImage, DocumentError> {
        let file = file.ok_or(DocumentError::MissingInput)?;

        let pages = self.rasterizer.render_pages(&file.bytes, 1, 1).await?;
        let first_page = pages.into_iter().next().ok_or(DocumentError::NoPages)?;

        debug!(
            "Rasterized page 1 of '{}' ({} PDF bytes → {} JPEG bytes)",
            file.file_name,
            file.bytes.len(),
            first_page.len()
        );

        Ok(EncodedImage::jpeg(STANDARD.encode(&first_page)))
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{BrokenRasterizer, FakeRasterizer};
    use super::*;

    fn resume() -> UploadedDocument {
        UploadedDocument::new("resume.pdf", &b"%PDF-1.7 fake"[..])
    }

    #[tokio::test]
    async fn test_missing_file_is_a_precondition_error() {
        let pre = DocumentPreprocessor::new(Arc::new(FakeRasterizer::with_pages(1)));
        let err = pre.prepare(None).await.unwrap_err();
        assert!(matches!(err, DocumentError::MissingInput));
        assert_eq!(err.to_string(), "No file is uploaded");
    }

    #[tokio::test]
    async fn test_multi_page_pdf_encodes_only_page_one() {
        let raster = Arc::new(FakeRasterizer::with_pages(4));
        let pre = DocumentPreprocessor::new(raster.clone());

        let image = pre.prepare(Some(&resume())).await.unwrap();

        assert_eq!(image.mime_type, "image/jpeg");
        assert_eq!(STANDARD.decode(&image.data).unwrap(), b"jpeg-page-1");
        assert_eq!(*raster.requests.lock().unwrap(), vec![(1, 1)]);
    }

    #[tokio::test]
    async fn test_no_pages_rendered() {
        let pre = DocumentPreprocessor::new(Arc::new(FakeRasterizer::with_pages(0)));
        let err = pre.prepare(Some(&resume())).await.unwrap_err();
        assert!(matches!(err, DocumentError::NoPages));
    }

    #[tokio::test]
    async fn test_rasterizer_failure_propagates() {
        let pre = DocumentPreprocessor::new(Arc::new(BrokenRasterizer));
        let err = pre.prepare(Some(&resume())).await.unwrap_err();
        assert!(err.to_string().contains("xref"));
    }
}
