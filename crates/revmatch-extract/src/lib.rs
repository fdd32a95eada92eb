//! revmatch text extraction - turns submitted documents into plain text.
//!
//! Provides the `TextExtractor` trait, a lopdf-backed `PdfExtractor`, a
//! `PlainTextExtractor`, a `DocumentExtractor` that picks one by file
//! extension, and a `MockExtractor` for testing.
//!
//! Extraction never fails merely because a document has no extractable text
//! (a scanned PDF, say): that yields an empty string, which callers treat as
//! "no query possible". Errors are reserved for I/O failures.

pub mod pdf;

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use revmatch_core::error::Result;

pub use pdf::PdfExtractor;

/// Service for extracting text from a document on disk.
pub trait TextExtractor: Send + Sync {
    /// Extract the document's text, trimmed. May be empty.
    fn extract_text(&self, path: &Path) -> impl Future<Output = Result<String>> + Send;
}

/// Object-safe form of [`TextExtractor`], implemented for every
/// `TextExtractor`.
pub trait DynTextExtractor: Send + Sync {
    fn extract_text_boxed<'a>(
        &'a self,
        path: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;
}

impl<T: TextExtractor> DynTextExtractor for T {
    fn extract_text_boxed<'a>(
        &'a self,
        path: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(self.extract_text(path))
    }
}

/// Reads a file as UTF-8 text, replacing invalid sequences.
#[derive(Debug, Clone, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    async fn extract_text(&self, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path).await?;
        Ok(String::from_utf8_lossy(&bytes).trim().to_string())
    }
}

/// Dispatches on file extension: `.pdf` goes to [`PdfExtractor`], anything
/// else is read as plain text.
#[derive(Debug, Clone, Default)]
pub struct DocumentExtractor {
    pdf: PdfExtractor,
    plain: PlainTextExtractor,
}

impl DocumentExtractor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TextExtractor for DocumentExtractor {
    async fn extract_text(&self, path: &Path) -> Result<String> {
        let is_pdf = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if is_pdf {
            self.pdf.extract_text(path).await
        } else {
            self.plain.extract_text(path).await
        }
    }
}

/// Mock extractor that returns fixed text for any path.
#[derive(Debug, Clone, Default)]
pub struct MockExtractor {
    text: String,
}

impl MockExtractor {
    pub fn with_text(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }

    /// Simulates a document with no extractable text.
    pub fn empty() -> Self {
        Self::default()
    }
}

impl TextExtractor for MockExtractor {
    async fn extract_text(&self, _path: &Path) -> Result<String> {
        Ok(self.text.clone())
    }
}
