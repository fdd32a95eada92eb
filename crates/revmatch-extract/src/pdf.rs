//! PDF text extraction using lopdf.

use std::path::Path;

use lopdf::Document;
use tracing::{debug, warn};

use revmatch_core::error::{Result, RevmatchError};

use crate::TextExtractor;

/// Extracts the text layer of a PDF, page by page.
#[derive(Debug, Clone, Default)]
pub struct PdfExtractor;

impl PdfExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl TextExtractor for PdfExtractor {
    async fn extract_text(&self, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path).await?;
        let label = path.display().to_string();

        // Parsing is CPU-bound.
        tokio::task::spawn_blocking(move || text_from_pdf_bytes(&bytes, &label))
            .await
            .map_err(|e| RevmatchError::Extraction(format!("PDF task panicked: {}", e)))
    }
}

/// Concatenate the text of every page, in page order, separated by newlines.
///
/// A document that does not parse, or whose pages carry no text, yields an
/// empty string. `label` only appears in logs.
pub fn text_from_pdf_bytes(bytes: &[u8], label: &str) -> String {
    let doc = match Document::load_mem(bytes) {
        Ok(doc) => doc,
        Err(e) => {
            warn!(document = label, error = %e, "PDF read failed");
            return String::new();
        }
    };

    let pages: Vec<String> = doc
        .get_pages()
        .keys()
        .map(|&page| match doc.extract_text(&[page]) {
            Ok(text) => text,
            Err(e) => {
                debug!(document = label, page, error = %e, "Page has no extractable text");
                String::new()
            }
        })
        .collect();

    let text = pages.join("\n").trim().to_string();
    if text.is_empty() {
        warn!(document = label, pages = pages.len(), "PDF contains no extractable text");
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_bytes_yield_empty_text() {
        assert_eq!(text_from_pdf_bytes(b"%PDF-1.4 truncated", "broken.pdf"), "");
        assert_eq!(text_from_pdf_bytes(&[], "empty.pdf"), "");
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let err = PdfExtractor::new()
            .extract_text(Path::new("/no/such/paper.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, RevmatchError::Io(_)));
    }
}
