//! Stage 1: validate the bytes, load the document and decide its kind.

use crate::error::PaperBotError;
use pdfium_render::prelude::*;
use tracing::{debug, info};

/// Leading bytes of every PDF file.
pub const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// Whether a document carries a usable text layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// Born-digital: text is extracted from the text layer.
    Text,
    /// Average text per page is below the threshold; pages are rasterised.
    Scanned,
}

/// Reject anything that does not start with `%PDF`.
pub fn check_magic(bytes: &[u8]) -> Result<(), PaperBotError> {
    if bytes.starts_with(PDF_MAGIC) {
        Ok(())
    } else {
        Err(PaperBotError::NotAPdf {
            magic: bytes.iter().take(PDF_MAGIC.len()).copied().collect(),
        })
    }
}

/// Load a PDF from memory.
pub fn load_document(pdfium: &Pdfium, bytes: Vec<u8>) -> Result<PdfDocument<'_>, PaperBotError> {
    check_magic(&bytes)?;
    pdfium
        .load_pdf_from_byte_vec(bytes, None)
        .map_err(|e| PaperBotError::CorruptPdf {
            detail: format!("{:?}", e),
        })
}

/// Decide the kind from per-page text-layer character counts.
///
/// An empty document counts as `Text` so it renders to an empty Markdown
/// file instead of failing.
pub fn kind_from_counts(page_chars: &[usize], scanned_chars_per_page: usize) -> DocumentKind {
    if page_chars.is_empty() {
        return DocumentKind::Text;
    }
    let total: usize = page_chars.iter().sum();
    if total / page_chars.len() < scanned_chars_per_page {
        DocumentKind::Scanned
    } else {
        DocumentKind::Text
    }
}

/// Classify a loaded document.
pub fn classify(
    document: &PdfDocument<'_>,
    scanned_chars_per_page: usize,
) -> Result<DocumentKind, PaperBotError> {
    let mut counts = Vec::with_capacity(document.pages().len() as usize);
    for (idx, page) in document.pages().iter().enumerate() {
        let text = page
            .text()
            .map_err(|e| PaperBotError::ExtractionFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            })?
            .all();
        let n = text.chars().filter(|c| !c.is_whitespace()).count();
        debug!("Page {}: {} text-layer chars", idx + 1, n);
        counts.push(n);
    }

    let kind = kind_from_counts(&counts, scanned_chars_per_page);
    info!("PDF loaded: {} pages, kind={:?}", counts.len(), kind);
    Ok(kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_accepted() {
        assert!(check_magic(b"%PDF-1.7\n...").is_ok());
    }

    #[test]
    fn magic_rejected_with_prefix() {
        match check_magic(b"PK\x03\x04rest") {
            Err(PaperBotError::NotAPdf { magic }) => assert_eq!(magic, b"PK\x03\x04".to_vec()),
            other => panic!("expected NotAPdf, got {other:?}"),
        }
        assert!(matches!(check_magic(b""), Err(PaperBotError::NotAPdf { .. })));
    }

    #[test]
    fn kind_threshold() {
        assert_eq!(kind_from_counts(&[1200, 900, 40], 32), DocumentKind::Text);
        assert_eq!(kind_from_counts(&[0, 10, 5], 32), DocumentKind::Scanned);
        // Exactly on the threshold is still text.
        assert_eq!(kind_from_counts(&[32, 32], 32), DocumentKind::Text);
        assert_eq!(kind_from_counts(&[], 32), DocumentKind::Text);
    }
}
