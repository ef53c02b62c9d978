use crate::error::{Error, SyncResult};
use lopdf::Document;
use tracing::{debug, info};

/// Page-wise text content of an ingested schedule document.
///
/// The first page carries the header signature and the schedule table; a
/// later page (usually the last) carries the beneficiary contact detail
/// table.
#[derive(Debug, Clone)]
pub struct DocumentText {
    pages: Vec<String>,
}

impl DocumentText {
    /// Extract per-page text from raw PDF bytes
    pub fn from_pdf_bytes(bytes: &[u8]) -> SyncResult<Self> {
        let doc = Document::load_mem(bytes)
            .map_err(|e| Error::Pdf(format!("Failed to load PDF: {}", e)))?;

        let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
        if page_numbers.is_empty() {
            return Err(Error::Pdf("PDF contains no pages".to_string()));
        }

        let mut pages = Vec::with_capacity(page_numbers.len());
        for number in page_numbers {
            let text = doc
                .extract_text(&[number])
                .map_err(|e| Error::Pdf(format!("Failed to extract page {}: {}", number, e)))?;
            debug!("Extracted page {}: {} chars", number, text.len());
            pages.push(text);
        }

        info!("Extracted {} pages from PDF", pages.len());
        Ok(Self { pages })
    }

    /// Wrap pasted plain text as a single-page document. Form feeds split
    /// the text into pages so a pasted multi-page export keeps its detail
    /// page addressable.
    pub fn from_text(text: &str) -> Self {
        let pages: Vec<String> = text.split('\u{0C}').map(|p| p.to_string()).collect();
        Self { pages }
    }

    /// Text of the first page, used for format detection and the header
    pub fn first_page(&self) -> &str {
        self.pages.first().map(String::as_str).unwrap_or("")
    }

    /// Text of the beneficiary detail page (the last page)
    pub fn detail_page(&self) -> &str {
        self.pages.last().map(String::as_str).unwrap_or("")
    }

    /// All pages joined, for whole-document line scans
    pub fn full_text(&self) -> String {
        self.pages.join("\n")
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_one_page() {
        let doc = DocumentText::from_text("hello\nworld");
        assert_eq!(doc.page_count(), 1);
        assert_eq!(doc.first_page(), "hello\nworld");
        assert_eq!(doc.detail_page(), "hello\nworld");
    }

    #[test]
    fn form_feed_splits_pages() {
        let doc = DocumentText::from_text("page one\u{0C}page two");
        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.first_page(), "page one");
        assert_eq!(doc.detail_page(), "page two");
    }
}
