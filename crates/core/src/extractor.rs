use crate::error::ExtractionError;
use lopdf::Document;

/// Extracted plain text of one page. Page numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

pub trait PdfExtractor: Send + Sync {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<PageText>, ExtractionError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<PageText>, ExtractionError> {
        let document = Document::load_mem(bytes)
            .map_err(|error| ExtractionError::Malformed(error.to_string()))?;

        if document.is_encrypted() {
            return Err(ExtractionError::Encrypted);
        }

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            // Image-only pages extract to nothing; that is an empty page,
            // not a document failure.
            let text = document.extract_text(&[page_no]).unwrap_or_default();

            pages.push(PageText {
                number: page_no,
                text: text.trim().to_string(),
            });
        }

        Ok(pages)
    }
}
