use crate::error::IngestError;
use lopdf::Document;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

pub trait PdfExtractor {
    /// Returns every page in order. A page without extractable text has empty `text`.
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError> {
        let document =
            Document::load(path).map_err(|error| IngestError::PdfParse(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = match document.extract_text(&[page_no]) {
                Ok(text) => text,
                Err(error) => {
                    debug!(
                        path = %path.display(),
                        page = page_no,
                        %error,
                        "page has no extractable text"
                    );
                    String::new()
                }
            };

            pages.push(PageText {
                number: page_no,
                text,
            });
        }

        Ok(pages)
    }
}

/// Concatenates page texts in page order and trims the surrounding whitespace.
pub fn join_pages(pages: &[PageText]) -> String {
    let joined: String = pages.iter().map(|page| page.text.as_str()).collect();
    joined.trim().to_string()
}
