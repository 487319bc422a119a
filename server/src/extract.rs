use anyhow::{anyhow, Result};

/// Most pages ever read from one document; anything beyond is ignored.
pub const MAX_PAGES: usize = 100;

/// Port over document text extraction: bytes in, page-indexed text out.
pub trait TextExtractor: Send + Sync {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>>;
}

/// PDF extraction via `pdf-extract`, bounded to `MAX_PAGES`.
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>> {
        let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
            .map_err(|e| anyhow!("pdf text extraction failed: {}", e))?;
        Ok(pages.into_iter().take(MAX_PAGES).collect())
    }
}
