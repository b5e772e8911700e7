//! Page-level text extraction.
//!
//! Ingestion of long documents works on pages. A [`PageExtractor`] turns an
//! uploaded byte stream into numbered page texts; [`PlainTextExtractor`]
//! handles UTF-8 text where pages are separated by form feeds, which is the
//! output format of common PDF-to-text converters.

use quarry_core::error::{QuarryError, Result};
use serde::Serialize;

/// Page delimiter recognized by [`PlainTextExtractor`].
pub const PAGE_BREAK: char = '\x0c';

/// Text of one non-blank page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageText {
    /// 1-based page number within the source document.
    pub page_number: usize,
    pub text: String,
}

/// Result of extracting a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedDocument {
    pub source: String,
    /// All pages, blank ones included.
    pub total_pages: usize,
    /// Non-blank pages only, in page order.
    pub pages: Vec<PageText>,
}

pub trait PageExtractor: Send + Sync {
    fn extract(&self, source: &str, bytes: &[u8]) -> Result<ExtractedDocument>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl PageExtractor for PlainTextExtractor {
    fn extract(&self, source: &str, bytes: &[u8]) -> Result<ExtractedDocument> {
        let text = std::str::from_utf8(bytes).map_err(|e| {
            QuarryError::Extraction(format!("{} is not valid UTF-8 text: {}", source, e))
        })?;

        let mut total_pages = 0;
        let mut pages = Vec::new();
        if !text.is_empty() {
            for (i, page) in text.split(PAGE_BREAK).enumerate() {
                total_pages += 1;
                if page.trim().is_empty() {
                    continue;
                }
                pages.push(PageText {
                    page_number: i + 1,
                    text: page.to_string(),
                });
            }
        }

        Ok(ExtractedDocument {
            source: source.to_string(),
            total_pages,
            pages,
        })
    }
}
