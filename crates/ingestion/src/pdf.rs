//! Page text supply
//!
//! The extraction core only sees the [`PageSource`] trait: a page count and
//! plain text per page. [`LopdfSource`] backs it with lopdf.

use crate::errors::IngestionError;
use lopdf::content::Content;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

/// Text of one page, 1-based page number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub page_number: u32,
    pub text: String,
}

/// Supplies plain text per page of one document.
///
/// Implementations are blocking; the pipeline calls them from
/// `spawn_blocking`.
pub trait PageSource: Send + Sync {
    /// Total number of pages in the document
    fn page_count(&self) -> Result<u32, IngestionError>;

    /// Normalized text of a single page; empty when the page has no text
    fn page_text(&self, page_number: u32) -> Result<String, IngestionError>;

    /// Text of every page in `first..=last`, in page order.
    ///
    /// Pages that fail are returned as errors in place so one bad page does
    /// not hide the rest of the range.
    fn page_range(&self, first: u32, last: u32) -> Vec<Result<PageText, IngestionError>> {
        (first..=last)
            .map(|page_number| {
                self.page_text(page_number)
                    .map(|text| PageText { page_number, text })
            })
            .collect()
    }
}

/// PDF page source backed by lopdf
pub struct LopdfSource {
    path: String,
    doc: lopdf::Document,
    pages: BTreeMap<u32, lopdf::ObjectId>,
}

impl LopdfSource {
    /// Open a PDF file
    pub fn open(path: &Path) -> Result<Self, IngestionError> {
        if !path.exists() {
            return Err(IngestionError::FileNotFound(path.display().to_string()));
        }

        let doc = lopdf::Document::load(path).map_err(|e| IngestionError::PdfParseError {
            path: path.display().to_string(),
            message: format!("Failed to load PDF: {}", e),
        })?;

        let pages = doc.get_pages();
        debug!(page_count = pages.len(), path = %path.display(), "PDF opened");

        Ok(Self {
            path: path.display().to_string(),
            doc,
            pages,
        })
    }
}

impl PageSource for LopdfSource {
    fn page_count(&self) -> Result<u32, IngestionError> {
        u32::try_from(self.pages.len()).map_err(|_| IngestionError::PdfParseError {
            path: self.path.clone(),
            message: "Page count out of range".to_string(),
        })
    }

    fn page_text(&self, page_number: u32) -> Result<String, IngestionError> {
        let page_id = *self.pages.get(&page_number).ok_or_else(|| IngestionError::PageError {
            page: page_number,
            message: "page not found".to_string(),
        })?;

        match self.doc.extract_text(&[page_number]) {
            Ok(text) => Ok(normalize_page_text(&text)),
            Err(e) => {
                // Fall back to scanning the raw content stream
                warn!(page = page_number, error = %e, "lopdf text extraction failed, scanning content stream");

                let text = self
                    .doc
                    .get_page_content(page_id)
                    .and_then(|content| content_stream_text(&content))
                    .map_err(|e| IngestionError::PageError {
                        page: page_number,
                        message: e.to_string(),
                    })?;

                Ok(normalize_page_text(&text))
            }
        }
    }
}

/// Text shown by a content stream, one line per text object
fn content_stream_text(content: &[u8]) -> lopdf::Result<String> {
    let content = Content::decode(content)?;
    let mut text = String::new();

    for operation in &content.operations {
        match operation.operator.as_str() {
            "Tj" | "'" | "\"" => {
                if let Some(Ok(bytes)) = operation.operands.last().map(|o| o.as_str()) {
                    text.push_str(&String::from_utf8_lossy(bytes));
                }
            }
            "TJ" => {
                let Some(Ok(items)) = operation.operands.first().map(|o| o.as_array()) else {
                    continue;
                };
                for bytes in items.iter().filter_map(|item| item.as_str().ok()) {
                    text.push_str(&String::from_utf8_lossy(bytes));
                }
            }
            "ET" => text.push('\n'),
            _ => {}
        }
    }

    Ok(text)
}

/// Normalize page text while keeping its line structure.
///
/// Line breaks and leading indentation carry meaning for outline and
/// exercise detection, so only line endings, trailing blanks, BOMs and
/// typographic quotes are touched.
pub fn normalize_page_text(text: &str) -> String {
    let text = text
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\u{FEFF}', "")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    lines.join("\n").trim_matches('\n').to_string()
}

/// In-memory page source, one string per page
#[derive(Debug, Clone, Default)]
pub struct StaticPages {
    pages: Vec<String>,
}

impl StaticPages {
    pub fn new<I, S>(pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pages: pages.into_iter().map(Into::into).collect(),
        }
    }
}

impl PageSource for StaticPages {
    fn page_count(&self) -> Result<u32, IngestionError> {
        Ok(self.pages.len() as u32)
    }

    fn page_text(&self, page_number: u32) -> Result<String, IngestionError> {
        page_number
            .checked_sub(1)
            .and_then(|idx| self.pages.get(idx as usize))
            .map(|text| normalize_page_text(text))
            .ok_or_else(|| IngestionError::PageError {
                page: page_number,
                message: "page not found".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_keeps_lines_and_indent() {
        let input = "Contents\r\n  1.1 Motion....3   \r\n\r\nEnd\u{FEFF}";
        assert_eq!(normalize_page_text(input), "Contents\n  1.1 Motion....3\n\nEnd");
    }

    #[test]
    fn test_normalize_quotes() {
        assert_eq!(normalize_page_text("\u{201C}Why?\u{201D} it\u{2019}s"), "\"Why?\" it's");
    }

    #[test]
    fn test_content_stream_text_blocks_become_lines() {
        let content = b"BT\n/F1 12 Tf\n(Chapter 1 Motion) Tj\nET\nBT\n[(What is ) -20 (speed?)] TJ\nET\n";
        assert_eq!(content_stream_text(content).unwrap(), "Chapter 1 Motion\nWhat is speed?\n");
    }

    #[test]
    fn test_content_stream_escaped_parentheses() {
        let content = b"BT (Test \\(paren\\)) Tj ET";
        assert_eq!(content_stream_text(content).unwrap(), "Test (paren)\n");
    }

    #[test]
    fn test_static_pages_range() {
        let source = StaticPages::new(["one", "", "three"]);
        assert_eq!(source.page_count().unwrap(), 3);

        let range = source.page_range(2, 3);
        assert_eq!(range.len(), 2);
        assert_eq!(range[0].as_ref().unwrap().text, "");
        assert_eq!(range[1].as_ref().unwrap().page_number, 3);

        assert!(source.page_text(0).is_err());
        assert!(source.page_text(4).is_err());
    }

    #[test]
    fn test_open_missing_file() {
        let err = LopdfSource::open(Path::new("/definitely/not/here.pdf")).err().unwrap();
        assert!(matches!(err, IngestionError::FileNotFound(_)));
    }
}
