use std::path::Path;

use crate::error::ProcessError;
use crate::processor::{DocumentFormat, DocumentProcessor};

/// Marker lopdf emits for glyphs in CID fonts it cannot decode.
const IDENTITY_H_PATTERN: &str = "?Identity-H Unimplemented?";

pub struct PdfProcessor;

impl PdfProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PdfProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentProcessor for PdfProcessor {
    fn process(&self, path: &Path) -> Result<String, ProcessError> {
        let _span = tracing::info_span!("processor.pdf").entered();

        let pdf_bytes = std::fs::read(path).map_err(|e| ProcessError::ReadDocument {
            path: path.to_path_buf(),
            source: e,
        })?;

        let doc = lopdf::Document::load_mem(&pdf_bytes)
            .map_err(|e| ProcessError::PdfProcessing(format!("Failed to load PDF: {}", e)))?;

        let text = extract_text_from_pdf(&doc);
        tracing::debug!(pages = doc.get_pages().len(), chars = text.len(), "Extracted PDF text");
        Ok(text)
    }

    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(format, DocumentFormat::Pdf)
    }
}

fn extract_text_from_pdf(doc: &lopdf::Document) -> String {
    let mut text = String::new();

    for (page_num, _) in doc.get_pages() {
        match doc.extract_text(&[page_num]) {
            Ok(page_text) => {
                text.push_str(&page_text.replace(IDENTITY_H_PATTERN, ""));
                text.push('\n');
            }
            Err(e) => {
                tracing::debug!(page = page_num, "Skipping unreadable PDF page: {}", e);
            }
        }
    }

    text
}
