pub mod pdf;
pub mod text;

use std::path::Path;

use crate::error::ProcessError;

/// Converts a stored document into plain text.
///
/// Implementations may block on disk I/O or CPU-heavy parsing; callers run
/// them on a dedicated worker thread.
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, path: &Path) -> Result<String, ProcessError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Text,
}

impl DocumentFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" | "text" | "md" => Some(Self::Text),
            _ => None,
        }
    }
}

pub trait DocumentProcessor: Send + Sync {
    fn process(&self, path: &Path) -> Result<String, ProcessError>;
    fn supports(&self, format: DocumentFormat) -> bool;
}

/// Routes a document to the processor for its extension.
pub struct ProcessorRegistry {
    processors: Vec<Box<dyn DocumentProcessor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self {
            processors: vec![
                Box::new(text::TextProcessor::new()),
                Box::new(pdf::PdfProcessor::new()),
            ],
        }
    }

    pub fn process(&self, path: &Path) -> Result<String, ProcessError> {
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let format = DocumentFormat::from_extension(extension)
            .ok_or_else(|| ProcessError::UnsupportedFormat(extension.to_string()))?;

        for processor in &self.processors {
            if processor.supports(format) {
                return processor.process(path);
            }
        }

        Err(ProcessError::UnsupportedFormat(extension.to_string()))
    }
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TextExtractor for ProcessorRegistry {
    fn extract_text(&self, path: &Path) -> Result<String, ProcessError> {
        let text = self.process(path)?;
        if text.trim().is_empty() {
            return Err(ProcessError::EmptyContent);
        }
        Ok(text)
    }
}
