//! Document extraction boundary.
//!
//! The pipeline consumes plain text; turning PDF or Word files into text is
//! the extraction collaborator's job, reached through the `TextExtractor`
//! trait. The core ships only the plain-text implementation and performs no
//! binary format parsing of its own.

use std::path::Path;

use serde::Serialize;
use thiserror::Error;

/// The closed set of formats a run can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    PlainText,
}

impl DocumentFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::PlainText => "plain_text",
        }
    }

    /// Classify by extension. `None` means the file is not ours to process.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "doc" | "docx" => Some(Self::Docx),
            "txt" => Some(Self::PlainText),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("file could not be decoded as {format}: {detail}")]
    CorruptFile { format: &'static str, detail: String },

    #[error("document contains no extractable text")]
    NoExtractableText,

    #[error("cannot read document: {0}")]
    Io(#[from] std::io::Error),
}

/// Text extraction abstraction. Implementations return the document's plain
/// text or a typed error; they never hand binary data to the pipeline.
pub trait TextExtractor: Send {
    fn extract(&self, path: &Path, format: DocumentFormat) -> Result<String, ExtractError>;
}

/// Reads `.txt` documents as UTF-8. PDF and Word files need an external
/// extraction collaborator; declaring them without one registered is an
/// unsupported-format error, not a silent fallback.
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path, format: DocumentFormat) -> Result<String, ExtractError> {
        match format {
            DocumentFormat::PlainText => {
                let bytes = std::fs::read(path)?;
                let text = String::from_utf8(bytes).map_err(|e| ExtractError::CorruptFile {
                    format: "plain_text",
                    detail: e.to_string(),
                })?;
                if text.trim().is_empty() {
                    return Err(ExtractError::NoExtractableText);
                }
                Ok(text)
            }
            other => Err(ExtractError::UnsupportedFormat(other.as_str().to_string())),
        }
    }
}
