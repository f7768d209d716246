//! GeoNER Parser - Document reading for plain-text sources
//!
//! Reads a file as UTF-8 text and applies the configured case
//! normalization. Each parser implements the `DocumentParser` trait and
//! produces a `TextDocument` ready for entity recognition.

use std::borrow::Cow;
use std::path::Path;

use geoner_core::{CaseMode, GeonerError};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while reading a document
#[derive(Error, Debug)]
pub enum ParserError {
    /// Path exists but is not a regular file
    #[error("Not a regular file: {0}")]
    NotAFile(String),

    /// IO error while reading the file
    #[error("IO error reading file: {path}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Content is not valid UTF-8
    #[error("Text encoding error in {path} at byte {offset}")]
    EncodingError { path: String, offset: usize },
}

impl From<ParserError> for GeonerError {
    fn from(err: ParserError) -> Self {
        GeonerError::DocumentError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ParserError>;

// ============================================================================
// Document Types
// ============================================================================

/// A document read into memory
#[derive(Debug, Clone)]
pub struct TextDocument {
    /// File name, used as the document identifier in output records
    pub name: String,

    /// Full path the document was read from
    pub path: String,

    /// Text content
    pub content: String,
}

impl TextDocument {
    /// Apply case normalization in place
    pub fn normalize(mut self, mode: CaseMode) -> Self {
        if let Cow::Owned(content) = normalize_case(&self.content, mode) {
            self.content = content;
        }
        self
    }
}

// ============================================================================
// Case Normalization
// ============================================================================

/// Apply a case mode, borrowing when the text is left unchanged
pub fn normalize_case(text: &str, mode: CaseMode) -> Cow<'_, str> {
    match mode {
        CaseMode::Preserve => Cow::Borrowed(text),
        CaseMode::Title => Cow::Owned(title_case(text)),
    }
}

/// Title-case text: the first letter of every run of letters is upper-cased
/// and the rest lower-cased ("they're" becomes "They'Re")
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous_is_letter = false;

    for c in text.chars() {
        if c.is_alphabetic() {
            if previous_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            out.push(c);
            previous_is_letter = false;
        }
    }

    out
}

// ============================================================================
// Parser Trait
// ============================================================================

/// Trait for document parsers
pub trait DocumentParser: Send + Sync {
    /// Parse a document from a file path
    fn parse(&self, path: &Path) -> Result<TextDocument>;
}

/// Plain text parser
///
/// Accepts any file, including ones without a recognised extension, as
/// long as the content decodes as UTF-8.
pub struct PlainTextParser;

impl DocumentParser for PlainTextParser {
    fn parse(&self, path: &Path) -> Result<TextDocument> {
        let path_str = path.display().to_string();

        if !path.is_file() {
            return Err(ParserError::NotAFile(path_str));
        }

        let bytes = std::fs::read(path).map_err(|e| ParserError::IoError {
            path: path_str.clone(),
            source: e,
        })?;

        let content = String::from_utf8(bytes).map_err(|e| ParserError::EncodingError {
            path: path_str.clone(),
            offset: e.utf8_error().valid_up_to(),
        })?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path_str.clone());

        tracing::debug!("Read {} ({} bytes)", path_str, content.len());

        Ok(TextDocument {
            name,
            path: path_str,
            content,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
