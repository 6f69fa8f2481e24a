//! Error types for XML parsing.

use thiserror::Error;

/// Result type alias for csl-sanitizer-xml operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while parsing a document.
///
/// Every variant means the input is not well-formed XML.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// XML syntax error from quick-xml.
    #[error("XML syntax error: {message}{}", at_byte(.position))]
    XmlSyntax {
        message: String,
        /// Byte offset where the error occurred.
        position: Option<u64>,
    },

    /// The input is not valid UTF-8.
    #[error("Invalid UTF-8 at byte {position}")]
    InvalidUtf8 { position: usize },

    /// Unexpected end of input.
    #[error("Unexpected end of input, expected {expected}")]
    UnexpectedEof {
        /// What was expected when EOF was encountered.
        expected: String,
    },

    /// Mismatched end tag.
    #[error("Mismatched end tag: expected </{expected}>, found </{found}>")]
    MismatchedEndTag {
        expected: String,
        found: String,
        position: usize,
    },

    /// Character data outside the root element.
    #[error("Text outside the root element at byte {position}")]
    TextOutsideRoot { position: usize },

    /// Empty document (no root element).
    #[error("Empty XML document: no root element found")]
    EmptyDocument,

    /// Multiple root elements.
    #[error("Invalid XML: multiple root elements (second one at byte {position})")]
    MultipleRoots { position: usize },
}

fn at_byte(position: &Option<u64>) -> String {
    match position {
        Some(pos) => format!(" at byte {}", pos),
        None => String::new(),
    }
}

impl Error {
    /// Byte offset of the problem, when known.
    pub fn position(&self) -> Option<u64> {
        match self {
            Error::XmlSyntax { position, .. } => *position,
            Error::InvalidUtf8 { position }
            | Error::MismatchedEndTag { position, .. }
            | Error::TextOutsideRoot { position }
            | Error::MultipleRoots { position } => Some(*position as u64),
            Error::UnexpectedEof { .. } | Error::EmptyDocument => None,
        }
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::XmlSyntax {
            message: err.to_string(),
            position: None,
        }
    }
}

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Error::XmlSyntax {
            message: format!("Attribute error: {}", err),
            position: None,
        }
    }
}
