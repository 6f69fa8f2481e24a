//! Lossless XML document model for CSL style rewriting.
//!
//! This crate wraps [`quick-xml`] to provide a tree of [`Node`]s that keeps the
//! exact source text of everything it has not been asked to change. Parsing a
//! file and serializing it again reproduces the input byte for byte, so a diff
//! between the original and a rewritten style shows only deliberate edits.
//!
//! # Overview
//!
//! The main types are:
//! - [`Document`]: prolog, root [`Element`] and epilog of one file
//! - [`Element`]: tag name, ordered attributes and ordered children
//! - [`Node`]: element, text, comment, CDATA or other markup
//! - [`Text`]: character data with its original escaped form
//!
//! # Example
//!
//! ```rust
//! use csl_sanitizer_xml::parse_str;
//!
//! let source = r#"<style version="1.0">
//!   <!-- kept verbatim -->
//!   <macro name="author"><text variable="author"/></macro>
//! </style>"#;
//!
//! let mut doc = parse_str(source).unwrap();
//! assert_eq!(doc.to_xml_string(), source);
//!
//! let macro_ = doc.root.child_elements_named_mut("macro").next().unwrap();
//! macro_.set_attribute("name", "contributors");
//! assert!(doc.to_xml_string().contains(r#"<macro name="contributors">"#));
//! ```

pub mod error;
pub mod parser;
pub mod types;
mod writer;

pub use error::{Error, Result};
pub use parser::{parse, parse_str};
pub use types::{Attribute, Document, Element, Node, Text};
