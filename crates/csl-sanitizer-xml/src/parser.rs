//! XML parser that builds lossless [`Document`] trees.

use crate::types::SourceTag;
use crate::{Attribute, Document, Element, Error, Node, Result, Text};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Parse a document from raw bytes.
///
/// The bytes must be UTF-8, optionally preceded by a byte order mark.
///
/// # Example
///
/// ```rust
/// use csl_sanitizer_xml::parse;
///
/// let doc = parse(b"<style><info/></style>").unwrap();
/// assert_eq!(doc.root.name(), "style");
/// assert_eq!(doc.to_bytes(), b"<style><info/></style>");
/// ```
///
/// # Errors
///
/// Returns an error if the input is not well-formed XML.
pub fn parse(bytes: &[u8]) -> Result<Document> {
    let (bom, body) = match bytes.strip_prefix(UTF8_BOM) {
        Some(rest) => (true, rest),
        None => (false, bytes),
    };
    let source = std::str::from_utf8(body).map_err(|e| Error::InvalidUtf8 {
        position: e.valid_up_to() + if bom { UTF8_BOM.len() } else { 0 },
    })?;
    XmlParser::new(source).parse(bom)
}

/// Parse a document from a string.
///
/// # Errors
///
/// Returns an error if the input is not well-formed XML.
pub fn parse_str(source: &str) -> Result<Document> {
    parse(source.as_bytes())
}

/// Internal parser state.
struct XmlParser<'a> {
    /// The source content being parsed.
    source: &'a str,

    /// The quick-xml reader.
    reader: Reader<&'a [u8]>,

    /// Stack of elements being built.
    stack: Vec<BuildNode>,

    prolog: Vec<Node>,
    root: Option<Element>,
    epilog: Vec<Node>,
}

/// An element being constructed during parsing.
struct BuildNode {
    name: String,
    attributes: Vec<Attribute>,
    /// Source text of the start tag.
    start: String,
    children: Vec<Node>,
}

impl<'a> XmlParser<'a> {
    fn new(source: &'a str) -> Self {
        let mut reader = Reader::from_str(source);
        reader.config_mut().trim_text_start = false;
        reader.config_mut().trim_text_end = false;

        Self {
            source,
            reader,
            stack: Vec::new(),
            prolog: Vec::new(),
            root: None,
            epilog: Vec::new(),
        }
    }

    fn parse(mut self, bom: bool) -> Result<Document> {
        loop {
            // Every event is sliced out of the source so nothing is lost
            let event_start = self.reader.buffer_position() as usize;
            let event = self.reader.read_event().map_err(|e| Error::XmlSyntax {
                message: e.to_string(),
                position: Some(self.reader.error_position()),
            })?;
            let event_end = self.reader.buffer_position() as usize;
            let raw = self.slice(event_start, event_end)?;

            match event {
                Event::Start(e) => {
                    let name = element_name(&e);
                    let attributes = parse_attributes(&e, event_start)?;
                    self.stack.push(BuildNode {
                        name,
                        attributes,
                        start: raw.to_string(),
                        children: Vec::new(),
                    });
                }
                Event::End(e) => {
                    let found = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    let node = self.stack.pop().ok_or_else(|| Error::XmlSyntax {
                        message: format!("Unexpected closing tag </{}>", found),
                        position: Some(event_start as u64),
                    })?;
                    if node.name != found {
                        return Err(Error::MismatchedEndTag {
                            expected: node.name,
                            found,
                            position: event_start,
                        });
                    }
                    let had_children = !node.children.is_empty();
                    let element = Element::from_source(
                        node.name,
                        node.attributes,
                        node.children,
                        SourceTag {
                            start: Some(node.start),
                            end: Some(raw.to_string()),
                            self_closing: false,
                            had_children,
                        },
                    );
                    self.attach(Node::Element(element), event_start)?;
                }
                Event::Empty(e) => {
                    let name = element_name(&e);
                    let attributes = parse_attributes(&e, event_start)?;
                    let element = Element::from_source(
                        name,
                        attributes,
                        Vec::new(),
                        SourceTag {
                            start: Some(raw.to_string()),
                            end: None,
                            self_closing: true,
                            had_children: false,
                        },
                    );
                    self.attach(Node::Element(element), event_start)?;
                }
                Event::Text(e) => {
                    let content = e.unescape().map_err(|err| Error::XmlSyntax {
                        message: format!("Invalid text content: {}", err),
                        position: Some(event_start as u64),
                    })?;
                    let text = Text::from_source(raw, content.into_owned());
                    self.attach(Node::Text(text), event_start)?;
                }
                Event::CData(_) => self.attach(Node::CData(raw.to_string()), event_start)?,
                Event::Comment(_) => self.attach(Node::Comment(raw.to_string()), event_start)?,
                Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {
                    self.attach(Node::Markup(raw.to_string()), event_start)?
                }
                Event::Eof => break,
            }
        }

        // Check for unclosed elements
        if let Some(node) = self.stack.last() {
            return Err(Error::UnexpectedEof {
                expected: format!("closing tag </{}>", node.name),
            });
        }

        let root = self.root.ok_or(Error::EmptyDocument)?;
        Ok(Document::new(bom, self.prolog, root, self.epilog))
    }

    /// Add a finished node to its parent, or to the document level.
    fn attach(&mut self, node: Node, position: usize) -> Result<()> {
        if let Some(parent) = self.stack.last_mut() {
            parent.children.push(node);
            return Ok(());
        }

        match node {
            Node::Element(element) => {
                if self.root.is_some() {
                    return Err(Error::MultipleRoots { position });
                }
                self.root = Some(element);
            }
            Node::Text(ref text) if !text.is_whitespace() => {
                return Err(Error::TextOutsideRoot { position });
            }
            Node::CData(_) => return Err(Error::TextOutsideRoot { position }),
            other => {
                if self.root.is_some() {
                    self.epilog.push(other);
                } else {
                    self.prolog.push(other);
                }
            }
        }
        Ok(())
    }

    fn slice(&self, start: usize, end: usize) -> Result<&'a str> {
        self.source.get(start..end).ok_or(Error::XmlSyntax {
            message: "Event boundary is not a character boundary".to_string(),
            position: Some(start as u64),
        })
    }
}

fn element_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn parse_attributes(e: &BytesStart<'_>, tag_start: usize) -> Result<Vec<Attribute>> {
    let mut attributes = Vec::new();

    for attr_result in e.attributes() {
        let attr = attr_result?;

        let name = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let raw_value = String::from_utf8_lossy(&attr.value).into_owned();
        let value = attr.unescape_value().map_err(|err| Error::XmlSyntax {
            message: format!("Invalid attribute value: {}", err),
            position: Some(tag_start as u64),
        })?;

        attributes.push(Attribute::from_source(name, value.into_owned(), raw_value));
    }

    Ok(attributes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_element() {
        let doc = parse_str("<root/>").unwrap();
        assert_eq!(doc.root.name(), "root");
        assert!(doc.root.children.is_empty());
    }

    #[test]
    fn test_parse_nested_elements() {
        let doc = parse_str("<root><child/></root>").unwrap();
        let children: Vec<&Element> = doc.root.elements().collect();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].name(), "child");
    }

    #[test]
    fn test_parse_attributes_in_order() {
        let doc = parse_str(r#"<term name="edition" form="short">ed.</term>"#).unwrap();
        let names: Vec<&str> = doc.root.attributes().iter().map(|a| a.name()).collect();
        assert_eq!(names, vec!["name", "form"]);
        assert_eq!(doc.root.attribute("form"), Some("short"));
        assert_eq!(doc.root.text(), "ed.");
    }

    #[test]
    fn test_parse_namespace_prefix() {
        let doc = parse_str(r#"<cs:style xmlns:cs="http://purl.org/net/xbiblio/csl"/>"#).unwrap();
        assert_eq!(doc.root.name(), "cs:style");
        assert_eq!(doc.root.local_name(), "style");
    }

    #[test]
    fn test_prolog_and_epilog_kept() {
        let source = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<!-- top -->\n<style/>\n";
        let doc = parse_str(source).unwrap();
        assert_eq!(doc.prolog.len(), 4);
        assert!(matches!(&doc.prolog[0], Node::Markup(m) if m.starts_with("<?xml")));
        assert!(matches!(&doc.prolog[2], Node::Comment(c) if c == "<!-- top -->"));
        assert_eq!(doc.epilog.len(), 1);
    }

    #[test]
    fn test_comments_inside_elements_kept() {
        let doc = parse_str("<a><!-- note --><b/></a>").unwrap();
        assert!(matches!(&doc.root.children[0], Node::Comment(c) if c == "<!-- note -->"));
    }

    #[test]
    fn test_byte_order_mark() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(b"<style/>");
        let doc = parse(&bytes).unwrap();
        assert_eq!(doc.root.name(), "style");
        assert_eq!(doc.to_bytes(), bytes);
    }

    #[test]
    fn test_empty_document_error() {
        let result = parse_str("");
        assert!(matches!(result, Err(Error::EmptyDocument)));
    }

    #[test]
    fn test_unclosed_element_error() {
        let result = parse_str("<root>");
        assert!(
            matches!(
                result,
                Err(Error::UnexpectedEof { .. } | Error::XmlSyntax { .. })
            ),
            "Expected UnexpectedEof or XmlSyntax error, got: {:?}",
            result
        );
    }

    #[test]
    fn test_mismatched_tags_error() {
        let result = parse_str("<root></wrong>");
        // quick-xml reports the mismatch itself when it checks end names
        assert!(
            matches!(
                result,
                Err(Error::MismatchedEndTag { .. } | Error::XmlSyntax { .. })
            ),
            "Expected MismatchedEndTag or XmlSyntax error, got: {:?}",
            result
        );
    }

    #[test]
    fn test_multiple_roots_error() {
        let result = parse_str("<root/><another/>");
        assert!(matches!(result, Err(Error::MultipleRoots { position: 7 })));
    }

    #[test]
    fn test_text_outside_root_error() {
        let result = parse_str("<root/>trailing");
        assert!(matches!(result, Err(Error::TextOutsideRoot { .. })));
    }

    #[test]
    fn test_invalid_utf8_error() {
        let result = parse(b"<root>\xff</root>");
        assert!(matches!(result, Err(Error::InvalidUtf8 { position: 6 })));
    }

    #[test]
    fn test_syntax_error() {
        let result = parse_str("<root attr=unquoted/>");
        assert!(matches!(result, Err(Error::XmlSyntax { .. })));
    }

    #[test]
    fn test_duplicate_attribute_error() {
        let result = parse_str(r#"<root a="1" a="2"/>"#);
        assert!(matches!(result, Err(Error::XmlSyntax { .. })));
    }
}
