//! Serialization back to XML text.
//!
//! Untouched elements are written from their source tags. Edited tags are
//! regenerated from the element's name and attributes, keeping the original
//! escaping of attribute values that did not change.

use crate::types::SourceTag;
use crate::{Attribute, Document, Element, Node};
use quick_xml::escape::{escape, partial_escape};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

impl Document {
    /// Serialize the document, not including any byte order mark.
    pub fn to_xml_string(&self) -> String {
        let mut out = String::new();
        for node in &self.prolog {
            write_node(&mut out, node);
        }
        write_element(&mut out, &self.root);
        for node in &self.epilog {
            write_node(&mut out, node);
        }
        out
    }

    /// Serialize the document to bytes, restoring the byte order mark if the
    /// source had one.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = if self.bom {
            UTF8_BOM.to_vec()
        } else {
            Vec::new()
        };
        bytes.extend_from_slice(self.to_xml_string().as_bytes());
        bytes
    }
}

fn write_node(out: &mut String, node: &Node) {
    match node {
        Node::Element(element) => write_element(out, element),
        Node::Text(text) => match text.raw() {
            Some(raw) => out.push_str(raw),
            None => out.push_str(&partial_escape(text.as_str())),
        },
        Node::Comment(raw) | Node::CData(raw) | Node::Markup(raw) => out.push_str(raw),
    }
}

fn write_element(out: &mut String, element: &Element) {
    let source = element.source();
    let start = source.and_then(|s| s.start.as_deref());
    let end = source.and_then(|s| s.end.as_deref());

    if element.children.is_empty() {
        match (source, start, end) {
            // `<a></a>` stays as it was
            (Some(SourceTag { self_closing: false, had_children: false, .. }), Some(start), Some(end)) => {
                out.push_str(start);
                out.push_str(end);
            }
            (Some(SourceTag { self_closing: true, .. }), Some(start), _) => out.push_str(start),
            _ => write_start_tag(out, element, true),
        }
        return;
    }

    match (source, start) {
        (Some(SourceTag { self_closing: false, .. }), Some(start)) => out.push_str(start),
        _ => write_start_tag(out, element, false),
    }
    for child in &element.children {
        write_node(out, child);
    }
    match end {
        Some(end) => out.push_str(end),
        None => {
            out.push_str("</");
            out.push_str(element.name());
            out.push('>');
        }
    }
}

fn write_start_tag(out: &mut String, element: &Element, self_closing: bool) {
    out.push('<');
    out.push_str(element.name());
    for attribute in element.attributes() {
        out.push(' ');
        write_attribute(out, attribute);
    }
    out.push_str(if self_closing { "/>" } else { ">" });
}

fn write_attribute(out: &mut String, attribute: &Attribute) {
    out.push_str(attribute.name());
    out.push('=');
    match attribute.raw_value() {
        Some(raw) => {
            let quote = if raw.contains('"') { '\'' } else { '"' };
            out.push(quote);
            out.push_str(raw);
            out.push(quote);
        }
        None => {
            out.push('"');
            out.push_str(&escape(attribute.value()));
            out.push('"');
        }
    }
}
