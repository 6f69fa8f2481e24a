//! Core types for the lossless document model.

/// A parsed XML document.
///
/// The root element is surrounded by the prolog (XML declaration, comments,
/// whitespace before the root) and the epilog (anything after it). Both are
/// kept verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Whether the source started with a UTF-8 byte order mark.
    pub(crate) bom: bool,

    /// Nodes before the root element.
    pub prolog: Vec<Node>,

    /// The root element.
    pub root: Element,

    /// Nodes after the root element.
    pub epilog: Vec<Node>,
}

/// A node of the document tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A child element.
    Element(Element),

    /// Character data.
    Text(Text),

    /// A comment, stored with its `<!--` and `-->` delimiters.
    Comment(String),

    /// A CDATA section, stored with its delimiters.
    CData(String),

    /// XML declaration, processing instruction or DOCTYPE, stored verbatim.
    Markup(String),
}

/// Character data.
///
/// Keeps the escaped form found in the source so that untouched text is
/// written back exactly as it was read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Text {
    content: String,
    raw: Option<String>,
}

/// An attribute of an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    name: String,
    value: String,
    /// The escaped value as it appeared between the quotes in the source.
    raw_value: Option<String>,
}

/// An XML element.
///
/// Attribute order is preserved and attribute names are unique. Children are
/// public because rules reorder and splice them freely; the serializer only
/// needs the name and attributes to go through the accessor methods.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    name: String,
    attributes: Vec<Attribute>,

    /// Child nodes in document order.
    pub children: Vec<Node>,

    source: Option<SourceTag>,
}

/// Source text of an element's tags, used to write untouched elements back
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SourceTag {
    /// The start tag (`<name ...>` or `<name .../>`); `None` once the name or
    /// attributes were edited.
    pub(crate) start: Option<String>,

    /// The end tag; `None` for self-closing tags or after a rename.
    pub(crate) end: Option<String>,

    pub(crate) self_closing: bool,

    /// Whether the element had any content (even whitespace) when parsed.
    pub(crate) had_children: bool,
}

impl Document {
    pub(crate) fn new(bom: bool, prolog: Vec<Node>, root: Element, epilog: Vec<Node>) -> Self {
        Self {
            bom,
            prolog,
            root,
            epilog,
        }
    }

    /// Create a document around a root element, without prolog or epilog.
    pub fn from_root(root: Element) -> Self {
        Self::new(false, Vec::new(), root, Vec::new())
    }
}

impl Node {
    /// The element inside this node, if it is one.
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Mutable access to the element inside this node, if it is one.
    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Node::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Whether this node is text made only of whitespace.
    pub fn is_whitespace(&self) -> bool {
        matches!(self, Node::Text(t) if t.is_whitespace())
    }

    /// Whether this node is a comment.
    pub fn is_comment(&self) -> bool {
        matches!(self, Node::Comment(_))
    }
}

impl Text {
    /// Create text from an unescaped value.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            raw: None,
        }
    }

    pub(crate) fn from_source(raw: &str, content: String) -> Self {
        Self {
            content,
            raw: Some(raw.to_string()),
        }
    }

    /// The unescaped text.
    pub fn as_str(&self) -> &str {
        &self.content
    }

    /// The text as it appeared in the source, if it has not been replaced.
    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    /// Whether the text contains only whitespace.
    pub fn is_whitespace(&self) -> bool {
        self.content.trim().is_empty()
    }
}

impl Attribute {
    /// Create an attribute from an unescaped value.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            raw_value: None,
        }
    }

    pub(crate) fn from_source(name: String, value: String, raw_value: String) -> Self {
        Self {
            name,
            value,
            raw_value: Some(raw_value),
        }
    }

    /// The qualified attribute name, e.g. `xml:lang`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The unescaped value.
    pub fn value(&self) -> &str {
        &self.value
    }

    pub(crate) fn raw_value(&self) -> Option<&str> {
        self.raw_value.as_deref()
    }
}

impl Element {
    /// Create a new element with no attributes or children.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
            source: None,
        }
    }

    /// Builder-style attribute setter for freshly created elements.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub(crate) fn from_source(
        name: String,
        attributes: Vec<Attribute>,
        children: Vec<Node>,
        source: SourceTag,
    ) -> Self {
        Self {
            name,
            attributes,
            children,
            source: Some(source),
        }
    }

    pub(crate) fn source(&self) -> Option<&SourceTag> {
        self.source.as_ref()
    }

    /// The qualified name as written in the source, e.g. `cs:term`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The name without its namespace prefix.
    pub fn local_name(&self) -> &str {
        self.name.rsplit(':').next().unwrap_or(&self.name)
    }

    /// Whether the element's local name is `local_name`.
    pub fn is(&self, local_name: &str) -> bool {
        self.local_name() == local_name
    }

    /// Rename the element, keeping any namespace prefix.
    pub fn set_local_name(&mut self, local_name: &str) {
        if self.local_name() == local_name {
            return;
        }
        self.name = match self.name.split_once(':') {
            Some((prefix, _)) => format!("{}:{}", prefix, local_name),
            None => local_name.to_string(),
        };
        if let Some(source) = &mut self.source {
            source.start = None;
            source.end = None;
        }
    }

    /// All attributes in source order.
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Get an attribute value by its qualified name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Set an attribute value.
    ///
    /// An existing attribute keeps its position; a new one is appended.
    /// Setting the value it already has leaves the element untouched.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|a| a.name == name) {
            Some(existing) if existing.value == value => return,
            Some(existing) => {
                existing.value = value;
                existing.raw_value = None;
            }
            None => self.attributes.push(Attribute::new(name, value)),
        }
        self.invalidate_start_tag();
    }

    /// Remove an attribute, returning its value.
    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        let index = self.attributes.iter().position(|a| a.name == name)?;
        let removed = self.attributes.remove(index);
        self.invalidate_start_tag();
        Some(removed.value)
    }

    fn invalidate_start_tag(&mut self) {
        if let Some(source) = &mut self.source {
            source.start = None;
        }
    }

    /// Child elements in document order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// Mutable child elements in document order.
    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(Node::as_element_mut)
    }

    /// Child elements with the given local name.
    pub fn child_elements_named<'a>(
        &'a self,
        local_name: &'a str,
    ) -> impl Iterator<Item = &'a Element> + 'a {
        self.elements().filter(move |e| e.is(local_name))
    }

    /// Mutable child elements with the given local name.
    pub fn child_elements_named_mut<'a>(
        &'a mut self,
        local_name: &'a str,
    ) -> impl Iterator<Item = &'a mut Element> + 'a {
        self.elements_mut().filter(move |e| e.is(local_name))
    }

    /// Indices into `children` of the child elements with the given local name.
    pub fn child_positions(&self, local_name: &str) -> Vec<usize> {
        self.children
            .iter()
            .enumerate()
            .filter(|(_, node)| node.as_element().is_some_and(|e| e.is(local_name)))
            .map(|(index, _)| index)
            .collect()
    }

    /// Concatenated unescaped text of the direct text children.
    pub fn text(&self) -> String {
        let mut text = String::new();
        for child in &self.children {
            match child {
                Node::Text(t) => text.push_str(t.as_str()),
                Node::CData(raw) => text.push_str(
                    raw.strip_prefix("<![CDATA[")
                        .and_then(|s| s.strip_suffix("]]>"))
                        .unwrap_or(raw),
                ),
                _ => {}
            }
        }
        text
    }

    /// Whether the element has no content besides comments and whitespace.
    pub fn is_effectively_empty(&self) -> bool {
        self.children
            .iter()
            .all(|child| child.is_comment() || child.is_whitespace())
    }

    /// Whether the element has at least one child element.
    pub fn has_elements(&self) -> bool {
        self.elements().next().is_some()
    }

    /// Remove the child at `index`.
    ///
    /// Whitespace that only served to indent the removed node goes with it:
    /// the preceding whitespace text if there is one, otherwise the following.
    pub fn remove_child(&mut self, index: usize) -> Option<Node> {
        if index >= self.children.len() {
            return None;
        }
        let removed = self.children.remove(index);
        if index > 0 && self.children[index - 1].is_whitespace() {
            self.children.remove(index - 1);
        } else if index < self.children.len() && self.children[index].is_whitespace() {
            self.children.remove(index);
        }
        Some(removed)
    }

    /// Replace the child at `index` with `nodes`.
    pub fn replace_child(&mut self, index: usize, nodes: Vec<Node>) -> Option<Node> {
        if index >= self.children.len() {
            return None;
        }
        let mut removed = self.children.splice(index..=index, nodes);
        removed.next()
    }

    /// Append a child element.
    pub fn push_element(&mut self, element: Element) {
        self.children.push(Node::Element(element));
    }

    /// Visit `self` and every descendant element in document order.
    pub fn visit_mut(&mut self, f: &mut dyn FnMut(&mut Element)) {
        f(self);
        for child in self.elements_mut() {
            child.visit_mut(f);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_str;

    #[test]
    fn test_local_name_strips_prefix() {
        let element = Element::new("cs:term");
        assert_eq!(element.name(), "cs:term");
        assert_eq!(element.local_name(), "term");
        assert!(element.is("term"));
    }

    #[test]
    fn test_set_local_name_keeps_prefix() {
        let mut element = Element::new("cs:else-if");
        element.set_local_name("if");
        assert_eq!(element.name(), "cs:if");
    }

    #[test]
    fn test_set_attribute_preserves_position() {
        let mut element = Element::new("term")
            .with_attribute("name", "space-et-al")
            .with_attribute("form", "short");
        element.set_attribute("name", "et-al");
        let names: Vec<&str> = element.attributes().iter().map(|a| a.name()).collect();
        assert_eq!(names, vec!["name", "form"]);
        assert_eq!(element.attribute("name"), Some("et-al"));
    }

    #[test]
    fn test_remove_attribute() {
        let mut element = Element::new("text").with_attribute("text-case", "");
        assert_eq!(element.remove_attribute("text-case"), Some(String::new()));
        assert_eq!(element.remove_attribute("text-case"), None);
        assert!(element.attributes().is_empty());
    }

    #[test]
    fn test_remove_child_takes_preceding_indentation() {
        let mut doc = parse_str("<terms>\n  <term name=\"a\"/>\n  <term name=\"b\"/>\n</terms>")
            .unwrap();
        let positions = doc.root.child_positions("term");
        doc.root.remove_child(positions[1]);
        assert_eq!(
            doc.to_xml_string(),
            "<terms>\n  <term name=\"a\"/>\n</terms>"
        );
    }

    #[test]
    fn test_remove_first_child_takes_following_whitespace() {
        let mut doc = parse_str("<a><b/> <c/></a>").unwrap();
        doc.root.remove_child(0);
        assert_eq!(doc.to_xml_string(), "<a><c/></a>");
    }

    #[test]
    fn test_effectively_empty() {
        let doc = parse_str("<else>\n  <!-- nothing -->\n</else>").unwrap();
        assert!(doc.root.is_effectively_empty());

        let doc = parse_str("<else><text value=\"x\"/></else>").unwrap();
        assert!(!doc.root.is_effectively_empty());
    }

    #[test]
    fn test_text_unescapes() {
        let doc = parse_str("<term>A &amp; B</term>").unwrap();
        assert_eq!(doc.root.text(), "A & B");
    }

    #[test]
    fn test_visit_mut_reaches_every_element() {
        let mut doc = parse_str("<a><b><c/></b><d/></a>").unwrap();
        let mut seen = Vec::new();
        doc.root
            .visit_mut(&mut |e: &mut Element| seen.push(e.name().to_string()));
        assert_eq!(seen, vec!["a", "b", "c", "d"]);
    }
}
