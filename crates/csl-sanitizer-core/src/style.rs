/*
 * style.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Typed views over the well-known parts of a CSL style.
 */

//! Typed views over a parsed style.
//!
//! Rules never walk the raw tree by shape guesses. They go through
//! [`Style`], which addresses the sections, locales and macros that CSL
//! defines and turns unexpected shapes into either a
//! [`NormalizeError`] or a [`KnownMalformedShape`].

use crate::error::{KnownMalformedShape, NormalizeError};
use csl_sanitizer_xml::{Document, Element, Node};
use std::fmt;

/// `<bibliography>` or `<citation>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Bibliography,
    Citation,
}

impl SectionKind {
    pub const ALL: [SectionKind; 2] = [SectionKind::Bibliography, SectionKind::Citation];

    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKind::Bibliography => "bibliography",
            SectionKind::Citation => "citation",
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `<style>` root of a document.
pub struct Style<'a> {
    root: &'a mut Element,
}

impl<'a> Style<'a> {
    /// View a document as a style.
    ///
    /// # Errors
    ///
    /// Returns `MalformedInput` if the root element is not `<style>`.
    pub fn new(document: &'a mut Document) -> Result<Self, NormalizeError> {
        if !document.root.is("style") {
            return Err(NormalizeError::structure(
                "style",
                format!("root element is <{}>, expected <style>", document.root.name()),
            ));
        }
        Ok(Self {
            root: &mut document.root,
        })
    }

    /// The `<bibliography>` or `<citation>` section, if present.
    ///
    /// # Errors
    ///
    /// Returns `MalformedInput` if the section appears more than once.
    pub fn section(
        &mut self,
        kind: SectionKind,
        rule: &'static str,
    ) -> Result<Option<Section<'_>>, NormalizeError> {
        let positions = self.root.child_positions(kind.as_str());
        match positions.as_slice() {
            [] => Ok(None),
            [index] => Ok(self.root.children[*index]
                .as_element_mut()
                .map(|element| Section { element })),
            _ => Err(NormalizeError::structure(
                rule,
                format!("<{}> appears {} times", kind, positions.len()),
            )),
        }
    }

    /// All `<locale>` elements in document order.
    pub fn locales(&mut self) -> impl Iterator<Item = Locale<'_>> {
        self.root
            .child_elements_named_mut("locale")
            .map(|element| Locale { element })
    }

    /// All `<macro>` elements in document order.
    pub fn macros(&mut self) -> impl Iterator<Item = Macro<'_>> {
        self.root
            .child_elements_named_mut("macro")
            .map(|element| Macro { element })
    }
}

/// A `<bibliography>` or `<citation>` element.
pub struct Section<'a> {
    element: &'a mut Element,
}

impl Section<'_> {
    pub fn element(&mut self) -> &mut Element {
        self.element
    }

    /// Indices of the `<layout>` children.
    pub fn layout_positions(&self) -> Vec<usize> {
        self.element.child_positions("layout")
    }

    pub fn layouts(&mut self) -> impl Iterator<Item = &mut Element> {
        self.element.child_elements_named_mut("layout")
    }
}

/// Result of looking up the `<terms>` of a locale.
pub enum TermsLookup<'a> {
    /// The locale has no `<terms>`.
    Absent,
    /// The `<terms>` contains something other than `<term>` elements.
    Malformed(KnownMalformedShape),
    /// A well-formed `<terms>`.
    Present(Terms<'a>),
}

/// A `<locale>` element.
pub struct Locale<'a> {
    element: &'a mut Element,
}

impl<'a> Locale<'a> {
    /// The `xml:lang` attribute; `None` for a locale that applies to all
    /// languages.
    pub fn lang(&self) -> Option<&str> {
        self.element.attribute("xml:lang")
    }

    /// Look up the `<terms>` collection.
    ///
    /// # Errors
    ///
    /// Returns `MalformedInput` if the locale has more than one `<terms>`.
    pub fn terms(self, rule: &'static str) -> Result<TermsLookup<'a>, NormalizeError> {
        let positions = self.element.child_positions("terms");
        let index = match positions.as_slice() {
            [] => return Ok(TermsLookup::Absent),
            [index] => *index,
            _ => {
                return Err(NormalizeError::structure(
                    rule,
                    format!(
                        "<locale> ({}) has {} <terms> elements",
                        self.lang().unwrap_or("default"),
                        positions.len()
                    ),
                ));
            }
        };

        let foreign = self.element.children[index]
            .as_element()
            .and_then(|terms| terms.elements().find(|e| !e.is("term")))
            .map(|e| e.local_name().to_string());
        if let Some(element) = foreign {
            return Ok(TermsLookup::Malformed(KnownMalformedShape {
                rule,
                locale: self.lang().map(str::to_string),
                element,
                context: "<terms>",
            }));
        }

        Ok(TermsLookup::Present(Terms {
            locale: self.element,
            index,
        }))
    }
}

/// The `<terms>` collection of a locale.
///
/// Keeps hold of the locale so the collection itself can be removed.
pub struct Terms<'a> {
    locale: &'a mut Element,
    index: usize,
}

impl Terms<'_> {
    fn element(&self) -> Option<&Element> {
        self.locale.children.get(self.index).and_then(Node::as_element)
    }

    fn element_mut(&mut self) -> Option<&mut Element> {
        self.locale
            .children
            .get_mut(self.index)
            .and_then(Node::as_element_mut)
    }

    /// The `<term>` elements in document order.
    pub fn terms_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.element_mut()
            .into_iter()
            .flat_map(|terms| terms.child_elements_named_mut("term"))
    }

    /// Remove every `<term>` whose name is in `names`, returning them in
    /// document order.
    pub fn remove_named(&mut self, names: &[&str]) -> Vec<Element> {
        let Some(terms) = self.element_mut() else {
            return Vec::new();
        };
        let positions: Vec<usize> = terms
            .child_positions("term")
            .into_iter()
            .filter(|&index| {
                terms.children[index]
                    .as_element()
                    .and_then(|term| term.attribute("name"))
                    .is_some_and(|name| names.contains(&name))
            })
            .collect();

        let mut removed = Vec::new();
        for index in positions.into_iter().rev() {
            if let Some(Node::Element(term)) = terms.remove_child(index) {
                removed.push(term);
            }
        }
        removed.reverse();
        removed
    }

    /// Whether nothing but whitespace is left in the collection.
    pub fn is_bare(&self) -> bool {
        self.element()
            .is_some_and(|terms| terms.children.iter().all(Node::is_whitespace))
    }

    /// Remove the collection from its locale.
    pub fn remove(self) {
        self.locale.remove_child(self.index);
    }
}

/// A `<macro>` element.
pub struct Macro<'a> {
    element: &'a mut Element,
}

impl Macro<'_> {
    /// The macro name, or an empty string when the attribute is missing.
    pub fn name(&self) -> String {
        self.element
            .attribute("name")
            .unwrap_or_default()
            .to_string()
    }

    pub fn element(&mut self) -> &mut Element {
        self.element
    }
}
