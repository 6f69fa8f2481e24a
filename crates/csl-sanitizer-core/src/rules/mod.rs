/*
 * rules/mod.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * The catalog of rewrite rules.
 */

//! The rule catalog.
//!
//! Each rule fixes one known deviation from the CSL specification that the
//! strict consumer rejects:
//!
//! - [`RemoveTerms`] - undocumented citeproc-js terms
//! - [`RenameEtAlTerms`] - deprecated spellings of the `et-al` term
//! - [`RemoveInstitutionInNames`] - CSL-M `<institution>`
//! - [`DropEmptyTextCase`], [`FixUnpublishedTerm`], [`LowercaseLocators`]
//! - [`ReplaceOriginalVariables`], [`StripVendorVariables`]
//! - [`DropEmptyGroups`], [`DropEmptyElseBranches`]
//! - [`FillEmptyLayouts`], [`RemoveDuplicateLayouts`]
//!
//! A rule that finds nothing to do returns no messages. Once a rule has fixed
//! a document, running it again finds nothing, which keeps the whole
//! pipeline idempotent.

mod cleanup;
mod layouts;
mod names;
mod terms;
mod variables;

pub use cleanup::{
    DropEmptyElseBranches, DropEmptyGroups, DropEmptyTextCase, FixUnpublishedTerm,
    LowercaseLocators,
};
pub use layouts::{FillEmptyLayouts, RemoveDuplicateLayouts};
pub use names::RemoveInstitutionInNames;
pub use terms::{RemoveTerms, RenameEtAlTerms};
pub use variables::{ReplaceOriginalVariables, StripVendorVariables};

use crate::error::{KnownMalformedShape, NormalizeError};
use crate::message::Message;
use crate::style::Style;
use csl_sanitizer_xml::{Element, Node};

/// A rewrite rule.
///
/// Rules must be `Send + Sync` so one catalog can serve a parallel batch.
pub trait Rule: Send + Sync {
    /// Stable kebab-case name, used in logs and checkpoints.
    fn name(&self) -> &'static str;

    /// Rewrite the style in place and describe every change.
    ///
    /// # Errors
    ///
    /// Returns `MalformedInput` when the style has a shape the rule cannot
    /// interpret. A missing target construct is not an error.
    fn apply(
        &self,
        style: &mut Style<'_>,
        ctx: &mut RuleContext,
    ) -> Result<Vec<Message>, NormalizeError>;
}

/// State shared by the rules of one pipeline run.
#[derive(Debug, Default)]
pub struct RuleContext {
    skipped: Vec<KnownMalformedShape>,
}

impl RuleContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a construct the rule had to skip.
    pub fn skip(&mut self, shape: KnownMalformedShape) {
        tracing::warn!(
            rule = shape.rule,
            locale = shape.locale.as_deref().unwrap_or("(default)"),
            element = %shape.element,
            "Skipping known malformed shape in {}",
            shape.context
        );
        self.skipped.push(shape);
    }

    pub fn skipped(&self) -> &[KnownMalformedShape] {
        &self.skipped
    }

    pub fn into_skipped(self) -> Vec<KnownMalformedShape> {
        self.skipped
    }
}

/// Variables that some style communities invent and the strict consumer
/// does not know.
pub const DEFAULT_VENDOR_VARIABLES: &[&str] = &["nationality", "container-title-zh", "locale"];

/// The full catalog in execution order.
///
/// The order goes from problems that stop parsing to problems that only
/// affect validity, and from common to uncommon.
pub fn catalog(vendor_variables: &[String]) -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(RemoveTerms::citation_range_delimiter()),
        Box::new(RenameEtAlTerms::space_variant()),
        Box::new(RenameEtAlTerms::localized_variants()),
        Box::new(RemoveTerms::large_long_ordinals()),
        Box::new(RemoveInstitutionInNames),
        Box::new(DropEmptyTextCase),
        Box::new(FixUnpublishedTerm),
        Box::new(LowercaseLocators),
        Box::new(ReplaceOriginalVariables),
        Box::new(StripVendorVariables::new(vendor_variables.to_vec())),
        Box::new(DropEmptyGroups),
        Box::new(DropEmptyElseBranches),
        Box::new(FillEmptyLayouts),
        Box::new(RemoveDuplicateLayouts),
    ]
}

/// An empty `<text value=""/>` that reuses the namespace prefix of `parent`.
pub(crate) fn empty_text_for(parent: &Element) -> Element {
    let name = match parent.name().split_once(':') {
        Some((prefix, _)) => format!("{}:text", prefix),
        None => "text".to_string(),
    };
    Element::new(name).with_attribute("value", "")
}

/// Visit every element below each macro, calling `f` with the macro name.
pub(crate) fn for_each_in_macros(
    style: &mut Style<'_>,
    f: &mut dyn FnMut(&str, &mut Element),
) {
    for mut macro_ in style.macros() {
        let name = macro_.name();
        for child in macro_.element().elements_mut() {
            child.visit_mut(&mut |element: &mut Element| f(&name, element));
        }
    }
}

/// Remove the children at `positions`, given in ascending order.
///
/// Works from the back so that earlier indices stay valid while indentation
/// is removed along with each child.
pub(crate) fn remove_children(parent: &mut Element, positions: &[usize]) {
    for &index in positions.iter().rev() {
        parent.remove_child(index);
    }
}

/// The children of `element` with leading and trailing whitespace dropped.
pub(crate) fn trimmed_children(element: &Element) -> Vec<Node> {
    let start = element
        .children
        .iter()
        .position(|node| !node.is_whitespace())
        .unwrap_or(element.children.len());
    let end = element
        .children
        .iter()
        .rposition(|node| !node.is_whitespace())
        .map_or(start, |index| index + 1);
    element.children[start..end].to_vec()
}
