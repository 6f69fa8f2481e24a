/*
 * rules/cleanup.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Small fixes that make macros follow the CSL specification strictly.
 */

use super::{Rule, RuleContext, for_each_in_macros, remove_children};
use crate::error::NormalizeError;
use crate::message::{Deviation, Message};
use crate::style::Style;
use csl_sanitizer_xml::Element;

/// Positions of the `local_name` children that hold nothing but comments
/// and whitespace.
fn hollow_children(element: &Element, local_name: &str) -> Vec<usize> {
    element
        .child_positions(local_name)
        .into_iter()
        .filter(|&index| {
            element.children[index]
                .as_element()
                .is_some_and(Element::is_effectively_empty)
        })
        .collect()
}

/// Drop `text-case=""`, which is not one of the allowed values.
pub struct DropEmptyTextCase;

impl Rule for DropEmptyTextCase {
    fn name(&self) -> &'static str {
        "drop-empty-text-case-attrs"
    }

    fn apply(
        &self,
        style: &mut Style<'_>,
        _ctx: &mut RuleContext,
    ) -> Result<Vec<Message>, NormalizeError> {
        let mut messages = Vec::new();
        for_each_in_macros(style, &mut |macro_name: &str, element: &mut Element| {
            if element.attribute("text-case") == Some("") {
                element.remove_attribute("text-case");
                messages.push(Message::new(
                    format!(
                        "Dropped the empty text-case attribute in a macro ({}).",
                        macro_name
                    ),
                    Deviation::CslSpec,
                ));
            }
        });
        Ok(messages)
    }
}

/// Replace the deprecated CSL-M term `unpublished` with its literal value.
pub struct FixUnpublishedTerm;

impl Rule for FixUnpublishedTerm {
    fn name(&self) -> &'static str {
        "fix-deprecated-term-unpublished"
    }

    fn apply(
        &self,
        style: &mut Style<'_>,
        _ctx: &mut RuleContext,
    ) -> Result<Vec<Message>, NormalizeError> {
        let mut messages = Vec::new();
        for_each_in_macros(style, &mut |macro_name: &str, element: &mut Element| {
            if element.is("text") && element.attribute("term") == Some("unpublished") {
                element.remove_attribute("term");
                element.set_attribute("value", "Unpublished");
                messages.push(Message::new(
                    format!(
                        "Fix the deprecated term `unpublished` with the value `Unpublished` in a macro ({}).",
                        macro_name
                    ),
                    Deviation::CslMDeprecated,
                ));
            }
        });
        Ok(messages)
    }
}

/// Locator types are lowercase keywords.
pub struct LowercaseLocators;

impl Rule for LowercaseLocators {
    fn name(&self) -> &'static str {
        "lowercase-locator-attrs"
    }

    fn apply(
        &self,
        style: &mut Style<'_>,
        _ctx: &mut RuleContext,
    ) -> Result<Vec<Message>, NormalizeError> {
        let mut messages = Vec::new();
        for_each_in_macros(style, &mut |macro_name: &str, element: &mut Element| {
            let Some(locator) = element.attribute("locator").map(str::to_string) else {
                return;
            };
            let lowered = locator.to_lowercase();
            if lowered != locator {
                element.set_attribute("locator", lowered.clone());
                messages.push(Message::new(
                    format!(
                        "Lowercased the locator attribute ({} -> {}) in a macro ({}).",
                        locator, lowered, macro_name
                    ),
                    Deviation::CslSpec,
                ));
            }
        });
        Ok(messages)
    }
}

/// Drop `<group>` elements with nothing to render.
///
/// Works bottom-up, so a group that only held empty groups goes too.
pub struct DropEmptyGroups;

impl DropEmptyGroups {
    fn drop_in(element: &mut Element, macro_name: &str, messages: &mut Vec<Message>) {
        for child in element.elements_mut() {
            Self::drop_in(child, macro_name, messages);
        }
        let positions = hollow_children(element, "group");
        remove_children(element, &positions);
        for _ in &positions {
            messages.push(Message::new(
                format!("Dropped an empty `<group>` in a macro ({}).", macro_name),
                Deviation::CslSpec,
            ));
        }
    }
}

impl Rule for DropEmptyGroups {
    fn name(&self) -> &'static str {
        "drop-empty-groups"
    }

    fn apply(
        &self,
        style: &mut Style<'_>,
        _ctx: &mut RuleContext,
    ) -> Result<Vec<Message>, NormalizeError> {
        let mut messages = Vec::new();
        for mut macro_ in style.macros() {
            let name = macro_.name();
            Self::drop_in(macro_.element(), &name, &mut messages);
        }
        Ok(messages)
    }
}

/// Drop `<else>` branches with nothing to render.
pub struct DropEmptyElseBranches;

impl Rule for DropEmptyElseBranches {
    fn name(&self) -> &'static str {
        "drop-empty-else-branches"
    }

    fn apply(
        &self,
        style: &mut Style<'_>,
        _ctx: &mut RuleContext,
    ) -> Result<Vec<Message>, NormalizeError> {
        let mut messages = Vec::new();
        for_each_in_macros(style, &mut |macro_name: &str, element: &mut Element| {
            if !element.is("choose") {
                return;
            }
            let positions = hollow_children(element, "else");
            remove_children(element, &positions);
            for _ in &positions {
                messages.push(Message::new(
                    format!(
                        "Dropped the empty `<else>` branch in a macro ({}).",
                        macro_name
                    ),
                    Deviation::CslSpec,
                ));
            }
        });
        Ok(messages)
    }
}
