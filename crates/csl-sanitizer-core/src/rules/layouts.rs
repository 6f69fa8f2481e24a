/*
 * rules/layouts.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Rules for the <layout> elements of <bibliography> and <citation>.
 */

use super::{Rule, RuleContext, empty_text_for};
use crate::error::NormalizeError;
use crate::message::{Deviation, Message};
use crate::style::{SectionKind, Style};

/// Give a `<layout>` without rendering elements an empty `<text>`.
pub struct FillEmptyLayouts;

impl Rule for FillEmptyLayouts {
    fn name(&self) -> &'static str {
        "fill-empty-layouts"
    }

    fn apply(
        &self,
        style: &mut Style<'_>,
        _ctx: &mut RuleContext,
    ) -> Result<Vec<Message>, NormalizeError> {
        let mut messages = Vec::new();
        for kind in SectionKind::ALL {
            let Some(mut section) = style.section(kind, self.name())? else {
                continue;
            };
            for layout in section.layouts() {
                if layout.has_elements() {
                    continue;
                }
                let text = empty_text_for(layout);
                layout.push_element(text);
                messages.push(Message::new(
                    format!(
                        "Fill the empty `<layout>` with an empty `<text>` for {}.",
                        kind
                    ),
                    Deviation::CslSpec,
                ));
            }
        }
        Ok(messages)
    }
}

/// Keep only the last `<layout>` of each section.
///
/// CSL-M allows several layouts keyed by a `locale` attribute, tried in order
/// before the final default one. The strict dialect allows exactly one, so the
/// localized variants in front are dropped.
pub struct RemoveDuplicateLayouts;

impl Rule for RemoveDuplicateLayouts {
    fn name(&self) -> &'static str {
        "remove-duplicate-layouts"
    }

    fn apply(
        &self,
        style: &mut Style<'_>,
        _ctx: &mut RuleContext,
    ) -> Result<Vec<Message>, NormalizeError> {
        let mut messages = Vec::new();
        for kind in SectionKind::ALL {
            let Some(mut section) = style.section(kind, self.name())? else {
                continue;
            };
            loop {
                let positions = section.layout_positions();
                let [first, _, ..] = positions.as_slice() else {
                    break;
                };
                let first = *first;
                let element = section.element();
                let lang = element.children[first]
                    .as_element()
                    .and_then(|layout| layout.attribute("locale"))
                    .map(str::to_string)
                    .ok_or_else(|| {
                        NormalizeError::structure(
                            self.name(),
                            format!(
                                "<{}> has {} <layout> elements but the first one has no locale attribute",
                                kind,
                                positions.len()
                            ),
                        )
                    })?;
                element.remove_child(first);
                messages.push(Message::new(
                    format!("Removed the localized ({}) layout for {}.", lang, kind),
                    Deviation::CslM,
                ));
            }
        }
        Ok(messages)
    }
}
