/*
 * rules/names.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Rules for the <names> elements of macros.
 */

use super::{Rule, RuleContext, for_each_in_macros, remove_children};
use crate::error::NormalizeError;
use crate::message::{Deviation, Message};
use crate::style::Style;
use csl_sanitizer_xml::Element;

/// Remove the CSL-M `<institution>` from `<names>` in macros.
pub struct RemoveInstitutionInNames;

impl Rule for RemoveInstitutionInNames {
    fn name(&self) -> &'static str {
        "remove-institution-in-names"
    }

    fn apply(
        &self,
        style: &mut Style<'_>,
        _ctx: &mut RuleContext,
    ) -> Result<Vec<Message>, NormalizeError> {
        // Macros are visited in document order, one after another.
        let mut touched: Vec<String> = Vec::new();
        for_each_in_macros(style, &mut |macro_name: &str, element: &mut Element| {
            if !element.is("names") {
                return;
            }
            let positions = element.child_positions("institution");
            if positions.is_empty() {
                return;
            }
            remove_children(element, &positions);
            if touched.last().map(String::as_str) != Some(macro_name) {
                touched.push(macro_name.to_string());
            }
        });
        Ok(touched
            .into_iter()
            .map(|macro_name| {
                Message::new(
                    format!(
                        "Removed the institution in names of a macro ({}).",
                        macro_name
                    ),
                    Deviation::CslM,
                )
            })
            .collect())
    }
}
