/*
 * rules/variables.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Rules for variables outside the CSL variable list.
 */

use super::{
    Rule, RuleContext, empty_text_for, for_each_in_macros, remove_children, trimmed_children,
};
use crate::error::NormalizeError;
use crate::message::{Deviation, Message};
use crate::style::Style;
use csl_sanitizer_xml::{Element, Node};

/// `original-*` variables that citeproc-js accepts but CSL does not define.
const NONSTANDARD_ORIGINAL_VARIABLES: &[&str] = &[
    "original-container-title",
    "original-container-title-short",
    "original-genre",
    "original-event-title",
    "original-event-place",
    "original-editor",
    "original-status",
    "original-issue",
    "original-jurisdiction",
];

/// Attributes of `<if>` and `<else-if>` that test variables.
const CONDITION_ATTRIBUTES: &[&str] = &["variable", "is-numeric", "is-uncertain-date"];

/// Replace non-standard `original-*` variables with the plain variable.
///
/// `variable` holds a space-separated list on conditions, so each token is
/// replaced separately.
pub struct ReplaceOriginalVariables;

impl Rule for ReplaceOriginalVariables {
    fn name(&self) -> &'static str {
        "replace-nonstandard-original-variables"
    }

    fn apply(
        &self,
        style: &mut Style<'_>,
        _ctx: &mut RuleContext,
    ) -> Result<Vec<Message>, NormalizeError> {
        let mut messages = Vec::new();
        for_each_in_macros(style, &mut |macro_name: &str, element: &mut Element| {
            let Some(value) = element.attribute("variable") else {
                return;
            };
            let mut changed = false;
            let tokens: Vec<String> = value
                .split_whitespace()
                .map(|token| {
                    if !NONSTANDARD_ORIGINAL_VARIABLES.contains(&token) {
                        return token.to_string();
                    }
                    let replacement = token.trim_start_matches("original-");
                    messages.push(Message::new(
                        format!(
                            "Replaced the variable `{}` with `{}` in a macro ({}).",
                            token, replacement, macro_name
                        ),
                        Deviation::CiteprocJs,
                    ));
                    changed = true;
                    replacement.to_string()
                })
                .collect();
            if changed {
                element.set_attribute("variable", tokens.join(" "));
            }
        });
        Ok(messages)
    }
}

/// Remove references to variables that a style community invented.
///
/// A rendering element that only names such variables is removed, and so is
/// a `<group>` left without children by that. In a condition, the variable is
/// never set, so the test is always false: depending on `match` the test is
/// dropped or the whole branch goes. The remaining branches are repaired so
/// the `<choose>` stays valid.
pub struct StripVendorVariables {
    variables: Vec<String>,
}

impl StripVendorVariables {
    pub fn new(variables: Vec<String>) -> Self {
        Self { variables }
    }
}

impl Rule for StripVendorVariables {
    fn name(&self) -> &'static str {
        "strip-vendor-variables"
    }

    fn apply(
        &self,
        style: &mut Style<'_>,
        _ctx: &mut RuleContext,
    ) -> Result<Vec<Message>, NormalizeError> {
        let mut messages = Vec::new();
        if self.variables.is_empty() {
            return Ok(messages);
        }
        for mut macro_ in style.macros() {
            let name = macro_.name();
            let mut stripper = Stripper {
                variables: &self.variables,
                macro_name: &name,
                messages: &mut messages,
            };
            stripper.children(macro_.element());
        }
        Ok(messages)
    }
}

/// What happens to an element after its subtree was stripped.
enum Outcome {
    Keep,
    Remove,
    /// Replace the element with these nodes.
    Unwrap(Vec<Node>),
}

/// What a condition still means once vendor variables are gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fate {
    Keep,
    /// The branch can never be taken.
    Remove,
    /// The branch is always taken.
    AlwaysTrue,
}

struct Stripper<'a> {
    variables: &'a [String],
    macro_name: &'a str,
    messages: &'a mut Vec<Message>,
}

impl Stripper<'_> {
    /// Split a variable list into standard and vendor tokens.
    fn partition<'v>(&self, value: &'v str) -> (Vec<&'v str>, Vec<&'v str>) {
        value
            .split_whitespace()
            .partition(|token| !self.variables.iter().any(|v| v == token))
    }

    fn report(&mut self, text: String) {
        self.report_as(text, Deviation::CommunityConvention);
    }

    fn report_as(&mut self, text: String, deviation: Deviation) {
        self.messages.push(Message::new(text, deviation));
    }

    fn children(&mut self, parent: &mut Element) {
        let mut edits = Vec::new();
        for (index, node) in parent.children.iter_mut().enumerate() {
            if let Node::Element(child) = node {
                match self.element(child) {
                    Outcome::Keep => {}
                    outcome => edits.push((index, outcome)),
                }
            }
        }
        for (index, outcome) in edits.into_iter().rev() {
            match outcome {
                Outcome::Keep => {}
                Outcome::Remove => {
                    parent.remove_child(index);
                }
                Outcome::Unwrap(nodes) => {
                    parent.replace_child(index, nodes);
                }
            }
        }
    }

    fn element(&mut self, element: &mut Element) -> Outcome {
        if element.is("choose") {
            return self.choose(element);
        }

        if let Some(value) = element.attribute("variable").map(str::to_string) {
            let (kept, vendor) = self.partition(&value);
            if !vendor.is_empty() {
                for variable in &vendor {
                    self.report(format!(
                        "Removed the reference to the non-standard variable `{}` in a macro ({}).",
                        variable, self.macro_name
                    ));
                }
                if kept.is_empty() {
                    return Outcome::Remove;
                }
                element.set_attribute("variable", kept.join(" "));
            }
        }

        let had_elements = element.has_elements();
        self.children(element);
        if element.is("group") && had_elements && !element.has_elements() {
            return Outcome::Remove;
        }
        Outcome::Keep
    }

    fn condition(&mut self, branch: &mut Element) -> Fate {
        let mode = branch.attribute("match").unwrap_or("all").to_string();
        let mut found = false;
        let mut fate = Fate::Keep;

        for attribute in CONDITION_ATTRIBUTES {
            let Some(value) = branch.attribute(attribute).map(str::to_string) else {
                continue;
            };
            let (kept, vendor) = self.partition(&value);
            if vendor.is_empty() {
                continue;
            }
            found = true;
            for variable in &vendor {
                self.report(format!(
                    "Removed the condition on the non-standard variable `{}` in a macro ({}).",
                    variable, self.macro_name
                ));
            }
            if mode == "all" {
                fate = Fate::Remove;
            } else if kept.is_empty() {
                branch.remove_attribute(attribute);
            } else {
                branch.set_attribute(*attribute, kept.join(" "));
            }
        }

        if fate == Fate::Remove || !found {
            return fate;
        }
        let has_tests = branch.attributes().iter().any(|a| a.name() != "match");
        match (has_tests, mode.as_str()) {
            (true, _) => Fate::Keep,
            // Nothing left to match: "any" of nothing is false, "none" is true
            (false, "any") => Fate::Remove,
            (false, _) => Fate::AlwaysTrue,
        }
    }

    fn choose(&mut self, choose: &mut Element) -> Outcome {
        let mut removals = Vec::new();
        let mut emptied = Vec::new();
        let mut decided = false;

        for index in 0..choose.children.len() {
            let Some(branch) = choose.children[index].as_element_mut() else {
                continue;
            };
            if !is_branch(branch) {
                continue;
            }
            // Branches after one that is always taken are unreachable
            if decided {
                self.report(format!(
                    "Removed the unreachable `<{}>` branch after a condition that always holds in a macro ({}).",
                    branch.local_name(),
                    self.macro_name
                ));
                removals.push(index);
                continue;
            }
            let fate = if branch.is("else") {
                Fate::Keep
            } else {
                self.condition(branch)
            };
            match fate {
                Fate::Remove => {
                    removals.push(index);
                    continue;
                }
                Fate::AlwaysTrue => {
                    decided = true;
                    branch.remove_attribute("match");
                    branch.set_local_name("else");
                }
                Fate::Keep => {}
            }
            let had_elements = branch.has_elements();
            self.children(branch);
            if had_elements && !branch.has_elements() {
                emptied.push(index);
            }
        }

        // Emptied branches at the end only guarded the stripped references
        let mut live: Vec<usize> = (0..choose.children.len())
            .filter(|index| {
                !removals.contains(index)
                    && choose.children[*index].as_element().is_some_and(is_branch)
            })
            .collect();
        while let Some(last) = live.pop() {
            if !emptied.contains(&last) {
                break;
            }
            removals.push(last);
        }

        // An emptied branch in front of others still decides which one renders
        for index in emptied {
            if removals.contains(&index) {
                continue;
            }
            if let Some(branch) = choose.children[index].as_element_mut() {
                let text = empty_text_for(branch);
                branch.push_element(text);
                let name = branch.local_name().to_string();
                self.report_as(
                    format!(
                        "Fill the `<{}>` branch left empty by removed variables with an empty `<text>` in a macro ({}).",
                        name, self.macro_name
                    ),
                    Deviation::CslSpec,
                );
            }
        }

        removals.sort_unstable();
        remove_children(choose, &removals);

        let Some(first) = choose.elements_mut().find(|e| is_branch(e)) else {
            return Outcome::Remove;
        };
        if first.is("else") {
            return Outcome::Unwrap(trimmed_children(first));
        }
        first.set_local_name("if");
        Outcome::Keep
    }
}

fn is_branch(element: &Element) -> bool {
    element.is("if") || element.is("else-if") || element.is("else")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::DEFAULT_VENDOR_VARIABLES;
    use crate::rules::testing::run_rule;

    fn vendor_rule() -> StripVendorVariables {
        StripVendorVariables::new(
            DEFAULT_VENDOR_VARIABLES
                .iter()
                .map(|v| v.to_string())
                .collect(),
        )
    }

    #[test]
    fn test_replace_original_variables() {
        let (output, messages) = run_rule(
            &ReplaceOriginalVariables,
            r#"<style><macro name="container"><choose><if variable="original-container-title original-date" match="any"><text variable="original-container-title"/></if></choose></macro></style>"#,
        );
        assert_eq!(
            messages,
            vec![
                "Replaced the variable `original-container-title` with `container-title` in a macro (container). [Discard citeproc-js extension]",
                "Replaced the variable `original-container-title` with `container-title` in a macro (container). [Discard citeproc-js extension]",
            ]
        );
        assert_eq!(
            output,
            r#"<style><macro name="container"><choose><if variable="container-title original-date" match="any"><text variable="container-title"/></if></choose></macro></style>"#
        );
    }

    #[test]
    fn test_standard_original_variables_untouched() {
        let source = r#"<style><macro name="a"><text variable="original-title"/><names variable="original-author"/></macro></style>"#;
        let (output, messages) = run_rule(&ReplaceOriginalVariables, source);
        assert!(messages.is_empty());
        assert_eq!(output, source);
    }

    #[test]
    fn test_remove_reference_and_emptied_group() {
        let (output, messages) = run_rule(
            &vendor_rule(),
            r#"<style><macro name="author"><group delimiter=" "><text variable="nationality"/></group><text variable="author"/></macro></style>"#,
        );
        assert_eq!(
            messages,
            vec![
                "Removed the reference to the non-standard variable `nationality` in a macro (author). [Discard community convention]"
            ]
        );
        assert_eq!(
            output,
            r#"<style><macro name="author"><text variable="author"/></macro></style>"#
        );
    }

    #[test]
    fn test_drop_vendor_token_from_list() {
        let (output, messages) = run_rule(
            &vendor_rule(),
            r#"<style><macro name="author"><names variable="author nationality"><name/></names></macro></style>"#,
        );
        assert_eq!(messages.len(), 1);
        assert_eq!(
            output,
            r#"<style><macro name="author"><names variable="author"><name/></names></macro></style>"#
        );
    }

    #[test]
    fn test_guarding_branch_removed_and_else_unwrapped() {
        let (output, messages) = run_rule(
            &vendor_rule(),
            r#"<style>
  <macro name="title">
    <choose>
      <if variable="container-title-zh">
        <text variable="container-title-zh"/>
      </if>
      <else>
        <text variable="container-title"/>
      </else>
    </choose>
  </macro>
</style>"#,
        );
        assert_eq!(
            messages,
            vec![
                "Removed the condition on the non-standard variable `container-title-zh` in a macro (title). [Discard community convention]"
            ]
        );
        assert_eq!(
            output,
            "<style>\n  <macro name=\"title\">\n    <text variable=\"container-title\"/>\n  </macro>\n</style>"
        );
    }

    #[test]
    fn test_else_if_promoted_when_head_removed() {
        let (output, messages) = run_rule(
            &vendor_rule(),
            r#"<style><macro name="m"><choose><if variable="locale"><text value="a"/></if><else-if type="book" variable="locale" match="any"><text value="b"/></else-if></choose></macro></style>"#,
        );
        assert_eq!(messages.len(), 2);
        assert_eq!(
            output,
            r#"<style><macro name="m"><choose><if type="book" match="any"><text value="b"/></if></choose></macro></style>"#
        );
    }

    #[test]
    fn test_only_branch_removed_takes_choose() {
        let (output, messages) = run_rule(
            &vendor_rule(),
            r#"<style><macro name="m"><text variable="title"/><choose><if variable="nationality"><text variable="nationality"/></if></choose></macro></style>"#,
        );
        assert_eq!(messages.len(), 1);
        assert_eq!(
            output,
            r#"<style><macro name="m"><text variable="title"/></macro></style>"#
        );
    }

    #[test]
    fn test_match_none_without_other_tests_becomes_else() {
        let (output, messages) = run_rule(
            &vendor_rule(),
            r#"<style><macro name="m"><choose><if variable="nationality" match="none"><text value="x"/></if><else><text value="y"/></else></choose></macro></style>"#,
        );
        assert_eq!(
            messages,
            vec![
                "Removed the condition on the non-standard variable `nationality` in a macro (m). [Discard community convention]",
                "Removed the unreachable `<else>` branch after a condition that always holds in a macro (m). [Discard community convention]",
            ]
        );
        assert_eq!(
            output,
            r#"<style><macro name="m"><text value="x"/></macro></style>"#
        );
    }

    #[test]
    fn test_unreachable_branches_are_reported() {
        let (output, messages) = run_rule(
            &vendor_rule(),
            r#"<style><macro name="m"><choose><if type="book"><text value="a"/></if><else-if variable="locale" match="none"><text value="b"/></else-if><else-if type="thesis"><text value="c"/></else-if><else><text value="d"/></else></choose></macro></style>"#,
        );
        assert_eq!(
            messages,
            vec![
                "Removed the condition on the non-standard variable `locale` in a macro (m). [Discard community convention]",
                "Removed the unreachable `<else-if>` branch after a condition that always holds in a macro (m). [Discard community convention]",
                "Removed the unreachable `<else>` branch after a condition that always holds in a macro (m). [Discard community convention]",
            ]
        );
        assert_eq!(
            output,
            r#"<style><macro name="m"><choose><if type="book"><text value="a"/></if><else><text value="b"/></else></choose></macro></style>"#
        );
    }

    #[test]
    fn test_emptied_branch_before_others_is_filled() {
        let (output, messages) = run_rule(
            &vendor_rule(),
            r#"<style><macro name="m"><choose><if type="book"><text variable="nationality"/></if><else><text variable="title"/></else></choose></macro></style>"#,
        );
        assert_eq!(
            messages,
            vec![
                "Removed the reference to the non-standard variable `nationality` in a macro (m). [Discard community convention]",
                "Fill the `<if>` branch left empty by removed variables with an empty `<text>` in a macro (m). [Follow CSL spec]",
            ]
        );
        assert_eq!(
            output,
            r#"<style><macro name="m"><choose><if type="book"><text value=""/></if><else><text variable="title"/></else></choose></macro></style>"#
        );
    }

    #[test]
    fn test_emptied_trailing_branches_are_removed() {
        let (output, messages) = run_rule(
            &vendor_rule(),
            r#"<style><macro name="m"><choose><if type="book"><text variable="title"/></if><else-if type="article"><text variable="nationality"/></else-if><else><group><text variable="locale"/></group></else></choose></macro></style>"#,
        );
        assert_eq!(messages.len(), 2);
        assert_eq!(
            output,
            r#"<style><macro name="m"><choose><if type="book"><text variable="title"/></if></choose></macro></style>"#
        );
    }

    #[test]
    fn test_choose_guarding_only_vendor_references_is_removed() {
        let (output, messages) = run_rule(
            &vendor_rule(),
            r#"<style><macro name="m"><text variable="title"/><choose><if type="book"><text variable="nationality"/></if></choose></macro></style>"#,
        );
        assert_eq!(messages.len(), 1);
        assert_eq!(
            output,
            r#"<style><macro name="m"><text variable="title"/></macro></style>"#
        );
    }

    #[test]
    fn test_standard_style_untouched() {
        let source = r#"<style><macro name="m"><choose><if variable="title"><text variable="title"/></if><else><text variable="locator"/></else></choose></macro></style>"#;
        let (output, messages) = run_rule(&vendor_rule(), source);
        assert!(messages.is_empty());
        assert_eq!(output, source);
    }
}
