/*
 * rules/terms.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Rules for locale terms that only citeproc-js understands.
 */

use super::{Rule, RuleContext, for_each_in_macros};
use crate::error::NormalizeError;
use crate::message::{Deviation, Message};
use crate::style::{SectionKind, Style, Terms, TermsLookup};
use csl_sanitizer_xml::Element;

const ET_AL: &str = "et-al";

/// Look up the terms of every locale, skipping known malformed collections.
fn each_terms(
    style: &mut Style<'_>,
    ctx: &mut RuleContext,
    rule: &'static str,
    f: &mut dyn FnMut(Terms<'_>),
) -> Result<(), NormalizeError> {
    for locale in style.locales() {
        match locale.terms(rule)? {
            TermsLookup::Absent => {}
            TermsLookup::Malformed(shape) => ctx.skip(shape),
            TermsLookup::Present(terms) => f(terms),
        }
    }
    Ok(())
}

/// Remove terms by name, and the `<terms>` collection if it ends up bare.
///
/// The `<locale>` itself is kept even when nothing else is left in it.
pub struct RemoveTerms {
    name: &'static str,
    terms: &'static [&'static str],
}

impl RemoveTerms {
    /// `citation-range-delimiter`, an undocumented citeproc-js term.
    pub fn citation_range_delimiter() -> Self {
        Self {
            name: "remove-citation-range-delimiter-terms",
            terms: &["citation-range-delimiter"],
        }
    }

    /// `long-ordinal-11` and `long-ordinal-12`; CSL defines long ordinals
    /// only up to ten.
    pub fn large_long_ordinals() -> Self {
        Self {
            name: "remove-large-long-ordinal-terms",
            terms: &["long-ordinal-11", "long-ordinal-12"],
        }
    }
}

impl Rule for RemoveTerms {
    fn name(&self) -> &'static str {
        self.name
    }

    fn apply(
        &self,
        style: &mut Style<'_>,
        ctx: &mut RuleContext,
    ) -> Result<Vec<Message>, NormalizeError> {
        let mut messages = Vec::new();
        each_terms(style, ctx, self.name, &mut |mut terms: Terms<'_>| {
            let removed = terms.remove_named(self.terms);
            if removed.is_empty() {
                return;
            }
            let bare = terms.is_bare();
            if bare {
                terms.remove();
            }

            let last = removed.len() - 1;
            for (index, term) in removed.iter().enumerate() {
                let name = term.attribute("name").unwrap_or_default();
                let text = if bare && index == last {
                    format!(
                        "Removed the term {} ({}) and its wrapping tag.",
                        name,
                        term.text()
                    )
                } else {
                    format!("Removed the term {} ({}).", name, term.text())
                };
                messages.push(Message::new(text, Deviation::CiteprocJs));
            }
        })?;
        Ok(messages)
    }
}

/// Rename deprecated spellings of the `et-al` term.
///
/// Both the declarations in `<terms>` and the references from `<et-al
/// term="...">` are renamed so they keep agreeing with each other.
pub struct RenameEtAlTerms {
    name: &'static str,
    from: &'static [&'static str],
}

impl RenameEtAlTerms {
    /// `space-et-al`.
    pub fn space_variant() -> Self {
        Self {
            name: "replace-space-et-al-terms",
            from: &["space-et-al"],
        }
    }

    /// `en-et-al`, `zh-et-al` and `et-al-zh`.
    pub fn localized_variants() -> Self {
        Self {
            name: "replace-localized-et-al-terms",
            from: &["en-et-al", "zh-et-al", "et-al-zh"],
        }
    }

    fn rename_reference(&self, element: &mut Element, messages: &mut Vec<Message>) {
        if !element.is("et-al") {
            return;
        }
        let Some(term) = element.attribute("term").map(str::to_string) else {
            return;
        };
        if self.from.contains(&term.as_str()) {
            element.set_attribute("term", ET_AL);
            messages.push(Message::new(
                format!(
                    "Replaced the term `{}` referenced by `<et-al>` with `{}`.",
                    term, ET_AL
                ),
                Deviation::CiteprocJs,
            ));
        }
    }
}

impl Rule for RenameEtAlTerms {
    fn name(&self) -> &'static str {
        self.name
    }

    fn apply(
        &self,
        style: &mut Style<'_>,
        ctx: &mut RuleContext,
    ) -> Result<Vec<Message>, NormalizeError> {
        let mut messages = Vec::new();

        each_terms(style, ctx, self.name, &mut |mut terms: Terms<'_>| {
            for term in terms.terms_mut() {
                let Some(name) = term.attribute("name").map(str::to_string) else {
                    continue;
                };
                if self.from.contains(&name.as_str()) {
                    term.set_attribute("name", ET_AL);
                    messages.push(Message::new(
                        format!(
                            "Replaced the term name `{}` with `{}` ({}).",
                            name,
                            ET_AL,
                            term.text()
                        ),
                        Deviation::CiteprocJs,
                    ));
                }
            }
        })?;

        for_each_in_macros(style, &mut |_: &str, element: &mut Element| {
            self.rename_reference(element, &mut messages)
        });
        for kind in SectionKind::ALL {
            if let Some(mut section) = style.section(kind, self.name)? {
                section
                    .element()
                    .visit_mut(&mut |element: &mut Element| {
                        self.rename_reference(element, &mut messages)
                    });
            }
        }

        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::testing::run_rule;

    #[test]
    fn test_remove_sole_range_delimiter_takes_wrapping_terms() {
        let (output, messages) = run_rule(
            &RemoveTerms::citation_range_delimiter(),
            r#"<style>
  <locale xml:lang="zh">
    <terms>
      <term name="citation-range-delimiter">-</term>
    </terms>
  </locale>
</style>"#,
        );
        assert_eq!(
            messages,
            vec![
                "Removed the term citation-range-delimiter (-) and its wrapping tag. [Discard citeproc-js extension]"
            ]
        );
        assert_eq!(
            output,
            "<style>\n  <locale xml:lang=\"zh\">\n  </locale>\n</style>"
        );
    }

    #[test]
    fn test_remove_range_delimiter_keeps_other_terms() {
        let (output, messages) = run_rule(
            &RemoveTerms::citation_range_delimiter(),
            r#"<style>
  <locale>
    <terms>
      <term name="citation-range-delimiter">&#8211;</term>
      <term name="et-al">et al.</term>
    </terms>
  </locale>
</style>"#,
        );
        assert_eq!(
            messages,
            vec!["Removed the term citation-range-delimiter (–). [Discard citeproc-js extension]"]
        );
        assert_eq!(
            output,
            "<style>\n  <locale>\n    <terms>\n      <term name=\"et-al\">et al.</term>\n    </terms>\n  </locale>\n</style>"
        );
    }

    #[test]
    fn test_terms_with_comment_are_not_bare() {
        let (output, messages) = run_rule(
            &RemoveTerms::large_long_ordinals(),
            "<style><locale><terms><!-- ordinals --><term name=\"long-ordinal-11\">eleventh</term><term name=\"long-ordinal-12\">twelfth</term></terms></locale></style>",
        );
        assert_eq!(
            messages,
            vec![
                "Removed the term long-ordinal-11 (eleventh). [Discard citeproc-js extension]",
                "Removed the term long-ordinal-12 (twelfth). [Discard citeproc-js extension]",
            ]
        );
        assert_eq!(
            output,
            "<style><locale><terms><!-- ordinals --></terms></locale></style>"
        );
    }

    #[test]
    fn test_no_locale_means_no_change() {
        let source = "<style><macro name=\"a\"><text variable=\"title\"/></macro></style>";
        for rule in [
            RemoveTerms::citation_range_delimiter(),
            RemoveTerms::large_long_ordinals(),
        ] {
            let (output, messages) = run_rule(&rule, source);
            assert!(messages.is_empty());
            assert_eq!(output, source);
        }
        let (output, messages) = run_rule(&RenameEtAlTerms::space_variant(), source);
        assert!(messages.is_empty());
        assert_eq!(output, source);
    }

    #[test]
    fn test_malformed_terms_are_skipped() {
        let source = r#"<style><locale xml:lang="zh"><terms><date form="text"/><term name="citation-range-delimiter">-</term></terms></locale></style>"#;
        let mut doc = csl_sanitizer_xml::parse_str(source).unwrap();
        let mut style = Style::new(&mut doc).unwrap();
        let mut ctx = RuleContext::new();
        let messages = RemoveTerms::citation_range_delimiter()
            .apply(&mut style, &mut ctx)
            .unwrap();
        assert!(messages.is_empty());
        assert_eq!(ctx.skipped().len(), 1);
        assert_eq!(ctx.skipped()[0].locale.as_deref(), Some("zh"));
        assert_eq!(ctx.skipped()[0].element, "date");
        assert_eq!(doc.to_xml_string(), source);
    }

    #[test]
    fn test_rename_declaration_and_reference() {
        let (output, messages) = run_rule(
            &RenameEtAlTerms::space_variant(),
            r#"<style>
  <locale><terms><term name="space-et-al">et al.</term></terms></locale>
  <macro name="author"><names variable="author"><et-al term="space-et-al"/></names></macro>
</style>"#,
        );
        assert_eq!(
            messages,
            vec![
                "Replaced the term name `space-et-al` with `et-al` (et al.). [Discard citeproc-js extension]",
                "Replaced the term `space-et-al` referenced by `<et-al>` with `et-al`. [Discard citeproc-js extension]",
            ]
        );
        assert_eq!(
            output,
            r#"<style>
  <locale><terms><term name="et-al">et al.</term></terms></locale>
  <macro name="author"><names variable="author"><et-al term="et-al"/></names></macro>
</style>"#
        );
    }

    #[test]
    fn test_rename_localized_reference_in_layout() {
        let (output, messages) = run_rule(
            &RenameEtAlTerms::localized_variants(),
            r#"<style><citation><layout><names variable="author"><et-al term="zh-et-al"/></names></layout></citation></style>"#,
        );
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("Replaced the term `zh-et-al`"));
        assert!(output.contains(r#"<et-al term="et-al"/>"#));
    }
}
