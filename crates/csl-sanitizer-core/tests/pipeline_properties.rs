/*
 * pipeline_properties.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Property tests for the standard pipeline on generated styles.
 *
 * Styles are assembled from the constructs the rule catalog rewrites
 * (vendor variables in references and conditions, deprecated terms,
 * CSL-M layouts and names extensions) mixed with ordinary CSL, nested
 * inside groups and choose blocks.
 */

use csl_sanitizer_core::Pipeline;
use csl_sanitizer_core::config::SanitizerConfig;
use csl_sanitizer_xml::parse_str;
use proptest::prelude::*;

const VARIABLES: &[&str] = &[
    "title",
    "author",
    "nationality",
    "container-title-zh",
    "locale",
    "original-container-title",
];

fn standard_pipeline() -> Pipeline {
    Pipeline::standard(&SanitizerConfig::default().vendor_variables)
}

fn variable() -> impl Strategy<Value = &'static str> {
    prop::sample::select(VARIABLES)
}

/// A rendering element without children.
fn leaf() -> BoxedStrategy<String> {
    prop_oneof![
        4 => variable().prop_map(|v| format!("<text variable=\"{}\"/>", v)),
        1 => Just("<text variable=\"title\" text-case=\"\"/>".to_string()),
        1 => Just("<text term=\"unpublished\"/>".to_string()),
        1 => Just("<label variable=\"locator\" locator=\"Page\"/>".to_string()),
        1 => Just("<text value=\"x\"/>".to_string()),
        1 => Just(
            "<names variable=\"author\"><name/><et-al term=\"space-et-al\"/><institution/></names>"
                .to_string()
        ),
        1 => variable().prop_map(|v| format!("<names variable=\"editor {}\"><name/></names>", v)),
        1 => Just("<group/>".to_string()),
        1 => Just("<group>\n  <!-- nothing -->\n</group>".to_string()),
    ]
    .boxed()
}

/// The test attributes of an `<if>` or `<else-if>`.
fn condition() -> BoxedStrategy<String> {
    prop_oneof![
        Just("type=\"book\"".to_string()),
        variable().prop_map(|v| format!("variable=\"{}\"", v)),
        variable().prop_map(|v| format!("variable=\"title {}\" match=\"any\"", v)),
        variable().prop_map(|v| format!("variable=\"{}\" match=\"none\"", v)),
        variable().prop_map(|v| format!("type=\"book\" variable=\"{}\" match=\"any\"", v)),
        variable().prop_map(|v| format!("is-numeric=\"{}\"", v)),
    ]
    .boxed()
}

fn body(children: Vec<String>) -> String {
    children.concat()
}

/// Rendering content, nested in groups and choose blocks.
fn content() -> BoxedStrategy<String> {
    leaf()
        .prop_recursive(3, 24, 3, |inner| {
            let children = prop::collection::vec(inner, 0..3);
            prop_oneof![
                children
                    .clone()
                    .prop_map(|c| format!("<group delimiter=\" \">{}</group>", body(c))),
                (
                    prop::collection::vec((condition(), children.clone()), 1..3),
                    prop::option::of(children),
                )
                    .prop_map(|(branches, otherwise)| {
                        let mut out = String::from("<choose>");
                        for (index, (condition, children)) in branches.into_iter().enumerate() {
                            let tag = if index == 0 { "if" } else { "else-if" };
                            out.push_str(&format!(
                                "<{} {}>{}</{}>",
                                tag,
                                condition,
                                body(children),
                                tag
                            ));
                        }
                        if let Some(children) = otherwise {
                            out.push_str(&format!("<else>{}</else>", body(children)));
                        }
                        out.push_str("</choose>");
                        out
                    }),
            ]
        })
        .boxed()
}

fn term() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("<term name=\"citation-range-delimiter\">–</term>"),
        Just("<term name=\"space-et-al\">et al.</term>"),
        Just("<term name=\"zh-et-al\">等</term>"),
        Just("<term name=\"long-ordinal-11\">eleventh</term>"),
        Just("<term name=\"and\">and</term>"),
    ]
    .prop_map(str::to_string)
}

fn locale() -> impl Strategy<Value = String> {
    prop::option::of(prop::collection::vec(term(), 1..4)).prop_map(|terms| match terms {
        Some(terms) => format!(
            "\n  <locale xml:lang=\"en\">\n    <terms>\n      {}\n    </terms>\n  </locale>",
            terms.join("\n      ")
        ),
        None => String::new(),
    })
}

/// One to three layouts; all but the last are localized.
fn layouts() -> impl Strategy<Value = String> {
    prop::collection::vec(any::<bool>(), 1..4).prop_map(|filled| {
        let last = filled.len() - 1;
        filled
            .iter()
            .enumerate()
            .map(|(index, filled)| {
                let locale = if index < last { " locale=\"zh\"" } else { "" };
                let content = if *filled { "<text macro=\"m0\"/>" } else { "" };
                format!("\n    <layout{}>{}</layout>", locale, content)
            })
            .collect()
    })
}

fn style() -> impl Strategy<Value = String> {
    (
        locale(),
        prop::collection::vec(prop::collection::vec(content(), 1..4), 1..3),
        layouts(),
        prop::option::of(layouts()),
    )
        .prop_map(|(locale, macros, citation, bibliography)| {
            let mut out = String::from(
                "<style xmlns=\"http://purl.org/net/xbiblio/csl\" version=\"1.0\">\n  <info>\n    <title>Generated</title>\n    <id>generated</id>\n    <updated>2024-01-01T00:00:00+00:00</updated>\n  </info>",
            );
            out.push_str(&locale);
            for (index, children) in macros.into_iter().enumerate() {
                out.push_str(&format!(
                    "\n  <macro name=\"m{}\">{}</macro>",
                    index,
                    body(children)
                ));
            }
            out.push_str(&format!("\n  <citation>{}\n  </citation>", citation));
            if let Some(bibliography) = bibliography {
                out.push_str(&format!("\n  <bibliography>{}\n  </bibliography>", bibliography));
            }
            out.push_str("\n</style>\n");
            out
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// A second run over the output changes nothing and reports nothing.
    #[test]
    fn test_pipeline_is_idempotent(source in style()) {
        let pipeline = standard_pipeline();
        let (once, _) = pipeline.normalize_str(&source).unwrap();
        let (twice, report) = pipeline.normalize_str(&once).unwrap();
        prop_assert!(report.is_clean(), "second run reported {:?}", report.messages);
        prop_assert_eq!(twice, once);
    }

    /// A style with nothing to fix comes back byte for byte.
    #[test]
    fn test_fixed_point_is_unchanged(source in style()) {
        let pipeline = standard_pipeline();
        let (once, _) = pipeline.normalize_str(&source).unwrap();
        let document = parse_str(&once).unwrap();
        prop_assert_eq!(document.to_xml_string(), once);
    }

    /// No vendor variable survives in the output and every section keeps
    /// exactly one layout.
    #[test]
    fn test_output_is_stripped(source in style()) {
        let pipeline = standard_pipeline();
        let (output, _) = pipeline.normalize_str(&source).unwrap();
        for vendor in SanitizerConfig::default().vendor_variables {
            prop_assert!(!output.contains(&format!("\"{}\"", vendor)), "{} left in {}", vendor, output);
            prop_assert!(!output.contains(&format!(" {}\"", vendor)), "{} left in {}", vendor, output);
        }
        prop_assert_eq!(output.matches("<layout").count(), if source.contains("<bibliography>") { 2 } else { 1 });
        prop_assert!(!output.contains("space-et-al"));
        prop_assert!(!output.contains("<institution"));
    }
}
