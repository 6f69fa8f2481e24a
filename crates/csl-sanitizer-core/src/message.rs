/*
 * message.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Change messages and their deviation categories.
 */

//! Change messages emitted by rules.

use std::fmt;

/// Why a construct was changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Deviation {
    /// Part of the CSL-M extension.
    CslM,
    /// Only understood by citeproc-js.
    CiteprocJs,
    /// An informal convention of a style community.
    CommunityConvention,
    /// Allowed by lenient processors but not by the CSL specification.
    CslSpec,
    /// Deprecated within CSL-M itself.
    CslMDeprecated,
}

impl fmt::Display for Deviation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Deviation::CslM => "Discard CSL-M extension",
            Deviation::CiteprocJs => "Discard citeproc-js extension",
            Deviation::CommunityConvention => "Discard community convention",
            Deviation::CslSpec => "Follow CSL spec",
            Deviation::CslMDeprecated => "Fix CSL-M deprecated extension",
        })
    }
}

/// One entry of the change log.
///
/// Displays as the text followed by the bracketed deviation category, e.g.
/// `Removed the localized (en) layout for bibliography. [Discard CSL-M extension]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub text: String,
    pub deviation: Deviation,
}

impl Message {
    pub fn new(text: impl Into<String>, deviation: Deviation) -> Self {
        Self {
            text: text.into(),
            deviation,
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.text, self.deviation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;

    #[test]
    fn test_message_display() {
        let message = Message::new(
            "Removed the localized (en) layout for bibliography.",
            Deviation::CslM,
        );
        assert_snapshot!(message, @"Removed the localized (en) layout for bibliography. [Discard CSL-M extension]");
    }

    #[test]
    fn test_deviation_categories() {
        let all = [
            Deviation::CslM,
            Deviation::CiteprocJs,
            Deviation::CommunityConvention,
            Deviation::CslSpec,
            Deviation::CslMDeprecated,
        ];
        let names: Vec<String> = all.iter().map(ToString::to_string).collect();
        assert_eq!(
            names,
            vec![
                "Discard CSL-M extension",
                "Discard citeproc-js extension",
                "Discard community convention",
                "Follow CSL spec",
                "Fix CSL-M deprecated extension",
            ]
        );
    }
}
