//! Background color resolution.
//!
//! Users answer the color prompt either with one of a fixed set of Uzbek
//! color names or with an HTML hex code such as `#34eb92`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Known color names and their codes. Names are stored lower-cased.
pub const NAMED_COLORS: &[(&str, &str)] = &[
    ("qizil", "#FF0000"),
    ("yashil", "#00FF00"),
    ("moviy", "#0000FF"),
    ("sariq", "#FFFF00"),
    ("qora", "#000000"),
    ("oq", "#FFFFFF"),
    ("pushti", "#FFC0CB"),
    ("kulrang", "#808080"),
    ("havorang", "#00FFFF"),
    ("to'q yashil", "#006400"),
];

/// A validated `#` + 6 hex digit color code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HexColor(String);

impl HexColor {
    /// The code including the leading `#`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The six hex digits without the leading `#`.
    #[must_use]
    pub fn digits(&self) -> &str {
        self.0.trim_start_matches('#')
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn hex_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^#[0-9a-f]{6}$").expect("valid regex"))
}

/// Resolve user input into a color code.
///
/// Input is trimmed and lower-cased first, so both names and hex digits
/// match case-insensitively. Named colors return their table code; hex
/// input is returned normalized to lower case.
#[must_use]
pub fn try_parse_color(input: &str) -> Option<HexColor> {
    let input = input.trim().to_lowercase();

    if let Some((_, hex)) = NAMED_COLORS.iter().find(|(name, _)| *name == input) {
        return Some(HexColor((*hex).to_string()));
    }

    hex_pattern()
        .is_match(&input)
        .then(|| HexColor(input))
}

/// The first `count` color names, for hints in prompts.
pub fn color_examples(count: usize) -> impl Iterator<Item = &'static str> {
    NAMED_COLORS.iter().take(count).map(|(name, _)| *name)
}
