//! Callback payload parsing.

use crate::avatar::{BackgroundKind, ImageFormat, Style};

/// Callback kind carrying a style choice.
pub const STYLE_KIND: &str = "style";
/// Callback kind carrying a format choice.
pub const FORMAT_KIND: &str = "format";
/// Callback kind carrying a background choice.
pub const BACKGROUND_KIND: &str = "bg";

/// A decoded `"<kind>:<value>"` button payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackData {
    /// `style:<slug>`
    Style(Style),
    /// `format:<slug>`
    Format(ImageFormat),
    /// `bg:<slug>`
    Background(BackgroundKind),
}

impl CallbackData {
    /// Decode a payload; unknown kinds or values yield `None`.
    #[must_use]
    pub fn parse(data: &str) -> Option<Self> {
        let (kind, value) = data.split_once(':')?;
        match kind {
            STYLE_KIND => Style::from_slug(value).map(Self::Style),
            FORMAT_KIND => ImageFormat::from_slug(value).map(Self::Format),
            BACKGROUND_KIND => BackgroundKind::from_slug(value).map(Self::Background),
            _ => None,
        }
    }

    /// Encode back into a payload.
    #[must_use]
    pub fn encode(self) -> String {
        match self {
            Self::Style(style) => format!("{STYLE_KIND}:{}", style.slug()),
            Self::Format(format) => format!("{FORMAT_KIND}:{}", format.slug()),
            Self::Background(bg) => format!("{BACKGROUND_KIND}:{}", bg.slug()),
        }
    }
}
