//! Avatar options and render request construction.

use crate::color::HexColor;
use crate::error::{RenderError, RenderResult};
use crate::util::escape_html;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default render endpoint (DiceBear HTTP API, version 8).
pub const DEFAULT_RENDER_BASE_URL: &str = "https://api.dicebear.com/8.x";

/// Longest seed taken from user input, in characters.
///
/// Keeps the caption well under Telegram's 1024 character limit.
pub const MAX_SEED_LEN: usize = 64;

/// Avatar style offered in the first menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Style {
    /// `fun-emoji`
    FunEmoji,
    /// `avataaars`
    Avataaars,
    /// `bottts`
    Bottts,
    /// `pixel-art`
    PixelArt,
}

impl Style {
    /// All styles in menu order.
    pub const ALL: [Self; 4] = [Self::FunEmoji, Self::Avataaars, Self::Bottts, Self::PixelArt];

    /// Identifier used by the render service and in callback data.
    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::FunEmoji => "fun-emoji",
            Self::Avataaars => "avataaars",
            Self::Bottts => "bottts",
            Self::PixelArt => "pixel-art",
        }
    }

    /// Button label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::FunEmoji => "🎉 Fun Emoji",
            Self::Avataaars => "🖼️ Avataaars",
            Self::Bottts => "🤖 Bottts",
            Self::PixelArt => "🎨 Pixel Art",
        }
    }

    /// Look up a style by its slug.
    #[must_use]
    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.slug() == slug)
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Output image format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// Raster image, deliverable as a photo.
    Png,
    /// Vector image, delivered as a file.
    Svg,
}

impl ImageFormat {
    /// All formats in menu order.
    pub const ALL: [Self; 2] = [Self::Png, Self::Svg];

    /// Identifier used by the render service and in callback data.
    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Svg => "svg",
        }
    }

    /// Button label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Png => "🖼 PNG",
            Self::Svg => "🧾 SVG",
        }
    }

    /// Look up a format by its slug.
    #[must_use]
    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.slug() == slug)
    }

    /// Whether the platform can show this format as a photo from a URL.
    #[must_use]
    pub const fn is_photo(self) -> bool {
        matches!(self, Self::Png)
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Background choice offered in the third menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundKind {
    /// No background fill.
    Transparent,
    /// Solid fill with a user-chosen color.
    Solid,
}

impl BackgroundKind {
    /// All background kinds in menu order.
    pub const ALL: [Self; 2] = [Self::Transparent, Self::Solid];

    /// Identifier used in callback data.
    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::Transparent => "transparent",
            Self::Solid => "solid",
        }
    }

    /// Button label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Transparent => "🔳 Transparent",
            Self::Solid => "🔲 Solid",
        }
    }

    /// Look up a background kind by its slug.
    #[must_use]
    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.slug() == slug)
    }
}

/// Resolved background of a finished wizard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Background {
    /// No fill.
    Transparent,
    /// Solid fill.
    Solid(HexColor),
}

impl Background {
    /// The fill color, if solid.
    #[must_use]
    pub const fn color(&self) -> Option<&HexColor> {
        match self {
            Self::Transparent => None,
            Self::Solid(color) => Some(color),
        }
    }
}

/// Everything needed to render one avatar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvatarRequest {
    /// Avatar style.
    pub style: Style,
    /// Output format.
    pub format: ImageFormat,
    /// Generation seed.
    pub seed: String,
    /// Background fill.
    pub background: Background,
}

impl AvatarRequest {
    /// Build the render URL under `base_url`.
    ///
    /// The background color is only sent for PNG output; SVG output is
    /// always rendered with the service default background.
    pub fn url(&self, base_url: &str) -> RenderResult<Url> {
        let base = base_url.trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}/{}/{}", self.style, self.format))
            .map_err(|e| RenderError::InvalidUrl(e.to_string()))?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("seed", &self.seed);
            if self.format == ImageFormat::Png
                && let Some(color) = self.background.color()
            {
                query.append_pair("backgroundColor", color.digits());
            }
        }

        Ok(url)
    }

    /// Name of the attachment when delivered as a file.
    ///
    /// Seed characters other than letters, digits, `-` and `_` become `_`.
    #[must_use]
    pub fn file_name(&self) -> String {
        let stem: String = self
            .seed
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        format!("avatar-{stem}.{}", self.format)
    }

    /// HTML caption sent alongside the image.
    #[must_use]
    pub fn caption(&self) -> String {
        format!(
            "🎭 <b>{}</b> uslubi\n💾 <b>{}</b>\n🧬 Seed: <code>{}</code>",
            self.style,
            self.format.slug().to_uppercase(),
            escape_html(&self.seed)
        )
    }
}
