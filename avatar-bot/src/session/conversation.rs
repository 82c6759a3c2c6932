//! The wizard record of a single conversation.

use crate::avatar::{BackgroundKind, ImageFormat, Style};
use crate::color::HexColor;
use crate::events::ConversationId;
use crate::util::timestamp_ms;
use serde::{Deserialize, Serialize};

/// Position of a conversation in the wizard.
///
/// Choices made so far travel inside the variants, so a step can never
/// exist without the data it depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    /// No wizard running yet.
    #[default]
    Start,
    /// Style menu shown.
    AwaitingStyle,
    /// Format menu shown.
    AwaitingFormat {
        /// Chosen style.
        style: Style,
    },
    /// Background menu shown.
    AwaitingBackground {
        /// Chosen style.
        style: Style,
        /// Chosen format.
        format: ImageFormat,
    },
    /// Solid background chosen; waiting for a color as text.
    AwaitingColor {
        /// Chosen style.
        style: Style,
        /// Chosen format.
        format: ImageFormat,
    },
    /// Color accepted; waiting for a seed as text.
    AwaitingSeed {
        /// Chosen style.
        style: Style,
        /// Chosen format.
        format: ImageFormat,
        /// Chosen color.
        color: HexColor,
    },
}

impl Step {
    /// Short name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::AwaitingStyle => "awaiting_style",
            Self::AwaitingFormat { .. } => "awaiting_format",
            Self::AwaitingBackground { .. } => "awaiting_background",
            Self::AwaitingColor { .. } => "awaiting_color",
            Self::AwaitingSeed { .. } => "awaiting_seed",
        }
    }
}

/// Wizard record of one conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    id: ConversationId,
    step: Step,
    created_at: u64,
    updated_at: u64,
    #[serde(skip)]
    retired: bool,
}

impl Conversation {
    /// Create a fresh record in [`Step::Start`].
    #[must_use]
    pub fn new(id: ConversationId) -> Self {
        let now = timestamp_ms();
        Self {
            id,
            step: Step::Start,
            created_at: now,
            updated_at: now,
            retired: false,
        }
    }

    /// Conversation id.
    #[must_use]
    pub const fn id(&self) -> ConversationId {
        self.id
    }

    /// Current step.
    #[must_use]
    pub const fn step(&self) -> &Step {
        &self.step
    }

    /// Move to another step.
    pub fn advance(&mut self, step: Step) {
        self.step = step;
        self.updated_at = timestamp_ms();
    }

    /// Creation time (Unix milliseconds).
    #[must_use]
    pub const fn created_at(&self) -> u64 {
        self.created_at
    }

    /// Last transition time (Unix milliseconds).
    #[must_use]
    pub const fn updated_at(&self) -> u64 {
        self.updated_at
    }

    /// Chosen style, once picked.
    #[must_use]
    pub const fn style(&self) -> Option<Style> {
        match &self.step {
            Step::Start | Step::AwaitingStyle => None,
            Step::AwaitingFormat { style }
            | Step::AwaitingBackground { style, .. }
            | Step::AwaitingColor { style, .. }
            | Step::AwaitingSeed { style, .. } => Some(*style),
        }
    }

    /// Chosen format, once picked.
    #[must_use]
    pub const fn format(&self) -> Option<ImageFormat> {
        match &self.step {
            Step::Start | Step::AwaitingStyle | Step::AwaitingFormat { .. } => None,
            Step::AwaitingBackground { format, .. }
            | Step::AwaitingColor { format, .. }
            | Step::AwaitingSeed { format, .. } => Some(*format),
        }
    }

    /// Chosen background kind, once picked.
    ///
    /// A transparent choice finishes the wizard immediately, so any live
    /// record with a background is solid.
    #[must_use]
    pub const fn background(&self) -> Option<BackgroundKind> {
        match &self.step {
            Step::AwaitingColor { .. } | Step::AwaitingSeed { .. } => Some(BackgroundKind::Solid),
            _ => None,
        }
    }

    /// Accepted color, once past the color step.
    #[must_use]
    pub const fn color_hex(&self) -> Option<&HexColor> {
        match &self.step {
            Step::AwaitingSeed { color, .. } => Some(color),
            _ => None,
        }
    }

    /// Whether the record was removed from its store.
    #[must_use]
    pub const fn is_retired(&self) -> bool {
        self.retired
    }

    pub(super) const fn retire(&mut self) {
        self.retired = true;
    }
}
