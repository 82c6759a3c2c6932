//! Inbound events and outbound actions.
//!
//! Channels normalize whatever the chat platform delivers into
//! [`InboundEvent`]s; the dispatcher answers with an ordered list of
//! [`OutboundAction`]s that the channel carries out.

use serde::{Deserialize, Serialize};

/// Stable identifier of a conversation (a Telegram chat id).
pub type ConversationId = i64;

/// An event coming from a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    /// A plain text message.
    Text(TextMessage),
    /// An inline keyboard button press.
    Callback(CallbackAction),
}

impl InboundEvent {
    /// Create a text event.
    pub fn text(conversation_id: ConversationId, text: impl Into<String>) -> Self {
        Self::Text(TextMessage {
            conversation_id,
            text: text.into(),
        })
    }

    /// Create a callback event.
    pub fn callback(
        conversation_id: ConversationId,
        message_id: i32,
        callback_id: impl Into<String>,
        data: impl Into<String>,
    ) -> Self {
        Self::Callback(CallbackAction {
            conversation_id,
            message_id,
            callback_id: callback_id.into(),
            data: data.into(),
        })
    }

    /// The conversation this event belongs to.
    #[must_use]
    pub const fn conversation_id(&self) -> ConversationId {
        match self {
            Self::Text(msg) => msg.conversation_id,
            Self::Callback(cb) => cb.conversation_id,
        }
    }

    /// The callback id, if this event must be acknowledged.
    #[must_use]
    pub fn callback_id(&self) -> Option<&str> {
        match self {
            Self::Text(_) => None,
            Self::Callback(cb) => Some(&cb.callback_id),
        }
    }
}

/// Text typed by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextMessage {
    /// Conversation the message was sent in.
    pub conversation_id: ConversationId,
    /// Raw message text.
    pub text: String,
}

/// A button press on an inline keyboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackAction {
    /// Conversation the keyboard lives in.
    pub conversation_id: ConversationId,
    /// Message carrying the keyboard.
    pub message_id: i32,
    /// Platform id used to acknowledge the press.
    pub callback_id: String,
    /// Button payload, `"<kind>:<value>"`.
    pub data: String,
}

/// Message format hint for rendering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageFormat {
    /// Plain text, no formatting.
    #[default]
    Plain,
    /// HTML formatted text.
    Html,
}

/// A single inline keyboard button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyboardButton {
    /// Text shown on the button.
    pub label: String,
    /// Callback payload sent back when pressed.
    pub data: String,
}

impl KeyboardButton {
    /// Create a callback button.
    pub fn callback(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data: data.into(),
        }
    }
}

/// An inline keyboard, row by row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineKeyboard {
    /// Button rows.
    pub rows: Vec<Vec<KeyboardButton>>,
}

impl InlineKeyboard {
    /// Create a keyboard from rows of buttons.
    #[must_use]
    pub const fn new(rows: Vec<Vec<KeyboardButton>>) -> Self {
        Self { rows }
    }

    /// Iterate over the payloads of all buttons.
    pub fn callback_data(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().flatten().map(|b| b.data.as_str())
    }
}

/// Something the channel must do on behalf of the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum OutboundAction {
    /// Send a text message, optionally with a keyboard.
    SendText {
        /// Target conversation.
        conversation_id: ConversationId,
        /// Message body.
        text: String,
        /// How the body is formatted.
        format: MessageFormat,
        /// Keyboard attached to the message.
        keyboard: Option<InlineKeyboard>,
    },
    /// Send a photo referenced by URL.
    SendPhoto {
        /// Target conversation.
        conversation_id: ConversationId,
        /// Image URL the platform downloads itself.
        url: String,
        /// HTML caption.
        caption: String,
    },
    /// Send a file attachment.
    SendDocument {
        /// Target conversation.
        conversation_id: ConversationId,
        /// Attachment file name.
        file_name: String,
        /// File contents.
        bytes: Vec<u8>,
        /// HTML caption.
        caption: String,
    },
    /// Replace the text (and keyboard) of an earlier message.
    EditMessageText {
        /// Conversation holding the message.
        conversation_id: ConversationId,
        /// Message to edit.
        message_id: i32,
        /// New text.
        text: String,
        /// New keyboard.
        keyboard: Option<InlineKeyboard>,
    },
    /// Remove the inline keyboard from an earlier message.
    ClearKeyboard {
        /// Conversation holding the message.
        conversation_id: ConversationId,
        /// Message to edit.
        message_id: i32,
    },
    /// Acknowledge a button press.
    AnswerCallback {
        /// Callback id from the inbound event.
        callback_id: String,
    },
}

impl OutboundAction {
    /// Plain text message without keyboard.
    pub fn text(conversation_id: ConversationId, text: impl Into<String>) -> Self {
        Self::SendText {
            conversation_id,
            text: text.into(),
            format: MessageFormat::Plain,
            keyboard: None,
        }
    }

    /// HTML text message without keyboard.
    pub fn html(conversation_id: ConversationId, text: impl Into<String>) -> Self {
        Self::SendText {
            conversation_id,
            text: text.into(),
            format: MessageFormat::Html,
            keyboard: None,
        }
    }

    /// Short name of the action kind, for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::SendText { .. } => "send_text",
            Self::SendPhoto { .. } => "send_photo",
            Self::SendDocument { .. } => "send_document",
            Self::EditMessageText { .. } => "edit_message_text",
            Self::ClearKeyboard { .. } => "clear_keyboard",
            Self::AnswerCallback { .. } => "answer_callback",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbound_accessors() {
        let text = InboundEvent::text(42, "/start");
        assert_eq!(text.conversation_id(), 42);
        assert_eq!(text.callback_id(), None);

        let cb = InboundEvent::callback(7, 100, "cb-1", "style:bottts");
        assert_eq!(cb.conversation_id(), 7);
        assert_eq!(cb.callback_id(), Some("cb-1"));
    }

    #[test]
    fn test_outbound_serialization_is_tagged() {
        let action = OutboundAction::AnswerCallback {
            callback_id: "abc".to_string(),
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["action"], "answer_callback");
        assert_eq!(json["callback_id"], "abc");
    }

    #[test]
    fn test_keyboard_callback_data() {
        let keyboard = InlineKeyboard::new(vec![
            vec![KeyboardButton::callback("A", "x:a")],
            vec![
                KeyboardButton::callback("B", "x:b"),
                KeyboardButton::callback("C", "x:c"),
            ],
        ]);
        let data: Vec<_> = keyboard.callback_data().collect();
        assert_eq!(data, ["x:a", "x:b", "x:c"]);
    }
}
