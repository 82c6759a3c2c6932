//! Fixed prompt texts and menus.

use super::callback::CallbackData;
use crate::avatar::{BackgroundKind, ImageFormat, Style};
use crate::color::color_examples;
use crate::events::{InlineKeyboard, KeyboardButton};

/// Text that (re)starts the wizard.
pub const RESTART_COMMAND: &str = "/start";

/// Title of the style menu.
pub const STYLE_MENU_TEXT: &str = "Avatar uslubini tanlang:";
/// Title of the format menu.
pub const FORMAT_MENU_TEXT: &str = "Qaysi formatda yuboraylik?";
/// Title of the background menu.
pub const BACKGROUND_MENU_TEXT: &str = "Fon qanday bo'lsin?";
/// Color question (HTML).
pub const COLOR_PROMPT: &str =
    "🎨 HTML rang kodi yoki rang nomini kiriting (masalan: <code>#34eb92</code>, <code>qizil</code>):";
/// Seed question (HTML).
pub const SEED_PROMPT: &str = "🧬 Ixtiyoriy <b>seed</b> kiriting (harflar/sonlar):";
/// Notice sent when the image could not be produced.
pub const RENDER_FAILED_NOTICE: &str =
    "⚠️ Avatarni yaratib bo'lmadi. Iltimos, qaytadan urinib ko'ring.";

/// Number of color names listed when a color is rejected.
const COLOR_HINT_COUNT: usize = 5;

fn button(label: &str, data: CallbackData) -> KeyboardButton {
    KeyboardButton::callback(label, data.encode())
}

/// Style menu, two styles per row.
#[must_use]
pub fn style_menu() -> InlineKeyboard {
    InlineKeyboard::new(
        Style::ALL
            .chunks(2)
            .map(|row| {
                row.iter()
                    .map(|s| button(s.label(), CallbackData::Style(*s)))
                    .collect()
            })
            .collect(),
    )
}

/// Format menu.
#[must_use]
pub fn format_menu() -> InlineKeyboard {
    InlineKeyboard::new(vec![
        ImageFormat::ALL
            .iter()
            .map(|f| button(f.label(), CallbackData::Format(*f)))
            .collect(),
    ])
}

/// Background menu.
#[must_use]
pub fn background_menu() -> InlineKeyboard {
    InlineKeyboard::new(vec![
        BackgroundKind::ALL
            .iter()
            .map(|b| button(b.label(), CallbackData::Background(*b)))
            .collect(),
    ])
}

/// Error message for rejected color input (HTML).
#[must_use]
pub fn invalid_color_message() -> String {
    let examples = color_examples(COLOR_HINT_COUNT)
        .map(|name| format!("<code>{name}</code>"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "❌ Noto'g'ri HTML rang kodi yoki rang nomi.\n\
         Masalan: <code>#ff5733</code>, <code>qizil</code>, <code>yashil</code>\n\
         Yordam uchun: {examples} ..."
    )
}
