//! Small shared helpers: paths, ids and text escaping.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// Length of an auto-generated seed.
pub const SEED_LEN: usize = 6;

/// Get the user's home directory, falling back to the current directory.
#[must_use]
pub fn home_dir() -> PathBuf {
    dirs_next::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Directory holding avatar-bot files (`~/.avatar-bot`).
#[must_use]
pub fn config_dir() -> PathBuf {
    home_dir().join(".avatar-bot")
}

/// Default configuration file path (`~/.avatar-bot/config.json`).
#[must_use]
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Current Unix time in milliseconds.
#[must_use]
#[allow(clippy::cast_possible_truncation)] // u64 millis lasts until year 584 million
pub fn timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}

/// Generate a short random hex seed.
#[must_use]
pub fn generate_seed() -> String {
    let mut seed = uuid::Uuid::new_v4().simple().to_string();
    seed.truncate(SEED_LEN);
    seed
}

/// Escape text for Telegram's HTML parse mode.
#[must_use]
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
