//! Channel implementations for messaging platforms.
//!
//! # Available Channels
//!
//! - [`telegram::TelegramChannel`] - Telegram bot (requires `telegram` feature)
//!
//! # Feature Flags
//!
//! - `telegram` - Enable Telegram support via teloxide

#[cfg(feature = "telegram")]
pub mod telegram;

#[cfg(feature = "telegram")]
pub use telegram::TelegramChannel;
