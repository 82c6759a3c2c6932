//! Conversation state.
//!
//! This module holds the per-conversation wizard record and the in-memory
//! store that keeps one record per active conversation.

mod conversation;
mod store;

pub use conversation::{Conversation, Step};
pub use store::{SessionHandle, SessionStore};
