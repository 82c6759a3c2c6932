//! Avatar Bot - a Telegram wizard that generates DiceBear avatars.
//!
//! A user walks through a short series of choices (style, image format,
//! background, optionally a color and a seed) and receives a rendered
//! avatar at the end.
//!
//! # Architecture
//!
//! - **Event Bus** ([`bus`]) - Queue between the chat channel and dispatch
//! - **Channels** ([`channels`]) - Platform integrations (Telegram)
//! - **Dispatcher** ([`dispatcher`]) - The wizard state machine
//! - **Session** ([`session`]) - Per-conversation wizard state
//! - **Render** ([`render`]) - DiceBear HTTP client
//! - **Gateway** ([`gateway`]) - Unified orchestration of all components
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use avatar_bot::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = load_config().await?.with_env();
//!     let gateway = GatewayBuilder::new().bot_config(config).build()?;
//!     gateway.run().await
//! }
//! ```
//!
//! # Features
//!
//! - `telegram` - Enable Telegram bot support via teloxide (default)

pub mod avatar;
pub mod bus;
pub mod channel;
pub mod channels;
pub mod color;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod gateway;
pub mod render;
pub mod session;
pub mod util;

/// Prelude module for convenient imports.
pub mod prelude {
    // Error types (centralized)
    pub use crate::error::{
        BotError, BusError, BusResult, ChannelError, ChannelResult, ConfigError, ConfigResult,
        RenderError, RenderResult, Result,
    };

    // Avatar model
    pub use crate::avatar::{AvatarRequest, Background, BackgroundKind, ImageFormat, Style};
    pub use crate::color::{HexColor, try_parse_color};

    // Bus
    pub use crate::bus::{BusStats, EventBus, InboundHandle};

    // Channel
    pub use crate::channel::{Channel, ChannelBase, ChannelState, ChannelStatus};
    #[cfg(feature = "telegram")]
    pub use crate::channels::{TelegramChannel, telegram::TelegramChannelConfig};

    // Config
    pub use crate::config::{
        BotConfig, ConfigIssue, DispatchConfig, IssueLevel, RenderConfig, TelegramConfig,
        config_path, init_config, load_config, load_config_from, save_config,
    };

    // Dispatch
    pub use crate::dispatcher::{CallbackData, Dispatcher};
    pub use crate::render::{DiceBearClient, RenderService};

    // Events
    pub use crate::events::{
        CallbackAction, ConversationId, InboundEvent, InlineKeyboard, KeyboardButton,
        MessageFormat, OutboundAction, TextMessage,
    };

    // Gateway
    pub use crate::gateway::{Gateway, GatewayBuilder, GatewayStatus};

    // Session
    pub use crate::session::{Conversation, SessionHandle, SessionStore, Step};
}
