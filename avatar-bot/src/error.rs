//! Unified error types for avatar-bot.
//!
//! Every module reports failures through its own error enum; all of them
//! convert into [`BotError`], which is what the dispatcher and the gateway
//! hand back to their callers.

// ============================================================================
// Main Error Type
// ============================================================================

/// The main error type for avatar-bot operations.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    /// Event bus error.
    #[error("bus: {0}")]
    Bus(#[from] BusError),

    /// Channel (transport) error.
    #[error("channel: {0}")]
    Channel(#[from] ChannelError),

    /// Render service error.
    #[error("render: {0}")]
    Render(#[from] RenderError),

    /// Configuration error.
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    /// Serialization error.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// Task join error.
    #[error("task: {0}")]
    Task(String),
}

impl BotError {
    /// Create a config error from a string.
    #[inline]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(ConfigError::Invalid(msg.into()))
    }

    /// Whether this error came from the render service.
    #[must_use]
    pub const fn is_render(&self) -> bool {
        matches!(self, Self::Render(_))
    }
}

impl From<tokio::task::JoinError> for BotError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}

/// Result type alias for avatar-bot operations.
pub type Result<T> = std::result::Result<T, BotError>;

// ============================================================================
// Event Bus Errors
// ============================================================================

/// Error type for event bus operations.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// The inbound queue has been closed.
    #[error("inbound channel closed")]
    InboundClosed,

    /// A dispatch lane stopped accepting events.
    #[error("lane {0} closed")]
    LaneClosed(usize),
}

/// Result type for event bus operations.
pub type BusResult<T> = std::result::Result<T, BusError>;

// ============================================================================
// Channel Errors
// ============================================================================

/// Error type for channel operations.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Failed to start the channel.
    #[error("start failed: {0}")]
    StartFailed(String),

    /// Failed to send or edit a message.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Configuration error.
    #[error("config: {0}")]
    Config(String),

    /// Channel is not connected.
    #[error("not connected")]
    NotConnected,
}

impl ChannelError {
    /// Create a start failed error.
    #[inline]
    pub fn start(msg: impl Into<String>) -> Self {
        Self::StartFailed(msg.into())
    }

    /// Create a send failed error.
    #[inline]
    pub fn send(msg: impl Into<String>) -> Self {
        Self::SendFailed(msg.into())
    }
}

/// Result type for channel operations.
pub type ChannelResult<T> = std::result::Result<T, ChannelError>;

// ============================================================================
// Render Errors
// ============================================================================

/// Error type for render service calls.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The request URL could not be built.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// Network or protocol failure.
    #[error("request failed: {0}")]
    Request(String),

    /// The service answered with a non-success status.
    #[error("unexpected status {0}")]
    Status(u16),
}

impl From<reqwest::Error> for RenderError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::Status(status.as_u16()),
            None => Self::Request(err.to_string()),
        }
    }
}

/// Result type for render service calls.
pub type RenderResult<T> = std::result::Result<T, RenderError>;

// ============================================================================
// Configuration Errors
// ============================================================================

/// Error type for configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("parse: {0}")]
    Parse(#[from] serde_json::Error),

    /// Missing required field.
    #[error("missing: {0}")]
    Missing(String),

    /// Invalid value.
    #[error("invalid: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Create a missing field error.
    #[inline]
    pub fn missing(field: impl Into<String>) -> Self {
        Self::Missing(field.into())
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// ============================================================================
// Tests
// ============================================================================
