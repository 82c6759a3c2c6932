//! Channel trait and base functionality for chat transports.
//!
//! A channel turns platform updates into [`InboundEvent`]s on the
//! [`EventBus`] and carries out the [`OutboundAction`]s the dispatcher
//! produces.
//!
//! [`InboundEvent`]: crate::events::InboundEvent

use crate::bus::EventBus;
use crate::error::ChannelResult;
use crate::events::OutboundAction;
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, error};

/// Channel state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    /// Channel is not started.
    #[default]
    Stopped,
    /// Channel is starting up.
    Starting,
    /// Channel is running and connected.
    Running,
    /// Channel is stopping.
    Stopping,
}

/// Channel status information.
#[derive(Debug, Clone)]
pub struct ChannelStatus {
    /// Channel name.
    pub name: String,
    /// Current state.
    pub state: ChannelState,
    /// Number of events received.
    pub events_received: u64,
    /// Number of actions performed.
    pub actions_sent: u64,
    /// Last error message, if any.
    pub last_error: Option<String>,
    /// Whether the channel is healthy.
    pub healthy: bool,
}

/// Trait for implementing chat transports.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Get the unique name of this channel.
    fn name(&self) -> &str;

    /// Connect and start publishing inbound events to `bus`.
    async fn start(&self, bus: &EventBus) -> ChannelResult<()>;

    /// Stop the channel and release resources.
    async fn stop(&self) -> ChannelResult<()>;

    /// Perform one outbound action.
    async fn execute(&self, action: &OutboundAction) -> ChannelResult<()>;

    /// Get the current channel status.
    async fn status(&self) -> ChannelStatus;
}

/// Shared state and counters most channels need.
pub struct ChannelBase {
    name: String,
    state: RwLock<ChannelState>,
    stats: RwLock<ChannelStats>,
}

impl std::fmt::Debug for ChannelBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelBase")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
struct ChannelStats {
    events_received: u64,
    actions_sent: u64,
    last_error: Option<String>,
}

impl ChannelBase {
    /// Create a new channel base.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(ChannelState::default()),
            stats: RwLock::new(ChannelStats::default()),
        }
    }

    /// Get the channel name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the current state.
    pub async fn state(&self) -> ChannelState {
        *self.state.read().await
    }

    /// Set the channel state.
    pub async fn set_state(&self, state: ChannelState) {
        *self.state.write().await = state;
        debug!(channel = %self.name, ?state, "channel state changed");
    }

    /// Record a received event.
    pub async fn record_received(&self) {
        self.stats.write().await.events_received += 1;
    }

    /// Record a performed action.
    pub async fn record_sent(&self) {
        self.stats.write().await.actions_sent += 1;
    }

    /// Record an error.
    pub async fn record_error(&self, error: impl Into<String>) {
        let error = error.into();
        error!(channel = %self.name, %error, "channel error");
        self.stats.write().await.last_error = Some(error);
    }

    /// Build status from current state and stats.
    pub async fn build_status(&self) -> ChannelStatus {
        let state = *self.state.read().await;
        let stats = self.stats.read().await;

        ChannelStatus {
            name: self.name.clone(),
            state,
            events_received: stats.events_received,
            actions_sent: stats.actions_sent,
            last_error: stats.last_error.clone(),
            healthy: state == ChannelState::Running && stats.last_error.is_none(),
        }
    }
}
