//! Gateway service for running the complete bot.
//!
//! The gateway is the unified entry point that orchestrates:
//! - Event bus
//! - The chat channel (Telegram)
//! - Dispatch lanes driving the wizard
//!
//! Inbound events are routed to one of `dispatch.workers` lanes by
//! conversation id. A lane handles its events strictly in order, so one
//! conversation never sees its events reordered, while different
//! conversations proceed in parallel.

use crate::bus::EventBus;
use crate::channel::{Channel, ChannelStatus};
use crate::config::BotConfig;
use crate::dispatcher::Dispatcher;
use crate::dispatcher::prompts::RENDER_FAILED_NOTICE;
use crate::error::{BotError, BusError, Result};
use crate::events::{ConversationId, InboundEvent, OutboundAction};
use crate::render::{DiceBearClient, RenderService};
use crate::session::SessionStore;

#[cfg(feature = "telegram")]
use crate::channels::{TelegramChannel, telegram::TelegramChannelConfig};

use std::future::{Future, pending};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// How long the dispatch loop waits on the bus before rechecking its flag.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Gateway service that runs the complete bot.
pub struct Gateway {
    config: BotConfig,
    bus: EventBus,
    dispatcher: Dispatcher,
    channel: Arc<dyn Channel>,
    running: Arc<RwLock<bool>>,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("config", &self.config)
            .field("bus", &self.bus)
            .field("channel", &self.channel.name())
            .finish_non_exhaustive()
    }
}

impl Gateway {
    /// Get a reference to the event bus.
    #[must_use]
    pub const fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Get a reference to the dispatcher.
    #[must_use]
    pub const fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Run until the process is killed or [`Gateway::stop`] is called.
    pub async fn run(&self) -> Result<()> {
        self.run_until(pending()).await
    }

    /// Run until `shutdown` resolves or [`Gateway::stop`] is called.
    ///
    /// Starts the channel, spawns the dispatch lanes and feeds them from the
    /// bus. On shutdown, events already routed to a lane are still handled
    /// before the channel is stopped.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        *self.running.write().await = true;
        info!("Gateway starting...");

        if let Err(e) = self.channel.start(&self.bus).await {
            *self.running.write().await = false;
            return Err(e.into());
        }

        let workers = self.config.dispatch.workers.max(1);
        let capacity = self.config.dispatch.queue_capacity.max(1);
        let (lanes, tasks): (Vec<_>, Vec<_>) = (0..workers)
            .map(|lane| {
                let (tx, rx) = mpsc::channel(capacity);
                let task = tokio::spawn(run_lane(
                    lane,
                    rx,
                    self.dispatcher.clone(),
                    Arc::clone(&self.channel),
                ));
                (tx, task)
            })
            .unzip();

        info!(workers, "Gateway started");
        let result = self.pump(&lanes, shutdown).await;

        info!("Gateway stopping...");
        drop(lanes);
        join_lanes(tasks).await;
        if let Err(e) = self.channel.stop().await {
            error!(error = %e, "failed to stop channel");
        }
        *self.running.write().await = false;

        info!("Gateway stopped");
        result
    }

    /// Move events from the bus to their lanes until told to stop.
    async fn pump<F>(&self, lanes: &[mpsc::Sender<InboundEvent>], shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        tokio::pin!(shutdown);

        while *self.running.read().await {
            tokio::select! {
                () = &mut shutdown => {
                    info!("shutdown requested");
                    break;
                }
                event = self.bus.consume_timeout(POLL_INTERVAL) => {
                    let Some(event) = event else { continue };
                    let lane = lane_for(event.conversation_id(), lanes.len());
                    if lanes[lane].send(event).await.is_err() {
                        error!(lane, "dispatch lane closed");
                        return Err(BusError::LaneClosed(lane).into());
                    }
                }
            }
        }

        Ok(())
    }

    /// Ask a running gateway to stop after the current poll.
    pub async fn stop(&self) {
        *self.running.write().await = false;
    }

    /// Check if the gateway is running.
    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Get gateway status.
    pub async fn status(&self) -> GatewayStatus {
        let bus_stats = self.bus.stats().await;

        GatewayStatus {
            running: *self.running.read().await,
            channel: self.channel.status().await.into(),
            active_sessions: self.dispatcher.sessions().len().await,
            total_inbound: bus_stats.published,
            total_dispatched: bus_stats.consumed,
        }
    }
}

/// Lane index for a conversation.
fn lane_for(id: ConversationId, lanes: usize) -> usize {
    let Ok(count) = i64::try_from(lanes.max(1)) else {
        return 0;
    };
    usize::try_from(id.rem_euclid(count)).unwrap_or(0)
}

async fn run_lane(
    lane: usize,
    mut rx: mpsc::Receiver<InboundEvent>,
    dispatcher: Dispatcher,
    channel: Arc<dyn Channel>,
) {
    while let Some(event) = rx.recv().await {
        if let Err(e) = process_event(&dispatcher, channel.as_ref(), &event).await {
            warn!(
                lane,
                conversation_id = event.conversation_id(),
                error = %e,
                "event handling failed"
            );
        }
    }
    debug!(lane, "dispatch lane finished");
}

async fn join_lanes(tasks: Vec<JoinHandle<()>>) {
    for task in tasks {
        if let Err(e) = task.await {
            error!(error = %BotError::from(e), "dispatch lane panicked");
        }
    }
}

/// Handle one event and perform the resulting actions in order.
///
/// When the dispatcher fails, the pending callback is still answered and a
/// render failure is reported to the user, so the chat client never hangs
/// on a spinner.
pub async fn process_event(
    dispatcher: &Dispatcher,
    channel: &dyn Channel,
    event: &InboundEvent,
) -> Result<()> {
    let actions = match dispatcher.handle_event(event).await {
        Ok(actions) => actions,
        Err(e) => {
            let mut fallback = Vec::new();
            if let Some(callback_id) = event.callback_id() {
                fallback.push(OutboundAction::AnswerCallback {
                    callback_id: callback_id.to_string(),
                });
            }
            if e.is_render() {
                fallback.push(OutboundAction::text(
                    event.conversation_id(),
                    RENDER_FAILED_NOTICE,
                ));
            }
            for action in &fallback {
                channel.execute(action).await?;
            }
            return Err(e);
        }
    };

    for action in &actions {
        channel.execute(action).await?;
    }
    Ok(())
}

/// Gateway status information.
#[derive(Debug, Clone, serde::Serialize)]
pub struct GatewayStatus {
    /// Whether the gateway is running.
    pub running: bool,
    /// Channel status.
    pub channel: ChannelStatusInfo,
    /// Conversations currently mid-wizard.
    pub active_sessions: usize,
    /// Total inbound events published.
    pub total_inbound: u64,
    /// Total inbound events routed to lanes.
    pub total_dispatched: u64,
}

/// Channel status info for gateway status.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ChannelStatusInfo {
    /// Channel name.
    pub name: String,
    /// Channel state.
    pub state: String,
    /// Events received.
    pub events_received: u64,
    /// Actions performed.
    pub actions_sent: u64,
    /// Whether the channel is healthy.
    pub healthy: bool,
}

impl From<ChannelStatus> for ChannelStatusInfo {
    fn from(s: ChannelStatus) -> Self {
        Self {
            name: s.name,
            state: format!("{:?}", s.state),
            events_received: s.events_received,
            actions_sent: s.actions_sent,
            healthy: s.healthy,
        }
    }
}

/// Builder for creating a Gateway.
#[derive(Default)]
pub struct GatewayBuilder {
    config: BotConfig,
    channel: Option<Arc<dyn Channel>>,
    renderer: Option<Arc<dyn RenderService>>,
    sessions: Option<Arc<SessionStore>>,
}

impl std::fmt::Debug for GatewayBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl GatewayBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bot configuration.
    #[must_use]
    pub fn bot_config(mut self, config: BotConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a specific channel instead of the configured Telegram one.
    #[must_use]
    pub fn channel(mut self, channel: Arc<dyn Channel>) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Use a specific render backend instead of the DiceBear client.
    #[must_use]
    pub fn renderer(mut self, renderer: Arc<dyn RenderService>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Share an existing session store.
    #[must_use]
    pub fn sessions(mut self, sessions: Arc<SessionStore>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    /// Build the gateway.
    ///
    /// # Errors
    ///
    /// Fails when no channel was given and none can be built from the
    /// configuration, or when the render client cannot be created.
    pub fn build(self) -> Result<Gateway> {
        let renderer: Arc<dyn RenderService> = match self.renderer {
            Some(renderer) => renderer,
            None => Arc::new(DiceBearClient::from_config(&self.config.render)?),
        };
        let channel = match self.channel {
            Some(channel) => channel,
            None => Self::default_channel(&self.config)?,
        };
        let sessions = self.sessions.unwrap_or_default();

        Ok(Gateway {
            bus: EventBus::with_capacity(self.config.dispatch.queue_capacity),
            dispatcher: Dispatcher::new(sessions, renderer),
            channel,
            config: self.config,
            running: Arc::new(RwLock::new(false)),
        })
    }

    #[cfg(feature = "telegram")]
    fn default_channel(config: &BotConfig) -> Result<Arc<dyn Channel>> {
        let telegram = TelegramChannelConfig::from_config(config)?;
        info!("Telegram channel enabled");
        Ok(Arc::new(TelegramChannel::new(telegram)))
    }

    #[cfg(not(feature = "telegram"))]
    fn default_channel(_config: &BotConfig) -> Result<Arc<dyn Channel>> {
        Err(BotError::config("no channel configured"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ChannelBase, ChannelState};
    use crate::dispatcher::prompts::STYLE_MENU_TEXT;
    use crate::dispatcher::tests::StubRenderer;
    use crate::error::{ChannelError, ChannelResult};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::oneshot;

    /// Channel that records every action instead of talking to a platform.
    #[derive(Debug)]
    struct RecordingChannel {
        base: ChannelBase,
        actions: Mutex<Vec<OutboundAction>>,
        fail: AtomicBool,
    }

    impl RecordingChannel {
        fn new() -> Self {
            Self {
                base: ChannelBase::new("recording"),
                actions: Mutex::new(Vec::new()),
                fail: AtomicBool::new(false),
            }
        }

        fn actions(&self) -> Vec<OutboundAction> {
            self.actions.lock().unwrap().clone()
        }

        async fn wait_for(&self, count: usize) -> Vec<OutboundAction> {
            tokio::time::timeout(Duration::from_secs(5), async {
                loop {
                    let actions = self.actions();
                    if actions.len() >= count {
                        return actions;
                    }
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            })
            .await
            .unwrap()
        }
    }

    #[async_trait]
    impl Channel for RecordingChannel {
        fn name(&self) -> &str {
            self.base.name()
        }

        async fn start(&self, _bus: &EventBus) -> ChannelResult<()> {
            self.base.set_state(ChannelState::Running).await;
            Ok(())
        }

        async fn stop(&self) -> ChannelResult<()> {
            self.base.set_state(ChannelState::Stopped).await;
            Ok(())
        }

        async fn execute(&self, action: &OutboundAction) -> ChannelResult<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(ChannelError::send(action.kind()));
            }
            self.actions.lock().unwrap().push(action.clone());
            self.base.record_sent().await;
            Ok(())
        }

        async fn status(&self) -> ChannelStatus {
            self.base.build_status().await
        }
    }

    fn setup(workers: usize) -> (Arc<Gateway>, Arc<RecordingChannel>, Arc<StubRenderer>) {
        let channel = Arc::new(RecordingChannel::new());
        let renderer = Arc::new(StubRenderer::default());
        let mut config = BotConfig::default();
        config.dispatch.workers = workers;

        let gateway = GatewayBuilder::new()
            .bot_config(config)
            .channel(Arc::clone(&channel) as Arc<dyn Channel>)
            .renderer(Arc::clone(&renderer) as Arc<dyn RenderService>)
            .build()
            .unwrap();
        (Arc::new(gateway), channel, renderer)
    }

    fn spawn(gateway: &Arc<Gateway>) -> (oneshot::Sender<()>, JoinHandle<Result<()>>) {
        let (tx, rx) = oneshot::channel::<()>();
        let gateway = Arc::clone(gateway);
        let task = tokio::spawn(async move {
            gateway
                .run_until(async {
                    let _ = rx.await;
                })
                .await
        });
        (tx, task)
    }

    #[test]
    fn test_lane_for_is_stable() {
        assert_eq!(lane_for(7, 4), lane_for(7, 4));
        assert_eq!(lane_for(8, 4), 0);
        assert!(lane_for(-1_001_234_567_890, 4) < 4);
        assert_eq!(lane_for(5, 0), 0);
    }

    #[tokio::test]
    async fn test_full_wizard_through_gateway() {
        let (gateway, channel, _) = setup(2);
        let (stop, task) = spawn(&gateway);

        let bus = gateway.bus();
        bus.publish(InboundEvent::text(42, "/start")).await.unwrap();
        bus.publish(InboundEvent::callback(42, 1, "a", "style:bottts"))
            .await
            .unwrap();
        bus.publish(InboundEvent::callback(42, 1, "b", "format:png"))
            .await
            .unwrap();
        bus.publish(InboundEvent::callback(42, 1, "c", "bg:transparent"))
            .await
            .unwrap();

        let actions = channel.wait_for(8).await;
        let kinds: Vec<_> = actions.iter().map(OutboundAction::kind).collect();
        assert_eq!(
            kinds,
            [
                "send_text",
                "answer_callback",
                "edit_message_text",
                "answer_callback",
                "edit_message_text",
                "answer_callback",
                "clear_keyboard",
                "send_photo",
            ]
        );
        assert!(matches!(&actions[0], OutboundAction::SendText { text, .. } if text == STYLE_MENU_TEXT));

        stop.send(()).unwrap();
        task.await.unwrap().unwrap();
        assert!(!gateway.is_running().await);
        assert!(!gateway.dispatcher().sessions().contains(42).await);
    }

    #[tokio::test]
    async fn test_render_failure_answers_and_notifies() {
        let (gateway, channel, renderer) = setup(1);
        renderer.fail.store(true, Ordering::SeqCst);
        let (stop, task) = spawn(&gateway);

        let bus = gateway.bus();
        bus.publish(InboundEvent::text(5, "/start")).await.unwrap();
        bus.publish(InboundEvent::callback(5, 1, "a", "style:avataaars"))
            .await
            .unwrap();
        bus.publish(InboundEvent::callback(5, 1, "b", "format:svg"))
            .await
            .unwrap();
        bus.publish(InboundEvent::callback(5, 1, "c", "bg:transparent"))
            .await
            .unwrap();

        let actions = channel.wait_for(7).await;
        assert_eq!(
            actions[5],
            OutboundAction::AnswerCallback {
                callback_id: "c".to_string()
            }
        );
        assert_eq!(actions[6], OutboundAction::text(5, RENDER_FAILED_NOTICE));
        assert!(gateway.dispatcher().sessions().contains(5).await);

        stop.send(()).unwrap();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_process_event_propagates_channel_error() {
        let (gateway, channel, _) = setup(1);
        channel.fail.store(true, Ordering::SeqCst);

        let err = process_event(
            gateway.dispatcher(),
            channel.as_ref(),
            &InboundEvent::text(1, "/start"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, BotError::Channel(ChannelError::SendFailed(_))));
        assert!(channel.actions().is_empty());

        // The transition already happened; only the delivery failed.
        assert!(gateway.dispatcher().sessions().contains(1).await);
    }

    #[tokio::test]
    async fn test_status_reports_counts() {
        let (gateway, channel, _) = setup(1);
        let (stop, task) = spawn(&gateway);

        gateway
            .bus()
            .publish(InboundEvent::text(9, "/start"))
            .await
            .unwrap();
        channel.wait_for(1).await;

        let status = gateway.status().await;
        assert!(status.running);
        assert_eq!(status.channel.name, "recording");
        assert_eq!(status.channel.state, "Running");
        assert_eq!(status.active_sessions, 1);
        assert_eq!(status.total_inbound, 1);

        stop.send(()).unwrap();
        task.await.unwrap().unwrap();
        assert_eq!(gateway.status().await.channel.state, "Stopped");
    }

    #[tokio::test]
    async fn test_stop_ends_run() {
        let (gateway, _, _) = setup(1);
        let runner = {
            let gateway = Arc::clone(&gateway);
            tokio::spawn(async move { gateway.run().await })
        };

        tokio::time::timeout(Duration::from_secs(1), async {
            while !gateway.is_running().await {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        gateway.stop().await;
        tokio::time::timeout(Duration::from_secs(3), runner)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(!gateway.is_running().await);
    }

    #[test]
    fn test_builder_without_token_fails() {
        let result = GatewayBuilder::new()
            .renderer(Arc::new(StubRenderer::default()) as Arc<dyn RenderService>)
            .build();
        assert!(result.is_err());
    }
}
