//! Telegram channel implementation using teloxide.
//!
//! Text messages and inline keyboard presses are normalized into
//! [`InboundEvent`]s and published on the bus. Outbound actions map one to
//! one onto Bot API calls.
//!
//! # Setup
//!
//! 1. Create a bot via [@BotFather](https://t.me/botfather)
//! 2. Get your bot token
//! 3. Put it in the config file or in `TELEGRAM_BOT_TOKEN`
//!
//! # Example
//!
//! ```rust,ignore
//! use avatar_bot::bus::EventBus;
//! use avatar_bot::channels::{TelegramChannel, telegram::TelegramChannelConfig};
//!
//! let bus = EventBus::new();
//! let telegram = TelegramChannel::new(TelegramChannelConfig::new("YOUR_BOT_TOKEN"));
//! telegram.start(&bus).await?;
//! ```

use crate::bus::EventBus;
use crate::channel::{Channel, ChannelBase, ChannelState, ChannelStatus};
use crate::config::BotConfig;
use crate::error::{ChannelError, ChannelResult};
use crate::events::{InboundEvent, InlineKeyboard, MessageFormat, OutboundAction};
use async_trait::async_trait;
use std::sync::Arc;
use teloxide::dispatching::ShutdownToken;
use teloxide::error_handlers::LoggingErrorHandler;
use teloxide::prelude::*;
use teloxide::types::{
    CallbackQueryId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, MessageId, ParseMode,
};
use teloxide::update_listeners::Polling;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

/// Telegram channel configuration.
#[derive(Debug, Clone)]
pub struct TelegramChannelConfig {
    /// Bot token from @BotFather.
    pub token: String,
    /// Skip updates that queued up while the bot was offline.
    pub drop_pending_updates: bool,
}

impl TelegramChannelConfig {
    /// Create a new Telegram channel config with the given token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            drop_pending_updates: true,
        }
    }

    /// Build from the bot configuration.
    pub fn from_config(config: &BotConfig) -> ChannelResult<Self> {
        let token = config
            .token()
            .map_err(|e| ChannelError::Config(e.to_string()))?;
        Ok(Self::new(token).drop_pending_updates(config.telegram.drop_pending_updates))
    }

    /// Set whether pending updates are dropped on start.
    #[must_use]
    pub const fn drop_pending_updates(mut self, enabled: bool) -> Self {
        self.drop_pending_updates = enabled;
        self
    }
}

/// Telegram channel implementation.
pub struct TelegramChannel {
    base: Arc<ChannelBase>,
    config: TelegramChannelConfig,
    bot: RwLock<Option<Bot>>,
    shutdown: RwLock<Option<ShutdownToken>>,
}

impl std::fmt::Debug for TelegramChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramChannel")
            .field("base", &self.base)
            .field("drop_pending_updates", &self.config.drop_pending_updates)
            .finish_non_exhaustive()
    }
}

impl TelegramChannel {
    /// Create a new Telegram channel with the given configuration.
    #[must_use]
    pub fn new(config: TelegramChannelConfig) -> Self {
        Self {
            base: Arc::new(ChannelBase::new("telegram")),
            config,
            bot: RwLock::new(None),
            shutdown: RwLock::new(None),
        }
    }

    /// Convert a keyboard into its Bot API form.
    fn to_markup(keyboard: &InlineKeyboard) -> InlineKeyboardMarkup {
        InlineKeyboardMarkup::new(keyboard.rows.iter().map(|row| {
            row.iter()
                .map(|b| InlineKeyboardButton::callback(b.label.clone(), b.data.clone()))
                .collect::<Vec<_>>()
        }))
    }

    async fn perform(bot: &Bot, action: &OutboundAction) -> Result<(), teloxide::RequestError> {
        match action {
            OutboundAction::SendText {
                conversation_id,
                text,
                format,
                keyboard,
            } => {
                let mut request = bot.send_message(ChatId(*conversation_id), text);
                if *format == MessageFormat::Html {
                    request = request.parse_mode(ParseMode::Html);
                }
                if let Some(keyboard) = keyboard {
                    request = request.reply_markup(Self::to_markup(keyboard));
                }
                request.await?;
            }
            OutboundAction::SendPhoto {
                conversation_id,
                url,
                caption,
            } => {
                let url = reqwest::Url::parse(url).map_err(|e| {
                    teloxide::RequestError::Io(std::io::Error::other(e.to_string()).into())
                })?;
                bot.send_photo(ChatId(*conversation_id), InputFile::url(url))
                    .caption(caption)
                    .parse_mode(ParseMode::Html)
                    .await?;
            }
            OutboundAction::SendDocument {
                conversation_id,
                file_name,
                bytes,
                caption,
            } => {
                let file = InputFile::memory(bytes.clone()).file_name(file_name.clone());
                bot.send_document(ChatId(*conversation_id), file)
                    .caption(caption)
                    .parse_mode(ParseMode::Html)
                    .await?;
            }
            OutboundAction::EditMessageText {
                conversation_id,
                message_id,
                text,
                keyboard,
            } => {
                let mut request =
                    bot.edit_message_text(ChatId(*conversation_id), MessageId(*message_id), text);
                if let Some(keyboard) = keyboard {
                    request = request.reply_markup(Self::to_markup(keyboard));
                }
                request.await?;
            }
            OutboundAction::ClearKeyboard {
                conversation_id,
                message_id,
            } => {
                bot.edit_message_reply_markup(ChatId(*conversation_id), MessageId(*message_id))
                    .await?;
            }
            OutboundAction::AnswerCallback { callback_id } => {
                bot.answer_callback_query(CallbackQueryId(callback_id.clone()))
                    .await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        self.base.name()
    }

    async fn start(&self, bus: &EventBus) -> ChannelResult<()> {
        self.base.set_state(ChannelState::Starting).await;

        let bot = Bot::new(&self.config.token);
        let me = bot
            .get_me()
            .await
            .map_err(|e| ChannelError::start(e.to_string()))?;
        info!(username = %me.username(), "telegram bot connected");

        *self.bot.write().await = Some(bot.clone());

        let inbound = bus.inbound_handle();
        let base = Arc::clone(&self.base);
        let message_handler = Update::filter_message().endpoint(move |msg: Message| {
            let inbound = inbound.clone();
            let base = Arc::clone(&base);

            async move {
                let Some(text) = msg.text() else {
                    return Ok::<(), teloxide::RequestError>(());
                };
                debug!(
                    chat_id = msg.chat.id.0,
                    username = ?msg.chat.username(),
                    "new message"
                );

                base.record_received().await;
                if let Err(e) = inbound.publish(InboundEvent::text(msg.chat.id.0, text)).await {
                    error!(error = %e, "failed to publish telegram message to bus");
                }
                Ok(())
            }
        });

        let inbound = bus.inbound_handle();
        let base = Arc::clone(&self.base);
        let callback_handler =
            Update::filter_callback_query().endpoint(move |bot: Bot, query: CallbackQuery| {
                let inbound = inbound.clone();
                let base = Arc::clone(&base);

                async move {
                    let (Some(data), Some(message)) = (query.data.as_deref(), &query.message)
                    else {
                        // Nothing to route it to; still clear the button spinner.
                        bot.answer_callback_query(query.id.clone()).await?;
                        return Ok(());
                    };

                    base.record_received().await;
                    let event = InboundEvent::callback(
                        message.chat().id.0,
                        message.id().0,
                        query.id.to_string(),
                        data,
                    );
                    if let Err(e) = inbound.publish(event).await {
                        error!(error = %e, "failed to publish telegram callback to bus");
                    }
                    Ok::<(), teloxide::RequestError>(())
                }
            });

        let handler = dptree::entry()
            .branch(message_handler)
            .branch(callback_handler);

        let mut dispatcher = Dispatcher::builder(bot.clone(), handler)
            .default_handler(|_| async {})
            .build();
        *self.shutdown.write().await = Some(dispatcher.shutdown_token());

        let mut polling = Polling::builder(bot);
        if self.config.drop_pending_updates {
            polling = polling.drop_pending_updates();
        }
        let listener = polling.build();

        tokio::spawn(async move {
            dispatcher
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("telegram update listener error"),
                )
                .await;
        });

        self.base.set_state(ChannelState::Running).await;
        info!("Telegram channel started");

        Ok(())
    }

    async fn stop(&self) -> ChannelResult<()> {
        self.base.set_state(ChannelState::Stopping).await;

        if let Some(token) = self.shutdown.write().await.take() {
            match token.shutdown() {
                Ok(done) => done.await,
                Err(e) => debug!(error = %e, "telegram dispatcher was not running"),
            }
        }
        *self.bot.write().await = None;

        self.base.set_state(ChannelState::Stopped).await;
        info!("Telegram channel stopped");

        Ok(())
    }

    async fn execute(&self, action: &OutboundAction) -> ChannelResult<()> {
        let bot = self
            .bot
            .read()
            .await
            .clone()
            .ok_or(ChannelError::NotConnected)?;

        if let Err(e) = Self::perform(&bot, action).await {
            self.base
                .record_error(format!("{}: {e}", action.kind()))
                .await;
            return Err(ChannelError::send(e.to_string()));
        }

        self.base.record_sent().await;
        Ok(())
    }

    async fn status(&self) -> ChannelStatus {
        self.base.build_status().await
    }
}
