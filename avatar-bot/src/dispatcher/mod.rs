//! Wizard state machine and event dispatcher.
//!
//! [`Dispatcher::handle_event`] is the single entry point for inbound events.
//! It advances the conversation's [`Step`] and returns the actions the
//! channel must perform, in order. The only I/O it does itself is the render
//! service download needed for file deliveries.
//!
//! ```text
//! /start ─▶ AwaitingStyle ─style─▶ AwaitingFormat ─format─▶ AwaitingBackground
//!                                                   │
//!                         bg:transparent ◀──────────┤
//!                          (send image)             └──▶ bg:solid ─▶ AwaitingColor
//!                                                                  │  ▲ invalid
//!                                                                  ▼──┘
//!                                                        AwaitingSeed ─text─▶ (send image)
//! ```

mod callback;
pub mod prompts;

pub use callback::CallbackData;

use crate::avatar::{AvatarRequest, Background, BackgroundKind, MAX_SEED_LEN};
use crate::color::try_parse_color;
use crate::error::Result;
use crate::events::{
    CallbackAction, ConversationId, InboundEvent, MessageFormat, OutboundAction, TextMessage,
};
use crate::render::RenderService;
use crate::session::{Conversation, SessionStore, Step};
use crate::util::generate_seed;
use prompts::{
    BACKGROUND_MENU_TEXT, COLOR_PROMPT, FORMAT_MENU_TEXT, RESTART_COMMAND, SEED_PROMPT,
    STYLE_MENU_TEXT, background_menu, format_menu, invalid_color_message, style_menu,
};
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info};

/// Drives the avatar wizard for every conversation.
#[derive(Clone)]
pub struct Dispatcher {
    sessions: Arc<SessionStore>,
    renderer: Arc<dyn RenderService>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("sessions", &self.sessions)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Create a dispatcher over an explicit store and render backend.
    pub fn new(sessions: Arc<SessionStore>, renderer: Arc<dyn RenderService>) -> Self {
        Self { sessions, renderer }
    }

    /// The session store this dispatcher mutates.
    #[must_use]
    pub const fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Handle one inbound event.
    ///
    /// Returns the actions to perform, in order. Callback events always
    /// start with an [`OutboundAction::AnswerCallback`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::BotError::Render`] when the image for a
    /// finished wizard cannot be produced. The conversation is then left at
    /// the step it was in, so the user can retry.
    pub async fn handle_event(&self, event: &InboundEvent) -> Result<Vec<OutboundAction>> {
        match event {
            InboundEvent::Text(msg) => self.handle_text(msg).await,
            InboundEvent::Callback(cb) => self.handle_callback(cb).await,
        }
    }

    /// Lock the live record for `id`, skipping records retired meanwhile.
    async fn lock(&self, id: ConversationId) -> OwnedMutexGuard<Conversation> {
        loop {
            let record = self.sessions.get_or_create(id).await.lock_owned().await;
            if !record.is_retired() {
                return record;
            }
        }
    }

    async fn restart(&self, id: ConversationId) -> Vec<OutboundAction> {
        let mut old = self.lock(id).await;
        let previous = old.step().name();
        self.sessions.delete(id, Some(&mut *old)).await;

        let mut record = self.lock(id).await;
        drop(old);
        record.advance(Step::AwaitingStyle);
        info!(conversation_id = id, previous, "wizard started");

        vec![OutboundAction::SendText {
            conversation_id: id,
            text: STYLE_MENU_TEXT.to_string(),
            format: MessageFormat::Plain,
            keyboard: Some(style_menu()),
        }]
    }

    async fn handle_text(&self, msg: &TextMessage) -> Result<Vec<OutboundAction>> {
        let id = msg.conversation_id;
        if msg.text.trim() == RESTART_COMMAND {
            return Ok(self.restart(id).await);
        }

        let mut record = self.lock(id).await;
        match record.step().clone() {
            Step::AwaitingColor { style, format } => match try_parse_color(&msg.text) {
                Some(color) => {
                    debug!(conversation_id = id, %color, "color accepted");
                    record.advance(Step::AwaitingSeed {
                        style,
                        format,
                        color,
                    });
                    Ok(vec![OutboundAction::html(id, SEED_PROMPT)])
                }
                None => {
                    debug!(conversation_id = id, "color rejected");
                    Ok(vec![OutboundAction::html(id, invalid_color_message())])
                }
            },
            Step::AwaitingSeed {
                style,
                format,
                color,
            } => {
                let seed = match msg.text.trim() {
                    "" => generate_seed(),
                    seed => seed.chars().take(MAX_SEED_LEN).collect(),
                };
                let request = AvatarRequest {
                    style,
                    format,
                    seed,
                    background: Background::Solid(color),
                };
                let delivery = self.deliver(id, &request).await?;
                self.sessions.delete(id, Some(&mut *record)).await;
                Ok(vec![delivery])
            }
            step => {
                debug!(conversation_id = id, step = step.name(), "text ignored");
                Ok(Vec::new())
            }
        }
    }

    async fn handle_callback(&self, cb: &CallbackAction) -> Result<Vec<OutboundAction>> {
        let id = cb.conversation_id;
        let mut actions = vec![OutboundAction::AnswerCallback {
            callback_id: cb.callback_id.clone(),
        }];

        let mut record = self.lock(id).await;
        let Some(data) = CallbackData::parse(&cb.data) else {
            debug!(conversation_id = id, data = %cb.data, "unknown callback ignored");
            return Ok(actions);
        };

        match (record.step().clone(), data) {
            (Step::AwaitingStyle, CallbackData::Style(style)) => {
                record.advance(Step::AwaitingFormat { style });
                actions.push(OutboundAction::EditMessageText {
                    conversation_id: id,
                    message_id: cb.message_id,
                    text: FORMAT_MENU_TEXT.to_string(),
                    keyboard: Some(format_menu()),
                });
            }
            (Step::AwaitingFormat { style }, CallbackData::Format(format)) => {
                record.advance(Step::AwaitingBackground { style, format });
                actions.push(OutboundAction::EditMessageText {
                    conversation_id: id,
                    message_id: cb.message_id,
                    text: BACKGROUND_MENU_TEXT.to_string(),
                    keyboard: Some(background_menu()),
                });
            }
            (
                Step::AwaitingBackground { style, format },
                CallbackData::Background(BackgroundKind::Transparent),
            ) => {
                let request = AvatarRequest {
                    style,
                    format,
                    seed: generate_seed(),
                    background: Background::Transparent,
                };
                let delivery = self.deliver(id, &request).await?;
                self.sessions.delete(id, Some(&mut *record)).await;
                actions.push(OutboundAction::ClearKeyboard {
                    conversation_id: id,
                    message_id: cb.message_id,
                });
                actions.push(delivery);
            }
            (
                Step::AwaitingBackground { style, format },
                CallbackData::Background(BackgroundKind::Solid),
            ) => {
                record.advance(Step::AwaitingColor { style, format });
                actions.push(OutboundAction::ClearKeyboard {
                    conversation_id: id,
                    message_id: cb.message_id,
                });
                actions.push(OutboundAction::html(id, COLOR_PROMPT));
            }
            (step, data) => {
                debug!(
                    conversation_id = id,
                    step = step.name(),
                    ?data,
                    "callback does not match step"
                );
            }
        }

        Ok(actions)
    }

    /// Build the final image delivery for a finished wizard.
    async fn deliver(&self, id: ConversationId, request: &AvatarRequest) -> Result<OutboundAction> {
        let caption = request.caption();

        let action = if request.format.is_photo() {
            let url = self.renderer.image_url(request)?;
            OutboundAction::SendPhoto {
                conversation_id: id,
                url: url.to_string(),
                caption,
            }
        } else {
            let bytes = self.renderer.fetch(request).await?;
            OutboundAction::SendDocument {
                conversation_id: id,
                file_name: request.file_name(),
                bytes,
                caption,
            }
        };

        info!(
            conversation_id = id,
            style = %request.style,
            format = %request.format,
            seed = %request.seed,
            "avatar ready"
        );
        Ok(action)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::avatar::{DEFAULT_RENDER_BASE_URL, ImageFormat, Style};
    use crate::error::{BotError, RenderError, RenderResult};
    use async_trait::async_trait;
    use reqwest::Url;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Render backend that records requests and can be told to fail.
    #[derive(Debug, Default)]
    pub(crate) struct StubRenderer {
        pub(crate) fail: AtomicBool,
        pub(crate) fetched: Mutex<Vec<AvatarRequest>>,
    }

    #[async_trait]
    impl RenderService for StubRenderer {
        fn image_url(&self, request: &AvatarRequest) -> RenderResult<Url> {
            request.url(DEFAULT_RENDER_BASE_URL)
        }

        async fn fetch(&self, request: &AvatarRequest) -> RenderResult<Vec<u8>> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(RenderError::Status(503));
            }
            self.fetched.lock().unwrap().push(request.clone());
            Ok(b"<svg/>".to_vec())
        }
    }

    fn setup() -> (Dispatcher, Arc<StubRenderer>) {
        let renderer = Arc::new(StubRenderer::default());
        let dispatcher = Dispatcher::new(
            Arc::new(SessionStore::new()),
            Arc::clone(&renderer) as Arc<dyn RenderService>,
        );
        (dispatcher, renderer)
    }

    async fn text(d: &Dispatcher, id: ConversationId, text: &str) -> Vec<OutboundAction> {
        d.handle_event(&InboundEvent::text(id, text)).await.unwrap()
    }

    async fn press(d: &Dispatcher, id: ConversationId, data: &str) -> Vec<OutboundAction> {
        d.handle_event(&InboundEvent::callback(id, 10, format!("cb-{data}"), data))
            .await
            .unwrap()
    }

    async fn step(d: &Dispatcher, id: ConversationId) -> Option<Step> {
        d.sessions().snapshot(id).await.map(|c| c.step().clone())
    }

    async fn reach_color_step(d: &Dispatcher, id: ConversationId, format: &str) {
        text(d, id, "/start").await;
        press(d, id, "style:bottts").await;
        press(d, id, &format!("format:{format}")).await;
        press(d, id, "bg:solid").await;
    }

    #[tokio::test]
    async fn test_start_shows_style_menu() {
        let (d, _) = setup();
        let actions = text(&d, 1, "/start").await;

        assert_eq!(actions.len(), 1);
        let OutboundAction::SendText { text, keyboard, .. } = &actions[0] else {
            panic!("expected send_text, got {actions:?}");
        };
        assert_eq!(text, STYLE_MENU_TEXT);
        assert_eq!(keyboard.as_ref().unwrap().callback_data().count(), 4);
        assert_eq!(step(&d, 1).await, Some(Step::AwaitingStyle));
    }

    #[tokio::test]
    async fn test_png_transparent_path_sends_photo() {
        let (d, renderer) = setup();
        text(&d, 1, "/start").await;

        let actions = press(&d, 1, "style:fun-emoji").await;
        assert_eq!(actions[0].kind(), "answer_callback");
        assert!(matches!(
            &actions[1],
            OutboundAction::EditMessageText { text, message_id: 10, .. } if text == FORMAT_MENU_TEXT
        ));

        let actions = press(&d, 1, "format:png").await;
        assert!(matches!(
            &actions[1],
            OutboundAction::EditMessageText { text, .. } if text == BACKGROUND_MENU_TEXT
        ));

        let actions = press(&d, 1, "bg:transparent").await;
        let kinds: Vec<_> = actions.iter().map(OutboundAction::kind).collect();
        assert_eq!(kinds, ["answer_callback", "clear_keyboard", "send_photo"]);

        let OutboundAction::SendPhoto { url, caption, .. } = &actions[2] else {
            unreachable!();
        };
        assert!(url.starts_with("https://api.dicebear.com/8.x/fun-emoji/png?seed="));
        assert!(!url.contains("backgroundColor"));
        let seed = url.rsplit('=').next().unwrap();
        assert_eq!(seed.len(), 6);
        assert!(caption.contains(seed));
        assert!(caption.contains("PNG"));

        assert!(!d.sessions().contains(1).await);
        assert!(renderer.fetched.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_svg_solid_path_sends_document() {
        let (d, renderer) = setup();
        reach_color_step(&d, 2, "svg").await;

        let actions = text(&d, 2, "qizil").await;
        assert_eq!(actions, vec![OutboundAction::html(2, SEED_PROMPT)]);
        assert_eq!(
            step(&d, 2).await.and_then(|s| match s {
                Step::AwaitingSeed { color, .. } => Some(color.to_string()),
                _ => None,
            }),
            Some("#FF0000".to_string())
        );

        let actions = text(&d, 2, "  abc123 ").await;
        assert_eq!(actions.len(), 1);
        let OutboundAction::SendDocument {
            file_name,
            bytes,
            caption,
            ..
        } = &actions[0]
        else {
            panic!("expected send_document, got {actions:?}");
        };
        assert_eq!(file_name, "avatar-abc123.svg");
        assert_eq!(bytes, b"<svg/>");
        assert!(caption.contains("bottts") && caption.contains("SVG") && caption.contains("abc123"));

        let fetched = renderer.fetched.lock().unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].background.color().unwrap().as_str(), "#FF0000");
        drop(fetched);

        assert!(!d.sessions().contains(2).await);
    }

    #[tokio::test]
    async fn test_png_solid_photo_carries_color() {
        let (d, _) = setup();
        reach_color_step(&d, 3, "png").await;
        text(&d, 3, "#34EB92").await;

        let actions = text(&d, 3, "me").await;
        let OutboundAction::SendPhoto { url, .. } = &actions[0] else {
            panic!("expected send_photo, got {actions:?}");
        };
        assert!(url.ends_with("/bottts/png?seed=me&backgroundColor=34eb92"));
    }

    #[tokio::test]
    async fn test_invalid_color_keeps_step() {
        let (d, _) = setup();
        reach_color_step(&d, 4, "svg").await;
        let before = step(&d, 4).await;

        let actions = text(&d, 4, "not a color").await;
        assert_eq!(actions, vec![OutboundAction::html(4, invalid_color_message())]);
        assert_eq!(step(&d, 4).await, before);

        let record = d.sessions().snapshot(4).await.unwrap();
        assert!(record.color_hex().is_none());
        assert!(matches!(record.step(), Step::AwaitingColor { .. }));
    }

    #[tokio::test]
    async fn test_restart_from_every_step() {
        let (d, _) = setup();
        let paths: [&[&str]; 5] = [
            &[],
            &["style:avataaars"],
            &["style:avataaars", "format:svg"],
            &["style:avataaars", "format:svg", "bg:solid"],
            &["style:avataaars", "format:svg", "bg:solid", "#000000"],
        ];

        for path in paths {
            text(&d, 5, "/start").await;
            for input in path {
                if input.contains(':') {
                    press(&d, 5, input).await;
                } else {
                    text(&d, 5, input).await;
                }
            }

            let actions = text(&d, 5, "/start").await;
            assert_eq!(actions.len(), 1);
            let record = d.sessions().snapshot(5).await.unwrap();
            assert_eq!(record.step(), &Step::AwaitingStyle);
            assert!(record.style().is_none());
            assert!(record.color_hex().is_none());
        }
        assert_eq!(d.sessions().len().await, 1);
    }

    #[tokio::test]
    async fn test_mismatched_callbacks_are_answered_and_ignored() {
        let (d, _) = setup();
        text(&d, 6, "/start").await;

        for data in ["format:png", "bg:solid", "style:unknown", "garbage", ""] {
            let actions = press(&d, 6, data).await;
            assert_eq!(
                actions,
                vec![OutboundAction::AnswerCallback {
                    callback_id: format!("cb-{data}")
                }]
            );
            assert_eq!(step(&d, 6).await, Some(Step::AwaitingStyle));
        }
    }

    #[tokio::test]
    async fn test_unmatched_text_is_ignored() {
        let (d, _) = setup();
        assert!(text(&d, 7, "hello").await.is_empty());
        assert_eq!(step(&d, 7).await, Some(Step::Start));

        text(&d, 7, "/start").await;
        assert!(text(&d, 7, "bottts").await.is_empty());
        assert_eq!(step(&d, 7).await, Some(Step::AwaitingStyle));
    }

    #[tokio::test]
    async fn test_render_failure_keeps_state() {
        let (d, renderer) = setup();
        reach_color_step(&d, 8, "svg").await;
        text(&d, 8, "oq").await;
        let before = step(&d, 8).await;

        renderer.fail.store(true, Ordering::SeqCst);
        let err = d
            .handle_event(&InboundEvent::text(8, "seed"))
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::Render(RenderError::Status(503))));
        assert_eq!(step(&d, 8).await, before);

        renderer.fail.store(false, Ordering::SeqCst);
        let actions = text(&d, 8, "seed").await;
        assert_eq!(actions[0].kind(), "send_document");
        assert!(!d.sessions().contains(8).await);
    }

    #[tokio::test]
    async fn test_transparent_render_failure_keeps_background_step() {
        let (d, renderer) = setup();
        text(&d, 9, "/start").await;
        press(&d, 9, "style:pixel-art").await;
        press(&d, 9, "format:svg").await;

        renderer.fail.store(true, Ordering::SeqCst);
        let result = d
            .handle_event(&InboundEvent::callback(9, 10, "cb", "bg:transparent"))
            .await;
        assert!(result.is_err());
        assert_eq!(
            step(&d, 9).await,
            Some(Step::AwaitingBackground {
                style: Style::PixelArt,
                format: ImageFormat::Svg
            })
        );
    }

    #[tokio::test]
    async fn test_svg_transparent_uses_generated_seed() {
        let (d, renderer) = setup();
        text(&d, 12, "/start").await;
        press(&d, 12, "style:avataaars").await;
        press(&d, 12, "format:svg").await;

        let actions = press(&d, 12, "bg:transparent").await;
        let kinds: Vec<_> = actions.iter().map(OutboundAction::kind).collect();
        assert_eq!(kinds, ["answer_callback", "clear_keyboard", "send_document"]);

        let fetched = renderer.fetched.lock().unwrap();
        assert_eq!(fetched.len(), 1);
        let seed = fetched[0].seed.clone();
        drop(fetched);
        assert_eq!(seed.len(), 6);

        let OutboundAction::SendDocument {
            file_name, caption, ..
        } = &actions[2]
        else {
            unreachable!();
        };
        assert_eq!(file_name, &format!("avatar-{seed}.svg"));
        assert!(caption.contains(&format!("<code>{seed}</code>")));
        assert!(!d.sessions().contains(12).await);
    }

    #[tokio::test]
    async fn test_long_seed_is_capped() {
        let (d, renderer) = setup();
        reach_color_step(&d, 13, "svg").await;
        text(&d, 13, "oq").await;

        let long = "x/".repeat(600);
        let actions = text(&d, 13, &long).await;
        let OutboundAction::SendDocument {
            file_name, caption, ..
        } = &actions[0]
        else {
            panic!("expected send_document, got {actions:?}");
        };

        let seed = renderer.fetched.lock().unwrap()[0].seed.clone();
        assert_eq!(seed.chars().count(), MAX_SEED_LEN);
        assert!(!file_name.contains('/'));
        assert!(caption.chars().count() < 1024);
    }

    #[tokio::test]
    async fn test_empty_seed_is_generated() {
        let (d, _) = setup();
        reach_color_step(&d, 10, "svg").await;
        text(&d, 10, "moviy").await;

        let actions = text(&d, 10, "   ").await;
        let OutboundAction::SendDocument { file_name, .. } = &actions[0] else {
            panic!("expected send_document, got {actions:?}");
        };
        assert_eq!(file_name.len(), "avatar-".len() + 6 + ".svg".len());
    }

    #[tokio::test]
    async fn test_restart_wins_over_pending_text() {
        let (d, _) = setup();
        reach_color_step(&d, 11, "png").await;

        let actions = text(&d, 11, " /start ").await;
        assert!(matches!(&actions[0], OutboundAction::SendText { text, .. } if text == STYLE_MENU_TEXT));
        assert_eq!(step(&d, 11).await, Some(Step::AwaitingStyle));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_interleaved_conversations_stay_isolated() {
        let (d, _) = setup();

        let run = |id: ConversationId, style: &'static str, color: &'static str| {
            let d = d.clone();
            tokio::spawn(async move {
                text(&d, id, "/start").await;
                tokio::task::yield_now().await;
                press(&d, id, style).await;
                tokio::task::yield_now().await;
                press(&d, id, "format:svg").await;
                tokio::task::yield_now().await;
                press(&d, id, "bg:solid").await;
                tokio::task::yield_now().await;
                text(&d, id, color).await;
                d.sessions().snapshot(id).await.unwrap()
            })
        };

        let a = run(100, "style:bottts", "qizil");
        let b = run(200, "style:avataaars", "#00ff00");
        let (a, b) = (a.await.unwrap(), b.await.unwrap());

        assert_eq!(a.style(), Some(Style::Bottts));
        assert_eq!(a.color_hex().unwrap().as_str(), "#FF0000");
        assert_eq!(b.style(), Some(Style::Avataaars));
        assert_eq!(b.color_hex().unwrap().as_str(), "#00ff00");
    }
}
