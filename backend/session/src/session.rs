//! The conversation pipeline.
//!
//! A submission moves `Idle -> Sending -> (Success | TimeoutRetry | Failed)`.
//! Failures classified as retryable are resubmitted until the configured
//! retry budget is spent; every other failure becomes a bot error message.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use chatframe_bridge::{BridgeOutcome, IframeEvent, ParentLink};
use chatframe_client::{normalize_text_response, ConversationBackend, TextResponse};
use chatframe_core::{
    AltRenderings, ChatError, KeyValueStorage, MemoryStorage, MessageDraft, MessageKind, Submission,
    DIALOG_STATE_FAILED,
};
use chatframe_logging::{ConversationEvent, EventLogger};
use chatframe_store::{ChatMode, Mutation, SessionSnapshot, Store};
use chatframe_stream::StreamConnector;

use crate::playback::Playback;
use crate::response::bot_messages;

/// Delay before the initial utterance after the widget is first opened.
pub const INITIAL_UTTERANCE_DELAY: Duration = Duration::from_millis(500);

pub const SUBMIT_ERROR_TEXT: &str = "Sorry, I was unable to process your message. Try again later.";

/// Plays the send/receive cue. The presentation layer decides how.
pub trait SoundCue: Send + Sync {
    fn play(&self, url: &str);
}

/// Plays nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

impl SoundCue for Silent {
    fn play(&self, _url: &str) {}
}

/// How a submission ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The reply was shown as `messages` bot messages.
    Replied { messages: usize },
    /// The failure was shown in the transcript.
    Failed { error: String },
}

/// Drives one widget's conversation. Clones share everything.
#[derive(Clone)]
pub struct ConversationSession {
    store: Store,
    backend: Arc<dyn ConversationBackend>,
    parent: ParentLink,
    session_storage: Arc<dyn KeyValueStorage>,
    sound: Arc<dyn SoundCue>,
    streams: Option<Arc<dyn StreamConnector>>,
    playback: Arc<Mutex<Playback>>,
}

impl ConversationSession {
    pub fn new(store: Store, backend: Arc<dyn ConversationBackend>, parent: ParentLink) -> Self {
        Self {
            store,
            backend,
            parent,
            session_storage: Arc::new(MemoryStorage::new()),
            sound: Arc::new(Silent),
            streams: None,
            playback: Arc::new(Mutex::new(Playback::new())),
        }
    }

    /// Storage holding the transcript snapshot.
    pub fn with_session_storage(mut self, storage: Arc<dyn KeyValueStorage>) -> Self {
        self.session_storage = storage;
        self
    }

    pub fn with_sound(mut self, sound: Arc<dyn SoundCue>) -> Self {
        self.sound = sound;
        self
    }

    /// Connector used when streaming replies are enabled.
    pub fn with_stream_connector(mut self, connector: Arc<dyn StreamConnector>) -> Self {
        self.streams = Some(connector);
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn parent(&self) -> &ParentLink {
        &self.parent
    }

    // ── Transcript ───────────────────────────────────────────────────

    /// Restore the saved transcript; returns how many messages came back.
    pub async fn reload_messages(&self) -> Result<usize, ChatError> {
        let Some(snapshot) = SessionSnapshot::load(self.session_storage.as_ref()).await? else {
            return Ok(0);
        };
        let restored = snapshot.messages.len();
        self.store.commit(Mutation::RestoreMessages(snapshot.messages)).await;
        Ok(restored)
    }

    /// Restore the transcript, greeting the user when it is empty.
    pub async fn init_message_list(&self) -> Result<(), ChatError> {
        if let Err(e) = self.reload_messages().await {
            warn!(error = %e, "Ignoring unreadable transcript snapshot");
        }
        let (empty, initial_text) = self
            .store
            .read(|s| (s.messages.is_empty(), s.config.backend.initial_text.clone()))
            .await;
        if empty && !initial_text.is_empty() {
            self.store
                .commit(Mutation::push_message(MessageDraft::bot(initial_text)))
                .await;
        }
        Ok(())
    }

    async fn save_history(&self) {
        let (enabled, messages) = self
            .store
            .read(|s| (s.config.ui.save_history, s.messages.clone()))
            .await;
        if !enabled {
            return;
        }
        if let Err(e) = SessionSnapshot::new(messages).save(self.session_storage.as_ref()).await {
            warn!(error = %e, "Failed to save transcript snapshot");
        }
    }

    async fn push_error_message(&self, text: String) {
        self.store
            .commit(Mutation::push_message(
                MessageDraft::bot(text).with_dialog_state(DIALOG_STATE_FAILED),
            ))
            .await;
    }

    // ── Submit pipeline ──────────────────────────────────────────────

    /// Post a user message and show the reply.
    #[instrument(skip(self, submission), fields(kind = submission.kind.as_str()))]
    pub async fn submit(&self, submission: Submission) -> SubmitOutcome {
        let session_id = self.backend.session_id().await;
        EventLogger::log_event(
            &session_id,
            ConversationEvent::Submitted {
                kind: submission.kind.as_str().to_string(),
                text: submission.text.clone(),
            },
        );

        loop {
            let state = self.store.snapshot().await;
            let retrying = state.turn.is_post_text_retry;
            if !retrying {
                if state.is_sfx_on && !state.config.ui.message_sent_sfx.is_empty() {
                    self.sound.play(&state.config.ui.message_sent_sfx);
                }
                self.store.commit(Mutation::push_message(submission.to_draft())).await;
                self.store
                    .commit(Mutation::PushUtterance(submission.text.clone()))
                    .await;
            }

            match self.post_text(&submission).await {
                Ok(response) => {
                    let messages = self.show_reply(&response).await;
                    if retrying {
                        self.store.commit(Mutation::SetPostTextRetry(false)).await;
                    }
                    self.save_history().await;
                    return SubmitOutcome::Replied { messages };
                }
                Err(err) => {
                    let retry_on = state.config.backend.retry_on_post_text_timeout;
                    let max = state.config.backend.retry_count_post_text_timeout;
                    let spent = retrying && state.turn.retry_count_post_text_timeout >= max;
                    if err.is_retryable() && retry_on && !spent {
                        let attempt = state.turn.retry_count_post_text_timeout + 1;
                        warn!(attempt, error = %err, "Backend timed out; resubmitting");
                        EventLogger::log_event(&session_id, ConversationEvent::Retry { attempt });
                        self.store.commit(Mutation::SetPostTextRetry(true)).await;
                        continue;
                    }

                    self.store.commit(Mutation::SetPostTextRetry(false)).await;
                    error!(error = %err, "Submission failed");
                    let error = err.to_string();
                    EventLogger::log_event(
                        &session_id,
                        ConversationEvent::Error { error_msg: error.clone() },
                    );
                    let text = if state.config.ui.show_error_details {
                        format!("{SUBMIT_ERROR_TEXT} {error}")
                    } else {
                        SUBMIT_ERROR_TEXT.to_string()
                    };
                    self.push_error_message(text).await;
                    self.save_history().await;
                    return SubmitOutcome::Failed { error };
                }
            }
        }
    }

    /// Push the reply's bot messages and run the post-reply steps.
    async fn show_reply(&self, response: &TextResponse) -> usize {
        let state = self.store.snapshot().await;
        let mut pushed = 0;
        if state.chat_mode == ChatMode::Bot {
            let session_id = self.backend.session_id().await;
            for draft in bot_messages(response, &state.turn) {
                EventLogger::log_event(
                    &session_id,
                    ConversationEvent::BotReply {
                        text: draft.text.clone(),
                        dialog_state: draft.dialog_state.clone(),
                    },
                );
                self.store.commit(Mutation::push_message(draft)).await;
                pushed += 1;
            }
        }

        if state.is_sfx_on && !state.config.ui.message_received_sfx.is_empty() {
            self.sound.play(&state.config.ui.message_received_sfx);
        }
        self.notify_parent(IframeEvent::MessageReceived);
        if state.turn.is_fulfilled() {
            self.re_init().await;
        }
        pushed
    }

    /// One backend exchange, with the processing flag and streaming around it.
    async fn post_text(&self, submission: &Submission) -> Result<TextResponse, ChatError> {
        self.store.commit(Mutation::SetIsProcessing(true)).await;
        let streaming = self.begin_stream().await;

        let result = self.backend.post_text(submission).await;

        if streaming {
            self.store.commit(Mutation::SetStreamingActive(false)).await;
        }
        let result = match result {
            Ok(response) => {
                self.update_turn_state(&response).await;
                Ok(response)
            }
            Err(e) => Err(e),
        };
        self.store.commit(Mutation::SetIsProcessing(false)).await;
        result
    }

    /// Open the stream for this exchange when streaming is enabled.
    async fn begin_stream(&self) -> bool {
        let config = self.store.read(|s| s.config.backend.clone()).await;
        if !config.allow_streaming_responses {
            return false;
        }
        let Some(connector) = self.streams.as_ref() else {
            warn!("Streaming is enabled but no stream connector is configured");
            return false;
        };
        let session_id = self.backend.session_id().await;
        match connector.connect(&session_id).await {
            Ok(transport) => {
                self.store.commit(Mutation::SetStreamingActive(true)).await;
                self.playback.lock().await.start(
                    self.store.clone(),
                    transport,
                    Duration::from_millis(config.streaming_tick_ms),
                );
                true
            }
            Err(e) => {
                warn!(error = %e, "Streaming unavailable; waiting for the full reply");
                false
            }
        }
    }

    /// Absorb a reply into the turn state and relay it to the host page.
    pub async fn update_turn_state(&self, response: &TextResponse) {
        self.store
            .commit(Mutation::UpdateTurnState(response.to_turn_state()))
            .await;
        let (embedded, turn) = self
            .store
            .read(|s| (s.is_running_embedded, s.turn.clone()))
            .await;
        if embedded {
            let state = serde_json::to_value(turn).unwrap_or(Value::Null);
            self.notify_parent(IframeEvent::UpdateSessionState { state });
        }
    }

    /// After a fulfilled intent: greet again and reset attributes as configured.
    pub async fn re_init(&self) {
        let config = self.store.read(|s| s.config.clone()).await;
        if config.ui.push_initial_text_on_restart {
            let text = config.backend.initial_text.clone();
            self.store
                .commit(Mutation::push_message(
                    MessageDraft::bot(text.clone()).with_alts(AltRenderings::markdown(text)),
                ))
                .await;
        }
        if config.backend.re_init_session_attributes_on_restart {
            self.store
                .commit(Mutation::ResetSessionAttributes(
                    config.backend.session_attributes.clone(),
                ))
                .await;
        }
    }

    // ── Session lifecycle ────────────────────────────────────────────

    pub async fn delete_session(&self) -> Result<Value, ChatError> {
        self.store.commit(Mutation::SetIsProcessing(true)).await;
        let result = self.backend.delete_session().await;
        self.store.commit(Mutation::SetIsProcessing(false)).await;
        self.absorb_session_reply(result).await
    }

    pub async fn start_new_session(&self) -> Result<Value, ChatError> {
        self.store.commit(Mutation::SetIsProcessing(true)).await;
        let result = self.backend.start_session().await;
        self.store.commit(Mutation::SetIsProcessing(false)).await;
        self.absorb_session_reply(result).await
    }

    async fn absorb_session_reply(
        &self,
        result: Result<Value, ChatError>,
    ) -> Result<Value, ChatError> {
        let data = result.inspect_err(|e| error!(error = %e, "Session call failed"))?;
        if data.is_object() {
            match normalize_text_response(data.clone()) {
                Ok(response) => self.update_turn_state(&response).await,
                Err(e) => warn!(error = %e, "Session reply not absorbed"),
            }
        }
        Ok(data)
    }

    pub async fn set_session_attribute(&self, key: impl Into<String>, value: Value) {
        self.store
            .commit(Mutation::SetSessionAttribute {
                key: key.into(),
                value,
            })
            .await;
    }

    // ── UI and host page ─────────────────────────────────────────────

    pub async fn toggle_minimize_ui(&self) -> Result<BridgeOutcome, ChatError> {
        self.schedule_initial_utterance().await;
        self.store.commit(Mutation::ToggleIsUiMinimized).await;
        self.send_to_parent(&IframeEvent::ToggleMinimizeUi).await
    }

    pub async fn toggle_expand_ui(&self) -> Result<BridgeOutcome, ChatError> {
        self.schedule_initial_utterance().await;
        self.store.commit(Mutation::ToggleIsUiExpanded).await;
        self.send_to_parent(&IframeEvent::ToggleIsUiExpanded).await
    }

    /// The first open from minimized sends the initial utterance shortly after.
    async fn schedule_initial_utterance(&self) {
        let (sent, minimized) = self
            .store
            .read(|s| (s.initial_utterance_sent, s.is_ui_minimized))
            .await;
        if sent || !minimized {
            return;
        }
        self.store.commit(Mutation::SetInitialUtteranceSent).await;
        let session = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(INITIAL_UTTERANCE_DELAY).await;
            session.send_initial_utterance().await;
        });
    }

    /// Submit the configured initial utterance, if any.
    pub async fn send_initial_utterance(&self) -> Option<SubmitOutcome> {
        let (utterance, as_button) = self
            .store
            .read(|s| {
                (
                    s.config.backend.initial_utterance.clone(),
                    s.config.ui.hide_button_message_bubble,
                )
            })
            .await;
        if utterance.is_empty() {
            return None;
        }
        let kind = if as_button { MessageKind::Button } else { MessageKind::Human };
        info!(kind = kind.as_str(), "Sending initial utterance");
        Some(self.submit(Submission::new(kind, utterance)).await)
    }

    pub async fn toggle_sfx(&self) {
        self.store.commit(Mutation::ToggleIsSfxOn).await;
    }

    /// Send to the host page and wait for its answer.
    pub async fn send_to_parent(&self, event: &IframeEvent) -> Result<BridgeOutcome, ChatError> {
        let (embedded, parent_origin) = self
            .store
            .read(|s| (s.is_running_embedded, s.config.ui.parent_origin.clone()))
            .await;
        self.parent.send(event, embedded, &parent_origin).await
    }

    /// Send to the host page without waiting.
    fn notify_parent(&self, event: IframeEvent) {
        let session = self.clone();
        tokio::spawn(async move {
            if let Err(e) = session.send_to_parent(&event).await {
                debug!(error = %e, "Host page notification failed");
            }
        });
    }
}
