//! State transitions.
//!
//! [`apply`] is the only function that changes a [`WidgetState`]. It is
//! pure: everything it needs, including message timestamps, travels in
//! the [`Mutation`].

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use chatframe_config::{merge, WidgetConfig};
use chatframe_core::{ChatError, ConversationTurnState, Message, MessageDraft};

use crate::state::{ChatMode, WidgetState, UTTERANCE_HISTORY_CAP};

#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Append a message; its id is the transcript length.
    PushMessage { draft: MessageDraft, at: DateTime<Utc> },
    PushUtterance(String),
    /// Shallow-merge a partial config tree. The parent origin is pinned.
    MergeConfig(Value),
    SetIsProcessing(bool),
    SetIsInterrupting(bool),
    SetIsRunningEmbedded(bool),
    /// `true` bumps the retry counter, `false` resets it.
    SetPostTextRetry(bool),
    UpdateTurnState(ConversationTurnState),
    ToggleIsUiMinimized,
    ToggleIsUiExpanded,
    SetInitialUtteranceSent,
    /// Drop the transcript and utterance history.
    Reset,
    /// Drop the transcript and the session attributes.
    ClearMessages,
    RestoreMessages(Vec<Message>),
    SetSessionAttribute { key: String, value: Value },
    ResetSessionAttributes(Map<String, Value>),
    ToggleIsSfxOn,
    SetIsBackProcessing(bool),
    SetChatMode(ChatMode),
    PushStreamChunk(String),
    TypeStreamChunk,
    SetStreamingActive(bool),
}

impl Mutation {
    /// A message push stamped with the current time.
    pub fn push_message(draft: MessageDraft) -> Self {
        Mutation::PushMessage { draft, at: Utc::now() }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Mutation::PushMessage { .. } => "pushMessage",
            Mutation::PushUtterance(_) => "pushUtterance",
            Mutation::MergeConfig(_) => "mergeConfig",
            Mutation::SetIsProcessing(_) => "setIsProcessing",
            Mutation::SetIsInterrupting(_) => "setIsInterrupting",
            Mutation::SetIsRunningEmbedded(_) => "setIsRunningEmbedded",
            Mutation::SetPostTextRetry(_) => "setPostTextRetry",
            Mutation::UpdateTurnState(_) => "updateTurnState",
            Mutation::ToggleIsUiMinimized => "toggleIsUiMinimized",
            Mutation::ToggleIsUiExpanded => "toggleIsUiExpanded",
            Mutation::SetInitialUtteranceSent => "setInitialUtteranceSent",
            Mutation::Reset => "reset",
            Mutation::ClearMessages => "clearMessages",
            Mutation::RestoreMessages(_) => "restoreMessages",
            Mutation::SetSessionAttribute { .. } => "setSessionAttribute",
            Mutation::ResetSessionAttributes(_) => "resetSessionAttributes",
            Mutation::ToggleIsSfxOn => "toggleIsSfxOn",
            Mutation::SetIsBackProcessing(_) => "setIsBackProcessing",
            Mutation::SetChatMode(_) => "setChatMode",
            Mutation::PushStreamChunk(_) => "pushStreamChunk",
            Mutation::TypeStreamChunk => "typeStreamChunk",
            Mutation::SetStreamingActive(_) => "setStreamingActive",
        }
    }

    /// Decode a mutation committed by name with an untyped payload.
    ///
    /// Boolean mutations reject anything that is not a JSON boolean.
    pub fn from_raw(name: &str, payload: &Value) -> Result<Self, ChatError> {
        let boolean = || {
            payload
                .as_bool()
                .ok_or_else(|| ChatError::Decode(format!("{name} status not boolean: {payload}")))
        };
        let string = || {
            payload
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| ChatError::Decode(format!("{name} expects a string: {payload}")))
        };

        let mutation = match name {
            "setIsProcessing" => Mutation::SetIsProcessing(boolean()?),
            "setIsInterrupting" => Mutation::SetIsInterrupting(boolean()?),
            "setIsRunningEmbedded" => Mutation::SetIsRunningEmbedded(boolean()?),
            "setPostTextRetry" => Mutation::SetPostTextRetry(boolean()?),
            "setIsBackProcessing" => Mutation::SetIsBackProcessing(boolean()?),
            "setStreamingActive" => Mutation::SetStreamingActive(boolean()?),
            "toggleIsUiMinimized" => Mutation::ToggleIsUiMinimized,
            "toggleIsUiExpanded" => Mutation::ToggleIsUiExpanded,
            "toggleIsSfxOn" => Mutation::ToggleIsSfxOn,
            "setInitialUtteranceSent" => Mutation::SetInitialUtteranceSent,
            "reset" => Mutation::Reset,
            "clearMessages" => Mutation::ClearMessages,
            "typeStreamChunk" => Mutation::TypeStreamChunk,
            "pushUtterance" => Mutation::PushUtterance(string()?),
            "pushStreamChunk" => Mutation::PushStreamChunk(string()?),
            "mergeConfig" if payload.is_object() => Mutation::MergeConfig(payload.clone()),
            "mergeConfig" => {
                return Err(ChatError::Decode(format!("mergeConfig expects an object: {payload}")))
            }
            "setChatMode" => Mutation::SetChatMode(
                serde_json::from_value(payload.clone())
                    .map_err(|e| ChatError::Decode(format!("setChatMode: {e}")))?,
            ),
            "setSessionAttribute" => {
                let key = payload
                    .get("key")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ChatError::Decode("setSessionAttribute expects a key".into()))?;
                Mutation::SetSessionAttribute {
                    key: key.to_string(),
                    value: payload.get("value").cloned().unwrap_or(Value::Null),
                }
            }
            other => return Err(ChatError::Decode(format!("unknown mutation: {other}"))),
        };
        Ok(mutation)
    }
}

/// Apply one mutation to the state.
pub fn apply(state: &mut WidgetState, mutation: Mutation) {
    match mutation {
        Mutation::PushMessage { draft, at } => {
            let id = state.messages.len();
            state.messages.push(draft.into_message(id, at));
        }
        Mutation::PushUtterance(utterance) => {
            if state.is_back_processing {
                state.is_back_processing = false;
                return;
            }
            state.utterances.push_back(utterance);
            while state.utterances.len() > UTTERANCE_HISTORY_CAP {
                state.utterances.pop_front();
            }
        }
        Mutation::MergeConfig(source) => merge_config(state, source),
        Mutation::SetIsProcessing(b) => state.turn.is_processing = b,
        Mutation::SetIsInterrupting(b) => state.turn.is_interrupting = b,
        Mutation::SetIsRunningEmbedded(b) => state.is_running_embedded = b,
        Mutation::SetPostTextRetry(b) => {
            state.turn.is_post_text_retry = b;
            if b {
                state.turn.retry_count_post_text_timeout += 1;
            } else {
                state.turn.retry_count_post_text_timeout = 0;
            }
        }
        Mutation::UpdateTurnState(reported) => state.turn.absorb(reported),
        Mutation::ToggleIsUiMinimized => state.is_ui_minimized = !state.is_ui_minimized,
        Mutation::ToggleIsUiExpanded => state.is_ui_expanded = !state.is_ui_expanded,
        Mutation::SetInitialUtteranceSent => state.initial_utterance_sent = true,
        Mutation::Reset => {
            state.messages.clear();
            state.utterances.clear();
        }
        Mutation::ClearMessages => {
            state.messages.clear();
            state.turn.session_attributes.clear();
        }
        Mutation::RestoreMessages(messages) => state.messages = messages,
        Mutation::SetSessionAttribute { key, value } => {
            state.turn.session_attributes.insert(key, value);
        }
        Mutation::ResetSessionAttributes(attributes) => state.turn.session_attributes = attributes,
        Mutation::ToggleIsSfxOn => state.is_sfx_on = !state.is_sfx_on,
        Mutation::SetIsBackProcessing(b) => state.is_back_processing = b,
        Mutation::SetChatMode(mode) => state.chat_mode = mode,
        Mutation::PushStreamChunk(chunk) => {
            if state.streaming.is_active {
                state.streaming.buffer.push(chunk);
            }
        }
        Mutation::TypeStreamChunk => {
            let stream = &mut state.streaming;
            if !stream.is_active {
                stream.clear();
            } else if stream.has_pending() {
                stream.text.push_str(&stream.buffer[stream.cursor]);
                stream.cursor += 1;
            }
        }
        Mutation::SetStreamingActive(active) => {
            state.streaming.is_active = active;
            if !active {
                state.streaming.clear();
            }
        }
    }
}

fn merge_config(state: &mut WidgetState, mut source: Value) {
    let pinned = state.config.ui.parent_origin.clone();
    let incoming = source
        .get("ui")
        .and_then(|ui| ui.get("parentOrigin"))
        .and_then(Value::as_str)
        .filter(|o| !o.is_empty())
        .map(str::to_string);

    let parent_origin = if !pinned.is_empty() {
        if let Some(incoming) = incoming.as_deref().filter(|o| *o != pinned) {
            warn!(ignored = %incoming, pinned = %pinned, "Ignoring parentOrigin in config");
        }
        pinned
    } else {
        incoming.unwrap_or_else(|| state.current_origin.clone())
    };

    if let Some(root) = source.as_object_mut() {
        let ui = root
            .entry("ui")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Some(ui) = ui.as_object_mut() {
            ui.insert("parentOrigin".into(), Value::String(parent_origin));
        }
    }

    let merged = merge(&state.config.to_value(), &source, false);
    match WidgetConfig::from_value(merged) {
        Ok(config) => {
            debug!(parent_origin = %config.ui.parent_origin, "Merged config");
            state.config = config;
        }
        Err(e) => warn!(error = %e, "Rejected config merge"),
    }
}
