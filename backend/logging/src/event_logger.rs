//! Conversation Event Logger
//!
//! Structured records of each exchange (submission, bot reply, failure)
//! written through `tracing` under the `chat_events` target, so the JSON
//! file layer produces one NDJSON line per event.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::redact::redact_sensitive_data;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationEvent {
    Submitted {
        kind: String,
        text: String,
    },
    BotReply {
        text: String,
        dialog_state: String,
    },
    Retry {
        attempt: u32,
    },
    Error {
        error_msg: String,
    },
}

#[derive(Debug, Serialize)]
pub struct EventLogEntry {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub event: ConversationEvent,
}

pub struct EventLogger;

impl EventLogger {
    /// Redact the event's free text and emit it.
    pub fn log_event(session_id: &str, event: ConversationEvent) -> EventLogEntry {
        let event = match event {
            ConversationEvent::Submitted { kind, text } => ConversationEvent::Submitted {
                kind,
                text: redact_sensitive_data(&text),
            },
            ConversationEvent::BotReply { text, dialog_state } => ConversationEvent::BotReply {
                text: redact_sensitive_data(&text),
                dialog_state,
            },
            ConversationEvent::Error { error_msg } => ConversationEvent::Error {
                error_msg: redact_sensitive_data(&error_msg),
            },
            retry @ ConversationEvent::Retry { .. } => retry,
        };

        let entry = EventLogEntry {
            session_id: session_id.into(),
            timestamp: Utc::now(),
            event,
        };

        let json = serde_json::to_string(&entry).unwrap_or_default();
        info!(target: "chat_events", session_id = %entry.session_id, event = %json, "Conversation event");
        entry
    }
}
