use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::card::ResponseCard;

pub const DIALOG_STATE_FULFILLED: &str = "Fulfilled";
pub const DIALOG_STATE_FAILED: &str = "Failed";

/// Conversation state reported by the backend after each exchange,
/// plus the client-side processing flags that travel with it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationTurnState {
    #[serde(default)]
    pub dialog_state: String,
    #[serde(default)]
    pub intent_name: String,
    #[serde(default)]
    pub slots: Map<String, Value>,
    #[serde(default)]
    pub slot_to_elicit: String,
    #[serde(default)]
    pub session_attributes: Map<String, Value>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub message_format: String,
    #[serde(default)]
    pub input_transcript: String,
    #[serde(default)]
    pub response_card: Option<ResponseCard>,
    #[serde(default)]
    pub last_raw_response: Value,

    #[serde(default)]
    pub is_processing: bool,
    #[serde(default)]
    pub is_interrupting: bool,
    #[serde(default)]
    pub is_post_text_retry: bool,
    #[serde(default)]
    pub retry_count_post_text_timeout: u32,
}

impl ConversationTurnState {
    /// Replace every backend-reported field, keeping the client flags.
    pub fn absorb(&mut self, reported: ConversationTurnState) {
        *self = ConversationTurnState {
            is_processing: self.is_processing,
            is_interrupting: self.is_interrupting,
            is_post_text_retry: self.is_post_text_retry,
            retry_count_post_text_timeout: self.retry_count_post_text_timeout,
            ..reported
        };
    }

    pub fn is_fulfilled(&self) -> bool {
        self.dialog_state == DIALOG_STATE_FULFILLED
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absorb_keeps_processing_flags() {
        let mut state = ConversationTurnState {
            is_processing: true,
            retry_count_post_text_timeout: 2,
            intent_name: "Old".into(),
            ..Default::default()
        };
        state.absorb(ConversationTurnState {
            intent_name: "New".into(),
            dialog_state: "Fulfilled".into(),
            ..Default::default()
        });
        assert!(state.is_processing);
        assert_eq!(state.retry_count_post_text_timeout, 2);
        assert_eq!(state.intent_name, "New");
        assert!(state.is_fulfilled());
    }
}
