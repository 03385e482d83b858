//! Request and response bodies of the text API.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use chatframe_core::{AppContext, ConversationTurnState, ResponseCard};

/// Body of `PUT /session` and `DELETE /session`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub session_id: String,
}

/// Body of `POST /text`. Feedback submissions carry the extra fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRequest {
    pub session_id: String,
    pub text: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

/// One entry of a multi-message reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyMessage {
    #[serde(rename = "type")]
    pub content_type: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default = "default_true", deserialize_with = "flag")]
    pub is_last_message_in_group: bool,
}

impl LegacyMessage {
    pub fn new(content_type: impl Into<String>, value: Value, is_last: bool) -> Self {
        Self {
            content_type: content_type.into(),
            value,
            is_last_message_in_group: is_last,
        }
    }

    /// Display text: strings as-is, structured payloads as JSON.
    pub fn text(&self) -> String {
        match &self.value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

/// `{"messages": [...]}`, carried JSON-encoded in the `message` field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    pub messages: Vec<LegacyMessage>,
}

impl MessageEnvelope {
    /// Whether `message` holds an encoded envelope rather than plain text.
    pub fn is_envelope(message: &str) -> bool {
        message.contains("{\"messages\":")
    }

    pub fn parse(message: &str) -> Option<Self> {
        serde_json::from_str(message).ok()
    }

    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{\"messages\":[]}"))
    }
}

/// Normalized (legacy-shaped) reply to `POST /text`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub dialog_state: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub intent_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub slots: Map<String, Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub slot_to_elicit: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub session_attributes: Map<String, Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message_format: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub input_transcript: String,
    #[serde(default)]
    pub response_card: Option<ResponseCard>,
    #[serde(default, rename = "responseCardLexV2")]
    pub response_card_lex_v2: Vec<ResponseCard>,
    /// Decoded `appContext` session attribute.
    #[serde(skip)]
    pub app_context: Option<AppContext>,
    /// The body exactly as the backend sent it.
    #[serde(skip)]
    pub raw: Value,
}

impl TextResponse {
    /// Turn-state view of this reply. The app-context card, when present,
    /// takes precedence over the reply's own card.
    pub fn to_turn_state(&self) -> ConversationTurnState {
        let response_card = self
            .app_context
            .as_ref()
            .and_then(|ctx| ctx.response_card.clone())
            .or_else(|| self.response_card.clone());
        ConversationTurnState {
            dialog_state: self.dialog_state.clone(),
            intent_name: self.intent_name.clone(),
            slots: self.slots.clone(),
            slot_to_elicit: self.slot_to_elicit.clone(),
            session_attributes: self.session_attributes.clone(),
            message: self.message.clone(),
            message_format: self.message_format.clone(),
            input_transcript: self.input_transcript.clone(),
            response_card,
            last_raw_response: self.raw.clone(),
            ..Default::default()
        }
    }
}

fn default_true() -> bool {
    true
}

/// Older backends send the group flag as `"true"`/`"false"`.
fn flag<'de, D: serde::Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    match Value::deserialize(d)? {
        Value::Bool(b) => Ok(b),
        Value::String(s) => Ok(s == "true"),
        Value::Null => Ok(true),
        other => Err(serde::de::Error::custom(format!("invalid isLastMessageInGroup: {other}"))),
    }
}

fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}
