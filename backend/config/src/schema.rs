//! Widget configuration schema.
//!
//! Three option groups: `backend` (conversation API and retry/streaming
//! behaviour), `ui` (transcript and host-page options), and `iframe`
//! (how the parent page mounts the embedded widget). Every field has a
//! default, so any partial source deserializes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use chatframe_core::ChatError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WidgetConfig {
    pub backend: BackendConfig,
    pub ui: UiConfig,
    pub iframe: IframeConfig,
}

impl WidgetConfig {
    /// The config as a merge tree.
    pub fn to_value(&self) -> Value {
        // Plain data with string keys; serialization cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Object(Map::new()))
    }

    pub fn from_value(value: Value) -> Result<Self, ChatError> {
        serde_json::from_value(value).map_err(|e| ChatError::Decode(format!("invalid config: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BackendConfig {
    /// Base URL of the conversational text API (`/session`, `/text`).
    pub api_url: String,
    /// Greeting pushed into an empty transcript.
    pub initial_text: String,
    /// Sent on the user's behalf the first time the UI is opened.
    pub initial_utterance: String,
    #[serde(deserialize_with = "lenient::boolean")]
    pub re_init_session_attributes_on_restart: bool,
    pub session_attributes: Map<String, Value>,
    #[serde(deserialize_with = "lenient::boolean")]
    pub retry_on_post_text_timeout: bool,
    #[serde(deserialize_with = "lenient::count")]
    pub retry_count_post_text_timeout: u32,
    #[serde(deserialize_with = "lenient::boolean")]
    pub allow_streaming_responses: bool,
    pub streaming_web_socket_endpoint: String,
    /// Interval between typed chunks during streamed playback.
    pub streaming_tick_ms: u64,
    pub request_timeout_ms: u64,
}

// ---------------------------------------------------------------------------
// UI
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UiConfig {
    /// Origin of the hosting page. Never accepted from dynamic sources.
    pub parent_origin: String,
    pub toolbar_title: String,
    #[serde(deserialize_with = "lenient::boolean")]
    pub show_error_details: bool,
    #[serde(deserialize_with = "lenient::boolean")]
    pub save_history: bool,
    #[serde(deserialize_with = "lenient::boolean")]
    pub push_initial_text_on_restart: bool,
    #[serde(deserialize_with = "lenient::boolean")]
    pub hide_button_message_bubble: bool,
    pub message_sent_sfx: String,
    pub message_received_sfx: String,
    pub positive_feedback_intent: String,
    pub negative_feedback_intent: String,
    pub help_intent: String,
    #[serde(deserialize_with = "lenient::boolean")]
    pub back_button: bool,
    #[serde(deserialize_with = "lenient::boolean")]
    pub message_menu: bool,
}

// ---------------------------------------------------------------------------
// Iframe
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IframeConfig {
    pub iframe_origin: String,
    /// Appended to `iframe_origin` to build the iframe `src`.
    pub iframe_src_path: String,
    #[serde(deserialize_with = "lenient::boolean")]
    pub should_load_iframe_minimized: bool,
}

impl IframeConfig {
    pub fn src_url(&self) -> String {
        format!("{}{}", self.iframe_origin, self.iframe_src_path)
    }
}

/// Build-time config files historically carry booleans and counts as
/// strings (`"false"`, `"1"`).
mod lenient {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Num(u64),
        Str(String),
    }

    pub fn boolean<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        match Raw::deserialize(d)? {
            Raw::Bool(b) => Ok(b),
            Raw::Num(n) => Ok(n != 0),
            Raw::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(true),
                "false" | "" => Ok(false),
                other => Err(D::Error::custom(format!("expected a boolean, got {other:?}"))),
            },
        }
    }

    pub fn count<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
        match Raw::deserialize(d)? {
            Raw::Num(n) => u32::try_from(n).map_err(D::Error::custom),
            Raw::Str(s) => s
                .trim()
                .parse()
                .map_err(|_| D::Error::custom(format!("expected a count, got {s:?}"))),
            Raw::Bool(b) => Err(D::Error::custom(format!("expected a count, got {b}"))),
        }
    }
}
