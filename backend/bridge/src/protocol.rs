//! Wire protocol between host page and widget.
//!
//! Every request is an envelope `{source: "chatframe", event, ...payload}`
//! posted with exactly one reply port. The receiver answers once on that
//! port with `{event: "resolve" | "reject", type, data?, error?}`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use chatframe_core::ChatError;

/// Source tag carried by every envelope.
pub const SOURCE_TAG: &str = "chatframe";

/// A closed set of events one side of the bridge handles.
pub trait BridgeEvent: Serialize + DeserializeOwned + Send + 'static {
    /// Every event name this side accepts.
    const NAMES: &'static [&'static str];

    fn name(&self) -> &'static str;
}

/// Events the widget sends to the host page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum IframeEvent {
    /// The widget's inbound handler is ready.
    Ready,
    GetCredentials,
    InitIframeConfig,
    ToggleMinimizeUi,
    ToggleIsUiExpanded,
    UpdateSessionState {
        #[serde(default)]
        state: Value,
    },
    MessageReceived,
}

impl BridgeEvent for IframeEvent {
    const NAMES: &'static [&'static str] = &[
        "ready",
        "getCredentials",
        "initIframeConfig",
        "toggleMinimizeUi",
        "toggleIsUiExpanded",
        "updateSessionState",
        "messageReceived",
    ];

    fn name(&self) -> &'static str {
        match self {
            IframeEvent::Ready => "ready",
            IframeEvent::GetCredentials => "getCredentials",
            IframeEvent::InitIframeConfig => "initIframeConfig",
            IframeEvent::ToggleMinimizeUi => "toggleMinimizeUi",
            IframeEvent::ToggleIsUiExpanded => "toggleIsUiExpanded",
            IframeEvent::UpdateSessionState { .. } => "updateSessionState",
            IframeEvent::MessageReceived => "messageReceived",
        }
    }
}

/// Events the host page sends to the widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ParentEvent {
    Ping,
    ParentReady,
    ToggleMinimizeUi,
    ToggleIsUiExpanded,
    PostText {
        #[serde(default)]
        message: String,
        #[serde(default, rename = "messageType", skip_serializing_if = "Option::is_none")]
        message_type: Option<String>,
    },
    DeleteSession,
    StartNewSession,
    SetSessionAttribute {
        key: String,
        #[serde(default)]
        value: Value,
    },
}

impl BridgeEvent for ParentEvent {
    const NAMES: &'static [&'static str] = &[
        "ping",
        "parentReady",
        "toggleMinimizeUi",
        "toggleIsUiExpanded",
        "postText",
        "deleteSession",
        "startNewSession",
        "setSessionAttribute",
    ];

    fn name(&self) -> &'static str {
        match self {
            ParentEvent::Ping => "ping",
            ParentEvent::ParentReady => "parentReady",
            ParentEvent::ToggleMinimizeUi => "toggleMinimizeUi",
            ParentEvent::ToggleIsUiExpanded => "toggleIsUiExpanded",
            ParentEvent::PostText { .. } => "postText",
            ParentEvent::DeleteSession => "deleteSession",
            ParentEvent::StartNewSession => "startNewSession",
            ParentEvent::SetSessionAttribute { .. } => "setSessionAttribute",
        }
    }
}

/// Wrap an event in the tagged envelope.
pub fn envelope<E: BridgeEvent>(event: &E) -> Result<Value, ChatError> {
    let mut map = match serde_json::to_value(event) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            return Err(ChatError::Decode(format!("event did not encode to an object: {other}")))
        }
        Err(e) => return Err(ChatError::Decode(format!("cannot encode event: {e}"))),
    };
    map.insert("source".into(), Value::String(SOURCE_TAG.to_string()));
    Ok(Value::Object(map))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Resolve,
    Reject,
}

/// The single answer to a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub event: ReplyStatus,
    /// Name of the event being answered.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Reply {
    pub fn resolve(kind: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            event: ReplyStatus::Resolve,
            kind: kind.into(),
            data,
            error: None,
        }
    }

    pub fn reject(kind: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            event: ReplyStatus::Reject,
            kind: kind.into(),
            data: None,
            error: Some(error.into()),
        }
    }

    pub fn is_resolve(&self) -> bool {
        self.event == ReplyStatus::Resolve
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Object(Map::new()))
    }
}
