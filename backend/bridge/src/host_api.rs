//! Call-style API the host page uses to drive the embedded widget.

use serde_json::Value;

use chatframe_core::ChatError;

use crate::outbound::send_over_channel;
use crate::protocol::{ParentEvent, Reply};
use crate::window::WindowHandle;

pub const MESSAGE_TYPE_HUMAN: &str = "human";
pub const MESSAGE_TYPE_BUTTON: &str = "button";

/// Each call sends one event to the widget frame and completes on its reply.
#[derive(Debug, Clone)]
pub struct HostApi {
    iframe: WindowHandle,
    iframe_origin: String,
}

impl HostApi {
    pub fn new(iframe: WindowHandle, iframe_origin: impl Into<String>) -> Self {
        Self {
            iframe,
            iframe_origin: iframe_origin.into(),
        }
    }

    pub async fn send(&self, event: &ParentEvent) -> Result<Reply, ChatError> {
        send_over_channel(&self.iframe, &self.iframe_origin, event).await
    }

    pub async fn ping(&self) -> Result<Reply, ChatError> {
        self.send(&ParentEvent::Ping).await
    }

    pub async fn send_parent_ready(&self) -> Result<Reply, ChatError> {
        self.send(&ParentEvent::ParentReady).await
    }

    pub async fn toggle_minimize_ui(&self) -> Result<Reply, ChatError> {
        self.send(&ParentEvent::ToggleMinimizeUi).await
    }

    pub async fn toggle_is_ui_expanded(&self) -> Result<Reply, ChatError> {
        self.send(&ParentEvent::ToggleIsUiExpanded).await
    }

    pub async fn post_text(
        &self,
        message: impl Into<String>,
        message_type: Option<&str>,
    ) -> Result<Reply, ChatError> {
        self.send(&ParentEvent::PostText {
            message: message.into(),
            message_type: message_type.map(str::to_string),
        })
        .await
    }

    pub async fn delete_session(&self) -> Result<Reply, ChatError> {
        self.send(&ParentEvent::DeleteSession).await
    }

    pub async fn start_new_session(&self) -> Result<Reply, ChatError> {
        self.send(&ParentEvent::StartNewSession).await
    }

    pub async fn set_session_attribute(
        &self,
        key: impl Into<String>,
        value: Value,
    ) -> Result<Reply, ChatError> {
        self.send(&ParentEvent::SetSessionAttribute {
            key: key.into(),
            value,
        })
        .await
    }
}
