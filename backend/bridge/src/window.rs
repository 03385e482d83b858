//! Windows, cross-origin handles, and the same-document event bus.

use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

use crate::port::MessagePort;

/// A message delivered to a window.
#[derive(Debug)]
pub struct MessageEvent {
    pub data: Value,
    /// Origin of the sending document.
    pub origin: String,
    pub ports: Vec<MessagePort>,
}

/// A browsing context that can receive messages.
#[derive(Debug, Clone)]
pub struct Window {
    origin: String,
    tx: mpsc::UnboundedSender<MessageEvent>,
}

/// Receiving end of a window's message queue.
#[derive(Debug)]
pub struct WindowInbox {
    rx: mpsc::UnboundedReceiver<MessageEvent>,
}

impl WindowInbox {
    pub async fn recv(&mut self) -> Option<MessageEvent> {
        self.rx.recv().await
    }
}

impl Window {
    pub fn open(origin: impl Into<String>) -> (Window, WindowInbox) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Window {
                origin: origin.into(),
                tx,
            },
            WindowInbox { rx },
        )
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// A reference to this window held by a document at `sender_origin`.
    pub fn handle(&self, sender_origin: impl Into<String>) -> WindowHandle {
        WindowHandle {
            target: self.clone(),
            sender_origin: sender_origin.into(),
        }
    }
}

/// What one document can do with another document's window.
#[derive(Debug, Clone)]
pub struct WindowHandle {
    target: Window,
    sender_origin: String,
}

impl WindowHandle {
    /// Deliver `data` if `target_origin` is `*` or the window's origin.
    ///
    /// Returns whether the message was delivered. A mismatched target
    /// origin drops the message silently, ports included.
    pub fn post_message(&self, data: Value, target_origin: &str, ports: Vec<MessagePort>) -> bool {
        if target_origin != "*" && target_origin != self.target.origin {
            debug!(
                target_origin,
                window_origin = %self.target.origin,
                "Target origin mismatch; message dropped"
            );
            return false;
        }
        self.target
            .tx
            .send(MessageEvent {
                data,
                origin: self.sender_origin.clone(),
                ports,
            })
            .is_ok()
    }

    pub fn target_origin(&self) -> &str {
        &self.target.origin
    }

    pub fn sender_origin(&self) -> &str {
        &self.sender_origin
    }
}

/// A named custom event on a document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentEvent {
    pub name: String,
    pub detail: Value,
}

/// Same-document custom event bus; clones share listeners.
#[derive(Debug, Clone)]
pub struct DocumentEvents {
    sender: broadcast::Sender<DocumentEvent>,
}

impl DocumentEvents {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }

    pub fn dispatch(&self, name: impl Into<String>, detail: Value) -> DocumentEvent {
        let event = DocumentEvent {
            name: name.into(),
            detail,
        };
        debug!(event = %event.name, "Dispatching document event");
        let _ = self.sender.send(event.clone());
        event
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DocumentEvent> {
        self.sender.subscribe()
    }
}

impl Default for DocumentEvents {
    fn default() -> Self {
        Self::new()
    }
}
