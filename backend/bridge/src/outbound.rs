//! Acknowledged outbound requests.

use serde_json::Value;
use tracing::{debug, warn};

use chatframe_core::ChatError;

use crate::origin::target_origin;
use crate::port::MessageChannel;
use crate::protocol::{envelope, BridgeEvent, IframeEvent, Reply};
use crate::window::{DocumentEvent, DocumentEvents, WindowHandle};

/// Document event carrying widget messages when no parent frame exists.
pub const FULL_PAGE_EVENT: &str = "fullpagecomponent";

/// Post `event` over a fresh channel and wait for its single reply.
///
/// A `reject` reply becomes [`ChatError::BridgeRejected`]. If the reply
/// port is dropped unanswered, including when the target origin did not
/// match and the message was never delivered, the call fails with
/// [`ChatError::BridgeClosed`]. No timeout is applied here.
pub async fn send_over_channel<E: BridgeEvent>(
    target: &WindowHandle,
    target_origin: &str,
    event: &E,
) -> Result<Reply, ChatError> {
    let data = envelope(event)?;
    let MessageChannel { mut port1, port2 } = MessageChannel::new();
    debug!(event = event.name(), target_origin, "Posting bridge request");
    if !target.post_message(data, target_origin, vec![port2]) {
        warn!(event = event.name(), target_origin, "Bridge request was not delivered");
    }

    let raw = port1.recv().await.ok_or(ChatError::BridgeClosed)?;
    drop(port1);
    let reply: Reply = serde_json::from_value(raw)
        .map_err(|e| ChatError::Decode(format!("bridge reply: {e}")))?;
    if reply.is_resolve() {
        Ok(reply)
    } else {
        let reason = reply.error.clone().unwrap_or_else(|| reply.kind.clone());
        Err(ChatError::BridgeRejected(reason))
    }
}

/// Result of a widget-to-host send.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeOutcome {
    /// Full-page mode: dispatched on the document, nothing waits.
    Dispatched(DocumentEvent),
    /// Embedded mode: the host's reply.
    Replied(Reply),
}

impl BridgeOutcome {
    pub fn data(&self) -> Option<&Value> {
        match self {
            BridgeOutcome::Dispatched(_) => None,
            BridgeOutcome::Replied(reply) => reply.data.as_ref(),
        }
    }
}

/// The widget's route to its host page.
#[derive(Debug, Clone)]
pub struct ParentLink {
    documents: DocumentEvents,
    parent: Option<WindowHandle>,
    current_origin: String,
}

impl ParentLink {
    pub fn full_page(documents: DocumentEvents, current_origin: impl Into<String>) -> Self {
        Self {
            documents,
            parent: None,
            current_origin: current_origin.into(),
        }
    }

    pub fn embedded(
        documents: DocumentEvents,
        parent: WindowHandle,
        current_origin: impl Into<String>,
    ) -> Self {
        Self {
            documents,
            parent: Some(parent),
            current_origin: current_origin.into(),
        }
    }

    pub fn has_parent(&self) -> bool {
        self.parent.is_some()
    }

    pub fn current_origin(&self) -> &str {
        &self.current_origin
    }

    pub fn documents(&self) -> &DocumentEvents {
        &self.documents
    }

    /// Send to the host page.
    ///
    /// When `embedded` is false, or there is no parent frame, the message
    /// is dispatched as a [`FULL_PAGE_EVENT`] document event and resolves
    /// at once.
    pub async fn send(
        &self,
        event: &IframeEvent,
        embedded: bool,
        parent_origin: &str,
    ) -> Result<BridgeOutcome, ChatError> {
        match (&self.parent, embedded) {
            (Some(parent), true) => {
                let origin = target_origin(parent_origin, &self.current_origin);
                send_over_channel(parent, &origin, event)
                    .await
                    .map(BridgeOutcome::Replied)
            }
            _ => {
                let detail = envelope(event)?;
                Ok(BridgeOutcome::Dispatched(
                    self.documents.dispatch(FULL_PAGE_EVENT, detail),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inbound::accept;
    use crate::protocol::ReplyStatus;
    use crate::window::Window;
    use serde_json::json;

    const HOST: &str = "https://host.example";
    const BOT: &str = "https://bot.example";

    #[tokio::test]
    async fn resolve_reply_is_returned() {
        let (host, mut inbox) = Window::open(HOST);
        tokio::spawn(async move {
            let msg = inbox.recv().await.unwrap();
            let inbound = accept::<IframeEvent>(msg, BOT).unwrap();
            inbound.responder.resolve(Some(json!({"ui": {}}))).unwrap();
        });

        let reply = send_over_channel(&host.handle(BOT), HOST, &IframeEvent::InitIframeConfig)
            .await
            .unwrap();
        assert_eq!(reply.event, ReplyStatus::Resolve);
        assert_eq!(reply.kind, "initIframeConfig");
        assert_eq!(reply.data, Some(json!({"ui": {}})));
    }

    #[tokio::test]
    async fn reject_reply_is_an_error() {
        let (host, mut inbox) = Window::open(HOST);
        tokio::spawn(async move {
            let msg = inbox.recv().await.unwrap();
            let inbound = accept::<IframeEvent>(msg, BOT).unwrap();
            inbound.responder.reject("failed to get credentials").unwrap();
        });

        let err = send_over_channel(&host.handle(BOT), HOST, &IframeEvent::GetCredentials)
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::BridgeRejected(ref m) if m == "failed to get credentials"));
    }

    #[tokio::test]
    async fn undelivered_request_fails_closed() {
        let (host, _inbox) = Window::open(HOST);
        let err = send_over_channel(&host.handle(BOT), "https://elsewhere.example", &IframeEvent::Ready)
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::BridgeClosed));
    }

    #[tokio::test]
    async fn full_page_send_dispatches_document_event() {
        let docs = DocumentEvents::new();
        let mut rx = docs.subscribe();
        let link = ParentLink::full_page(docs, BOT);
        let outcome = link.send(&IframeEvent::MessageReceived, false, HOST).await.unwrap();

        let BridgeOutcome::Dispatched(event) = outcome else {
            panic!("expected a document event");
        };
        assert_eq!(event.name, FULL_PAGE_EVENT);
        assert_eq!(event.detail["event"], "messageReceived");
        assert_eq!(rx.recv().await.unwrap(), event);
    }
}
