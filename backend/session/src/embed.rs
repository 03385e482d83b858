//! Widget-side runtime when the widget runs inside a host page's frame.
//!
//! Startup asks the host for its config, merges it, restores the
//! transcript, starts listening for host events, announces `ready`, then
//! waits for the host's `parentReady`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use chatframe_bridge::{accept, BridgeOutcome, IframeEvent, Inbound, ParentEvent, ParentLink, WindowInbox};
use chatframe_core::{ChatError, CredentialProvider, Credentials, MessageKind, ProtocolViolation, Submission};
use chatframe_store::{Mutation, Store};

use crate::session::ConversationSession;

pub const PARENT_READY_TIMEOUT: Duration = Duration::from_secs(10);

/// Asks the host page for credentials on every call.
pub struct ParentCredentials {
    parent: ParentLink,
    store: Store,
}

impl ParentCredentials {
    pub fn new(parent: ParentLink, store: Store) -> Self {
        Self { parent, store }
    }
}

#[async_trait]
impl CredentialProvider for ParentCredentials {
    async fn credentials(&self) -> anyhow::Result<Option<Credentials>> {
        let parent_origin = self.store.read(|s| s.config.ui.parent_origin.clone()).await;
        let outcome = self
            .parent
            .send(&IframeEvent::GetCredentials, true, &parent_origin)
            .await?;
        match outcome.data() {
            Some(Value::Object(map)) => Ok(Some(Credentials(map.clone()))),
            _ => Ok(None),
        }
    }
}

pub struct EmbeddedWidget {
    session: ConversationSession,
    inbox: Option<WindowInbox>,
    parent_ready: Arc<watch::Sender<bool>>,
    tasks: Vec<JoinHandle<()>>,
}

impl EmbeddedWidget {
    pub fn new(session: ConversationSession, inbox: WindowInbox) -> Self {
        let (parent_ready, _) = watch::channel(false);
        Self {
            session,
            inbox: Some(inbox),
            parent_ready: Arc::new(parent_ready),
            tasks: Vec::new(),
        }
    }

    pub fn session(&self) -> &ConversationSession {
        &self.session
    }

    pub fn is_parent_ready(&self) -> bool {
        *self.parent_ready.borrow()
    }

    /// Run the embedded startup handshake.
    pub async fn start(&mut self) -> Result<(), ChatError> {
        if !self.session.parent().has_parent() {
            return Err(ChatError::Other(anyhow::anyhow!("widget is not running in a frame")));
        }
        let store = self.session.store().clone();
        store.commit(Mutation::SetIsRunningEmbedded(true)).await;

        let config = self.request_config().await?;
        store.commit(Mutation::MergeConfig(config)).await;
        self.session.init_message_list().await?;

        let parent_origin = store.read(|s| s.config.ui.parent_origin.clone()).await;
        self.start_listener(parent_origin.clone())?;

        self.session.send_to_parent(&IframeEvent::Ready).await?;
        let mut ready = self.parent_ready.subscribe();
        match tokio::time::timeout(PARENT_READY_TIMEOUT, ready.wait_for(|r| *r)).await {
            Ok(Ok(_)) => {}
            Ok(Err(_)) => return Err(ChatError::BridgeClosed),
            Err(_) => return Err(ChatError::BridgeTimeout("parentReady".into())),
        }
        info!(parent_origin = %parent_origin, "Embedded widget ready");
        Ok(())
    }

    async fn request_config(&self) -> Result<Value, ChatError> {
        let outcome = self.session.send_to_parent(&IframeEvent::InitIframeConfig).await?;
        match outcome {
            BridgeOutcome::Replied(reply) if reply.is_resolve() && reply.kind == "initIframeConfig" => {
                reply.data.filter(Value::is_object).ok_or_else(|| {
                    ProtocolViolation::MalformedPayload("initIframeConfig reply has no config".into()).into()
                })
            }
            _ => Err(ProtocolViolation::MalformedPayload("invalid config event from parent".into()).into()),
        }
    }

    fn start_listener(&mut self, parent_origin: String) -> Result<(), ChatError> {
        let Some(mut inbox) = self.inbox.take() else {
            return Err(ChatError::Other(anyhow::anyhow!("host listener already started")));
        };
        // Events that touch the session run one at a time, in arrival order.
        let (queue, mut work) = mpsc::unbounded_channel::<Inbound<ParentEvent>>();
        let session = self.session.clone();
        self.tasks.push(tokio::spawn(async move {
            while let Some(inbound) = work.recv().await {
                handle(&session, inbound).await;
            }
            debug!("Host event worker stopped");
        }));

        let parent_ready = self.parent_ready.clone();
        self.tasks.push(tokio::spawn(async move {
            while let Some(message) = inbox.recv().await {
                let Some(inbound) = accept::<ParentEvent>(message, &parent_origin) else {
                    continue;
                };
                if matches!(inbound.event, ParentEvent::Ping | ParentEvent::ParentReady) {
                    answer_control(&parent_ready, inbound);
                } else if queue.send(inbound).is_err() {
                    break;
                }
            }
            debug!("Host listener stopped");
        }));
        Ok(())
    }
}

impl Drop for EmbeddedWidget {
    fn drop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

/// `ping` and `parentReady` never wait behind a running `postText`.
fn answer_control(parent_ready: &watch::Sender<bool>, inbound: Inbound<ParentEvent>) {
    let Inbound { event, responder, .. } = inbound;
    if matches!(event, ParentEvent::ParentReady) {
        parent_ready.send_replace(true);
    }
    if let Err(e) = responder.resolve(None) {
        debug!(error = %e, "Reply to host page was not delivered");
    }
}

async fn handle(session: &ConversationSession, inbound: Inbound<ParentEvent>) {
    let Inbound { event, responder, .. } = inbound;
    let outcome = match event {
        ParentEvent::Ping | ParentEvent::ParentReady => responder.resolve(None),
        ParentEvent::ToggleMinimizeUi => match session.toggle_minimize_ui().await {
            Ok(_) => responder.resolve(None),
            Err(e) => {
                error!(error = %e, "failed to toggleMinimizeUi");
                responder.reject("failed to toggleMinimizeUi")
            }
        },
        ParentEvent::ToggleIsUiExpanded => match session.toggle_expand_ui().await {
            Ok(_) => responder.resolve(None),
            Err(e) => {
                error!(error = %e, "failed to toggleIsUiExpanded");
                responder.reject("failed to toggleIsUiExpanded")
            }
        },
        ParentEvent::PostText { message, message_type } => {
            if message.is_empty() {
                responder.reject("missing message field")
            } else {
                let kind = match message_type.as_deref().map(str::parse::<MessageKind>) {
                    None => MessageKind::Human,
                    Some(Ok(kind)) => kind,
                    Some(Err(e)) => {
                        warn!(error = %e, "Treating unknown message type as human");
                        MessageKind::Human
                    }
                };
                session.submit(Submission::new(kind, message)).await;
                responder.resolve(None)
            }
        }
        ParentEvent::DeleteSession => match session.delete_session().await {
            Ok(data) => responder.resolve(Some(data)),
            Err(e) => responder.reject(format!("failed to delete session: {e}")),
        },
        ParentEvent::StartNewSession => match session.start_new_session().await {
            Ok(data) => responder.resolve(Some(data)),
            Err(e) => responder.reject(format!("failed to start new session: {e}")),
        },
        ParentEvent::SetSessionAttribute { key, value } => {
            session.set_session_attribute(key, value).await;
            responder.resolve(None)
        }
    };
    if let Err(e) = outcome {
        debug!(error = %e, "Reply to host page was not delivered");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::{post, put};
    use axum::{Json, Router};
    use chatframe_bridge::{
        DocumentEvents, FrameMount, IframeLoader, Window, WindowHandle, MESSAGE_RECEIVED_EVENT,
    };
    use chatframe_client::BackendClient;
    use chatframe_config::{BackendConfig, WidgetConfig};
    use chatframe_core::{MemoryStorage, StaticCredentials};
    use chatframe_store::WidgetState;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;

    const HOST: &str = "https://host.example";
    const BOT: &str = "https://bot.example";

    type Seen = Arc<StdMutex<Vec<Value>>>;

    async fn spawn_backend(seen: Seen) -> String {
        async fn text(
            axum::extract::State(seen): axum::extract::State<Seen>,
            Json(body): Json<Value>,
        ) -> Json<Value> {
            let reply = format!("you said {}", body["text"].as_str().unwrap_or_default());
            seen.lock().unwrap().push(body);
            Json(json!({"dialogState": "ElicitIntent", "message": reply}))
        }
        async fn session() -> Json<Value> {
            Json(json!({"dialogState": "ElicitIntent"}))
        }
        let router = Router::new()
            .route("/text", post(text))
            .route("/session", put(session).delete(session))
            .with_state(seen);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    /// Mounts a real widget runtime in-process.
    struct WidgetFrame {
        api_url: String,
        widget: Arc<tokio::sync::Mutex<Option<EmbeddedWidget>>>,
    }

    #[async_trait]
    impl FrameMount for WidgetFrame {
        async fn mount(&self, _src_url: &str, parent: WindowHandle) -> Result<Window, ChatError> {
            let (frame, inbox) = Window::open(BOT);
            let mut config = WidgetConfig::default();
            config.ui.parent_origin = HOST.into();
            let store = Store::new(WidgetState::new(config, BOT));
            let link = ParentLink::embedded(DocumentEvents::new(), parent, BOT);
            let backend_config = BackendConfig {
                api_url: self.api_url.clone(),
                request_timeout_ms: 2_000,
                ..Default::default()
            };
            let credentials = Arc::new(ParentCredentials::new(link.clone(), store.clone()));
            let backend = Arc::new(BackendClient::new(&backend_config, credentials)?);
            let session = ConversationSession::new(store, backend, link);

            let slot = self.widget.clone();
            tokio::spawn(async move {
                let mut widget = EmbeddedWidget::new(session, inbox);
                widget.start().await.unwrap();
                *slot.lock().await = Some(widget);
            });
            Ok(frame)
        }
    }

    #[tokio::test]
    async fn loader_and_widget_complete_the_handshake_and_chat() {
        let seen: Seen = Arc::default();
        let api_url = spawn_backend(seen.clone()).await;
        let widget = Arc::new(tokio::sync::Mutex::new(None));
        let docs = DocumentEvents::new();
        let mut doc_events = docs.subscribe();

        let (window, inbox) = Window::open(HOST);
        let mut loader = IframeLoader::new(
            window,
            inbox,
            docs,
            Arc::new(MemoryStorage::new()),
            Arc::new(StaticCredentials::identity("us-east-1:abc")),
            Arc::new(WidgetFrame { api_url, widget: widget.clone() }),
        );
        let api = loader
            .load(&json!({
                "ui": {"parentOrigin": HOST, "toolbarTitle": "Help"},
                "iframe": {"iframeOrigin": BOT, "iframeSrcPath": "/#/?embed=true"}
            }))
            .await
            .unwrap();
        assert!(loader.container().await.minimized);

        for _ in 0..100 {
            if widget.lock().await.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let slot = widget.lock().await;
        let widget = slot.as_ref().unwrap();
        assert!(widget.is_parent_ready());
        let state = widget.session().store().snapshot().await;
        assert!(state.is_running_embedded);
        assert!(state.is_ui_minimized);
        assert_eq!(state.config.ui.toolbar_title, "Help");

        let reply = api.post_text("hello", None).await.unwrap();
        assert!(reply.is_resolve());
        assert_eq!(seen.lock().unwrap()[0]["sessionId"], "us-east-1:abc");
        let last = widget.session().store().read(|s| s.messages.last().cloned()).await.unwrap();
        assert_eq!(last.text, "you said hello");

        let received = loop {
            let event = doc_events.recv().await.unwrap();
            if event.name == MESSAGE_RECEIVED_EVENT {
                break event;
            }
        };
        assert_eq!(received.detail["event"], "messageReceived");
    }

    /// Starts a widget against `backend_config`, playing the host side of the handshake.
    async fn started_widget(backend_config: BackendConfig) -> (EmbeddedWidget, Store, Window) {
        let (host, mut host_inbox) = Window::open(HOST);
        let (frame, inbox) = Window::open(BOT);
        let mut config = WidgetConfig::default();
        config.ui.parent_origin = HOST.into();
        let store = Store::new(WidgetState::new(config, BOT));
        let link = ParentLink::embedded(DocumentEvents::new(), host.handle(BOT), BOT);
        let backend =
            Arc::new(BackendClient::new(&backend_config, Arc::new(StaticCredentials::none())).unwrap());
        let session = ConversationSession::new(store.clone(), backend, link);
        let mut widget = EmbeddedWidget::new(session, inbox);

        let to_widget = frame.handle(HOST);
        tokio::spawn(async move {
            while let Some(msg) = host_inbox.recv().await {
                let Some(inbound) = accept::<IframeEvent>(msg, BOT) else { continue };
                match inbound.event {
                    IframeEvent::InitIframeConfig => {
                        let _ = inbound.responder.resolve(Some(json!({"ui": {"toolbarTitle": "Embedded"}})));
                    }
                    IframeEvent::Ready => {
                        let _ = inbound.responder.resolve(None);
                        let api = chatframe_bridge::HostApi::new(to_widget.clone(), BOT);
                        tokio::spawn(async move { api.send_parent_ready().await.unwrap() });
                    }
                    _ => {
                        let _ = inbound.responder.resolve(None);
                    }
                }
            }
        });
        widget.start().await.unwrap();
        (widget, store, frame)
    }

    #[tokio::test]
    async fn host_events_are_validated_and_served() {
        let (_widget, store, frame) = started_widget(BackendConfig::default()).await;
        assert_eq!(store.read(|s| s.config.ui.toolbar_title.clone()).await, "Embedded");

        let api = chatframe_bridge::HostApi::new(frame.handle(HOST), BOT);
        assert!(api.ping().await.unwrap().is_resolve());
        api.set_session_attribute("topic", json!("billing")).await.unwrap();
        assert_eq!(store.read(|s| s.turn.session_attributes["topic"].clone()).await, "billing");

        let err = api.post_text("", None).await.unwrap_err();
        assert!(err.to_string().contains("missing message field"));

        // a different origin gets no reply and changes nothing
        let before = store.snapshot().await;
        let stranger = chatframe_bridge::HostApi::new(frame.handle("https://evil.example"), BOT);
        let silent = tokio::time::timeout(
            Duration::from_millis(200),
            stranger.set_session_attribute("topic", json!("hijacked")),
        )
        .await;
        assert!(!matches!(silent, Ok(Ok(_))));
        let silent = tokio::time::timeout(Duration::from_millis(200), stranger.ping()).await;
        assert!(!matches!(silent, Ok(Ok(_))));
        assert!(api.ping().await.unwrap().is_resolve());
        assert_eq!(store.snapshot().await, before);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn posted_texts_reach_the_transcript_in_order() {
        let api_url = spawn_backend(Seen::default()).await;
        let backend_config = BackendConfig {
            api_url,
            request_timeout_ms: 5_000,
            ..Default::default()
        };
        let (_widget, store, frame) = started_widget(backend_config).await;
        let to_widget = frame.handle(HOST);

        let sent: Vec<String> = (0..50).map(|i| format!("m{i}")).collect();
        let mut replies = Vec::new();
        for text in &sent {
            let event = ParentEvent::PostText { message: text.clone(), message_type: None };
            let chatframe_bridge::MessageChannel { port1, port2 } = chatframe_bridge::MessageChannel::new();
            assert!(to_widget.post_message(chatframe_bridge::envelope(&event).unwrap(), BOT, vec![port2]));
            replies.push(port1);
        }
        for port in &mut replies {
            let reply: chatframe_bridge::Reply =
                serde_json::from_value(port.recv().await.unwrap()).unwrap();
            assert!(reply.is_resolve());
        }

        let human: Vec<String> = store
            .read(|s| {
                s.messages
                    .iter()
                    .filter(|m| m.kind == MessageKind::Human)
                    .map(|m| m.text.clone())
                    .collect()
            })
            .await;
        assert_eq!(human, sent);
    }

    #[tokio::test]
    async fn start_requires_a_parent_frame() {
        let (_frame, inbox) = Window::open(BOT);
        let store = Store::new(WidgetState::default());
        let link = ParentLink::full_page(DocumentEvents::new(), BOT);
        let backend = Arc::new(
            BackendClient::new(&BackendConfig::default(), Arc::new(StaticCredentials::none())).unwrap(),
        );
        let mut widget = EmbeddedWidget::new(ConversationSession::new(store, backend, link), inbox);
        assert!(widget.start().await.is_err());
    }
}
