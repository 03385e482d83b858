//! Parent-side loader: mounts the widget frame and serves its requests.
//!
//! `load` runs the whole sequence and fails fast: prepare and validate the
//! config, start the frame listener, mount the frame, wait for its `ready`
//! signal, expose the [`HostApi`], then show the container.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use chatframe_config::{prepare_loader_config, WidgetConfig};
use chatframe_core::{ChatError, CredentialProvider, KeyValueStorage};

use crate::host_api::HostApi;
use crate::inbound::{accept, Inbound};
use crate::protocol::{BridgeEvent, IframeEvent, ParentEvent};
use crate::window::{DocumentEvents, Window, WindowHandle, WindowInbox};

pub const IFRAME_LOAD_TIMEOUT: Duration = Duration::from_secs(20);
pub const READY_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const READY_TIMEOUT: Duration = Duration::from_secs(15);

/// Document event the host page dispatches to message the widget.
pub const HOST_MESSAGE_EVENT: &str = "chatframeMessage";
/// Document event announcing that the host API is usable.
pub const HOST_READY_EVENT: &str = "chatframeReady";
pub const UPDATE_SESSION_STATE_EVENT: &str = "updatesessionstate";
pub const MESSAGE_RECEIVED_EVENT: &str = "messagereceived";

/// Creates the widget frame.
#[async_trait]
pub trait FrameMount: Send + Sync {
    /// Load the frame at `src_url`, handing it `parent` to talk back on.
    /// Resolves with the frame's window once it has loaded.
    async fn mount(&self, src_url: &str, parent: WindowHandle) -> Result<Window, ChatError>;
}

/// Visibility classes on the frame container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContainerState {
    pub shown: bool,
    pub minimized: bool,
    pub maximized: bool,
}

fn minimized_key(config: &WidgetConfig) -> String {
    format!("{}lastUiIsMinimized", config.ui.toolbar_title)
}

fn maximized_key(config: &WidgetConfig) -> String {
    format!("{}lastUiIsMaximized", config.ui.toolbar_title)
}

struct LoaderShared {
    config: RwLock<WidgetConfig>,
    documents: DocumentEvents,
    local_storage: Arc<dyn KeyValueStorage>,
    credentials: Arc<dyn CredentialProvider>,
    ready: AtomicBool,
    container: Mutex<ContainerState>,
}

pub struct IframeLoader {
    shared: Arc<LoaderShared>,
    window: Window,
    inbox: Option<WindowInbox>,
    mount: Arc<dyn FrameMount>,
    tasks: Vec<JoinHandle<()>>,
}

impl IframeLoader {
    pub fn new(
        window: Window,
        inbox: WindowInbox,
        documents: DocumentEvents,
        local_storage: Arc<dyn KeyValueStorage>,
        credentials: Arc<dyn CredentialProvider>,
        mount: Arc<dyn FrameMount>,
    ) -> Self {
        Self {
            shared: Arc::new(LoaderShared {
                config: RwLock::new(WidgetConfig::default()),
                documents,
                local_storage,
                credentials,
                ready: AtomicBool::new(false),
                container: Mutex::new(ContainerState::default()),
            }),
            window,
            inbox: Some(inbox),
            mount,
            tasks: Vec::new(),
        }
    }

    pub async fn config(&self) -> WidgetConfig {
        self.shared.config.read().await.clone()
    }

    pub async fn container(&self) -> ContainerState {
        *self.shared.container.lock().await
    }

    pub fn is_chat_bot_ready(&self) -> bool {
        self.shared.ready.load(Ordering::SeqCst)
    }

    /// Mount the widget with `overrides` merged over the loader defaults.
    pub async fn load(&mut self, overrides: &Value) -> Result<HostApi, ChatError> {
        let config = prepare_loader_config(overrides, self.window.origin())?;
        let iframe_origin = config.iframe.iframe_origin.clone();
        let src_url = config.iframe.src_url();
        *self.shared.config.write().await = config;

        self.start_listener(iframe_origin.clone())?;

        let parent = self.window.handle(iframe_origin.clone());
        let frame = tokio::time::timeout(IFRAME_LOAD_TIMEOUT, self.mount.mount(&src_url, parent))
            .await
            .map_err(|_| ChatError::BridgeTimeout("iframe load".into()))??;
        info!(src_url = %src_url, "Widget frame loaded");

        self.wait_for_ready().await?;

        let api = HostApi::new(frame.handle(self.window.origin()), iframe_origin);
        self.init_host_api(&api).await?;
        self.show(&api).await?;
        Ok(api)
    }

    fn start_listener(&mut self, iframe_origin: String) -> Result<(), ChatError> {
        let Some(mut inbox) = self.inbox.take() else {
            return Err(ChatError::Other(anyhow::anyhow!("frame listener already started")));
        };
        let shared = self.shared.clone();
        self.tasks.push(tokio::spawn(async move {
            while let Some(message) = inbox.recv().await {
                if let Some(inbound) = accept::<IframeEvent>(message, &iframe_origin) {
                    shared.handle(inbound).await;
                }
            }
            debug!("Frame listener stopped");
        }));
        Ok(())
    }

    async fn wait_for_ready(&self) -> Result<(), ChatError> {
        let poll = async {
            let mut interval = tokio::time::interval(READY_POLL_INTERVAL);
            loop {
                interval.tick().await;
                if self.is_chat_bot_ready() {
                    return;
                }
            }
        };
        tokio::time::timeout(READY_TIMEOUT, poll)
            .await
            .map_err(|_| ChatError::BridgeTimeout("chatbot ready".into()))
    }

    async fn init_host_api(&mut self, api: &HostApi) -> Result<(), ChatError> {
        let mut events = self.shared.documents.subscribe();
        let forward_api = api.clone();
        self.tasks.push(tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) if event.name == HOST_MESSAGE_EVENT => {
                        forward_host_message(&forward_api, event.detail).await;
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Host message forwarder lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }));

        api.send_parent_ready().await?;
        self.shared.documents.dispatch(HOST_READY_EVENT, Value::Null);
        Ok(())
    }

    async fn show(&self, api: &HostApi) -> Result<(), ChatError> {
        let config = self.config().await;
        let key = minimized_key(&config);
        let result = if config.iframe.should_load_iframe_minimized {
            let result = api.toggle_minimize_ui().await.map(|_| ());
            self.shared.local_storage.set_item(&key, "true").await?;
            result
        } else {
            match self.shared.local_storage.get_item(&key).await?.as_deref() {
                Some("true") => api.toggle_minimize_ui().await.map(|_| ()),
                Some("false") => api.ping().await.map(|_| ()),
                _ => Ok(()),
            }
        };
        if let Err(e) = result {
            warn!(error = %e, "Restoring widget visibility failed");
        }

        self.shared.container.lock().await.shown = true;
        Ok(())
    }
}

impl Drop for IframeLoader {
    fn drop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

async fn forward_host_message(api: &HostApi, detail: Value) {
    let Some(message) = detail.get("message").cloned() else {
        warn!("Malformed message to widget event");
        return;
    };
    match serde_json::from_value::<ParentEvent>(message) {
        Ok(event) => {
            if let Err(e) = api.send(&event).await {
                warn!(event = event.name(), error = %e, "Forwarding host message failed");
            }
        }
        Err(e) => warn!(error = %e, "Unknown message to widget event"),
    }
}

impl LoaderShared {
    async fn handle(&self, inbound: Inbound<IframeEvent>) {
        let Inbound {
            event,
            responder,
            data,
        } = inbound;
        let outcome = match event {
            IframeEvent::Ready => {
                self.ready.store(true, Ordering::SeqCst);
                responder.resolve(None)
            }
            IframeEvent::GetCredentials => match self.credentials.credentials().await {
                Ok(Some(credentials)) => {
                    let data = serde_json::to_value(credentials).unwrap_or(Value::Null);
                    responder.resolve(Some(data))
                }
                Ok(None) => {
                    error!("failed to get credentials: none available");
                    responder.reject("failed to get credentials")
                }
                Err(e) => {
                    error!(error = %e, "failed to get credentials");
                    responder.reject("failed to get credentials")
                }
            },
            IframeEvent::InitIframeConfig => {
                let config = self.config.read().await.to_value();
                responder.resolve(Some(config))
            }
            IframeEvent::ToggleMinimizeUi => match self.toggle_minimized().await {
                Ok(()) => responder.resolve(None),
                Err(e) => {
                    error!(error = %e, "failed to toggleMinimizeUi");
                    responder.reject("failed to toggleMinimizeUi")
                }
            },
            IframeEvent::ToggleIsUiExpanded => match self.toggle_maximized().await {
                Ok(()) => responder.resolve(None),
                Err(e) => {
                    error!(error = %e, "failed to toggleIsUiExpanded");
                    responder.reject("failed to toggleIsUiExpanded")
                }
            },
            IframeEvent::UpdateSessionState { .. } => {
                let outcome = responder.resolve(None);
                self.documents.dispatch(UPDATE_SESSION_STATE_EVENT, data);
                outcome
            }
            IframeEvent::MessageReceived => {
                let outcome = responder.resolve(None);
                self.documents.dispatch(MESSAGE_RECEIVED_EVENT, data);
                outcome
            }
        };
        if let Err(e) = outcome {
            debug!(error = %e, "Reply to frame was not delivered");
        }
    }

    async fn toggle_minimized(&self) -> Result<(), ChatError> {
        let minimized = {
            let mut container = self.container.lock().await;
            container.minimized = !container.minimized;
            container.minimized
        };
        let key = minimized_key(&*self.config.read().await);
        self.local_storage
            .set_item(&key, if minimized { "true" } else { "false" })
            .await
    }

    async fn toggle_maximized(&self) -> Result<(), ChatError> {
        let maximized = {
            let mut container = self.container.lock().await;
            container.maximized = !container.maximized;
            container.maximized
        };
        let key = maximized_key(&*self.config.read().await);
        self.local_storage
            .set_item(&key, if maximized { "true" } else { "false" })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbound::send_over_channel;
    use chatframe_core::{MemoryStorage, StaticCredentials};
    use serde_json::json;

    const HOST: &str = "https://host.example";
    const BOT: &str = "https://bot.example";

    /// A frame that says `ready` on mount and acks every host request.
    /// A host `toggleMinimizeUi` is echoed back to the parent first, the
    /// way the widget asks its host to resize the container.
    struct AckingFrame {
        send_ready: bool,
    }

    #[async_trait]
    impl FrameMount for AckingFrame {
        async fn mount(&self, src_url: &str, parent: WindowHandle) -> Result<Window, ChatError> {
            assert_eq!(src_url, "https://bot.example/#/?embed=true");
            let (frame, mut inbox) = Window::open(BOT);
            let send_ready = self.send_ready;
            tokio::spawn(async move {
                if send_ready {
                    let origin = parent.target_origin().to_string();
                    send_over_channel(&parent, &origin, &IframeEvent::Ready).await.unwrap();
                }
                while let Some(msg) = inbox.recv().await {
                    let Some(inbound) = accept::<ParentEvent>(msg, HOST) else {
                        continue;
                    };
                    if inbound.event == ParentEvent::ToggleMinimizeUi {
                        let origin = parent.target_origin().to_string();
                        let _ = send_over_channel(&parent, &origin, &IframeEvent::ToggleMinimizeUi).await;
                    }
                    let _ = inbound.responder.resolve(None);
                }
            });
            Ok(frame)
        }
    }

    fn loader(storage: MemoryStorage, docs: DocumentEvents, send_ready: bool) -> IframeLoader {
        let (window, inbox) = Window::open(HOST);
        IframeLoader::new(
            window,
            inbox,
            docs,
            Arc::new(storage),
            Arc::new(StaticCredentials::identity("us-east-1:abc")),
            Arc::new(AckingFrame { send_ready }),
        )
    }

    fn overrides() -> Value {
        json!({
            "ui": {"parentOrigin": HOST, "toolbarTitle": "Help"},
            "iframe": {"iframeOrigin": BOT, "iframeSrcPath": "/#/?embed=true"}
        })
    }

    #[tokio::test]
    async fn load_mounts_waits_for_ready_and_shows_minimized() {
        let storage = MemoryStorage::new();
        let docs = DocumentEvents::new();
        let mut doc_events = docs.subscribe();
        let mut loader = loader(storage.clone(), docs, true);

        let api = loader.load(&overrides()).await.unwrap();
        assert!(loader.is_chat_bot_ready());
        assert_eq!(
            loader.container().await,
            ContainerState { shown: true, minimized: true, maximized: false }
        );
        assert_eq!(
            storage.get_item("HelplastUiIsMinimized").await.unwrap().as_deref(),
            Some("true")
        );
        assert_eq!(doc_events.recv().await.unwrap().name, HOST_READY_EVENT);
        assert_eq!(api.ping().await.unwrap().kind, "ping");
    }

    #[tokio::test]
    async fn missing_src_path_fails_before_mounting() {
        let mut loader = loader(MemoryStorage::new(), DocumentEvents::new(), true);
        let err = loader
            .load(&json!({"ui": {"parentOrigin": HOST}}))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::ConfigValidation { ref missing_field } if missing_field == "iframe.iframeSrcPath"));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_frame_times_out() {
        let mut loader = loader(MemoryStorage::new(), DocumentEvents::new(), false);
        let err = loader.load(&overrides()).await.unwrap_err();
        assert!(matches!(err, ChatError::BridgeTimeout(_)));
        assert!(!loader.container().await.shown);
    }

    #[tokio::test]
    async fn frame_requests_are_served() {
        let storage = MemoryStorage::new();
        let docs = DocumentEvents::new();
        let mut loader = loader(storage, docs.clone(), true);
        loader.load(&overrides()).await.unwrap();

        // a second frame at the iframe origin talking to the host window
        let parent = loader.window.handle(BOT);
        let reply = send_over_channel(&parent, HOST, &IframeEvent::InitIframeConfig)
            .await
            .unwrap();
        assert_eq!(reply.data.unwrap()["ui"]["parentOrigin"], HOST);

        let creds = send_over_channel(&parent, HOST, &IframeEvent::GetCredentials)
            .await
            .unwrap();
        assert_eq!(creds.data.unwrap()["identityId"], "us-east-1:abc");

        let mut doc_events = docs.subscribe();
        send_over_channel(&parent, HOST, &IframeEvent::MessageReceived)
            .await
            .unwrap();
        assert_eq!(doc_events.recv().await.unwrap().name, MESSAGE_RECEIVED_EVENT);

        send_over_channel(&parent, HOST, &IframeEvent::ToggleIsUiExpanded)
            .await
            .unwrap();
        assert!(loader.container().await.maximized);
    }
}
