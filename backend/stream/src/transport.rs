//! Duplex websocket carrying streamed reply chunks.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use chatframe_core::ChatError;

/// Text frame that marks the end of a streamed reply.
pub const STREAM_END_SENTINEL: &str = "/stop/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    Chunk(String),
    End,
}

impl StreamFrame {
    pub fn from_text(text: &str) -> Self {
        if text == STREAM_END_SENTINEL {
            StreamFrame::End
        } else {
            StreamFrame::Chunk(text.to_string())
        }
    }
}

/// Receiving half yields frames; sending half writes text frames.
pub struct StreamTransport {
    frames: mpsc::UnboundedReceiver<StreamFrame>,
    outbound: mpsc::UnboundedSender<String>,
    task: Option<JoinHandle<()>>,
}

impl StreamTransport {
    /// Open `{endpoint}?sessionId={session_id}`.
    pub async fn connect(endpoint: &str, session_id: &str) -> Result<Self, ChatError> {
        let url = format!("{endpoint}?sessionId={}", urlencoding::encode(session_id));
        let (socket, _) = connect_async(url.as_str())
            .await
            .map_err(|e| ChatError::Transport(format!("websocket connect to {endpoint} failed: {e}")))?;
        info!(endpoint, session_id, "Streaming websocket connected");

        let (mut sink, mut source) = socket.split();
        let (frame_tx, frames) = mpsc::unbounded_channel();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<String>();

        let task = tokio::spawn(async move {
            let mut send_task = tokio::spawn(async move {
                while let Some(text) = outbound_rx.recv().await {
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                let _ = sink.close().await;
            });

            let mut recv_task = tokio::spawn(async move {
                while let Some(msg) = source.next().await {
                    match msg {
                        Ok(Message::Text(text)) => {
                            if frame_tx.send(StreamFrame::from_text(text.as_str())).is_err() {
                                break;
                            }
                        }
                        Ok(Message::Close(_)) => break,
                        Ok(_) => {}
                        Err(e) => {
                            warn!(error = %e, "Streaming websocket error");
                            break;
                        }
                    }
                }
            });

            // If either half exits, abort the other.
            tokio::select! {
                _ = (&mut send_task) => recv_task.abort(),
                _ = (&mut recv_task) => send_task.abort(),
            }
            debug!("Streaming websocket closed");
        });

        Ok(Self {
            frames,
            outbound,
            task: Some(task),
        })
    }

    /// Build a transport over in-process channels.
    pub fn from_channel(
        frames: mpsc::UnboundedReceiver<StreamFrame>,
        outbound: mpsc::UnboundedSender<String>,
    ) -> Self {
        Self {
            frames,
            outbound,
            task: None,
        }
    }

    /// Next frame, or `None` once the socket is gone.
    pub async fn next_frame(&mut self) -> Option<StreamFrame> {
        self.frames.recv().await
    }

    pub fn send(&self, text: impl Into<String>) -> Result<(), ChatError> {
        self.outbound
            .send(text.into())
            .map_err(|_| ChatError::Transport("streaming websocket is closed".into()))
    }
}

impl Drop for StreamTransport {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Opens a transport for a session on demand.
#[async_trait]
pub trait StreamConnector: Send + Sync {
    async fn connect(&self, session_id: &str) -> Result<StreamTransport, ChatError>;
}

/// Connects to a fixed websocket endpoint.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    endpoint: String,
}

impl WebSocketConnector {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl StreamConnector for WebSocketConnector {
    async fn connect(&self, session_id: &str) -> Result<StreamTransport, ChatError> {
        StreamTransport::connect(&self.endpoint, session_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::ws::{Message as AxumMessage, WebSocket, WebSocketUpgrade};
    use axum::extract::Query;
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::Router;
    use std::collections::HashMap;

    async fn ws_handler(
        ws: WebSocketUpgrade,
        Query(params): Query<HashMap<String, String>>,
    ) -> impl IntoResponse {
        let session_id = params.get("sessionId").cloned().unwrap_or_default();
        ws.on_upgrade(move |socket| stream_reply(socket, session_id))
    }

    /// Waits for one text frame, then streams the session id back in chunks.
    async fn stream_reply(mut socket: WebSocket, session_id: String) {
        let Some(Ok(AxumMessage::Text(request))) = socket.recv().await else {
            return;
        };
        for chunk in [format!("{request}:"), session_id, STREAM_END_SENTINEL.to_string()] {
            if socket.send(AxumMessage::Text(chunk)).await.is_err() {
                return;
            }
        }
    }

    #[tokio::test]
    async fn frames_arrive_in_order_and_end_on_sentinel() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, Router::new().route("/ws", get(ws_handler)))
                .await
                .unwrap();
        });

        let connector = WebSocketConnector::new(format!("ws://{addr}/ws"));
        let mut transport = connector.connect("chatframe-ab12").await.unwrap();
        transport.send("hello").unwrap();

        assert_eq!(transport.next_frame().await, Some(StreamFrame::Chunk("hello:".into())));
        assert_eq!(
            transport.next_frame().await,
            Some(StreamFrame::Chunk("chatframe-ab12".into()))
        );
        assert_eq!(transport.next_frame().await, Some(StreamFrame::End));
    }

    #[tokio::test]
    async fn channel_transport_relays_frames() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let mut transport = StreamTransport::from_channel(rx, out_tx);
        tx.send(StreamFrame::from_text("chunk")).unwrap();
        tx.send(StreamFrame::from_text(STREAM_END_SENTINEL)).unwrap();
        drop(tx);

        transport.send("ping").unwrap();
        assert_eq!(out_rx.recv().await.as_deref(), Some("ping"));
        assert_eq!(transport.next_frame().await, Some(StreamFrame::Chunk("chunk".into())));
        assert_eq!(transport.next_frame().await, Some(StreamFrame::End));
        assert_eq!(transport.next_frame().await, None);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transport_error() {
        let err = StreamTransport::connect("ws://127.0.0.1:9/ws", "s").await.err().unwrap();
        assert!(matches!(err, ChatError::Transport(_)));
    }
}
