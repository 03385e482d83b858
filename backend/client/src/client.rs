//! reqwest client for the conversational text API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, Response};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info};

use chatframe_config::BackendConfig;
use chatframe_core::{ChatError, CredentialProvider, MessageKind, Submission};
use chatframe_logging::redact_json;

use crate::normalize::normalize_text_response;
use crate::wire::{SessionRequest, TextRequest, TextResponse};

/// Body marker of a fulfilment timeout reported by the backend.
const PERMISSIBLE_TIME: &str = "permissible time";

const PROMPT_NOT_FOUND: &str = "err - prompt not found";
const RESPONSE_NOT_FOUND: &str = "err - response not found";

/// The conversation backend as the session sees it.
#[async_trait]
pub trait ConversationBackend: Send + Sync {
    async fn start_session(&self) -> Result<Value, ChatError>;
    async fn delete_session(&self) -> Result<Value, ChatError>;
    async fn post_text(&self, submission: &Submission) -> Result<TextResponse, ChatError>;
    /// Id sent with every request.
    async fn session_id(&self) -> String;
}

pub struct BackendClient {
    base_url: String,
    http: Client,
    credentials: Arc<dyn CredentialProvider>,
    session_id: RwLock<String>,
}

impl BackendClient {
    pub fn new(
        config: &BackendConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, ChatError> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| ChatError::Transport(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            base_url: config.api_url.trim_end_matches('/').to_string(),
            http,
            credentials,
            session_id: RwLock::new(default_session_id()),
        })
    }

    /// Use a fixed session id instead of a generated one.
    pub fn with_session_id(self, session_id: impl Into<String>) -> Self {
        Self {
            session_id: RwLock::new(session_id.into()),
            ..self
        }
    }

    /// Resolve credentials; an identity id replaces the session id.
    async fn init_credentials(&self) -> Result<String, ChatError> {
        let credentials = self
            .credentials
            .credentials()
            .await?
            .filter(|c| !c.is_empty())
            .ok_or(ChatError::MissingCredentials)?;
        debug!(credentials = %redact_json(&serde_json::Value::Object(credentials.0.clone())), "Resolved credentials");

        let mut session_id = self.session_id.write().await;
        if let Some(identity_id) = credentials.identity_id() {
            *session_id = identity_id.to_string();
        }
        Ok(session_id.clone())
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<Value, ChatError> {
        let url = format!("{}{}", self.base_url, path);
        let res = self
            .http
            .request(method, &url)
            .json(body)
            .send()
            .await
            .map_err(classify_transport)?;
        read_body(res).await
    }
}

#[async_trait]
impl ConversationBackend for BackendClient {
    async fn start_session(&self) -> Result<Value, ChatError> {
        let session_id = self.init_credentials().await?;
        info!(session_id = %session_id, "Starting new session");
        self.send(Method::PUT, "/session", &SessionRequest { session_id })
            .await
    }

    async fn delete_session(&self) -> Result<Value, ChatError> {
        let session_id = self.init_credentials().await?;
        info!(session_id = %session_id, "Deleting session");
        self.send(Method::DELETE, "/session", &SessionRequest { session_id })
            .await
    }

    async fn post_text(&self, submission: &Submission) -> Result<TextResponse, ChatError> {
        let session_id = self.init_credentials().await?;
        let body = text_request(session_id, submission);
        debug!(session_id = %body.session_id, kind = submission.kind.as_str(), "Posting text");
        let reply = self.send(Method::POST, "/text", &body).await?;
        normalize_text_response(reply)
    }

    async fn session_id(&self) -> String {
        self.session_id.read().await.clone()
    }
}

fn text_request(session_id: String, submission: &Submission) -> TextRequest {
    let mut body = TextRequest {
        session_id,
        text: submission.text.clone(),
        kind: None,
        prompt: None,
        response: None,
    };
    if submission.kind == MessageKind::Feedback {
        let feedback = submission.feedback.clone().unwrap_or_default();
        body.kind = Some(MessageKind::Feedback.as_str().to_string());
        body.prompt = Some(feedback.prompt.unwrap_or_else(|| PROMPT_NOT_FOUND.to_string()));
        body.response = Some(feedback.response.unwrap_or_else(|| RESPONSE_NOT_FOUND.to_string()));
    }
    body
}

/// `chatframe-` followed by four hex digits.
fn default_session_id() -> String {
    let simple = uuid::Uuid::new_v4().simple().to_string();
    format!("chatframe-{}", &simple[..4])
}

fn classify_transport(e: reqwest::Error) -> ChatError {
    if e.is_timeout() {
        ChatError::TimeoutRetryable(e.to_string())
    } else {
        ChatError::Transport(e.to_string())
    }
}

async fn read_body(res: Response) -> Result<Value, ChatError> {
    let status = res.status();
    let text = res.text().await.map_err(classify_transport)?;
    if !status.is_success() {
        if text.contains(PERMISSIBLE_TIME) {
            return Err(ChatError::TimeoutRetryable(text));
        }
        return Err(ChatError::BackendHttp {
            status: status.as_u16(),
        });
    }
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text).map_err(|e| ChatError::Decode(format!("invalid JSON reply: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::{post, put};
    use axum::{Json, Router};
    use chatframe_core::StaticCredentials;
    use serde_json::json;

    type Seen = Arc<Mutex<Vec<Value>>>;

    async fn spawn_backend(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn config(api_url: String) -> BackendConfig {
        BackendConfig {
            api_url,
            request_timeout_ms: 2_000,
            ..Default::default()
        }
    }

    fn recording_router(seen: Seen) -> Router {
        async fn text(State(seen): State<Seen>, Json(body): Json<Value>) -> Json<Value> {
            seen.lock().unwrap().push(body);
            Json(json!({"dialogState": "Fulfilled", "message": "ok"}))
        }
        async fn session(State(seen): State<Seen>, Json(body): Json<Value>) -> Json<Value> {
            seen.lock().unwrap().push(body);
            Json(json!({}))
        }
        Router::new()
            .route("/text", post(text))
            .route("/session", put(session).delete(session))
            .with_state(seen)
    }

    #[test]
    fn default_session_id_has_four_hex_digits() {
        let id = default_session_id();
        let suffix = id.strip_prefix("chatframe-").unwrap();
        assert_eq!(suffix.len(), 4);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn identity_id_becomes_session_id() {
        let seen: Seen = Arc::default();
        let url = spawn_backend(recording_router(seen.clone())).await;
        let client =
            BackendClient::new(&config(url), Arc::new(StaticCredentials::identity("us-east-1:abc"))).unwrap();

        let resp = client.post_text(&Submission::human("hi")).await.unwrap();
        assert_eq!(resp.message, "ok");
        client.start_session().await.unwrap();
        client.delete_session().await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0], json!({"sessionId": "us-east-1:abc", "text": "hi"}));
        assert_eq!(seen[1], json!({"sessionId": "us-east-1:abc"}));
        assert_eq!(seen.len(), 3);
    }

    #[tokio::test]
    async fn feedback_carries_placeholders() {
        let seen: Seen = Arc::default();
        let url = spawn_backend(recording_router(seen.clone())).await;
        let client = BackendClient::new(&config(url), Arc::new(StaticCredentials::identity("id")))
            .unwrap();
        client
            .post_text(&Submission::feedback("Thumbs up", Some("q".into()), None))
            .await
            .unwrap();
        assert_eq!(
            seen.lock().unwrap()[0],
            json!({
                "sessionId": "id",
                "text": "Thumbs up",
                "type": "feedback",
                "prompt": "q",
                "response": "err - response not found"
            })
        );
    }

    #[tokio::test]
    async fn missing_credentials_fail_every_call() {
        let client = BackendClient::new(
            &config("http://127.0.0.1:9".into()),
            Arc::new(StaticCredentials::none()),
        )
        .unwrap()
        .with_session_id("fixed");
        assert!(matches!(client.start_session().await, Err(ChatError::MissingCredentials)));
        assert!(matches!(client.delete_session().await, Err(ChatError::MissingCredentials)));
        assert!(matches!(
            client.post_text(&Submission::human("x")).await,
            Err(ChatError::MissingCredentials)
        ));
        assert_eq!(client.session_id().await, "fixed");
    }

    #[tokio::test]
    async fn http_errors_are_classified() {
        async fn fail() -> (StatusCode, &'static str) {
            (StatusCode::INTERNAL_SERVER_ERROR, "boom")
        }
        async fn slow() -> (StatusCode, &'static str) {
            (
                StatusCode::BAD_REQUEST,
                "Lambda did not respond in the permissible time",
            )
        }
        let url = spawn_backend(
            Router::new()
                .route("/text", post(slow))
                .route("/session", put(fail)),
        )
        .await;
        let client =
            BackendClient::new(&config(url), Arc::new(StaticCredentials::identity("id"))).unwrap();

        let err = client.start_session().await.unwrap_err();
        assert!(matches!(err, ChatError::BackendHttp { status: 500 }));
        assert!(!err.is_retryable());

        let err = client.post_text(&Submission::human("x")).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
