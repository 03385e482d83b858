use thiserror::Error;

/// Top-level error type for the chatframe widget.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("credentials are undefined")]
    MissingCredentials,

    #[error("HTTP error! status: {status}")]
    BackendHttp { status: u16 },

    /// The backend (or the transport) gave up waiting for fulfilment.
    /// This is the only class of failure the submit pipeline resubmits.
    /// Carries the backend's own message, which already says what timed out.
    #[error("{0}")]
    TimeoutRetryable(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("config object is missing required field: {missing_field}")]
    ConfigValidation { missing_field: String },

    #[error("bridge timed out waiting for {0}")]
    BridgeTimeout(String),

    #[error("bridge protocol violation: {reason}")]
    BridgeProtocol { reason: ProtocolViolation },

    #[error("peer failed to handle message - {0}")]
    BridgeRejected(String),

    #[error("reply port closed before a reply arrived")]
    BridgeClosed,

    #[error("storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ChatError {
    /// Whether the submit pipeline may resubmit after this failure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ChatError::TimeoutRetryable(_))
    }
}

impl From<ProtocolViolation> for ChatError {
    fn from(reason: ProtocolViolation) -> Self {
        ChatError::BridgeProtocol { reason }
    }
}

/// Why an inbound cross-document message was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    /// Envelope did not carry the fixed source tag.
    #[error("unexpected source tag {}", .0.as_deref().unwrap_or("(none)"))]
    SourceTag(Option<String>),
    /// Sender origin did not exactly match the expected origin.
    #[error("postMessage from invalid origin {actual} (expected {expected})")]
    Origin { expected: String, actual: String },
    /// Message was not sent over a message channel.
    #[error("postMessage not sent over MessageChannel")]
    MissingPort,
    /// Envelope has no `event` field.
    #[error("message does not have the event field")]
    MissingEvent,
    /// No handler for this event on the receiving side. Names that only
    /// exist on a prototype chain in a browser (`toString`, `__proto__`)
    /// land here too.
    #[error("unknown message event {0:?}")]
    UnknownEvent(String),
    /// The event is known but its payload did not decode.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}
