//! Validation of inbound bridge messages and the single-use reply handle.

use serde_json::Value;
use tracing::{debug, warn};

use chatframe_core::{ChatError, ProtocolViolation};

use crate::port::MessagePort;
use crate::protocol::{BridgeEvent, Reply, SOURCE_TAG};
use crate::window::MessageEvent;

/// Answers one request. Consumed by the first reply.
#[derive(Debug)]
pub struct Responder {
    port: MessagePort,
    kind: &'static str,
}

impl Responder {
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn resolve(self, data: Option<Value>) -> Result<(), ChatError> {
        self.port.post_message(Reply::resolve(self.kind, data).to_value())
    }

    pub fn reject(self, error: impl Into<String>) -> Result<(), ChatError> {
        let error = error.into();
        debug!(event = self.kind, %error, "Rejecting bridge request");
        self.port.post_message(Reply::reject(self.kind, error).to_value())
    }
}

/// A request that passed every check.
#[derive(Debug)]
pub struct Inbound<E> {
    pub event: E,
    pub responder: Responder,
    /// The raw envelope as received.
    pub data: Value,
}

/// Check an inbound message against the protocol.
///
/// Checks run in order: source tag, exact sender origin, reply port,
/// `event` field, then a known event with a decodable payload. The first
/// failure wins. A refused message gets no reply.
pub fn validate_inbound<E: BridgeEvent>(
    message: MessageEvent,
    expected_origin: &str,
) -> Result<Inbound<E>, ProtocolViolation> {
    let MessageEvent { data, origin, ports } = message;

    match data.get("source").and_then(Value::as_str) {
        Some(SOURCE_TAG) => {}
        other => return Err(ProtocolViolation::SourceTag(other.map(str::to_string))),
    }

    if origin != expected_origin {
        return Err(ProtocolViolation::Origin {
            expected: expected_origin.to_string(),
            actual: origin,
        });
    }

    let Some(port) = ports.into_iter().next() else {
        return Err(ProtocolViolation::MissingPort);
    };

    let name = match data.get("event") {
        Some(Value::String(name)) => name.clone(),
        Some(other) => return Err(ProtocolViolation::UnknownEvent(other.to_string())),
        None => return Err(ProtocolViolation::MissingEvent),
    };
    let Some(kind) = E::NAMES.iter().copied().find(|n| *n == name) else {
        return Err(ProtocolViolation::UnknownEvent(name));
    };

    let event: E = serde_json::from_value(data.clone())
        .map_err(|e| ProtocolViolation::MalformedPayload(format!("{kind}: {e}")))?;

    Ok(Inbound {
        event,
        responder: Responder { port, kind },
        data,
    })
}

/// Like [`validate_inbound`], logging and swallowing refusals.
pub fn accept<E: BridgeEvent>(message: MessageEvent, expected_origin: &str) -> Option<Inbound<E>> {
    match validate_inbound(message, expected_origin) {
        Ok(inbound) => Some(inbound),
        Err(reason) => {
            warn!(%reason, "Dropping bridge message");
            None
        }
    }
}
