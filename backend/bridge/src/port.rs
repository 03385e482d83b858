//! Entangled message ports.
//!
//! A [`MessageChannel`] is a pair of ports; whatever one port posts, the
//! other receives. Dropping a port closes its side.

use serde_json::Value;
use tokio::sync::mpsc;

use chatframe_core::ChatError;

#[derive(Debug)]
pub struct MessagePort {
    tx: mpsc::UnboundedSender<Value>,
    rx: mpsc::UnboundedReceiver<Value>,
}

impl MessagePort {
    /// Post to the entangled port. Fails once that port is gone.
    pub fn post_message(&self, data: Value) -> Result<(), ChatError> {
        self.tx.send(data).map_err(|_| ChatError::BridgeClosed)
    }

    /// Next message, or `None` once the entangled port is dropped.
    pub async fn recv(&mut self) -> Option<Value> {
        self.rx.recv().await
    }
}

#[derive(Debug)]
pub struct MessageChannel {
    pub port1: MessagePort,
    pub port2: MessagePort,
}

impl MessageChannel {
    pub fn new() -> Self {
        let (tx1, rx2) = mpsc::unbounded_channel();
        let (tx2, rx1) = mpsc::unbounded_channel();
        Self {
            port1: MessagePort { tx: tx1, rx: rx1 },
            port2: MessagePort { tx: tx2, rx: rx2 },
        }
    }
}

impl Default for MessageChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn ports_are_entangled() {
        let MessageChannel { mut port1, mut port2 } = MessageChannel::new();
        port2.post_message(json!({"event": "resolve"})).unwrap();
        assert_eq!(port1.recv().await, Some(json!({"event": "resolve"})));
        port1.post_message(json!(1)).unwrap();
        assert_eq!(port2.recv().await, Some(json!(1)));
    }

    #[tokio::test]
    async fn dropping_a_port_closes_the_other_side() {
        let MessageChannel { mut port1, port2 } = MessageChannel::new();
        drop(port2);
        assert_eq!(port1.recv().await, None);
        assert!(matches!(port1.post_message(json!(null)), Err(ChatError::BridgeClosed)));
    }
}
