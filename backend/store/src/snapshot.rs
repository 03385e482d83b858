//! Transcript snapshots kept in session storage.

use serde::{Deserialize, Serialize};
use tracing::debug;

use chatframe_core::{ChatError, KeyValueStorage, Message};

/// Session-storage key holding the snapshot.
pub const SNAPSHOT_KEY: &str = "store";

/// Serialized form of the transcript; dates are RFC 3339 strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl SessionSnapshot {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// Load the snapshot, if one was saved.
    pub async fn load(storage: &dyn KeyValueStorage) -> Result<Option<Self>, ChatError> {
        let Some(raw) = storage.get_item(SNAPSHOT_KEY).await? else {
            return Ok(None);
        };
        let snapshot: Self = serde_json::from_str(&raw)
            .map_err(|e| ChatError::Decode(format!("invalid session snapshot: {e}")))?;
        debug!(messages = snapshot.messages.len(), "Loaded session snapshot");
        Ok(Some(snapshot))
    }

    pub async fn save(&self, storage: &dyn KeyValueStorage) -> Result<(), ChatError> {
        let raw = serde_json::to_string(self)
            .map_err(|e| ChatError::Decode(format!("cannot encode session snapshot: {e}")))?;
        storage.set_item(SNAPSHOT_KEY, &raw).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatframe_core::{MemoryStorage, MessageDraft};
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn snapshot_survives_storage_with_dates() {
        let storage = MemoryStorage::new();
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        let snapshot = SessionSnapshot::new(vec![MessageDraft::bot("hi").into_message(0, at)]);
        snapshot.save(&storage).await.unwrap();

        let raw = storage.get_item(SNAPSHOT_KEY).await.unwrap().unwrap();
        assert!(raw.contains("2024-05-01T12:30:00"));

        let loaded = SessionSnapshot::load(&storage).await.unwrap().unwrap();
        assert_eq!(loaded.messages[0].date, at);
        assert_eq!(loaded, snapshot);
    }

    #[tokio::test]
    async fn missing_snapshot_is_none() {
        assert!(SessionSnapshot::load(&MemoryStorage::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_decode_error() {
        let storage = MemoryStorage::new();
        storage.set_item(SNAPSHOT_KEY, "{oops").await.unwrap();
        let err = SessionSnapshot::load(&storage).await.unwrap_err();
        assert!(matches!(err, ChatError::Decode(_)));
    }
}
