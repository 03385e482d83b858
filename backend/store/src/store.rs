//! Shared, observable handle to the widget state.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};

use crate::mutations::{apply, Mutation};
use crate::state::WidgetState;

/// Sent to subscribers after every applied mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    pub mutation: &'static str,
}

/// Cloneable handle; clones share the same state.
#[derive(Clone)]
pub struct Store {
    state: Arc<RwLock<WidgetState>>,
    changes: broadcast::Sender<StateChange>,
}

impl Store {
    pub fn new(state: WidgetState) -> Self {
        let (changes, _) = broadcast::channel(256);
        Self {
            state: Arc::new(RwLock::new(state)),
            changes,
        }
    }

    /// Apply a mutation under the write lock and notify subscribers.
    pub async fn commit(&self, mutation: Mutation) {
        let name = mutation.name();
        {
            let mut state = self.state.write().await;
            apply(&mut state, mutation);
        }
        debug!(mutation = name, "Committed");
        let _ = self.changes.send(StateChange { mutation: name });
    }

    /// Commit a mutation given by name with an untyped payload.
    ///
    /// Payloads of the wrong type are logged and ignored; returns whether
    /// the mutation was applied.
    pub async fn commit_raw(&self, name: &str, payload: Value) -> bool {
        match Mutation::from_raw(name, &payload) {
            Ok(mutation) => {
                self.commit(mutation).await;
                true
            }
            Err(e) => {
                warn!(mutation = name, error = %e, "Rejected mutation");
                false
            }
        }
    }

    /// Run `f` against a consistent view of the state.
    pub async fn read<R>(&self, f: impl FnOnce(&WidgetState) -> R) -> R {
        let state = self.state.read().await;
        f(&state)
    }

    /// Clone of the whole state.
    pub async fn snapshot(&self) -> WidgetState {
        self.state.read().await.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.changes.subscribe()
    }

    pub async fn last_utterance(&self) -> Option<String> {
        self.read(|s| s.last_utterance().map(str::to_string)).await
    }

    pub async fn is_processing(&self) -> bool {
        self.read(WidgetState::is_processing).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn commit_notifies_subscribers() {
        let store = Store::new(WidgetState::default());
        let mut rx = store.subscribe();
        store.commit(Mutation::SetIsProcessing(true)).await;
        assert_eq!(rx.recv().await.unwrap().mutation, "setIsProcessing");
        assert!(store.is_processing().await);
    }

    #[tokio::test]
    async fn raw_non_boolean_is_a_no_op() {
        let store = Store::new(WidgetState::default());
        let mut rx = store.subscribe();
        assert!(!store.commit_raw("setIsRunningEmbedded", json!("yes")).await);
        assert!(!store.read(|s| s.is_running_embedded).await);
        assert!(rx.try_recv().is_err());

        assert!(store.commit_raw("pushUtterance", json!("hello")).await);
        assert_eq!(store.last_utterance().await.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn concurrent_commits_are_all_applied() {
        let store = Store::new(WidgetState::default());
        let handles: Vec<_> = (0..50)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.commit(Mutation::PushUtterance(format!("u{i}"))).await })
            })
            .collect();
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(store.read(|s| s.utterances.len()).await, 50);
    }
}
