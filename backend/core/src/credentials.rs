//! Opaque credential objects and the seam that resolves them.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Credentials are passed through untouched; only the identity id is read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credentials(pub Map<String, Value>);

impl Credentials {
    pub fn identity_id(&self) -> Option<&str> {
        self.0
            .get("identityId")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Resolves the credentials required for every backend call.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn credentials(&self) -> Result<Option<Credentials>>;
}

/// Fixed credentials, handy for the CLI and for tests.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials(Option<Credentials>);

impl StaticCredentials {
    pub fn new(credentials: Credentials) -> Self {
        Self(Some(credentials))
    }

    pub fn none() -> Self {
        Self(None)
    }

    /// Credentials carrying nothing but an identity id.
    pub fn identity(identity_id: impl Into<String>) -> Self {
        let mut map = Map::new();
        map.insert("identityId".into(), Value::String(identity_id.into()));
        Self::new(Credentials(map))
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn credentials(&self) -> Result<Option<Credentials>> {
        Ok(self.0.clone())
    }
}
