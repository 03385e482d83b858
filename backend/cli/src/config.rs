use std::path::PathBuf;

use chatframe_config::config_dir;

/// Process-level settings for the `chatframe` binary.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the config file, logs and saved transcripts
    pub home: PathBuf,
    /// Log level when `RUST_LOG` is unset
    pub log_level: String,
    /// Identity id sent as credentials; the backend session id follows it
    pub identity_id: Option<String>,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    pub fn from_env() -> Self {
        Self {
            home: config_dir(),
            log_level: std::env::var("CHATFRAME_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            identity_id: std::env::var("CHATFRAME_IDENTITY_ID").ok().filter(|id| !id.is_empty()),
        }
    }

    pub fn log_dir(&self) -> PathBuf {
        self.home.join("logs")
    }

    pub fn session_dir(&self) -> PathBuf {
        self.home.join("session")
    }
}
