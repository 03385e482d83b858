//! Build-time config file loading.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use tokio::fs;
use tracing::{debug, info};

/// Default config file name within the config directory.
const CONFIG_FILE_NAME: &str = "chatframe-config.yaml";

/// Resolve the chatframe config directory.
/// Priority: `CHATFRAME_CONFIG_DIR` env > `~/.chatframe/`
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CHATFRAME_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    match dirs::home_dir() {
        Some(home) => home.join(".chatframe"),
        None => PathBuf::from(".chatframe"),
    }
}

/// Resolve the full path to the default config file.
pub fn config_file_path(config_dir: &Path) -> PathBuf {
    config_dir.join(CONFIG_FILE_NAME)
}

/// Load a config file as a merge tree.
///
/// `.yaml`/`.yml` files are parsed as YAML, anything else as JSON.
/// Returns an empty object if the file doesn't exist.
pub async fn load_config_file(path: &Path) -> Result<Value> {
    if !fs::try_exists(path).await.unwrap_or(false) {
        debug!(path = %path.display(), "Config file does not exist; using defaults");
        return Ok(Value::Object(Map::new()));
    }

    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    let value: Value = if is_yaml {
        serde_yaml::from_str(&raw)
            .with_context(|| format!("Failed to parse config YAML at: {}", path.display()))?
    } else {
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config JSON at: {}", path.display()))?
    };

    let value = match value {
        Value::Null => Value::Object(Map::new()),
        Value::Object(_) => value,
        _ => bail!("Config file {} does not contain an object", path.display()),
    };

    info!(path = %path.display(), "Loaded config");
    Ok(value)
}
