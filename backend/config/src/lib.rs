//! `chatframe-config`: widget configuration.
//!
//! Provides:
//! - Typed config schema (`backend`, `ui`, `iframe`)
//! - Schema-driven merge, deep merge and the loader's non-empty merge
//! - YAML/JSON file source and the `widgetConfig` URL query source
//! - Built-in defaults and loader origin inference
//! - Validation

pub mod defaults;
pub mod io;
pub mod merge;
pub mod query;
pub mod schema;
pub mod validation;

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use serde_json::Value;
use tracing::{error, warn};

use chatframe_core::ChatError;

pub use defaults::{apply_loader_defaults, loader_base_config};
pub use io::{config_dir, config_file_path, load_config_file};
pub use merge::{merge, merge_non_empty, merge_typed};
pub use query::{config_from_query, parse_query_params, CONFIG_QUERY_PARAM};
pub use schema::{BackendConfig, IframeConfig, UiConfig, WidgetConfig};
pub use validation::{validate, validate_loader_config, ConfigValidationError, ValidationReport};

/// A config resolved from every source, plus the page's query parameters.
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    pub config: WidgetConfig,
    pub query_params: HashMap<String, String>,
}

/// Resolve the config for a page: defaults < file < URL query.
///
/// Validation warnings and errors are logged; they do not fail the load.
pub async fn load_layered(file: Option<&Path>, page_url: &str) -> Result<LayeredConfig> {
    let mut config = WidgetConfig::default();

    if let Some(path) = file {
        let file_config = load_config_file(path).await?;
        config = merge_typed(&config, &file_config, false)?;
    }

    let query_params = parse_query_params(page_url);
    let query_config = config_from_query(&query_params);
    config = merge_typed(&config, &query_config, false)?;

    let report = validate(&config);
    for warning in &report.warnings {
        warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    for error in &report.errors {
        error!(path = %error.path, message = %error.message, "Config error");
    }

    Ok(LayeredConfig { config, query_params })
}

/// Build the parent-side loader config from host-supplied overrides.
///
/// Empty override values are ignored, origins are inferred, and the
/// required fields are checked.
pub fn prepare_loader_config(overrides: &Value, current_origin: &str) -> Result<WidgetConfig, ChatError> {
    let merged = merge_non_empty(&loader_base_config().to_value(), overrides);
    let config = WidgetConfig::from_value(merged)?;
    let config = apply_loader_defaults(config, current_origin);
    validate_loader_config(&config)?;
    Ok(config)
}
