//! Config validation with field paths.

use thiserror::Error;

use chatframe_core::ChatError;

use crate::schema::WidgetConfig;

/// A config validation finding with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// All findings from one validation pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate the widget config and report errors and warnings.
pub fn validate(config: &WidgetConfig) -> ValidationReport {
    let mut report = ValidationReport::default();

    let backend = &config.backend;
    if backend.api_url.trim().is_empty() {
        report.error("backend.apiUrl", "apiUrl is required");
    }
    if backend.allow_streaming_responses && backend.streaming_web_socket_endpoint.is_empty() {
        report.error(
            "backend.streamingWebSocketEndpoint",
            "streaming responses are enabled but no websocket endpoint is set",
        );
    }
    if backend.streaming_tick_ms == 0 {
        report.error("backend.streamingTickMs", "streamingTickMs must be > 0");
    }
    if backend.retry_on_post_text_timeout && backend.retry_count_post_text_timeout == 0 {
        report.warn(
            "backend.retryCountPostTextTimeout",
            "retries are enabled but the retry count is 0",
        );
    }

    let ui = &config.ui;
    if ui.parent_origin.is_empty() {
        report.warn("ui.parentOrigin", "parentOrigin is empty; the current origin will be used");
    }
    if ui.toolbar_title.is_empty() {
        report.warn("ui.toolbarTitle", "toolbarTitle is empty; persisted UI state keys collide");
    }

    report
}

/// Parent-side loader check: fail on the first required field that is empty.
pub fn validate_loader_config(config: &WidgetConfig) -> Result<(), ChatError> {
    let required = [
        ("iframe.iframeOrigin", &config.iframe.iframe_origin),
        ("iframe.iframeSrcPath", &config.iframe.iframe_src_path),
        ("ui.parentOrigin", &config.ui.parent_origin),
    ];
    for (field, value) in required {
        if value.is_empty() {
            return Err(ChatError::ConfigValidation {
                missing_field: field.to_string(),
            });
        }
    }
    Ok(())
}
