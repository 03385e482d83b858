//! Built-in defaults, the lowest-precedence config layer.

use serde_json::Map;
use tracing::debug;

use crate::schema::{BackendConfig, IframeConfig, UiConfig, WidgetConfig};

/// Default backend endpoint.
pub const DEFAULT_API_URL: &str = "http://localhost:3000";

/// Default greeting shown in an empty transcript.
pub const DEFAULT_INITIAL_TEXT: &str = "How can I help you?";

/// Default parent page origin.
pub const DEFAULT_PARENT_ORIGIN: &str = "http://localhost:8000";

/// Default origin serving the embedded widget.
pub const DEFAULT_IFRAME_ORIGIN: &str = "http://localhost:8080";

/// Default iframe path; the query string switches the widget into embedded mode.
pub const DEFAULT_IFRAME_SRC_PATH: &str = "/#/?embed=true";

/// Default playback interval for streamed chunks (milliseconds).
pub const DEFAULT_STREAMING_TICK_MS: u64 = 500;

/// Default HTTP request timeout (milliseconds).
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            initial_text: DEFAULT_INITIAL_TEXT.to_string(),
            initial_utterance: String::new(),
            re_init_session_attributes_on_restart: false,
            session_attributes: Map::new(),
            retry_on_post_text_timeout: false,
            retry_count_post_text_timeout: 1,
            allow_streaming_responses: false,
            streaming_web_socket_endpoint: String::new(),
            streaming_tick_ms: DEFAULT_STREAMING_TICK_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            parent_origin: DEFAULT_PARENT_ORIGIN.to_string(),
            toolbar_title: "Chat".to_string(),
            show_error_details: false,
            save_history: false,
            push_initial_text_on_restart: false,
            hide_button_message_bubble: false,
            message_sent_sfx: String::new(),
            message_received_sfx: String::new(),
            positive_feedback_intent: "Thumbs up".to_string(),
            negative_feedback_intent: "Thumbs down".to_string(),
            help_intent: String::new(),
            back_button: false,
            message_menu: true,
        }
    }
}

impl Default for IframeConfig {
    fn default() -> Self {
        Self {
            iframe_origin: DEFAULT_IFRAME_ORIGIN.to_string(),
            iframe_src_path: DEFAULT_IFRAME_SRC_PATH.to_string(),
            should_load_iframe_minimized: true,
        }
    }
}

/// The empty skeleton the parent-side loader starts from: every field
/// present (so merges keep their keys) but origins and path unset.
pub fn loader_base_config() -> WidgetConfig {
    let mut config = WidgetConfig::default();
    config.ui.parent_origin = String::new();
    config.iframe.iframe_origin = String::new();
    config.iframe.iframe_src_path = String::new();
    config
}

/// Fill the origins the loader can infer before validation.
///
/// `iframeOrigin` falls back to the parent origin, then to the page's own
/// origin; `parentOrigin` falls back to the iframe origin.
pub fn apply_loader_defaults(mut config: WidgetConfig, current_origin: &str) -> WidgetConfig {
    if config.iframe.iframe_origin.is_empty() {
        config.iframe.iframe_origin = if config.ui.parent_origin.is_empty() {
            current_origin.to_string()
        } else {
            config.ui.parent_origin.clone()
        };
        debug!(iframe_origin = %config.iframe.iframe_origin, "Inferred iframe origin");
    }
    if config.ui.parent_origin.is_empty() {
        config.ui.parent_origin = if config.iframe.iframe_origin.is_empty() {
            current_origin.to_string()
        } else {
            config.iframe.iframe_origin.clone()
        };
        debug!(parent_origin = %config.ui.parent_origin, "Inferred parent origin");
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loader_defaults_fill_iframe_origin_from_parent() {
        let mut cfg = loader_base_config();
        cfg.ui.parent_origin = "https://host.example".into();
        let cfg = apply_loader_defaults(cfg, "https://page.example");
        assert_eq!(cfg.iframe.iframe_origin, "https://host.example");
        assert_eq!(cfg.ui.parent_origin, "https://host.example");
    }

    #[test]
    fn loader_defaults_fall_back_to_current_origin() {
        let cfg = apply_loader_defaults(loader_base_config(), "https://page.example");
        assert_eq!(cfg.iframe.iframe_origin, "https://page.example");
        assert_eq!(cfg.ui.parent_origin, "https://page.example");
    }

    #[test]
    fn loader_defaults_keep_explicit_values() {
        let mut cfg = loader_base_config();
        cfg.ui.parent_origin = "https://host.example".into();
        cfg.iframe.iframe_origin = "https://bot.example".into();
        let cfg = apply_loader_defaults(cfg, "https://page.example");
        assert_eq!(cfg.iframe.iframe_origin, "https://bot.example");
        assert_eq!(cfg.ui.parent_origin, "https://host.example");
    }
}
