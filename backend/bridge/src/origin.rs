//! Target-origin selection for messages sent to the host page.

/// The origin to post to the host page with.
///
/// Normally the configured parent origin. When it differs from the
/// widget's own origin but both share the first `.`-separated label (a
/// region-specific host of the same site), the widget's origin is used.
pub fn target_origin(configured_parent: &str, current: &str) -> String {
    if configured_parent != current {
        let configured_label = configured_parent.split('.').next();
        let current_label = current.split('.').next();
        if configured_label == current_label {
            return current.to_string();
        }
    }
    configured_parent.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_origin_is_kept() {
        assert_eq!(
            target_origin("https://chat.example.com", "https://chat.example.com"),
            "https://chat.example.com"
        );
    }

    #[test]
    fn shared_first_label_uses_current_origin() {
        assert_eq!(
            target_origin("https://chat.example.com", "https://chat.eu-west-1.example.com"),
            "https://chat.eu-west-1.example.com"
        );
    }

    #[test]
    fn different_first_label_keeps_configured_origin() {
        assert_eq!(
            target_origin("https://host.example.com", "https://bot.example.com"),
            "https://host.example.com"
        );
        assert_eq!(
            target_origin("http://localhost:8000", "http://localhost:8080"),
            "http://localhost:8000"
        );
    }
}
