//! Structured logging for chatframe.
//!
//! Console plus rolling NDJSON file output, conversation event records,
//! and redaction of credentials before they reach a log line.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::{ConversationEvent, EventLogEntry, EventLogger};
pub use logger::init_logger;
pub use redact::{redact_json, redact_sensitive_data};
