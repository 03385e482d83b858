//! `chatframe-client`: the conversational text API.
//!
//! `PUT /session`, `DELETE /session` and `POST /text`, credential
//! resolution, error classification, and normalization of replies into
//! one legacy shape.

pub mod client;
pub mod normalize;
pub mod wire;

pub use client::{BackendClient, ConversationBackend};
pub use normalize::normalize_text_response;
pub use wire::{LegacyMessage, MessageEnvelope, SessionRequest, TextRequest, TextResponse};
