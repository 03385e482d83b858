//! `chatframe-session`: the conversation pipeline and the embedded widget runtime.
//!
//! Provides:
//! - [`ConversationSession`]: submit with bounded retry, session lifecycle, UI toggles
//! - Reply-to-transcript mapping for single and multi-message replies
//! - Typing playback of streamed replies
//! - [`EmbeddedWidget`]: the frame-side handshake and host event handling

pub mod embed;
pub mod playback;
pub mod response;
pub mod session;

pub use embed::{EmbeddedWidget, ParentCredentials, PARENT_READY_TIMEOUT};
pub use playback::{Playback, FALLBACK_TICK};
pub use response::{bot_messages, CUSTOM_PAYLOAD};
pub use session::{
    ConversationSession, Silent, SoundCue, SubmitOutcome, INITIAL_UTTERANCE_DELAY, SUBMIT_ERROR_TEXT,
};
