//! `chatframe-store`: the widget's single mutable resource.
//!
//! State lives in a [`WidgetState`]; [`apply`] is the pure transition
//! function; [`Store`] shares the state behind one lock and broadcasts a
//! change notice per commit. Transcripts persist as a [`SessionSnapshot`].

pub mod file_storage;
pub mod mutations;
pub mod snapshot;
pub mod state;
pub mod store;

pub use file_storage::FileStorage;
pub use mutations::{apply, Mutation};
pub use snapshot::{SessionSnapshot, SNAPSHOT_KEY};
pub use state::{ChatMode, StreamState, WidgetState, UTTERANCE_HISTORY_CAP};
pub use store::{StateChange, Store};
