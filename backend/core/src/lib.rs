pub mod card;
pub mod credentials;
pub mod error;
pub mod message;
pub mod storage;
pub mod turn;

pub use card::{AltRenderings, AppContext, CardButton, GenericAttachment, ResponseCard};
pub use credentials::{CredentialProvider, Credentials, StaticCredentials};
pub use error::{ChatError, ProtocolViolation};
pub use message::{FeedbackContext, Message, MessageDraft, MessageKind, Submission};
pub use storage::{KeyValueStorage, MemoryStorage};
pub use turn::{ConversationTurnState, DIALOG_STATE_FAILED, DIALOG_STATE_FULFILLED};
