//! `chatframe-bridge`: messaging between the host page and the widget frame.
//!
//! Provides:
//! - In-process windows, message ports and a document event bus
//! - The tagged envelope and the closed event sets for each direction
//! - Inbound validation with a single-use [`Responder`]
//! - Acknowledged outbound sends and the target-origin rule
//! - The parent-side [`IframeLoader`] and the host-facing [`HostApi`]

pub mod host_api;
pub mod inbound;
pub mod loader;
pub mod origin;
pub mod outbound;
pub mod port;
pub mod protocol;
pub mod window;

pub use host_api::{HostApi, MESSAGE_TYPE_BUTTON, MESSAGE_TYPE_HUMAN};
pub use inbound::{accept, validate_inbound, Inbound, Responder};
pub use loader::{
    ContainerState, FrameMount, IframeLoader, HOST_MESSAGE_EVENT, HOST_READY_EVENT,
    MESSAGE_RECEIVED_EVENT, UPDATE_SESSION_STATE_EVENT,
};
pub use origin::target_origin;
pub use outbound::{send_over_channel, BridgeOutcome, ParentLink, FULL_PAGE_EVENT};
pub use port::{MessageChannel, MessagePort};
pub use protocol::{envelope, BridgeEvent, IframeEvent, ParentEvent, Reply, ReplyStatus, SOURCE_TAG};
pub use window::{DocumentEvent, DocumentEvents, MessageEvent, Window, WindowHandle, WindowInbox};
