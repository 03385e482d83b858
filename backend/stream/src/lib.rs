//! `chatframe-stream`: streamed reply transport.

pub mod transport;

pub use transport::{
    StreamConnector, StreamFrame, StreamTransport, WebSocketConnector, STREAM_END_SENTINEL,
};
