//! Typing effect for streamed replies.
//!
//! Chunks arriving on the stream transport are buffered in the store; a
//! fixed-interval tick types one buffered chunk at a time. Only one loop
//! runs at a time.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use chatframe_store::{Mutation, Store};
use chatframe_stream::{StreamFrame, StreamTransport};

/// Tick used when the configured one is zero.
pub const FALLBACK_TICK: Duration = Duration::from_millis(500);

#[derive(Debug, Default)]
pub struct Playback {
    task: Option<JoinHandle<()>>,
}

impl Playback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start typing frames from `transport`, cancelling any previous loop.
    pub fn start(&mut self, store: Store, transport: StreamTransport, tick: Duration) {
        self.cancel();
        let tick = if tick.is_zero() {
            warn!(fallback_ms = FALLBACK_TICK.as_millis() as u64, "Zero streaming tick; using the fallback");
            FALLBACK_TICK
        } else {
            tick
        };
        self.task = Some(tokio::spawn(run(store, transport, tick)));
    }

    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for Playback {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn run(store: Store, mut transport: StreamTransport, tick: Duration) {
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut intake_open = true;

    loop {
        tokio::select! {
            frame = transport.next_frame(), if intake_open => match frame {
                Some(StreamFrame::Chunk(chunk)) => store.commit(Mutation::PushStreamChunk(chunk)).await,
                Some(StreamFrame::End) | None => {
                    debug!("Stream intake finished");
                    intake_open = false;
                }
            },
            _ = interval.tick() => {
                store.commit(Mutation::TypeStreamChunk).await;
                let (active, pending) = store
                    .read(|s| (s.streaming.is_active, s.streaming.has_pending()))
                    .await;
                if !active || (!intake_open && !pending) {
                    break;
                }
            }
        }
    }
    debug!("Stream playback stopped");
}
