//! Stream ingestion: one channel per user message.
//!
//! [`run_stream`] opens the backend channel, parses each frame, folds the
//! result into the transcript, and republishes the event for the
//! presentation layer. Transport failures become synthetic terminal events
//! before they reach the fold; cancellation is checked before every fold and
//! suppresses all further delivery.

use std::sync::Arc;

use anyhow::Result;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::backend::BackendClient;
use crate::core::events::{self, ChatEvent};
use crate::core::transcript::Transcript;

/// Channel-based event sender (async, bounded).
pub type ChatEventTx = mpsc::Sender<Arc<ChatEvent>>;

/// Channel-based event receiver (async, bounded).
pub type ChatEventRx = mpsc::Receiver<Arc<ChatEvent>>;

/// Default channel capacity for event streams.
///
/// Set higher (128) to accommodate best-effort delta sends without blocking.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 128;

/// Creates a bounded event channel with the default capacity.
pub fn create_event_channel() -> (ChatEventTx, ChatEventRx) {
    mpsc::channel(DEFAULT_EVENT_CHANNEL_CAPACITY)
}

/// Event sender wrapper that provides best-effort and reliable send modes.
///
/// Use `send_delta()` for high-volume text deltas that can be dropped if the
/// consumer is slow. Use `send_important()` for events that must be
/// delivered (tool blocks, final chunks, terminals). The transcript fold
/// happens before publication either way; a dropped delta loses a repaint,
/// not content.
#[derive(Clone)]
pub struct EventSender {
    tx: ChatEventTx,
}

impl EventSender {
    pub fn new(tx: ChatEventTx) -> Self {
        Self { tx }
    }

    /// Best-effort send: never awaits, drops if channel is full.
    pub fn send_delta(&self, event: ChatEvent) {
        let _ = self.tx.try_send(Arc::new(event));
    }

    /// Reliable send: awaits delivery.
    pub async fn send_important(&self, event: ChatEvent) {
        let _ = self.tx.send(Arc::new(event)).await;
    }
}

/// How a stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The channel delivered a normal close.
    Completed,
    /// The cancellation token fired; the active turn stays pending.
    Cancelled,
}

/// Runs one streaming exchange to completion.
///
/// Every parsed event is folded into `transcript` and then published via
/// `sender`, strictly in arrival order. Returns an error (with the turn
/// already annotated) when the channel fails to open or dies mid-stream;
/// there is no automatic reconnect.
pub async fn run_stream(
    client: &BackendClient,
    message: &str,
    transcript: &mut Transcript,
    cancel: &CancellationToken,
    sender: &EventSender,
) -> Result<StreamOutcome> {
    let open = tokio::select! {
        biased;
        () = cancel.cancelled() => return Ok(StreamOutcome::Cancelled),
        result = client.open_stream(message) => result,
    };

    let mut stream = match open {
        Ok(stream) => stream,
        Err(err) => {
            // Failed open still clears the turn's loading state.
            let event = ChatEvent::Error {
                message: err.message.clone(),
            };
            transcript.apply(&event);
            sender.send_important(event).await;
            return Err(err.into());
        }
    };

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(StreamOutcome::Cancelled),
            frame = stream.next() => frame,
        };

        match next {
            None => {
                let event = ChatEvent::Close;
                transcript.apply(&event);
                sender.send_important(event).await;
                return Ok(StreamOutcome::Completed);
            }
            Some(Err(err)) => {
                let event = ChatEvent::Error {
                    message: err.message.clone(),
                };
                transcript.apply(&event);
                sender.send_important(event).await;
                return Err(err.into());
            }
            Some(Ok(frame)) => match events::parse_frame(&frame) {
                Ok(Some(event)) => {
                    transcript.apply(&event);
                    publish(sender, event).await;
                }
                Ok(None) => {
                    tracing::debug!(frame = %frame, "skipping unrecognized frame type");
                }
                Err(err) => {
                    tracing::warn!(error = %err, frame = %frame, "dropping malformed frame");
                }
            },
        }
    }
}

/// Non-final deltas go best-effort; everything else is awaited.
async fn publish(sender: &EventSender, event: ChatEvent) {
    match &event {
        ChatEvent::InitResponse { .. } => sender.send_delta(event),
        _ => sender.send_important(event).await,
    }
}
