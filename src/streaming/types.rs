//! Value types shared between the streaming manager's public API and its actor
//! loop.

use crate::error::LlmError;

pub type StreamId = uuid::Uuid;
pub type SubscriberId = uuid::Uuid;

/// Where a stream currently sits in its lifecycle. Transitions are irreversible
/// once a terminal state (`Completed`, `Error`, `Stopped`) is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Starting,
    Active,
    Completed,
    Error,
    Stopped,
}

impl StreamState {
    pub fn is_terminal(self) -> bool {
        matches!(self, StreamState::Completed | StreamState::Error | StreamState::Stopped)
    }
}

/// Why a stream ended, carried in the single terminal [`StreamMessage`] every
/// subscriber receives exactly once.
#[derive(Debug, Clone)]
pub enum Terminal {
    Completed,
    Error(LlmError),
    Stopped,
}

impl Terminal {
    pub fn state(&self) -> StreamState {
        match self {
            Terminal::Completed => StreamState::Completed,
            Terminal::Error(_) => StreamState::Error,
            Terminal::Stopped => StreamState::Stopped,
        }
    }
}

/// What a subscriber receives on its channel.
#[derive(Debug, Clone)]
pub enum StreamMessage {
    /// One successfully-decoded server event.
    Event(serde_json::Value),
    /// The event's `data:` payload was not valid JSON; the stream continues.
    EventError(String),
    /// The stream has ended; no further messages follow.
    Terminal(Terminal),
}

/// A snapshot returned by `status`.
#[derive(Debug, Clone)]
pub struct StreamStatus {
    pub state: StreamState,
    pub events_count: u64,
    pub subscriber_count: usize,
}

/// Returned when a stream operation targets an id the manager has no record of
/// (never opened, or already swept after its cleanup grace window).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotFound;
