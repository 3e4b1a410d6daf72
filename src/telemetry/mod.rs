//! Telemetry event contract.
//!
//! This module defines the *shape* of the events this crate emits around request and
//! stream lifecycles, plus the [`TelemetrySink`] trait a caller implements to receive
//! them. It does not ship an exporter to any external observability platform — wiring
//! a sink to Langfuse, Helicone, or an internal metrics pipeline is the embedding
//! application's job.

use std::time::Duration;

use crate::auth::Backend;
use crate::error::ErrorCategory;

/// A lifecycle event from the unary transport or the streaming manager.
#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    RequestStart {
        url: String,
        method: String,
    },
    RequestStop {
        duration: Duration,
        status: u16,
    },
    RequestException {
        duration: Duration,
        category: ErrorCategory,
    },
    StreamStart {
        stream_id: String,
        model: String,
    },
    StreamChunk {
        stream_id: String,
        chunk_size: usize,
    },
    StreamStop {
        stream_id: String,
        total_events: u64,
    },
    StreamException {
        stream_id: String,
        category: ErrorCategory,
    },
    ModelsOperation {
        backend: Backend,
        duration: Duration,
        model_count: Option<usize>,
    },
    TokensOperation {
        backend: Backend,
        duration: Duration,
        total_tokens: Option<i64>,
    },
}

/// Receives telemetry events emitted by the transport and streaming layers.
///
/// `emit` is synchronous and must not block: implementations that need to do I/O
/// should hand events off to a queue or background task themselves.
pub trait TelemetrySink: Send + Sync {
    fn emit(&self, event: TelemetryEvent);
}

/// Discards every event. The default sink when the caller does not opt in.
pub struct NoopSink;

impl TelemetrySink for NoopSink {
    fn emit(&self, _event: TelemetryEvent) {}
}

/// Forwards every event onto an unbounded channel. Useful for tests and for callers
/// that want to process events on their own task rather than inline in `emit`.
pub struct ChannelSink {
    sender: tokio::sync::mpsc::UnboundedSender<TelemetryEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, tokio::sync::mpsc::UnboundedReceiver<TelemetryEvent>) {
        let (sender, receiver) = tokio::sync::mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl TelemetrySink for ChannelSink {
    fn emit(&self, event: TelemetryEvent) {
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_sink_accepts_every_event_variant_without_panicking() {
        let sink = NoopSink;
        sink.emit(TelemetryEvent::RequestStart {
            url: "https://example".into(),
            method: "POST".into(),
        });
        sink.emit(TelemetryEvent::StreamException {
            stream_id: "s1".into(),
            category: ErrorCategory::Network,
        });
    }

    #[tokio::test]
    async fn channel_sink_forwards_events_in_order() {
        let (sink, mut rx) = ChannelSink::new();
        sink.emit(TelemetryEvent::StreamStart {
            stream_id: "s1".into(),
            model: "gemini-pro".into(),
        });
        sink.emit(TelemetryEvent::StreamStop {
            stream_id: "s1".into(),
            total_events: 3,
        });
        assert!(matches!(rx.recv().await, Some(TelemetryEvent::StreamStart { .. })));
        assert!(matches!(rx.recv().await, Some(TelemetryEvent::StreamStop { .. })));
    }
}
