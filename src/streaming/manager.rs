//! The streaming manager: a single-owner actor that opens SSE streams, fans their
//! events out to subscribers, and enforces the stream lifecycle state machine.
//!
//! All mutable state lives on one `tokio::spawn`ed task reachable only through an
//! `mpsc` command channel, so there is never a lock to contend for on the
//! event-fan-out hot path — callers and stream workers alike just send commands and
//! await a reply.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::auth::{AuthCoordinator, Backend};
use crate::config::GeminiConfig;
use crate::error::LlmError;
use crate::sse::parser::SseEvent;
use crate::sse::transport::{SseOutcome, StreamSse};
use crate::streaming::types::{NotFound, StreamId, StreamMessage, StreamState, StreamStatus, SubscriberId, Terminal};
use crate::telemetry::{TelemetryEvent, TelemetrySink};

struct StreamRecord {
    state: StreamState,
    model: String,
    subscribers: HashMap<SubscriberId, mpsc::UnboundedSender<StreamMessage>>,
    cancel: CancellationToken,
    terminal: Option<Terminal>,
    events_count: u64,
    /// Replies to `stop()` calls issued before the worker task confirmed teardown;
    /// fired once `handle_worker_terminal` observes the socket is actually closed.
    stop_waiters: Vec<oneshot::Sender<Result<(), NotFound>>>,
}

enum Command {
    Open {
        backend: Backend,
        model: String,
        body: serde_json::Value,
        reply: oneshot::Sender<Result<StreamId, LlmError>>,
    },
    Subscribe {
        stream_id: StreamId,
        subscriber_id: SubscriberId,
        sender: mpsc::UnboundedSender<StreamMessage>,
        reply: oneshot::Sender<Result<(), NotFound>>,
    },
    Unsubscribe {
        stream_id: StreamId,
        subscriber_id: SubscriberId,
        reply: oneshot::Sender<Result<(), NotFound>>,
    },
    Stop {
        stream_id: StreamId,
        reply: oneshot::Sender<Result<(), NotFound>>,
    },
    Status {
        stream_id: StreamId,
        reply: oneshot::Sender<Option<StreamStatus>>,
    },
    List {
        reply: oneshot::Sender<Vec<StreamId>>,
    },
    WorkerEvent {
        stream_id: StreamId,
        event: SseEvent,
    },
    WorkerTerminal {
        stream_id: StreamId,
        terminal: Terminal,
    },
    Sweep {
        stream_id: StreamId,
    },
}

/// Handle to the running actor. Cheap to clone; every clone shares the same
/// underlying stream table.
#[derive(Clone)]
pub struct StreamingManager {
    tx: mpsc::UnboundedSender<Command>,
}

impl StreamingManager {
    pub fn new(
        auth: Arc<AuthCoordinator>,
        http: reqwest::Client,
        config: GeminiConfig,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let actor = Actor {
            auth,
            http,
            max_streams: config.max_streams,
            cleanup_delay: config.stream_cleanup_delay,
            inactivity_timeout: config.stream_inactivity_timeout,
            telemetry,
            streams: HashMap::new(),
            self_tx: tx.clone(),
        };
        tokio::spawn(actor.run(rx));
        Self { tx }
    }

    pub async fn open(&self, backend: Backend, model: &str, body: serde_json::Value) -> Result<StreamId, LlmError> {
        let (reply, recv) = oneshot::channel();
        self.send(Command::Open {
            backend,
            model: model.to_string(),
            body,
            reply,
        });
        recv.await
            .map_err(|_| LlmError::Internal("streaming manager actor is gone".to_string()))?
    }

    pub async fn subscribe(
        &self,
        stream_id: StreamId,
        subscriber_id: SubscriberId,
        sender: mpsc::UnboundedSender<StreamMessage>,
    ) -> Result<(), NotFound> {
        let (reply, recv) = oneshot::channel();
        self.send(Command::Subscribe {
            stream_id,
            subscriber_id,
            sender,
            reply,
        });
        recv.await.unwrap_or(Err(NotFound))
    }

    pub async fn unsubscribe(&self, stream_id: StreamId, subscriber_id: SubscriberId) -> Result<(), NotFound> {
        let (reply, recv) = oneshot::channel();
        self.send(Command::Unsubscribe {
            stream_id,
            subscriber_id,
            reply,
        });
        recv.await.unwrap_or(Err(NotFound))
    }

    pub async fn stop(&self, stream_id: StreamId) -> Result<(), NotFound> {
        let (reply, recv) = oneshot::channel();
        self.send(Command::Stop { stream_id, reply });
        recv.await.unwrap_or(Err(NotFound))
    }

    pub async fn status(&self, stream_id: StreamId) -> Option<StreamStatus> {
        let (reply, recv) = oneshot::channel();
        self.send(Command::Status { stream_id, reply });
        recv.await.unwrap_or(None)
    }

    pub async fn list(&self) -> Vec<StreamId> {
        let (reply, recv) = oneshot::channel();
        self.send(Command::List { reply });
        recv.await.unwrap_or_default()
    }

    fn send(&self, command: Command) {
        let _ = self.tx.send(command);
    }
}

struct Actor {
    auth: Arc<AuthCoordinator>,
    http: reqwest::Client,
    max_streams: usize,
    cleanup_delay: std::time::Duration,
    inactivity_timeout: std::time::Duration,
    telemetry: Arc<dyn TelemetrySink>,
    streams: HashMap<StreamId, StreamRecord>,
    self_tx: mpsc::UnboundedSender<Command>,
}

impl Actor {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = rx.recv().await {
            match command {
                Command::Open { backend, model, body, reply } => {
                    let result = self.handle_open(backend, model, body).await;
                    let _ = reply.send(result);
                }
                Command::Subscribe { stream_id, subscriber_id, sender, reply } => {
                    let _ = reply.send(self.handle_subscribe(stream_id, subscriber_id, sender));
                }
                Command::Unsubscribe { stream_id, subscriber_id, reply } => {
                    let _ = reply.send(self.handle_unsubscribe(stream_id, subscriber_id));
                }
                Command::Stop { stream_id, reply } => self.handle_stop(stream_id, reply),
                Command::Status { stream_id, reply } => {
                    let _ = reply.send(self.streams.get(&stream_id).map(|r| StreamStatus {
                        state: r.state,
                        events_count: r.events_count,
                        subscriber_count: r.subscribers.len(),
                    }));
                }
                Command::List { reply } => {
                    let _ = reply.send(self.streams.keys().copied().collect());
                }
                Command::WorkerEvent { stream_id, event } => self.handle_worker_event(stream_id, event),
                Command::WorkerTerminal { stream_id, terminal } => self.handle_worker_terminal(stream_id, terminal),
                Command::Sweep { stream_id } => {
                    self.streams.remove(&stream_id);
                }
            }
        }
    }

    async fn handle_open(
        &mut self,
        backend: Backend,
        model: String,
        body: serde_json::Value,
    ) -> Result<StreamId, LlmError> {
        if self.streams.len() >= self.max_streams {
            return Err(LlmError::Validation(format!(
                "stream capacity exceeded: {} streams already open",
                self.max_streams
            )));
        }

        let authenticated = self.auth.authenticate(backend, &model, "streamGenerateContent").await?;
        let url = if authenticated.url.contains('?') {
            format!("{}&alt=sse", authenticated.url)
        } else {
            format!("{}?alt=sse", authenticated.url)
        };

        let stream_id = StreamId::new_v4();
        let cancel = CancellationToken::new();
        self.telemetry.emit(TelemetryEvent::StreamStart {
            stream_id: stream_id.to_string(),
            model: model.clone(),
        });

        self.streams.insert(
            stream_id,
            StreamRecord {
                state: StreamState::Starting,
                model,
                subscribers: HashMap::new(),
                cancel: cancel.clone(),
                terminal: None,
                events_count: 0,
                stop_waiters: Vec::new(),
            },
        );

        let http = self.http.clone();
        let headers = authenticated.headers;
        let tx = self.self_tx.clone();
        let inactivity_timeout = self.inactivity_timeout;
        tokio::spawn(async move {
            let tx_for_events = tx.clone();
            let outcome = StreamSse::run(&http, &url, headers, &body, cancel, inactivity_timeout, move |event| {
                let _ = tx_for_events.send(Command::WorkerEvent { stream_id, event });
            })
            .await;

            let terminal = match outcome {
                SseOutcome::Completed => Terminal::Completed,
                SseOutcome::Error(e) => Terminal::Error(e),
                SseOutcome::Cancelled => Terminal::Stopped,
            };
            let _ = tx.send(Command::WorkerTerminal { stream_id, terminal });
        });

        Ok(stream_id)
    }

    fn handle_subscribe(
        &mut self,
        stream_id: StreamId,
        subscriber_id: SubscriberId,
        sender: mpsc::UnboundedSender<StreamMessage>,
    ) -> Result<(), NotFound> {
        let record = self.streams.get_mut(&stream_id).ok_or(NotFound)?;

        if let Some(terminal) = &record.terminal {
            // Late subscriber within the cleanup grace window: replay the terminal
            // instead of wiring up a subscription that will never receive events.
            let _ = sender.send(StreamMessage::Terminal(terminal.clone()));
            return Ok(());
        }

        record.subscribers.insert(subscriber_id, sender);
        Ok(())
    }

    fn handle_unsubscribe(&mut self, stream_id: StreamId, subscriber_id: SubscriberId) -> Result<(), NotFound> {
        let record = self.streams.get_mut(&stream_id).ok_or(NotFound)?;
        record.subscribers.remove(&subscriber_id);
        if record.subscribers.is_empty() && !record.state.is_terminal() {
            record.cancel.cancel();
        }
        Ok(())
    }

    /// `stop()` is guaranteed to release the underlying socket before it returns, so a
    /// cancellation request is only acknowledged once the worker task has actually torn
    /// down — cancellation is cooperative, not immediate. A stream already in a terminal
    /// state has no socket left to release and is acknowledged right away; otherwise the
    /// reply is stashed on the record and fired from `handle_worker_terminal`.
    fn handle_stop(&mut self, stream_id: StreamId, reply: oneshot::Sender<Result<(), NotFound>>) {
        let Some(record) = self.streams.get_mut(&stream_id) else {
            let _ = reply.send(Err(NotFound));
            return;
        };
        if record.state.is_terminal() {
            let _ = reply.send(Ok(()));
            return;
        }
        record.cancel.cancel();
        record.stop_waiters.push(reply);
    }

    fn handle_worker_event(&mut self, stream_id: StreamId, event: SseEvent) {
        let Some(record) = self.streams.get_mut(&stream_id) else {
            return;
        };
        if record.state == StreamState::Starting {
            record.state = StreamState::Active;
        }
        record.events_count += 1;
        self.telemetry.emit(TelemetryEvent::StreamChunk {
            stream_id: stream_id.to_string(),
            chunk_size: event.data.len(),
        });

        let message = if event.data == "[DONE]" {
            return;
        } else {
            match serde_json::from_str::<serde_json::Value>(&event.data) {
                Ok(value) => StreamMessage::Event(value),
                Err(e) => StreamMessage::EventError(format!("malformed event payload: {e}")),
            }
        };

        record.subscribers.retain(|_, sender| sender.send(message.clone()).is_ok());
        if record.subscribers.is_empty() && !record.state.is_terminal() {
            record.cancel.cancel();
        }
    }

    fn handle_worker_terminal(&mut self, stream_id: StreamId, terminal: Terminal) {
        let Some(record) = self.streams.get_mut(&stream_id) else {
            return;
        };
        record.state = terminal.state();
        if let Terminal::Error(e) = &terminal {
            warn!(stream_id = %stream_id, error = %e, "stream ended with an error");
            self.telemetry.emit(TelemetryEvent::StreamException {
                stream_id: stream_id.to_string(),
                category: e.category(),
            });
        }
        self.telemetry.emit(TelemetryEvent::StreamStop {
            stream_id: stream_id.to_string(),
            total_events: record.events_count,
        });
        debug!(stream_id = %stream_id, model = %record.model, state = ?record.state, "stream terminated");

        for sender in record.subscribers.values() {
            let _ = sender.send(StreamMessage::Terminal(terminal.clone()));
        }
        record.subscribers.clear();
        record.terminal = Some(terminal);
        for waiter in record.stop_waiters.drain(..) {
            let _ = waiter.send(Ok(()));
        }

        let tx = self.self_tx.clone();
        let delay = self.cleanup_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Command::Sweep { stream_id });
        });
    }
}
