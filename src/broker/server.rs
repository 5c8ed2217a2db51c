//! Broker server: accept loop, connection tasks and dispatch.
//!
//! # Architecture
//!
//! ```text
//! Connection ─► reader task ─┐
//! Connection ─► reader task ─┼─► mpsc<Event> ─► dispatch (PipeTable) ─► WriterHandle per client
//! BrokerHandle::pipe_stats ──┘
//! ```
//!
//! Reader tasks only frame bytes and forward them. All routing decisions are
//! made by the single dispatch loop, one event at a time, so the table needs
//! no lock and per-connection frame order is preserved.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};

use super::table::{ClientId, Delivery, PipeStats, PipeTable};
use crate::config::BrokerConfig;
use crate::error::{Result, SkypipeError};
use crate::protocol::{Frame, Message, PipeName, Rejection};
use crate::reader::FrameReader;
use crate::transport::{Endpoint, Listener, Stream};
use crate::writer::{spawn_writer_task, WriterHandle};

/// Queue depth at which a slow listener gets a warning.
const PENDING_WARN_THRESHOLD: usize = 10_000;

/// Pause after a failed accept before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Inputs to the dispatch loop.
enum Event {
    Connected {
        id: ClientId,
        writer: WriterHandle,
    },
    Frame {
        id: ClientId,
        frame: Frame,
    },
    Disconnected {
        id: ClientId,
    },
    Stats {
        pipe: PipeName,
        reply: oneshot::Sender<PipeStats>,
    },
}

/// Entry point for running a broker.
pub struct Broker;

impl Broker {
    /// Bind the configured endpoint and start serving.
    pub async fn spawn(config: &BrokerConfig) -> Result<BrokerHandle> {
        let listener = Listener::bind(&config.bind).await?;
        Self::spawn_on(listener)
    }

    /// Start serving on an already bound listener.
    pub fn spawn_on(listener: Listener) -> Result<BrokerHandle> {
        let endpoint = listener.local_endpoint()?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tracing::info!(endpoint = %endpoint, "Broker listening");

        let task = tokio::spawn(run(listener, events_tx.clone(), events_rx, shutdown_rx));

        Ok(BrokerHandle {
            endpoint,
            events: events_tx,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        })
    }
}

/// Handle to a running broker.
///
/// Dropping the handle stops the broker.
pub struct BrokerHandle {
    endpoint: Endpoint,
    events: mpsc::UnboundedSender<Event>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl BrokerHandle {
    /// The endpoint the broker is bound to, with the real port.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Listener count and pending buffer length for a pipe.
    ///
    /// Answered by the dispatch loop, so the snapshot reflects every event
    /// it has processed before this request.
    pub async fn pipe_stats(&self, pipe: impl Into<PipeName>) -> Result<PipeStats> {
        let (reply, rx) = oneshot::channel();
        self.events
            .send(Event::Stats {
                pipe: pipe.into(),
                reply,
            })
            .map_err(|_| SkypipeError::ConnectionClosed)?;
        rx.await.map_err(|_| SkypipeError::ConnectionClosed)
    }

    /// Stop accepting, close every connection and wait for the broker task.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            task.await.map_err(|e| SkypipeError::Io(std::io::Error::other(e)))?;
        }
        Ok(())
    }
}

/// Broker main loop. Owns the listener, the routing table and every
/// client's writer handle.
async fn run(
    listener: Listener,
    events_tx: mpsc::UnboundedSender<Event>,
    mut events_rx: mpsc::UnboundedReceiver<Event>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut dispatch = Dispatch::default();
    let mut connections = JoinSet::new();
    let mut next_id: u64 = 0;

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => {
                tracing::info!("Broker shutting down");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok(stream) => {
                    next_id += 1;
                    let id = ClientId::new(next_id);
                    tracing::debug!(client = %id, peer = stream.peer(), "Accepted connection");
                    connections.spawn(serve_connection(id, stream, events_tx.clone()));
                }
                Err(e) => {
                    // Typically fd exhaustion; retrying at once would spin
                    tracing::warn!(error = %e, "Accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            },
            Some(event) = events_rx.recv() => dispatch.handle(event),
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    connections.shutdown().await;
}

/// Reader side of one connection.
///
/// Registers the client's writer, forwards frames, then reports the
/// disconnect. Framing errors end the connection.
async fn serve_connection(id: ClientId, stream: Stream, events: mpsc::UnboundedSender<Event>) {
    let (reader, writer) = stream.into_split();
    // The writer task outlives this one until dispatch drops the handle.
    let (writer, _writer_task) = spawn_writer_task(writer);

    if events.send(Event::Connected { id, writer }).is_err() {
        return;
    }

    let mut reader = FrameReader::new(reader);
    loop {
        match reader.next_frame().await {
            Ok(Some(frame)) => {
                if events.send(Event::Frame { id, frame }).is_err() {
                    return;
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(client = %id, error = %e, "Dropping connection");
                break;
            }
        }
    }

    let _ = events.send(Event::Disconnected { id });
}

/// Dispatch state: the table plus one writer per connected client.
#[derive(Default)]
struct Dispatch {
    table: PipeTable,
    writers: HashMap<ClientId, WriterHandle>,
}

impl Dispatch {
    fn handle(&mut self, event: Event) {
        match event {
            Event::Connected { id, writer } => {
                self.writers.insert(id, writer);
            }
            Event::Frame { id, frame } => self.on_frame(id, &frame),
            Event::Disconnected { id } => {
                self.writers.remove(&id);
                let pipes = self.table.disconnect(id);
                tracing::debug!(client = %id, listening = pipes.len(), "Client disconnected");
            }
            Event::Stats { pipe, reply } => {
                let _ = reply.send(self.table.stats(&pipe));
            }
        }
    }

    fn on_frame(&mut self, id: ClientId, frame: &Frame) {
        let message = match Message::decode(frame) {
            Ok(message) => message,
            Err(Rejection::UnknownCommand(command)) => {
                tracing::warn!(client = %id, command = %command, "Unknown command");
                return;
            }
            Err(rejection) => {
                tracing::debug!(client = %id, %rejection, "Discarding frame");
                return;
            }
        };

        tracing::debug!(
            client = %id,
            command = %message.command(),
            pipe = message.pipe().map(PipeName::as_str).unwrap_or(""),
            "Processing command"
        );

        for delivery in self.table.handle(id, message) {
            self.deliver(delivery);
        }
    }

    fn deliver(&self, delivery: Delivery) {
        let Some(writer) = self.writers.get(&delivery.to) else {
            return;
        };

        if writer.send_message(&delivery.message).is_err() {
            tracing::debug!(client = %delivery.to, "Writer closed, frame dropped");
            return;
        }

        let pending = writer.pending_count();
        if pending == PENDING_WARN_THRESHOLD {
            tracing::warn!(client = %delivery.to, pending, "Listener is falling behind");
        }
    }
}
