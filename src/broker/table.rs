//! Routing state: listener sets and pending buffers, per pipe.
//!
//! `PipeTable` is plain data with no I/O. Each call handles one inbound
//! message to completion and returns the frames to send, in order. The
//! server's dispatch task is the only owner, so no locking is involved.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use bytes::Bytes;

use crate::protocol::{Message, PipeName};

/// Opaque per-connection identity assigned by the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl ClientId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06x}", self.0 & 0xff_ffff)
    }
}

/// A message addressed to one client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub to: ClientId,
    pub message: Message,
}

impl Delivery {
    fn data(to: ClientId, pipe: &PipeName, payload: Bytes) -> Self {
        Self {
            to,
            message: Message::Data {
                pipe: pipe.clone(),
                payload,
            },
        }
    }
}

/// Snapshot of one pipe's routing state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipeStats {
    pub listeners: usize,
    pub pending: usize,
}

/// Per-pipe listener sets and pending buffers.
///
/// Absent entries behave exactly like empty ones. Entries are removed
/// again once they become empty so the maps only hold live pipes.
#[derive(Debug, Default)]
pub struct PipeTable {
    listeners: HashMap<PipeName, Vec<ClientId>>,
    buffers: HashMap<PipeName, VecDeque<Bytes>>,
}

impl PipeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle one message from `from` and return what to send.
    pub fn handle(&mut self, from: ClientId, message: Message) -> Vec<Delivery> {
        match message {
            Message::Hello => vec![Delivery {
                to: from,
                message: Message::Hello,
            }],
            Message::Listen { pipe } => self.listen(from, pipe),
            Message::Unlisten { pipe } => {
                self.unlisten(from, &pipe);
                Vec::new()
            }
            Message::Data { pipe, payload } => self.data(pipe, payload),
        }
    }

    /// Subscribe `client` to `pipe`.
    ///
    /// Only the client that turns an empty listener set into a set of one
    /// receives the backlog, and only up to and including the first
    /// end-of-stream payload. Later listeners see live traffic only.
    pub fn listen(&mut self, client: ClientId, pipe: PipeName) -> Vec<Delivery> {
        let listeners = self.listeners.entry(pipe.clone()).or_default();
        if listeners.contains(&client) {
            return Vec::new();
        }
        listeners.push(client);

        if listeners.len() != 1 {
            return Vec::new();
        }

        let mut deliveries = Vec::new();
        if let Some(buffer) = self.buffers.get_mut(&pipe) {
            while let Some(payload) = buffer.pop_front() {
                let eof = payload.is_empty();
                deliveries.push(Delivery::data(client, &pipe, payload));
                if eof {
                    break;
                }
            }
            if buffer.is_empty() {
                self.buffers.remove(&pipe);
            }
        }
        deliveries
    }

    /// Unsubscribe `client` from `pipe`. No-op if it was not subscribed.
    pub fn unlisten(&mut self, client: ClientId, pipe: &PipeName) {
        if let Some(listeners) = self.listeners.get_mut(pipe) {
            if let Some(index) = listeners.iter().position(|c| *c == client) {
                listeners.remove(index);
            }
            if listeners.is_empty() {
                self.listeners.remove(pipe);
            }
        }
    }

    /// Route a payload: fan out to every listener, or buffer it.
    pub fn data(&mut self, pipe: PipeName, payload: Bytes) -> Vec<Delivery> {
        match self.listeners.get(&pipe) {
            Some(listeners) if !listeners.is_empty() => listeners
                .iter()
                .map(|client| Delivery::data(*client, &pipe, payload.clone()))
                .collect(),
            _ => {
                self.buffers.entry(pipe).or_default().push_back(payload);
                Vec::new()
            }
        }
    }

    /// Drop a closed connection from every listener set.
    ///
    /// Returns the pipes the client was subscribed to.
    pub fn disconnect(&mut self, client: ClientId) -> Vec<PipeName> {
        let mut left = Vec::new();
        self.listeners.retain(|pipe, listeners| {
            let before = listeners.len();
            listeners.retain(|c| *c != client);
            if listeners.len() != before {
                left.push(pipe.clone());
            }
            !listeners.is_empty()
        });
        left
    }

    /// Current listeners of `pipe`, in LISTEN order.
    pub fn listeners(&self, pipe: &PipeName) -> &[ClientId] {
        self.listeners.get(pipe).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of payloads buffered for `pipe`.
    pub fn pending(&self, pipe: &PipeName) -> usize {
        self.buffers.get(pipe).map(VecDeque::len).unwrap_or(0)
    }

    pub fn stats(&self, pipe: &PipeName) -> PipeStats {
        PipeStats {
            listeners: self.listeners(pipe).len(),
            pending: self.pending(pipe),
        }
    }
}
