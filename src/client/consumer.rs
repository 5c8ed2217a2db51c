//! Consumer mode: subscribe to a pipe and write its payloads out.

use std::collections::VecDeque;
use std::future::Future;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::Socket;
use crate::error::{Result, SkypipeError};
use crate::protocol::{Frame, Message, PipeName};
use crate::transport::Endpoint;

/// Inbound side of a pipe.
///
/// Sends UNLISTEN when closed, or on drop if [`close`](Self::close) was
/// never called.
pub struct OutputStream {
    socket: Socket,
    pipe: PipeName,
    /// Payloads received while waiting for the subscription to settle.
    stashed: VecDeque<Bytes>,
    ended: bool,
    closed: bool,
}

impl OutputStream {
    /// Connect and subscribe to `pipe`.
    pub async fn listen(endpoint: &Endpoint, pipe: impl Into<PipeName>) -> Result<Self> {
        let socket = Socket::connect(endpoint).await?;
        let pipe = pipe.into();
        socket.send(&Message::listen(pipe.clone()))?;
        tracing::debug!(pipe = %pipe, "Listening");

        Ok(Self {
            socket,
            pipe,
            stashed: VecDeque::new(),
            ended: false,
            closed: false,
        })
    }

    pub fn pipe(&self) -> &PipeName {
        &self.pipe
    }

    /// Wait until the broker has processed the LISTEN.
    ///
    /// Sends HELLO and waits for the reply. The broker handles one
    /// connection's frames in order, so the reply means the subscription is
    /// in place. Payloads that arrive meanwhile are kept for `next_chunk`.
    pub async fn wait_subscribed(&mut self) -> Result<()> {
        self.socket.send(&Message::Hello)?;

        loop {
            let frame = self
                .socket
                .recv()
                .await?
                .ok_or(SkypipeError::ConnectionClosed)?;

            if matches!(Message::decode(&frame), Ok(Message::Hello)) {
                return Ok(());
            }
            if let Some(payload) = payload_for(&self.pipe, &frame) {
                self.stashed.push_back(payload);
            }
        }
    }

    /// Next payload, or `None` once the end-of-stream sentinel arrived.
    ///
    /// Frames with a foreign header, another pipe name or a command other
    /// than DATA are skipped. Cancel-safe.
    ///
    /// # Errors
    ///
    /// [`SkypipeError::ConnectionClosed`] if the broker went away before
    /// the sentinel.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        if self.ended {
            return Ok(None);
        }

        loop {
            let payload = match self.stashed.pop_front() {
                Some(payload) => payload,
                None => {
                    let frame = self
                        .socket
                        .recv()
                        .await?
                        .ok_or(SkypipeError::ConnectionClosed)?;
                    match payload_for(&self.pipe, &frame) {
                        Some(payload) => payload,
                        None => continue,
                    }
                }
            };

            if payload.is_empty() {
                self.ended = true;
                return Ok(None);
            }
            return Ok(Some(payload));
        }
    }

    /// Send UNLISTEN best-effort, then flush and close.
    pub async fn close(mut self) -> Result<()> {
        self.closed = true;
        self.unlisten();
        self.socket.close().await
    }

    fn unlisten(&self) {
        if let Err(e) = self.socket.send(&Message::unlisten(self.pipe.clone())) {
            tracing::debug!(pipe = %self.pipe, error = %e, "Could not queue UNLISTEN");
        }
    }
}

impl Drop for OutputStream {
    fn drop(&mut self) {
        if !self.closed {
            self.unlisten();
        }
    }
}

/// DATA payload for `pipe`, or `None` if the frame should be discarded.
fn payload_for(pipe: &PipeName, frame: &Frame) -> Option<Bytes> {
    match Message::decode(frame) {
        Ok(Message::Data { pipe: p, payload }) if p == *pipe => Some(payload),
        _ => None,
    }
}

/// Outcome of a consumer run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    /// Payloads written to the output, not counting the sentinel.
    pub chunks: usize,
    pub bytes: usize,
    /// The run stopped because `interrupt` fired.
    pub interrupted: bool,
}

/// Copy `pipe` to `output` until the end-of-stream sentinel or `interrupt`.
///
/// UNLISTEN is sent on every path before returning.
pub async fn run_consumer<W, F>(
    endpoint: &Endpoint,
    pipe: impl Into<PipeName>,
    mut output: W,
    interrupt: F,
) -> Result<ConsumerStats>
where
    W: AsyncWrite + Unpin,
    F: Future<Output = ()>,
{
    let mut stream = OutputStream::listen(endpoint, pipe).await?;
    let mut stats = ConsumerStats::default();
    tokio::pin!(interrupt);

    let result: Result<()> = loop {
        tokio::select! {
            _ = &mut interrupt => {
                tracing::debug!(pipe = %stream.pipe(), "Consumer interrupted");
                stats.interrupted = true;
                break Ok(());
            }
            chunk = stream.next_chunk() => match chunk {
                Ok(Some(chunk)) => {
                    if let Err(e) = write_chunk(&mut output, &chunk).await {
                        break Err(e);
                    }
                    stats.chunks += 1;
                    stats.bytes += chunk.len();
                }
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            },
        }
    };

    tracing::debug!(pipe = %stream.pipe(), chunks = stats.chunks, bytes = stats.bytes, "Consumer done");
    let closed = stream.close().await;
    result?;
    closed?;
    Ok(stats)
}

async fn write_chunk<W: AsyncWrite + Unpin>(output: &mut W, chunk: &[u8]) -> Result<()> {
    output.write_all(chunk).await?;
    output.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::HEADER;

    #[test]
    fn test_payload_for_accepts_matching_data() {
        let pipe = PipeName::from("p");
        let frame = Message::data("p", "x").to_frame();
        assert_eq!(payload_for(&pipe, &frame), Some(Bytes::from_static(b"x")));
    }

    #[test]
    fn test_payload_for_keeps_sentinel() {
        let pipe = PipeName::default();
        let frame = Message::eof("").to_frame();
        assert_eq!(payload_for(&pipe, &frame), Some(Bytes::new()));
    }

    #[test]
    fn test_payload_for_discards_other_pipe() {
        let pipe = PipeName::from("p");
        let frame = Message::data("q", "x").to_frame();
        assert_eq!(payload_for(&pipe, &frame), None);
    }

    #[test]
    fn test_payload_for_discards_foreign_header() {
        let pipe = PipeName::from("p");
        // Same field count, header of a different length
        let frame = Frame::from_parts(&[&b"SKYPIPE/0.10"[..], b"DATA", b"p", b"x"]);
        assert_eq!(payload_for(&pipe, &frame), None);
    }

    #[test]
    fn test_payload_for_discards_non_data() {
        let pipe = PipeName::from("p");
        assert_eq!(payload_for(&pipe, &Message::listen("p").to_frame()), None);
        assert_eq!(payload_for(&pipe, &Message::Hello.to_frame()), None);

        let unknown = Frame::from_parts(&[HEADER.as_bytes(), b"PUSH", b"p", b"x"]);
        assert_eq!(payload_for(&pipe, &unknown), None);
    }
}
