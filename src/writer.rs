//! Dedicated writer task per connection.
//!
//! Every connection, on both the broker and the client side, owns one writer
//! task fed by an unbounded mpsc channel. Senders never wait on the socket:
//! the broker can fan a payload out to many listeners without one slow
//! consumer stalling delivery to the others.
//!
//! # Architecture
//!
//! ```text
//! Dispatch ─┐
//! Drop guard┼─► mpsc::UnboundedSender<OutboundFrame> ─► Writer Task ─► Socket
//! Client   ─┘
//! ```
//!
//! The queue is unbounded. A peer that never reads lets its queue grow
//! without limit; `pending_count` exposes the depth for logging.

use std::io::IoSlice;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Result, SkypipeError};
use crate::protocol::{Frame, Message};

/// Maximum frames to batch in a single write operation.
const MAX_BATCH_SIZE: usize = 64;

/// A fully encoded frame ready to be written.
#[derive(Debug, Clone)]
pub struct OutboundFrame {
    bytes: Bytes,
}

impl OutboundFrame {
    /// Encode a message.
    #[inline]
    pub fn new(message: &Message) -> Result<Self> {
        Ok(Self {
            bytes: message.encode()?,
        })
    }

    /// Encode raw frame parts.
    #[inline]
    pub fn raw(frame: &Frame) -> Result<Self> {
        Ok(Self {
            bytes: frame.encode()?,
        })
    }

    /// Encoded size in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Encoded bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Handle for sending frames to the writer task.
///
/// Cheaply cloneable. Sending never blocks, so it is safe to call from
/// `Drop` implementations.
#[derive(Clone)]
pub struct WriterHandle {
    /// Channel sender for frames.
    tx: mpsc::UnboundedSender<OutboundFrame>,
    /// Frames queued but not yet written.
    pending: Arc<AtomicUsize>,
}

impl WriterHandle {
    /// Queue a frame for writing.
    ///
    /// Fails only if the writer task has stopped (socket closed or errored).
    pub fn send(&self, frame: OutboundFrame) -> Result<()> {
        self.pending.fetch_add(1, Ordering::AcqRel);

        self.tx.send(frame).map_err(|_| {
            self.pending.fetch_sub(1, Ordering::Release);
            SkypipeError::ConnectionClosed
        })
    }

    /// Queue a message for writing.
    pub fn send_message(&self, message: &Message) -> Result<()> {
        self.send(OutboundFrame::new(message)?)
    }

    /// Get current pending frame count.
    #[inline]
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }
}

/// Spawn the writer task and return a handle for sending frames.
///
/// The task exits once every `WriterHandle` is dropped and the queue is
/// drained, then shuts the write half down. The `JoinHandle` resolves when
/// all queued bytes have been flushed.
pub fn spawn_writer_task<W>(writer: W) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let pending = Arc::new(AtomicUsize::new(0));

    let handle = WriterHandle {
        tx,
        pending: pending.clone(),
    };

    let task = tokio::spawn(writer_loop(rx, writer, pending));

    (handle, task)
}

/// Main writer loop - receives frames and writes them to the socket.
async fn writer_loop<W>(
    mut rx: mpsc::UnboundedReceiver<OutboundFrame>,
    mut writer: W,
    pending: Arc<AtomicUsize>,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);

    while let Some(first) = rx.recv().await {
        batch.push(first);

        // Collect additional ready frames (non-blocking)
        while batch.len() < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(frame) => batch.push(frame),
                Err(_) => break,
            }
        }

        write_batch(&mut writer, &batch).await?;
        pending.fetch_sub(batch.len(), Ordering::Release);
        batch.clear();
    }

    // Channel closed, clean shutdown
    writer.shutdown().await?;
    Ok(())
}

/// Write a batch of frames using scatter/gather I/O (write_vectored).
async fn write_batch<W>(writer: &mut W, batch: &[OutboundFrame]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let total_size: usize = batch.iter().map(OutboundFrame::size).sum();
    let mut total_written = 0;

    while total_written < total_size {
        let slices = build_remaining_slices(batch, total_written);
        let written = writer.write_vectored(&slices).await?;
        if written == 0 {
            return Err(SkypipeError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "write_vectored returned 0",
            )));
        }
        total_written += written;
    }

    writer.flush().await?;
    Ok(())
}

/// Build IoSlice array for remaining data after `skip_bytes` were written.
fn build_remaining_slices(batch: &[OutboundFrame], skip_bytes: usize) -> Vec<IoSlice<'_>> {
    let mut slices = Vec::with_capacity(batch.len());
    let mut offset = 0;

    for frame in batch {
        let end = offset + frame.size();
        if skip_bytes < end {
            let start = skip_bytes.saturating_sub(offset);
            slices.push(IoSlice::new(&frame.as_bytes()[start..]));
        }
        offset = end;
    }

    slices
}
