//! Frame reader over an async byte stream.

use std::collections::VecDeque;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::Result;
use crate::protocol::{Frame, FrameBuffer};

/// Read buffer size per socket read.
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Pulls complete frames off a reader.
///
/// `next_frame` is cancel-safe: all buffering happens after the underlying
/// read completes, so it may be used as a `tokio::select!` branch.
pub struct FrameReader<R> {
    reader: R,
    buffer: FrameBuffer,
    ready: VecDeque<Frame>,
    chunk: Vec<u8>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: FrameBuffer::new(),
            ready: VecDeque::new(),
            chunk: vec![0u8; READ_CHUNK_SIZE],
        }
    }

    /// Next complete frame, or `None` once the peer closed the connection.
    ///
    /// # Errors
    ///
    /// I/O errors and framing violations. Either way the connection is done.
    pub async fn next_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            if let Some(frame) = self.ready.pop_front() {
                return Ok(Some(frame));
            }

            let n = self.reader.read(&mut self.chunk).await?;
            if n == 0 {
                if !self.buffer.is_empty() {
                    tracing::debug!(
                        buffered = self.buffer.len(),
                        "Connection closed mid-frame"
                    );
                }
                return Ok(None);
            }

            self.ready.extend(self.buffer.push(&self.chunk[..n])?);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Message;
    use tokio::io::{duplex, AsyncWriteExt};

    #[tokio::test]
    async fn test_reads_frames_then_eof() {
        let (mut tx, rx) = duplex(1024);
        let mut reader = FrameReader::new(rx);

        let mut bytes = Message::listen("p").encode().unwrap().to_vec();
        bytes.extend_from_slice(&Message::Hello.encode().unwrap());
        tx.write_all(&bytes).await.unwrap();
        drop(tx);

        let first = reader.next_frame().await.unwrap().unwrap();
        assert_eq!(Message::decode(&first).unwrap(), Message::listen("p"));

        let second = reader.next_frame().await.unwrap().unwrap();
        assert_eq!(Message::decode(&second).unwrap(), Message::Hello);

        assert!(reader.next_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_frame_split_across_writes() {
        let (mut tx, rx) = duplex(1024);
        let mut reader = FrameReader::new(rx);

        let bytes = Message::data("p", "split me").encode().unwrap();
        let (head, tail) = bytes.split_at(7);

        let writer = tokio::spawn({
            let head = head.to_vec();
            let tail = tail.to_vec();
            async move {
                tx.write_all(&head).await.unwrap();
                tokio::task::yield_now().await;
                tx.write_all(&tail).await.unwrap();
            }
        });

        let frame = reader.next_frame().await.unwrap().unwrap();
        assert_eq!(
            Message::decode(&frame).unwrap(),
            Message::data("p", "split me")
        );
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_framing_violation_is_error() {
        let (mut tx, rx) = duplex(1024);
        let mut reader = FrameReader::new(rx);

        tx.write_all(&u32::MAX.to_be_bytes()).await.unwrap();

        assert!(reader.next_frame().await.is_err());
    }
}
