//! A client connection to a broker.

use tokio::task::JoinHandle;

use crate::error::{Result, SkypipeError};
use crate::protocol::{Frame, Message};
use crate::reader::FrameReader;
use crate::transport::{connect, BoxedReader, Endpoint};
use crate::writer::{spawn_writer_task, OutboundFrame, WriterHandle};

/// Framed, bidirectional connection to the broker.
///
/// Writes go through a dedicated writer task, so `send` never waits on the
/// network and can be called from drop guards.
pub struct Socket {
    reader: FrameReader<BoxedReader>,
    writer: Option<WriterHandle>,
    writer_task: Option<JoinHandle<Result<()>>>,
}

impl Socket {
    /// Connect to the broker at `endpoint`.
    pub async fn connect(endpoint: &Endpoint) -> Result<Self> {
        let stream = connect(endpoint).await?;
        tracing::debug!(endpoint = %endpoint, "Connected to broker");

        let (reader, writer) = stream.into_split();
        let (writer, writer_task) = spawn_writer_task(writer);

        Ok(Self {
            reader: FrameReader::new(reader),
            writer: Some(writer),
            writer_task: Some(writer_task),
        })
    }

    /// Queue a message for sending.
    pub fn send(&self, message: &Message) -> Result<()> {
        self.writer()?.send_message(message)
    }

    /// Queue arbitrary frame parts, bypassing message encoding.
    pub fn send_frame(&self, frame: &Frame) -> Result<()> {
        self.writer()?.send(OutboundFrame::raw(frame)?)
    }

    /// Next frame from the broker, or `None` once the connection closed.
    ///
    /// Cancel-safe.
    pub async fn recv(&mut self) -> Result<Option<Frame>> {
        self.reader.next_frame().await
    }

    /// Flush everything queued and close the write side.
    ///
    /// Waits until the writer task has written every queued frame. A socket
    /// dropped without `close` still flushes in the background.
    pub async fn close(&mut self) -> Result<()> {
        self.writer.take();
        match self.writer_task.take() {
            Some(task) => task
                .await
                .map_err(|e| SkypipeError::Io(std::io::Error::other(e)))?,
            None => Ok(()),
        }
    }

    fn writer(&self) -> Result<&WriterHandle> {
        self.writer.as_ref().ok_or(SkypipeError::ConnectionClosed)
    }
}
