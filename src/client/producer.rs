//! Producer mode: frame a local byte stream as DATA messages.

use std::future::Future;

use bytes::Bytes;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};

use super::Socket;
use crate::error::Result;
use crate::protocol::{Message, PipeName};
use crate::transport::Endpoint;

/// Longest chunk read from the input. A longer line goes out as several
/// DATA frames.
pub const MAX_CHUNK_SIZE: usize = 64 * 1024;

/// Outbound side of a pipe.
///
/// Guarantees the end-of-stream sentinel: either [`finish`](Self::finish)
/// sends it, or dropping the stream queues it. The sentinel goes out
/// exactly once on every exit path.
pub struct InputStream {
    socket: Socket,
    pipe: PipeName,
    finished: bool,
}

impl InputStream {
    /// Connect to the broker and open `pipe` for writing.
    pub async fn open(endpoint: &Endpoint, pipe: impl Into<PipeName>) -> Result<Self> {
        let socket = Socket::connect(endpoint).await?;
        Ok(Self {
            socket,
            pipe: pipe.into(),
            finished: false,
        })
    }

    pub fn pipe(&self) -> &PipeName {
        &self.pipe
    }

    /// Queue one chunk. Empty chunks are skipped: an empty payload would
    /// end the stream for every listener.
    pub fn send(&self, chunk: impl Into<Bytes>) -> Result<()> {
        let chunk = chunk.into();
        if chunk.is_empty() {
            return Ok(());
        }
        self.socket.send(&Message::data(self.pipe.clone(), chunk))
    }

    /// Send the end-of-stream sentinel, flush and close.
    pub async fn finish(mut self) -> Result<()> {
        self.finished = true;
        self.socket.send(&Message::eof(self.pipe.clone()))?;
        self.socket.close().await
    }
}

impl Drop for InputStream {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        // The writer task is detached and flushes the queue on its own.
        if let Err(e) = self.socket.send(&Message::eof(self.pipe.clone())) {
            tracing::debug!(pipe = %self.pipe, error = %e, "Could not queue end-of-stream");
        }
    }
}

/// Outcome of a producer run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerStats {
    /// DATA frames sent, not counting the sentinel.
    pub chunks: usize,
    pub bytes: usize,
    /// The run stopped because `interrupt` fired.
    pub interrupted: bool,
}

/// Stream `input` to `pipe` line by line until end of input or `interrupt`.
///
/// Lines longer than [`MAX_CHUNK_SIZE`] are split. The sentinel is sent and
/// flushed on every path, including read errors and an interrupt before any
/// data was read.
pub async fn run_producer<R, F>(
    endpoint: &Endpoint,
    pipe: impl Into<PipeName>,
    input: R,
    interrupt: F,
) -> Result<ProducerStats>
where
    R: AsyncRead + Unpin,
    F: Future<Output = ()>,
{
    let stream = InputStream::open(endpoint, pipe).await?;
    let mut input = BufReader::new(input);
    let mut stats = ProducerStats::default();
    let mut line = Vec::new();
    tokio::pin!(interrupt);

    let result: Result<()> = loop {
        line.clear();
        tokio::select! {
            _ = &mut interrupt => {
                tracing::debug!(pipe = %stream.pipe(), "Producer interrupted");
                stats.interrupted = true;
                break Ok(());
            }
            read = async {
                let mut limited = (&mut input).take(MAX_CHUNK_SIZE as u64);
                limited.read_until(b'\n', &mut line).await
            } => {
                let n = match read {
                    Ok(0) => break Ok(()),
                    Ok(n) => n,
                    Err(e) => break Err(e.into()),
                };
                if let Err(e) = stream.send(Bytes::copy_from_slice(&line)) {
                    break Err(e);
                }
                stats.chunks += 1;
                stats.bytes += n;
            }
        }
    };

    tracing::debug!(pipe = %stream.pipe(), chunks = stats.chunks, bytes = stats.bytes, "Producer done");
    let finished = stream.finish().await;
    if let Err(e) = &result {
        tracing::warn!(error = %e, "Producer stopped early");
    }
    result?;
    finished?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::FrameReader;
    use crate::transport::Listener;

    /// Accept one connection and collect every message until it closes.
    async fn capture(listener: Listener) -> Vec<Message> {
        let (reader, _writer) = listener.accept().await.unwrap().into_split();
        let mut reader = FrameReader::new(reader);
        let mut messages = Vec::new();
        while let Some(frame) = reader.next_frame().await.unwrap() {
            messages.push(Message::decode(&frame).unwrap());
        }
        messages
    }

    async fn fake_broker() -> (Endpoint, tokio::task::JoinHandle<Vec<Message>>) {
        let listener = Listener::bind(&"tcp://127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let endpoint = listener.local_endpoint().unwrap();
        (endpoint, tokio::spawn(capture(listener)))
    }

    #[tokio::test]
    async fn test_finish_sends_single_eof() {
        let (endpoint, captured) = fake_broker().await;

        let stream = InputStream::open(&endpoint, "p").await.unwrap();
        stream.send("a").unwrap();
        stream.send("").unwrap();
        stream.finish().await.unwrap();

        assert_eq!(
            captured.await.unwrap(),
            vec![Message::data("p", "a"), Message::eof("p")]
        );
    }

    #[tokio::test]
    async fn test_drop_without_finish_sends_eof() {
        let (endpoint, captured) = fake_broker().await;

        let stream = InputStream::open(&endpoint, "p").await.unwrap();
        stream.send("partial").unwrap();
        drop(stream);

        assert_eq!(
            captured.await.unwrap(),
            vec![Message::data("p", "partial"), Message::eof("p")]
        );
    }

    #[tokio::test]
    async fn test_run_producer_sends_lines() {
        let (endpoint, captured) = fake_broker().await;

        let input: &[u8] = b"one\ntwo\nlast";
        let stats = run_producer(&endpoint, "", input, std::future::pending())
            .await
            .unwrap();

        assert_eq!(
            stats,
            ProducerStats {
                chunks: 3,
                bytes: 12,
                interrupted: false,
            }
        );
        assert_eq!(
            captured.await.unwrap(),
            vec![
                Message::data("", "one\n"),
                Message::data("", "two\n"),
                Message::data("", "last"),
                Message::eof(""),
            ]
        );
    }

    #[tokio::test]
    async fn test_interrupt_before_input_still_sends_eof() {
        let (endpoint, captured) = fake_broker().await;

        // Input that never yields anything
        let (_keep_open, input) = tokio::io::duplex(64);
        let stats = run_producer(&endpoint, "p", input, async {})
            .await
            .unwrap();

        assert!(stats.interrupted);
        assert_eq!(stats.chunks, 0);

        assert_eq!(captured.await.unwrap(), vec![Message::eof("p")]);
    }

    /// Yields one line, then fails.
    struct FailingInput {
        served: bool,
    }

    impl AsyncRead for FailingInput {
        fn poll_read(
            mut self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            if self.served {
                return std::task::Poll::Ready(Err(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "input went away",
                )));
            }
            self.served = true;
            buf.put_slice(b"line\n");
            std::task::Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_read_error_still_flushes_eof() {
        let (endpoint, captured) = fake_broker().await;

        let err = run_producer(
            &endpoint,
            "p",
            FailingInput { served: false },
            std::future::pending(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, crate::SkypipeError::Io(_)));

        assert_eq!(
            captured.await.unwrap(),
            vec![Message::data("p", "line\n"), Message::eof("p")]
        );
    }

    #[tokio::test]
    async fn test_long_line_is_split_into_chunks() {
        let (endpoint, captured) = fake_broker().await;

        let input = vec![b'x'; MAX_CHUNK_SIZE * 2 + 10];
        let stats = run_producer(&endpoint, "p", &input[..], std::future::pending())
            .await
            .unwrap();
        assert_eq!(stats.chunks, 3);
        assert_eq!(stats.bytes, input.len());

        let messages = captured.await.unwrap();
        let sizes: Vec<_> = messages
            .iter()
            .map(|m| match m {
                Message::Data { payload, .. } => payload.len(),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(sizes, vec![MAX_CHUNK_SIZE, MAX_CHUNK_SIZE, 10, 0]);
        assert_eq!(messages.last(), Some(&Message::eof("p")));
    }
}
