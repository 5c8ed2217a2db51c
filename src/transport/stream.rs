//! Connected streams and listeners.
//!
//! - TCP: `tokio::net::TcpListener` / `TcpStream`
//! - Unix: Unix Domain Socket, socket file removed on drop
//!
//! # Example
//!
//! ```ignore
//! use skypipe::transport::{connect, Endpoint, Listener};
//!
//! let endpoint: Endpoint = "tcp://127.0.0.1:0".parse()?;
//! let listener = Listener::bind(&endpoint).await?;
//! let stream = connect(&listener.local_endpoint()?).await?;
//! ```

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};

use super::Endpoint;
use crate::error::Result;

/// Read half of a connection.
pub type BoxedReader = Box<dyn AsyncRead + Unpin + Send>;

/// Write half of a connection.
pub type BoxedWriter = Box<dyn AsyncWrite + Unpin + Send>;

/// A connected stream, already split into halves.
pub struct Stream {
    reader: BoxedReader,
    writer: BoxedWriter,
    peer: String,
}

impl Stream {
    /// Wrap arbitrary halves, e.g. a `tokio::io::duplex` pair in tests.
    pub fn from_halves(
        reader: impl AsyncRead + Unpin + Send + 'static,
        writer: impl AsyncWrite + Unpin + Send + 'static,
        peer: impl Into<String>,
    ) -> Self {
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
            peer: peer.into(),
        }
    }

    fn from_tcp(stream: TcpStream) -> Result<Self> {
        stream.set_nodelay(true)?;
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        let (reader, writer) = stream.into_split();
        Ok(Self::from_halves(reader, writer, peer))
    }

    /// Remote address, for logging.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Split into read and write halves.
    pub fn into_split(self) -> (BoxedReader, BoxedWriter) {
        (self.reader, self.writer)
    }
}

/// Connect to a broker endpoint.
pub async fn connect(endpoint: &Endpoint) -> Result<Stream> {
    match endpoint {
        Endpoint::Tcp(address) => Stream::from_tcp(TcpStream::connect(address.as_str()).await?),
        #[cfg(unix)]
        Endpoint::Ipc(path) => {
            let stream = tokio::net::UnixStream::connect(path).await?;
            let (reader, writer) = stream.into_split();
            Ok(Stream::from_halves(reader, writer, path.display().to_string()))
        }
        #[cfg(not(unix))]
        Endpoint::Ipc(_) => Err(crate::error::SkypipeError::InvalidEndpoint(
            "ipc endpoints are only supported on Unix".to_string(),
        )),
    }
}

/// A bound listener accepting client connections.
pub enum Listener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix {
        listener: tokio::net::UnixListener,
        path: std::path::PathBuf,
    },
}

impl Listener {
    /// Bind to an endpoint.
    ///
    /// For `ipc://` endpoints any existing socket file at the path is
    /// removed before binding.
    pub async fn bind(endpoint: &Endpoint) -> Result<Self> {
        match endpoint {
            Endpoint::Tcp(address) => Ok(Listener::Tcp(TcpListener::bind(address.as_str()).await?)),
            #[cfg(unix)]
            Endpoint::Ipc(path) => {
                if path.exists() {
                    std::fs::remove_file(path)?;
                }
                let listener = tokio::net::UnixListener::bind(path)?;
                Ok(Listener::Unix {
                    listener,
                    path: path.clone(),
                })
            }
            #[cfg(not(unix))]
            Endpoint::Ipc(_) => Err(crate::error::SkypipeError::InvalidEndpoint(
                "ipc endpoints are only supported on Unix".to_string(),
            )),
        }
    }

    /// Accept a single connection.
    pub async fn accept(&self) -> Result<Stream> {
        match self {
            Listener::Tcp(listener) => {
                let (stream, _addr) = listener.accept().await?;
                Stream::from_tcp(stream)
            }
            #[cfg(unix)]
            Listener::Unix { listener, path } => {
                let (stream, _addr) = listener.accept().await?;
                let (reader, writer) = stream.into_split();
                Ok(Stream::from_halves(reader, writer, path.display().to_string()))
            }
        }
    }

    /// The endpoint clients should connect to.
    ///
    /// For TCP this reports the actual port, so binding port 0 works.
    /// A wildcard bind (`0.0.0.0`) is reported as-is.
    pub fn local_endpoint(&self) -> Result<Endpoint> {
        match self {
            Listener::Tcp(listener) => Ok(Endpoint::Tcp(listener.local_addr()?.to_string())),
            #[cfg(unix)]
            Listener::Unix { path, .. } => Ok(Endpoint::Ipc(path.clone())),
        }
    }
}

#[cfg(unix)]
impl Drop for Listener {
    fn drop(&mut self) {
        if let Listener::Unix { path, .. } = self {
            let _ = std::fs::remove_file(path);
        }
    }
}
