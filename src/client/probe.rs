//! Liveness probe: is there a skypipe broker at this endpoint?

use std::fmt;
use std::time::Duration;

use super::Socket;
use crate::error::{Result, SkypipeError};
use crate::protocol::{Message, HEADER};
use crate::transport::Endpoint;

/// How long to wait for a HELLO reply by default.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of a liveness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// A skypipe broker replied to HELLO.
    Alive,
    /// Something replied, but not with the skypipe header.
    Foreign,
    /// Connection refused, closed without a reply, or the timeout elapsed.
    NoReply,
}

impl Liveness {
    pub fn is_alive(&self) -> bool {
        *self == Liveness::Alive
    }
}

impl fmt::Display for Liveness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Liveness::Alive => "alive",
            Liveness::Foreign => "foreign",
            Liveness::NoReply => "no reply",
        })
    }
}

/// Send HELLO to `endpoint` and classify the reply.
///
/// The whole exchange, connect included, is bounded by `timeout`.
pub async fn check_endpoint(endpoint: &Endpoint, timeout: Duration) -> Liveness {
    let liveness = match tokio::time::timeout(timeout, hello(endpoint)).await {
        Ok(Ok(liveness)) => liveness,
        // Bytes that cannot be framed came from some other protocol
        Ok(Err(SkypipeError::Protocol(_))) => Liveness::Foreign,
        Ok(Err(e)) => {
            tracing::debug!(endpoint = %endpoint, error = %e, "Probe failed");
            Liveness::NoReply
        }
        Err(_) => Liveness::NoReply,
    };

    tracing::debug!(endpoint = %endpoint, %liveness, "Probe finished");
    liveness
}

async fn hello(endpoint: &Endpoint) -> Result<Liveness> {
    let mut socket = Socket::connect(endpoint).await?;
    socket.send(&Message::Hello)?;

    Ok(match socket.recv().await? {
        Some(reply) if reply.header() == Some(HEADER.as_bytes()) => Liveness::Alive,
        Some(_) => Liveness::Foreign,
        None => Liveness::NoReply,
    })
}
