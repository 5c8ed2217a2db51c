//! Client library: producer and consumer roles plus the liveness probe.
//!
//! The client takes a resolved [`Endpoint`](crate::transport::Endpoint)
//! and never retries or reconnects. Finding a broker is the job of
//! [`discovery`](crate::discovery).

mod consumer;
mod probe;
mod producer;
mod socket;

pub use consumer::{run_consumer, ConsumerStats, OutputStream};
pub use probe::{check_endpoint, Liveness, DEFAULT_PROBE_TIMEOUT};
pub use producer::{run_producer, InputStream, ProducerStats};
pub use socket::Socket;
