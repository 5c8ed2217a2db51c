//! Transport module - endpoints, listeners and connected streams.
//!
//! Provides abstraction over:
//! - TCP (`tcp://host:port`)
//! - Unix Domain Sockets (`ipc:///path/to/socket`, Unix only)

mod endpoint;
mod stream;

pub use endpoint::Endpoint;
pub use stream::{connect, BoxedReader, BoxedWriter, Listener, Stream};
