//! # skypipe
//!
//! A named-pipe relay. Producers stream bytes into a pipe by name, a broker
//! routes them, and consumers subscribed to that name receive them.
//!
//! ## Architecture
//!
//! - **Wire protocol** ([`protocol`]): length-prefixed multi-part frames,
//!   `[SKYPIPE/0.1, COMMAND, pipe?, payload?]`
//! - **Broker** ([`broker`]): a single dispatch task owning listener sets
//!   and pending buffers; buffers while a pipe has no listener
//! - **Client** ([`client`]): producer and consumer roles, liveness probe
//! - **Discovery** ([`discovery`]): picks the endpoint the client talks to
//!
//! ## Example
//!
//! ```ignore
//! use skypipe::client::{run_consumer, run_producer};
//!
//! let endpoint = "tcp://127.0.0.1:9000".parse()?;
//! run_producer(&endpoint, "logs", tokio::io::stdin(), std::future::pending()).await?;
//!
//! // elsewhere
//! run_consumer(&endpoint, "logs", tokio::io::stdout(), skypipe::bootstrap::interrupt()).await?;
//! ```

pub mod bootstrap;
pub mod broker;
pub mod client;
pub mod config;
pub mod discovery;
pub mod error;
pub mod protocol;
pub mod transport;

mod reader;
mod writer;

pub use broker::{Broker, BrokerHandle};
pub use error::{Result, SkypipeError};
pub use protocol::{Message, PipeName};
pub use transport::Endpoint;
