//! Broker module - the relay process.
//!
//! Provides:
//! - [`PipeTable`] - listener sets and pending buffers, pure routing logic
//! - [`Broker`] - accept loop, per-connection tasks and the dispatch task
//!
//! # Example
//!
//! ```ignore
//! use skypipe::broker::Broker;
//! use skypipe::config::BrokerConfig;
//!
//! let handle = Broker::spawn(&BrokerConfig::default()).await?;
//! tokio::signal::ctrl_c().await?;
//! handle.shutdown().await?;
//! ```

mod server;
mod table;

pub use server::{Broker, BrokerHandle};
pub use table::{ClientId, Delivery, PipeStats, PipeTable};
