//! skypipe-satellite - the relay broker.

use anyhow::{Context, Result};
use clap::Parser;
use skypipe::bootstrap::{init_tracing, interrupt};
use skypipe::config::{BrokerConfig, DEFAULT_PORT};
use skypipe::{Broker, Endpoint};

#[derive(Debug, Parser)]
#[command(name = "skypipe-satellite", version, about = "Relay broker for skypipe")]
struct Args {
    /// Endpoint to listen on, e.g. tcp://0.0.0.0:9000 or ipc:///tmp/skypipe.sock
    #[arg(long, env = "SKYPIPE_BIND")]
    bind: Option<Endpoint>,

    /// TCP port on all interfaces, used when --bind is not given
    #[arg(long, env = "PORT_ZMQ", default_value_t = DEFAULT_PORT)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("info");
    let args = Args::parse();

    let config = match args.bind {
        Some(bind) => BrokerConfig { bind },
        None => BrokerConfig::on_port(args.port),
    };

    let broker = Broker::spawn(&config)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    interrupt().await;

    broker.shutdown().await.context("broker did not shut down cleanly")?;
    Ok(())
}
