//! skypipe - pipe data through a named relay pipe.
//!
//! ```text
//! echo hello | skypipe logs     # producer: stdin is not a terminal
//! skypipe logs                  # consumer: prints what arrives
//! ```

use std::io::IsTerminal;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use skypipe::bootstrap::{init_tracing, interrupt};
use skypipe::client::{run_consumer, run_producer};
use skypipe::config::ClientConfig;
use skypipe::discovery::{discover, StaticDiscovery};
use skypipe::{Endpoint, PipeName};
use tracing::{info, warn};

/// How long a blocked stdin read may delay exit.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(100);

#[derive(Debug, Parser)]
#[command(name = "skypipe", version, about = "Pipe data to and from a named relay pipe")]
struct Args {
    /// Pipe name. Empty selects the default pipe.
    #[arg(default_value = "")]
    name: String,

    /// Broker endpoint, e.g. tcp://relay.example.net:9000
    #[arg(long, env = "SATELLITE")]
    endpoint: Option<Endpoint>,

    /// Send stdin to the pipe even if stdin is a terminal
    #[arg(long, conflicts_with = "listen")]
    send: bool,

    /// Print the pipe to stdout even if stdin is redirected
    #[arg(long)]
    listen: bool,

    /// Liveness probe timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Produce,
    Consume,
}

impl Args {
    fn mode(&self) -> Mode {
        if self.send {
            Mode::Produce
        } else if self.listen || std::io::stdin().is_terminal() {
            Mode::Consume
        } else {
            Mode::Produce
        }
    }
}

fn main() -> Result<()> {
    init_tracing("warn");
    let args = Args::parse();

    let runtime = tokio::runtime::Runtime::new().context("failed to start runtime")?;
    let result = runtime.block_on(run(args));
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    result
}

async fn run(args: Args) -> Result<()> {
    let config = ClientConfig::load().context("failed to read skypipe config")?;
    let timeout = args
        .timeout
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.probe_timeout());

    let discovery = StaticDiscovery::from_sources(args.endpoint.clone(), &config)
        .context("invalid endpoint in skypipe config")?;
    let endpoint = discover(&discovery, timeout)
        .await
        .context("no skypipe broker available; pass --endpoint or set SATELLITE")?;

    if let Some(path) = ClientConfig::default_path() {
        if let Err(e) = ClientConfig::save_endpoint(&path, &endpoint) {
            warn!(path = %path.display(), error = %e, "Could not cache broker endpoint");
        }
    }

    let pipe = PipeName::from(args.name.clone());
    match args.mode() {
        Mode::Produce => {
            let stats = run_producer(&endpoint, pipe, tokio::io::stdin(), interrupt())
                .await
                .context("producer failed")?;
            info!(chunks = stats.chunks, bytes = stats.bytes, interrupted = stats.interrupted, "Sent");
        }
        Mode::Consume => {
            let stats = run_consumer(&endpoint, pipe, tokio::io::stdout(), interrupt())
                .await
                .context("consumer failed")?;
            info!(chunks = stats.chunks, bytes = stats.bytes, interrupted = stats.interrupted, "Received");
        }
    }

    Ok(())
}
