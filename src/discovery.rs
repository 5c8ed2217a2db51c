//! Finding a broker to talk to.
//!
//! The relay client itself only takes a resolved endpoint. A [`Discovery`]
//! implementation supplies one: it knows where a broker might be, can probe
//! it, and may be able to start a new one. [`discover`] strings these
//! together:
//!
//! ```text
//! resolve() ─► check() ─ alive ─► endpoint
//!                 │
//!                 └─ otherwise ─► provision() ─► check(60s) ─ alive ─► endpoint
//! ```
//!
//! There is no retry loop; a failed final check is an error for the caller.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::client::{check_endpoint, Liveness};
use crate::config::ClientConfig;
use crate::error::{Result, SkypipeError};
use crate::transport::Endpoint;

/// How long a freshly provisioned broker gets to answer.
pub const PROVISION_TIMEOUT: Duration = Duration::from_secs(60);

/// Boxed future returned by [`Discovery`] methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Source of broker endpoints.
pub trait Discovery: Send + Sync {
    /// Best known endpoint, if any.
    fn resolve(&self) -> BoxFuture<'_, Option<Endpoint>>;

    /// Probe an endpoint. Defaults to a HELLO round-trip.
    fn check<'a>(&'a self, endpoint: &'a Endpoint, timeout: Duration) -> BoxFuture<'a, Liveness> {
        Box::pin(check_endpoint(endpoint, timeout))
    }

    /// Start a new broker and return its endpoint.
    fn provision(&self) -> BoxFuture<'_, Result<Endpoint>> {
        Box::pin(async {
            Err(SkypipeError::Discovery(
                "no reachable broker and provisioning is not available".to_string(),
            ))
        })
    }
}

/// Discovery from locally known endpoints: a command-line or environment
/// value first, then the cached config entry. Cannot provision.
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    endpoint: Option<Endpoint>,
}

impl StaticDiscovery {
    pub fn new(endpoint: Option<Endpoint>) -> Self {
        Self { endpoint }
    }

    /// Prefer `explicit`, fall back to the endpoint cached in `config`.
    pub fn from_sources(explicit: Option<Endpoint>, config: &ClientConfig) -> Result<Self> {
        let endpoint = match explicit {
            Some(endpoint) => Some(endpoint),
            None => config.endpoint()?,
        };
        Ok(Self::new(endpoint))
    }
}

impl Discovery for StaticDiscovery {
    fn resolve(&self) -> BoxFuture<'_, Option<Endpoint>> {
        Box::pin(async move { self.endpoint.clone() })
    }
}

/// Find a live broker: the resolved one if it answers within `timeout`,
/// otherwise a freshly provisioned one.
pub async fn discover(discovery: &dyn Discovery, timeout: Duration) -> Result<Endpoint> {
    match discovery.resolve().await {
        Some(endpoint) => {
            let liveness = discovery.check(&endpoint, timeout).await;
            if liveness.is_alive() {
                tracing::debug!(endpoint = %endpoint, "Using known broker");
                return Ok(endpoint);
            }
            tracing::warn!(endpoint = %endpoint, %liveness, "Known broker is not usable");
        }
        None => tracing::debug!("No known broker endpoint"),
    }

    let endpoint = discovery.provision().await?;
    tracing::info!(endpoint = %endpoint, "Provisioned broker, waiting for it to answer");

    let liveness = discovery.check(&endpoint, PROVISION_TIMEOUT).await;
    if !liveness.is_alive() {
        return Err(SkypipeError::Discovery(format!(
            "provisioned broker at {} is not usable ({})",
            endpoint, liveness
        )));
    }
    Ok(endpoint)
}
