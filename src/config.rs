//! Configuration for the client CLI and the broker.
//!
//! The client keeps a small JSON file remembering the last broker that
//! answered a probe:
//!
//! ```text
//! { "endpoint": "tcp://relay.example.net:9000", "probe_timeout_secs": 10 }
//! ```
//!
//! It lives in `$SKYPIPE_HOME/config`, defaulting to `~/.skypipe/config`
//! (`%APPDATA%\skypipe\config` on Windows).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::transport::Endpoint;

/// Environment variable overriding the config directory.
pub const HOME_ENV: &str = "SKYPIPE_HOME";

/// Name of the config file inside the config directory.
pub const CONFIG_FILE: &str = "config";

/// Broker port when none is configured.
pub const DEFAULT_PORT: u16 = 9000;

const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 10;

fn default_probe_timeout_secs() -> u64 {
    DEFAULT_PROBE_TIMEOUT_SECS
}

/// Persisted client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Last known good broker endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Liveness probe timeout in seconds.
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            probe_timeout_secs: DEFAULT_PROBE_TIMEOUT_SECS,
        }
    }
}

impl ClientConfig {
    /// Config directory for this platform, honouring `SKYPIPE_HOME`.
    pub fn default_dir() -> Option<PathBuf> {
        if let Some(home) = std::env::var_os(HOME_ENV) {
            return Some(PathBuf::from(home));
        }
        if cfg!(windows) {
            std::env::var_os("APPDATA").map(|dir| PathBuf::from(dir).join("skypipe"))
        } else {
            std::env::var_os("HOME").map(|dir| PathBuf::from(dir).join(".skypipe"))
        }
    }

    /// Full path of the config file.
    pub fn default_path() -> Option<PathBuf> {
        Self::default_dir().map(|dir| dir.join(CONFIG_FILE))
    }

    /// Load from the default location. No home directory means defaults.
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load from `path`. A missing file yields the defaults; a malformed
    /// one is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Remember `endpoint` in the config file at `path`, keeping other
    /// settings.
    pub fn save_endpoint(path: &Path, endpoint: &Endpoint) -> Result<()> {
        let mut config = Self::load_from(path)?;
        config.endpoint = Some(endpoint.to_string());
        config.save_to(path)
    }

    /// The cached endpoint, parsed.
    pub fn endpoint(&self) -> Result<Option<Endpoint>> {
        self.endpoint.as_deref().map(str::parse::<Endpoint>).transpose()
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

/// Broker settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    /// Endpoint to accept clients on.
    pub bind: Endpoint,
}

impl BrokerConfig {
    /// Bind all interfaces on `port`.
    pub fn on_port(port: u16) -> Self {
        Self {
            bind: Endpoint::tcp("0.0.0.0", port),
        }
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self::on_port(DEFAULT_PORT)
    }
}
