//! Broker endpoint addresses.
//!
//! # Example
//!
//! ```
//! use skypipe::transport::Endpoint;
//!
//! let endpoint: Endpoint = "tcp://127.0.0.1:9000".parse().unwrap();
//! assert_eq!(endpoint.to_string(), "tcp://127.0.0.1:9000");
//! ```

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::SkypipeError;

/// A broker address in `scheme://address` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// `tcp://host:port`
    Tcp(String),
    /// `ipc:///path`, a Unix Domain Socket.
    Ipc(PathBuf),
}

impl Endpoint {
    /// Build a TCP endpoint from host and port.
    pub fn tcp(host: &str, port: u16) -> Self {
        Endpoint::Tcp(format!("{}:{}", host, port))
    }

    /// Scheme part of the endpoint.
    pub fn scheme(&self) -> &'static str {
        match self {
            Endpoint::Tcp(_) => "tcp",
            Endpoint::Ipc(_) => "ipc",
        }
    }
}

impl FromStr for Endpoint {
    type Err = SkypipeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, address) = s
            .split_once("://")
            .ok_or_else(|| SkypipeError::InvalidEndpoint(format!("missing scheme in {:?}", s)))?;

        if address.is_empty() {
            return Err(SkypipeError::InvalidEndpoint(format!(
                "missing address in {:?}",
                s
            )));
        }

        match scheme {
            "tcp" => {
                let (host, port) = address.rsplit_once(':').ok_or_else(|| {
                    SkypipeError::InvalidEndpoint(format!("missing port in {:?}", s))
                })?;
                if host.is_empty() || port.parse::<u16>().is_err() {
                    return Err(SkypipeError::InvalidEndpoint(format!(
                        "expected tcp://host:port, got {:?}",
                        s
                    )));
                }
                Ok(Endpoint::Tcp(address.to_string()))
            }
            "ipc" => Ok(Endpoint::Ipc(PathBuf::from(address))),
            other => Err(SkypipeError::InvalidEndpoint(format!(
                "unsupported scheme {:?}",
                other
            ))),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp(address) => write!(f, "tcp://{}", address),
            Endpoint::Ipc(path) => write!(f, "ipc://{}", path.display()),
        }
    }
}
