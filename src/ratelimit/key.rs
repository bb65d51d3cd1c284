//! Client key generation and handling.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// A key that identifies whose admissions are being counted.
///
/// The client part is usually the caller's network address. The optional
/// scope partitions one client's admissions per guarded operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientKey {
    /// Operation the admissions belong to, `None` when shared
    pub scope: Option<String>,
    /// Opaque client identifier
    pub client: String,
}

impl ClientKey {
    /// Create an unscoped key.
    pub fn new(client: impl Into<String>) -> Self {
        Self {
            scope: None,
            client: client.into(),
        }
    }

    /// Create a key scoped to a single operation.
    pub fn scoped(scope: impl Into<String>, client: impl Into<String>) -> Self {
        Self {
            scope: Some(scope.into()),
            client: client.into(),
        }
    }

    /// Key for a peer address. The port is dropped.
    pub fn from_peer(addr: SocketAddr) -> Self {
        Self::from(addr.ip())
    }
}

impl From<IpAddr> for ClientKey {
    fn from(ip: IpAddr) -> Self {
        Self::new(ip.to_string())
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            Some(scope) => write!(f, "{}:{}", scope, self.client),
            None => write!(f, "{}", self.client),
        }
    }
}
