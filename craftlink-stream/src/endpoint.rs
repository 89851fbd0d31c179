//! Remote server address

use std::fmt;

/// Host and port of a remote game server.
///
/// Immutable once a connection has been created for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Hostname or IP address
    pub host: String,
    /// TCP port of the server plugin's socket
    pub port: u16,
}

impl Endpoint {
    /// Create a new Endpoint
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_display() {
        assert_eq!(Endpoint::new("10.0.0.5", 25565).to_string(), "10.0.0.5:25565");
        assert_eq!(Endpoint::new("::1", 10692).to_string(), "[::1]:10692");
    }
}
