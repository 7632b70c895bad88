use chrono::{DateTime, Utc};
use std::fmt;

/// The only status code treated as healthy.
pub const HEALTHY_STATUS: u16 = 200;

/// A monitored address, always carrying an `http://` or `https://` scheme.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Endpoint(String);

impl Endpoint {
    /// Trims `raw` and prefixes `http://` when it has no scheme.
    ///
    /// Normalizing an already normalized address returns it unchanged.
    pub fn new(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.starts_with("http://") || raw.starts_with("https://") {
            Self(raw.to_string())
        } else {
            Self(format!("http://{raw}"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Classification of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Status code reported by the remote peer.
    Code(u16),
    /// Timeout, refused connection, DNS failure or malformed response.
    Unreachable,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Code(HEALTHY_STATUS))
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "{code}"),
            Self::Unreachable => f.write_str("unreachable"),
        }
    }
}

/// Payload handed to every notification channel.
#[derive(Debug, Clone)]
pub struct Alert {
    pub endpoint: Endpoint,
    pub status: HealthStatus,
    pub observed_at: DateTime<Utc>,
}
