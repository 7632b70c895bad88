//! Endpoint liveness probes.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::models::{Endpoint, HealthStatus};

/// A single bounded health check against one endpoint.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Never fails: network problems map to [`HealthStatus::Unreachable`].
    async fn check(&self, endpoint: &Endpoint, timeout: Duration) -> HealthStatus;
}

/// Issues a GET and reports the status code as returned by the peer.
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("site-monitor/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn check(&self, endpoint: &Endpoint, timeout: Duration) -> HealthStatus {
        let request = self.client.get(endpoint.as_str()).timeout(timeout).send();
        match tokio::time::timeout(timeout, request).await {
            Ok(Ok(resp)) => HealthStatus::Code(resp.status().as_u16()),
            Ok(Err(e)) => {
                debug!(%endpoint, error = %e, "probe request failed");
                HealthStatus::Unreachable
            }
            Err(_) => {
                debug!(%endpoint, ?timeout, "probe timed out");
                HealthStatus::Unreachable
            }
        }
    }
}
