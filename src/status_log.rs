//! Persistent record of unhealthy observations.

use chrono::{DateTime, Local, Utc};
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::console;
use crate::models::{Endpoint, HealthStatus};

pub const TIMESTAMP_FORMAT: &str = "%a %b %d %Y %H:%M:%S";

/// Appends `(<timestamp>) <endpoint> STATUS: <status>` lines to a file.
pub struct StatusLog {
    path: PathBuf,
}

impl StatusLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Echoes the observation to the console and appends it to the log file.
    /// Write failures are reported but never stop monitoring.
    pub async fn record(&self, at: DateTime<Utc>, endpoint: &Endpoint, status: HealthStatus) {
        let timestamp = format_timestamp(at);
        console::status(&timestamp, endpoint.as_str(), &status.to_string());

        let line = format!("({timestamp}) {endpoint} STATUS: {status}\n");
        if let Err(e) = self.append(&line).await {
            warn!(path = %self.path.display(), error = %e, "failed to write status log");
        }
    }

    async fn append(&self, line: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format(TIMESTAMP_FORMAT).to_string()
}
