//! Error types for configuration and alert delivery.

use std::path::PathBuf;

use thiserror::Error;

/// Problems found while loading or validating the monitor configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },

    #[error("{channel} channel is enabled but {field} is not set")]
    MissingCredential {
        channel: &'static str,
        field: &'static str,
    },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Failure to deliver an alert over a channel.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),

    #[error("invalid address {address:?}: {reason}")]
    Address { address: String, reason: String },

    #[error("failed to build message: {0}")]
    Message(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("{channel} rejected the alert: {reason}")]
    Rejected {
        channel: &'static str,
        reason: String,
    },
}
