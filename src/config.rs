use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_PATH: &str = "monitor.json";
pub const PUSHOVER_API_URL: &str = "https://api.pushover.net/1/messages.json";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MonitorConfig {
    /// Seconds between full check cycles.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Minimum seconds between two alerts for the same endpoint.
    #[serde(default = "default_alert_interval")]
    pub alert_interval_secs: u64,
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_sites_file")]
    pub sites_file: PathBuf,
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    #[serde(default)]
    pub channels: ChannelsConfig,
}

fn default_poll_interval() -> u64 { 60 }
fn default_alert_interval() -> u64 { 1800 }
fn default_probe_timeout() -> u64 { 5 }
fn default_max_concurrency() -> usize { 16 }
fn default_sites_file() -> PathBuf { PathBuf::from("sites.txt") }
fn default_log_file() -> PathBuf { PathBuf::from("monitor.log") }

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            alert_interval_secs: default_alert_interval(),
            probe_timeout_secs: default_probe_timeout(),
            max_concurrency: default_max_concurrency(),
            sites_file: default_sites_file(),
            log_file: default_log_file(),
            channels: ChannelsConfig::default(),
        }
    }
}

/// Enabled notification channels. A channel is active when its section is present.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ChannelsConfig {
    pub email: Option<EmailConfig>,
    pub pushover: Option<PushoverConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EmailConfig {
    /// Login name, also used as the sender address.
    #[serde(default)]
    pub username: String,
    /// Usually supplied through `SMTP_PASSWORD` rather than the file.
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default = "default_notify_timeout")]
    pub timeout_secs: u64,
}

fn default_smtp_host() -> String { "smtp.gmail.com".into() }
fn default_smtp_port() -> u16 { 587 }
fn default_notify_timeout() -> u64 { 10 }

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: None,
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            recipients: Vec::new(),
            timeout_secs: default_notify_timeout(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PushoverConfig {
    #[serde(default)]
    pub app_token: Option<String>,
    #[serde(default)]
    pub user_key: Option<String>,
    #[serde(default = "default_pushover_url")]
    pub api_url: String,
    #[serde(default = "default_notify_timeout")]
    pub timeout_secs: u64,
}

fn default_pushover_url() -> String { PUSHOVER_API_URL.into() }

impl Default for PushoverConfig {
    fn default() -> Self {
        Self {
            app_token: None,
            user_key: None,
            api_url: default_pushover_url(),
            timeout_secs: default_notify_timeout(),
        }
    }
}

impl MonitorConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overlays channel secrets from the environment.
    ///
    /// `lookup` is `std::env::var` in production. Any email or pushover
    /// variable that is set enables its channel.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let username = var("SMTP_USERNAME");
        let password = var("SMTP_PASSWORD");
        let host = var("SMTP_HOST");
        let port = var("SMTP_PORT");
        let recipients = var("ALERT_RECIPIENTS");
        if username.is_some() || password.is_some() || host.is_some() || port.is_some() || recipients.is_some() {
            let email = self.channels.email.get_or_insert_with(EmailConfig::default);
            if let Some(username) = username {
                email.username = username;
            }
            if password.is_some() {
                email.password = password;
            }
            if let Some(host) = host {
                email.smtp_host = host;
            }
            if let Some(port) = port {
                email.smtp_port = port.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    name: "SMTP_PORT",
                    value: port.clone(),
                })?;
            }
            if let Some(recipients) = recipients {
                email.recipients = recipients
                    .split(',')
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(String::from)
                    .collect();
            }
        }

        let token = var("PUSHOVER_TOKEN");
        let user = var("PUSHOVER_USER");
        if token.is_some() || user.is_some() {
            let pushover = self.channels.pushover.get_or_insert_with(PushoverConfig::default);
            if token.is_some() {
                pushover.app_token = token;
            }
            if user.is_some() {
                pushover.user_key = user;
            }
        }
        Ok(())
    }

    /// Startup validation. A channel with a missing credential is fatal.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Zero("poll_interval_secs"));
        }
        if self.probe_timeout_secs == 0 {
            return Err(ConfigError::Zero("probe_timeout_secs"));
        }
        if self.max_concurrency == 0 {
            return Err(ConfigError::Zero("max_concurrency"));
        }

        if let Some(email) = &self.channels.email {
            let missing = |field| ConfigError::MissingCredential { channel: "email", field };
            if email.username.trim().is_empty() {
                return Err(missing("username"));
            }
            if email.password.as_deref().map_or(true, |p| p.is_empty()) {
                return Err(missing("password"));
            }
            if email.smtp_host.trim().is_empty() {
                return Err(missing("smtp_host"));
            }
            if email.recipients.is_empty() {
                return Err(missing("recipients"));
            }
        }

        if let Some(pushover) = &self.channels.pushover {
            let missing = |field| ConfigError::MissingCredential { channel: "pushover", field };
            if pushover.app_token.as_deref().map_or(true, str::is_empty) {
                return Err(missing("app_token"));
            }
            if pushover.user_key.as_deref().map_or(true, str::is_empty) {
                return Err(missing("user_key"));
            }
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn alert_interval(&self) -> Duration {
        Duration::from_secs(self.alert_interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}
