//! Notification channels.
//!
//! - Email over SMTP with STARTTLS
//! - Pushover push notifications

mod email;
mod pushover;

pub use email::EmailNotifier;
pub use pushover::PushoverNotifier;

use async_trait::async_trait;

use crate::config::ChannelsConfig;
use crate::error::NotifyError;
use crate::models::Alert;

pub const SUBJECT: &str = "Monitor Service Notification";

/// Delivers an alert over one channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Channel name used in logs.
    fn channel(&self) -> &'static str;

    async fn notify(&self, alert: &Alert) -> Result<(), NotifyError>;
}

/// Text shared by every channel.
pub fn alert_text(alert: &Alert) -> String {
    format!(
        "You are being notified that {} is experiencing a {} status!",
        alert.endpoint, alert.status
    )
}

/// Builds one notifier per configured channel.
pub fn from_config(channels: &ChannelsConfig) -> Result<Vec<Box<dyn Notifier>>, NotifyError> {
    let mut notifiers: Vec<Box<dyn Notifier>> = Vec::new();
    if let Some(email) = &channels.email {
        notifiers.push(Box::new(EmailNotifier::new(email.clone())?));
    }
    if let Some(pushover) = &channels.pushover {
        notifiers.push(Box::new(PushoverNotifier::new(pushover.clone())?));
    }
    Ok(notifiers)
}
