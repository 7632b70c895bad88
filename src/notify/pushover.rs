//! Pushover push notification channel.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::{alert_text, Notifier, SUBJECT};
use crate::config::PushoverConfig;
use crate::error::NotifyError;
use crate::models::Alert;

pub struct PushoverNotifier {
    app_token: String,
    user_key: String,
    api_url: String,
    client: Client,
}

impl PushoverNotifier {
    pub fn new(config: PushoverConfig) -> Result<Self, NotifyError> {
        let app_token = config
            .app_token
            .ok_or(NotifyError::MissingCredential("Pushover app token"))?;
        let user_key = config
            .user_key
            .ok_or(NotifyError::MissingCredential("Pushover user key"))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        Ok(Self {
            app_token,
            user_key,
            api_url: config.api_url,
            client,
        })
    }
}

#[async_trait]
impl Notifier for PushoverNotifier {
    fn channel(&self) -> &'static str {
        "pushover"
    }

    async fn notify(&self, alert: &Alert) -> Result<(), NotifyError> {
        let message = alert_text(alert);
        let timestamp = alert.observed_at.timestamp().to_string();
        let form = [
            ("token", self.app_token.as_str()),
            ("user", self.user_key.as_str()),
            ("title", SUBJECT),
            ("message", message.as_str()),
            ("timestamp", timestamp.as_str()),
        ];

        let response = self
            .client
            .post(&self.api_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                channel: "pushover",
                reason: format!("{status} - {body}"),
            });
        }

        debug!(endpoint = %alert.endpoint, "push notification sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Endpoint, HealthStatus};
    use chrono::Utc;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn notifier(server: &MockServer) -> PushoverNotifier {
        PushoverNotifier::new(PushoverConfig {
            app_token: Some("app-token".into()),
            user_key: Some("user-key".into()),
            api_url: format!("{}/1/messages.json", server.uri()),
            timeout_secs: 2,
        })
        .unwrap()
    }

    fn alert() -> Alert {
        Alert {
            endpoint: Endpoint::new("a.com"),
            status: HealthStatus::Unreachable,
            observed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn posts_form_with_credentials_and_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1/messages.json"))
            .and(body_string_contains("token=app-token"))
            .and(body_string_contains("user=user-key"))
            .and(body_string_contains("unreachable"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"status":1}"#))
            .expect(1)
            .mount(&server)
            .await;

        notifier(&server).notify(&alert()).await.unwrap();
    }

    #[tokio::test]
    async fn non_success_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid token"))
            .mount(&server)
            .await;

        let err = notifier(&server).notify(&alert()).await.unwrap_err();
        match err {
            NotifyError::Rejected { channel, reason } => {
                assert_eq!(channel, "pushover");
                assert!(reason.contains("invalid token"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn requires_both_tokens() {
        let config = PushoverConfig {
            app_token: Some("app".into()),
            ..PushoverConfig::default()
        };
        assert!(matches!(
            PushoverNotifier::new(config),
            Err(NotifyError::MissingCredential(_))
        ));
    }
}
