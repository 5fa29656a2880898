//! Telegram Bot API delivery.

use super::{Notifier, NotifyError};
use crate::config::TelegramConfig;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;
use wreq::Client;

/// Sends messages through a bot's `sendMessage` method.
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    bot_token: String,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig, timeout_secs: u64) -> Result<Self, NotifyError> {
        let bot_token = config
            .bot_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or(NotifyError::NotConfigured("telegram bot token"))?;

        let client = Client::builder().timeout(Duration::from_secs(timeout_secs)).build()?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            bot_token,
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, recipient: &str, text: &str) -> Result<(), NotifyError> {
        // The token is part of the path; never log the full URL
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);
        let body = json!({
            "chat_id": recipient,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": false,
        });
        let body = serde_json::to_vec(&body).map_err(|e| NotifyError::Network(e.to_string()))?;

        debug!("Sending Telegram message to chat {} ({} bytes)", recipient, text.len());

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let raw_reply = response.text().await?;
        let reply: Option<Value> = serde_json::from_str(&raw_reply).ok();
        let ok = reply.as_ref().and_then(|v| v["ok"].as_bool());

        if (200..300).contains(&status) && ok != Some(false) {
            return Ok(());
        }

        let message = reply
            .as_ref()
            .and_then(|v| v["description"].as_str())
            .map(String::from)
            .unwrap_or(raw_reply);

        Err(NotifyError::Api { status, message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(api_base: &str) -> TelegramConfig {
        TelegramConfig {
            bot_token: Some("123:abc".to_string()),
            chat_id: Some("42".to_string()),
            api_base: api_base.to_string(),
        }
    }

    #[tokio::test]
    async fn test_send_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .and(header("Content-Type", "application/json"))
            .and(body_partial_json(json!({
                "chat_id": "42",
                "text": "<b>60% OFF</b>",
                "parse_mode": "HTML",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"ok":true,"result":{}}"#))
            .expect(1)
            .mount(&mock_server)
            .await;

        let notifier = TelegramNotifier::new(&config(&mock_server.uri()), 5).unwrap();
        notifier.send("42", "<b>60% OFF</b>").await.unwrap();
    }

    #[tokio::test]
    async fn test_send_api_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_string(r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#),
            )
            .mount(&mock_server)
            .await;

        let notifier = TelegramNotifier::new(&config(&mock_server.uri()), 5).unwrap();
        let err = notifier.send("42", "hello").await.unwrap_err();

        match err {
            NotifyError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Bad Request: chat not found");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_send_ok_false_is_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"ok":false,"description":"flood"}"#))
            .mount(&mock_server)
            .await;

        let notifier = TelegramNotifier::new(&config(&mock_server.uri()), 5).unwrap();
        assert!(notifier.send("42", "hello").await.is_err());
    }

    #[tokio::test]
    async fn test_send_network_error() {
        // Nothing listens on port 9
        let notifier = TelegramNotifier::new(&config("http://127.0.0.1:9"), 2).unwrap();
        assert!(matches!(notifier.send("42", "hello").await, Err(NotifyError::Network(_))));
    }

    #[test]
    fn test_missing_token() {
        let mut cfg = config("http://localhost");
        cfg.bot_token = None;
        assert!(matches!(TelegramNotifier::new(&cfg, 5), Err(NotifyError::NotConfigured(_))));
    }
}
