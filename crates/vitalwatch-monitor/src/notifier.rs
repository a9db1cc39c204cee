//! Outbound notifications.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::MonitorError;

const TELEGRAM_API: &str = "https://api.telegram.org";

/// Delivers one text message.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), MonitorError>;
}

/// Telegram Bot API `sendMessage` to one chat, with HTML emphasis enabled.
pub struct TelegramNotifier {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    chat_id: String,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
}

impl TelegramNotifier {
    pub fn new(api_key: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: TELEGRAM_API.to_string(),
            api_key: api_key.into(),
            chat_id: chat_id.into(),
        }
    }

    /// Point at a different API host (a local Bot API server, or a mock).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.base_url, self.api_key)
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) -> Result<(), MonitorError> {
        let body = SendMessage {
            chat_id: &self.chat_id,
            text,
            parse_mode: "HTML",
        };
        // The endpoint embeds the bot key; keep it out of errors and logs.
        let resp = self
            .http
            .post(self.endpoint())
            .json(&body)
            .send()
            .await
            .map_err(|e| MonitorError::Notify(e.without_url().to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(MonitorError::Notify(format!(
                "sendMessage returned {}: {detail}",
                status.as_u16()
            )));
        }

        tracing::debug!(chat_id = %self.chat_id, chars = text.len(), "notification sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn posts_html_message_to_chat() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/bot123:ABC/sendMessage")
                    .json_body(json!({
                        "chat_id": "-1001",
                        "text": "<b>gcDAI</b> <i>50.00%</i>",
                        "parse_mode": "HTML"
                    }));
                then.status(200).json_body(json!({"ok": true}));
            })
            .await;

        let notifier = TelegramNotifier::new("123:ABC", "-1001").with_base_url(server.base_url());
        notifier.send("<b>gcDAI</b> <i>50.00%</i>").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rejected_message_is_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(400)
                    .json_body(json!({"ok": false, "description": "Bad Request: chat not found"}));
            })
            .await;

        let notifier = TelegramNotifier::new("123:ABC", "-1").with_base_url(server.base_url());
        let err = notifier.send("hi").await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("400"));
        assert!(msg.contains("chat not found"));
        assert!(!msg.contains("123:ABC"));
    }
}
