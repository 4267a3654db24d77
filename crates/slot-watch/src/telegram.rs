//! Telegram bot API used as the notification channel.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use slot_types::MessageHandle;

use crate::config::TelegramConfig;
use crate::error::WatchResult;
use crate::sources::NotificationSink;

#[derive(Debug, Clone)]
pub struct TelegramSink {
    http: reqwest::Client,
    api_base_url: String,
    token: String,
    chat_id: String,
}

#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    result: Option<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: Option<i64>,
}

impl TelegramSink {
    pub fn new(config: &TelegramConfig) -> WatchResult<Self> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            chat_id: config.chat_id.clone(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base_url, self.token, method)
    }
}

#[async_trait]
impl NotificationSink for TelegramSink {
    async fn create(&self, text: &str) -> WatchResult<Option<MessageHandle>> {
        let response: SendMessageResponse = self
            .http
            .post(self.method_url("sendMessage"))
            .json(&json!({
                "chat_id": self.chat_id,
                "text": text,
                "disable_notification": false,
            }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match response.result.and_then(|sent| sent.message_id) {
            Some(message_id) => Ok(Some(MessageHandle(message_id))),
            None => {
                tracing::warn!("expected 'result.message_id' in sendMessage response but was not there");
                Ok(None)
            }
        }
    }

    async fn delete(&self, handle: &MessageHandle) -> WatchResult<()> {
        self.http
            .post(self.method_url("deleteMessage"))
            .json(&json!({
                "chat_id": self.chat_id,
                "message_id": handle.0,
            }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
