use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const TELEGRAM_BASE: &str = "https://api.telegram.org";

const HTTP_TIMEOUT: Duration = Duration::from_secs(20);

/// Inbound Bot API update, reduced to the fields the dispatcher reads.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    #[serde(default)]
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// Outbound reply capability, kept behind a trait so tests can record sends.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()>;
    async fn send_photo(&self, chat_id: i64, photo_url: &str, caption: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct TelegramClient {
    client: Client,
    token: String,
}

impl TelegramClient {
    pub fn new(token: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("Failed to build Telegram HTTP client")?;
        Ok(Self { client, token })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{TELEGRAM_BASE}/bot{}/{}", self.token, method)
    }

    async fn call(&self, method: &str, body: serde_json::Value) -> Result<()> {
        let res = self
            .client
            .post(self.method_url(method))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("{} request failed", method))?;
        let status = res.status();
        let text = res.text().await.context("reading body failed")?;
        if !status.is_success() {
            return Err(anyhow!("{} -> {} {}", method, status, text));
        }
        Ok(())
    }

    /// Register the webhook with Telegram. Called once at startup when a
    /// public base URL is configured.
    pub async fn set_webhook(&self, url: &str) -> Result<()> {
        self.call("setWebhook", json!({ "url": url })).await
    }

    pub async fn delete_webhook(&self) -> Result<()> {
        self.call("deleteWebhook", json!({ "drop_pending_updates": false }))
            .await
    }
}

#[async_trait]
impl ReplySink for TelegramClient {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()> {
        self.call("sendMessage", json!({ "chat_id": chat_id, "text": text }))
            .await
    }

    async fn send_photo(&self, chat_id: i64, photo_url: &str, caption: &str) -> Result<()> {
        self.call(
            "sendPhoto",
            json!({ "chat_id": chat_id, "photo": photo_url, "caption": caption }),
        )
        .await
    }
}
