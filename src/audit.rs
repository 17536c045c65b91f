use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

const HTTP_TIMEOUT: Duration = Duration::from_secs(20);

/// Best-effort record of each processed query. Callers fire and forget;
/// a failed write must never touch the reply path.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record_search(&self, user_id: i64, query: &str) -> Result<()>;
}

/// Audit sink over a document-store HTTP insert endpoint: one POSTed
/// document per query.
#[derive(Debug, Clone)]
pub struct HttpAuditSink {
    client: Client,
    url: String,
}

impl HttpAuditSink {
    pub fn new(url: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("Failed to build audit HTTP client")?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl AuditSink for HttpAuditSink {
    async fn record_search(&self, user_id: i64, query: &str) -> Result<()> {
        let doc = json!({
            "user_id": user_id,
            "q": query,
            "at": Utc::now().to_rfc3339(),
        });
        let res = self
            .client
            .post(&self.url)
            .json(&doc)
            .send()
            .await
            .context("audit insert request failed")?;
        let status = res.status();
        if !status.is_success() {
            return Err(anyhow!("audit insert -> {}", status));
        }
        Ok(())
    }
}
