// src/notify/mod.rs — Low-balance notification side channel
//
// Fire-and-forget: the ledger spawns these on a background task, so a slow
// or failing notifier can never block or fail the operation that tripped
// the threshold.

use async_trait::async_trait;
use serde::Serialize;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn low_balance(&self, account_id: &str, balance: i64);
}

/// Default notifier: records the event in the log stream.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn low_balance(&self, account_id: &str, balance: i64) {
        tracing::warn!(account_id, balance, "Account credit is running low");
    }
}

/// JSON payload sent to the webhook URL.
#[derive(Debug, Serialize)]
struct LowBalancePayload<'a> {
    event: &'static str,
    account_id: &'a str,
    balance: i64,
    timestamp: String,
}

/// POSTs a JSON payload to a configured URL on each low-balance event.
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        Self {
            url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn low_balance(&self, account_id: &str, balance: i64) {
        let payload = LowBalancePayload {
            event: "credits.low",
            account_id,
            balance,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        let result = self
            .client
            .post(&self.url)
            .header("content-type", "application/json")
            .header(
                "user-agent",
                format!("surveyor/{}", env!("CARGO_PKG_VERSION")),
            )
            .json(&payload)
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await;

        match result {
            Ok(resp) if !resp.status().is_success() => {
                tracing::warn!(
                    "Low-balance webhook returned HTTP {}",
                    resp.status().as_u16()
                );
            }
            Ok(_) => {
                tracing::debug!("Low-balance webhook delivered to {}", self.url);
            }
            Err(e) => {
                tracing::warn!("Low-balance webhook delivery to {} failed: {}", self.url, e);
            }
        }
    }
}
