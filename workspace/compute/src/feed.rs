//! Client side of the external transaction feed.

use std::time::Duration;

use async_trait::async_trait;
use common::FeedPage;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ComputeError, Result};

/// Source of incremental transaction pages for one linked item.
///
/// Credentials travel with every call; implementations hold no per-item state.
#[async_trait]
pub trait TransactionFeed: Send + Sync + std::fmt::Debug {
    /// Fetches the page following `cursor`. `None` starts from the beginning of history.
    async fn sync_page(&self, access_token: &str, cursor: Option<&str>) -> Result<FeedPage>;
}

/// Connection settings for [`HttpTransactionFeed`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedSettings {
    pub base_url: String,
    pub client_id: String,
    pub secret: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// Records requested per page.
    pub page_size: u32,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            base_url: "https://sandbox.plaid.com".to_string(),
            client_id: String::new(),
            secret: String::new(),
            timeout_secs: 30,
            max_retries: 3,
            page_size: 500,
        }
    }
}

#[derive(Debug, Serialize)]
struct SyncRequest<'a> {
    client_id: &'a str,
    secret: &'a str,
    access_token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    cursor: Option<&'a str>,
    count: u32,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    error_code: Option<String>,
    error_message: Option<String>,
}

/// `POST {base_url}/transactions/sync` over HTTPS with JSON bodies.
#[derive(Debug, Clone)]
pub struct HttpTransactionFeed {
    client: Client,
    settings: FeedSettings,
}

impl HttpTransactionFeed {
    pub fn new(settings: FeedSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| ComputeError::Feed(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client, settings })
    }

    async fn provider_error(response: reqwest::Response) -> ComputeError {
        let status = response.status();
        match response.json::<ProviderError>().await {
            Ok(ProviderError {
                error_code,
                error_message,
            }) => ComputeError::Feed(format!(
                "Feed returned {status}: {} {}",
                error_code.unwrap_or_default(),
                error_message.unwrap_or_default()
            )),
            Err(_) => ComputeError::Feed(format!("Feed returned {status}")),
        }
    }
}

#[async_trait]
impl TransactionFeed for HttpTransactionFeed {
    async fn sync_page(&self, access_token: &str, cursor: Option<&str>) -> Result<FeedPage> {
        let url = format!("{}/transactions/sync", self.settings.base_url.trim_end_matches('/'));
        let body = SyncRequest {
            client_id: &self.settings.client_id,
            secret: &self.settings.secret,
            access_token,
            cursor,
            count: self.settings.page_size,
        };
        debug!(%url, has_cursor = cursor.is_some(), "Requesting feed page");

        let mut attempts = 0;
        loop {
            match self.client.post(&url).json(&body).send().await {
                Ok(response) if response.status().is_success() => {
                    let page = response.json::<FeedPage>().await?;
                    info!(
                        added = page.added.len(),
                        modified = page.modified.len(),
                        removed = page.removed.len(),
                        has_more = page.has_more,
                        "Feed page received"
                    );
                    return Ok(page);
                }
                // Client errors will not improve with a retry
                Ok(response) if response.status().is_client_error() => {
                    return Err(Self::provider_error(response).await);
                }
                Ok(response) if attempts >= self.settings.max_retries => {
                    return Err(Self::provider_error(response).await);
                }
                Err(e) if attempts >= self.settings.max_retries => {
                    return Err(ComputeError::Feed(format!("Failed to reach feed: {e}")));
                }
                Ok(_) | Err(_) => {
                    attempts += 1;
                    let delay = Duration::from_secs(2_u64.pow(attempts));
                    warn!(attempt = attempts, max = self.settings.max_retries, ?delay, "Feed request failed, retrying");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_request_omits_missing_cursor() {
        let body = SyncRequest {
            client_id: "id",
            secret: "s",
            access_token: "token",
            cursor: None,
            count: 100,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("cursor").is_none());
        assert_eq!(json["count"], 100);
    }

    #[tokio::test]
    async fn unreachable_feed_reports_feed_error() {
        let feed = HttpTransactionFeed::new(FeedSettings {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 1,
            max_retries: 0,
            ..Default::default()
        })
        .unwrap();

        let result = feed.sync_page("token", None).await;
        assert!(matches!(result, Err(ComputeError::Feed(_))));
    }
}
