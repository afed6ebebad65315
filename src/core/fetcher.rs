use crate::core::retry::RetryPolicy;
use crate::domain::model::{FetchResult, ProfileUrl};
use crate::domain::ports::ProfileSource;
use crate::utils::error::Result;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://api.scrapin.io/enrichment/profile";

/// Client for the Scrapin.io profile enrichment endpoint.
pub struct ProfileFetcher {
    client: Client,
    endpoint: String,
    api_key: String,
    retry: RetryPolicy,
}

impl ProfileFetcher {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, endpoint, api_key, retry))
    }

    pub fn with_client(
        client: Client,
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            retry,
        }
    }

    async fn request(&self, linkedin_url: &str) -> Result<FetchResult> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("apikey", self.api_key.as_str()), ("linkedinUrl", linkedin_url)])
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.bytes().await?;

        // 非 JSON 回應只保留狀態碼
        let payload = match serde_json::from_slice(&body) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!("Response for {} is not JSON ({}): {}", linkedin_url, status, e);
                None
            }
        };

        Ok(FetchResult::new(payload, Some(status)))
    }
}

#[async_trait]
impl ProfileSource for ProfileFetcher {
    async fn fetch_profile(&self, url: &ProfileUrl) -> FetchResult {
        let linkedin_url = url.normalized();
        tracing::debug!("📡 Fetching profile: {}", linkedin_url);

        let operation = format!("fetch {}", linkedin_url);
        match self
            .retry
            .run(&operation, || self.request(&linkedin_url))
            .await
        {
            Ok(result) => {
                tracing::debug!("📡 {} -> {:?}", linkedin_url, result.status);
                result
            }
            Err(e) => {
                tracing::error!("Error fetching data for URL {}: {}", linkedin_url, e);
                FetchResult::failed()
            }
        }
    }
}
