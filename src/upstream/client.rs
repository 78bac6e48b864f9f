/*
 * src/upstream/client.rs
 *
 * File for the Upstream HTTP Client
 *
 * Purpose:
 *   Fetch raw bytes from a root server with a fixed user-agent and a
 *   configured timeout. No retries at this layer — a non-200 status
 *   surfaces as `UpstreamError` for the caller (the import orchestrator)
 *   to turn into an ImportProblem.
 */

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::global::UPSTREAM_USER_AGENT;

#[derive(Debug, Clone)]
pub struct UpstreamError {
    pub status: u16,
    pub url: String,
}

impl std::fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unexpected status {} from {}", self.status, self.url)
    }
}

impl std::error::Error for UpstreamError {}

#[derive(Clone)]
pub struct Client {
    inner: reqwest::Client,
}

impl Client {
    pub fn new(timeout: Duration) -> Self {
        let inner = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(UPSTREAM_USER_AGENT)
            .build()
            .expect("failed to build upstream HTTP client");
        Client { inner }
    }

    /// Fetches raw bytes from `url`. Fails with [`UpstreamError`] on any
    /// non-200 response; transport failures are reported with status 0.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, UpstreamError> {
        let resp = self
            .inner
            .get(url)
            .send()
            .await
            .map_err(|_| UpstreamError { status: 0, url: url.to_string() })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(UpstreamError { status: status.as_u16(), url: url.to_string() });
        }
        resp.bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|_| UpstreamError { status: 0, url: url.to_string() })
    }

    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, UpstreamError> {
        let bytes = self.fetch(url).await?;
        serde_json::from_slice(&bytes).map_err(|_| UpstreamError { status: 0, url: url.to_string() })
    }

    pub async fn fetch_text(&self, url: &str) -> Result<String, UpstreamError> {
        let bytes = self.fetch(url).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
