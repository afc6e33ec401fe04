use crate::types::{ContinuationRequest, ContinuationResponse};
use anyhow::{Context, Result};
use reqwest::Url;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

const DEFAULT_BASE_URL: &str = "http://localhost:8000";
const RETRY_BACKOFF: Duration = Duration::from_millis(400);

/// Anything that can extend a seed phrase into a full continuation. The
/// worker client is the production backend; tests substitute stubs.
#[allow(async_fn_in_trait)]
pub trait ContinuationBackend {
    async fn continue_sequence(&self, request: &ContinuationRequest)
        -> Result<ContinuationResponse>;
}

pub struct WorkerClient {
    http: reqwest::Client,
    base_url: Url,
    max_attempts: u32,
}

impl WorkerClient {
    pub fn new(base_url: Option<&str>, timeout: Duration, max_attempts: u32) -> Result<Self> {
        let url = base_url
            .map(Url::parse)
            .unwrap_or_else(|| Url::parse(DEFAULT_BASE_URL))
            .context("invalid worker base URL")?;
        let http = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { http, base_url: url, max_attempts: max_attempts.max(1) })
    }

    pub async fn health_check(&self) -> Result<()> {
        let url = self.base_url.join("health").context("failed to build health URL")?;
        let response = self.http.get(url).send().await.context("worker health request failed")?;
        if !response.status().is_success() {
            anyhow::bail!("worker responded with status {}", response.status());
        }
        Ok(())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn post_continuation(
        &self,
        request: &ContinuationRequest,
    ) -> Result<ContinuationResponse> {
        let url = self
            .base_url
            .join("v1/continuations")
            .context("failed to build continuation URL")?;
        let response = self
            .http
            .post(url)
            .json(request)
            .send()
            .await
            .context("continuation request failed")?;
        if !response.status().is_success() {
            anyhow::bail!("worker responded with status {}", response.status());
        }
        response.json().await.context("failed to decode continuation response")
    }
}

impl ContinuationBackend for WorkerClient {
    async fn continue_sequence(
        &self,
        request: &ContinuationRequest,
    ) -> Result<ContinuationResponse> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.post_continuation(request).await {
                Ok(response) => return Ok(response),
                Err(err) if attempt < self.max_attempts => {
                    warn!("continuation attempt {attempt} failed ({err}), retrying");
                    sleep(RETRY_BACKOFF.saturating_mul(attempt.min(5))).await;
                }
                Err(err) => {
                    return Err(err).with_context(|| {
                        format!("continuation failed after {attempt} attempt(s)")
                    });
                }
            }
        }
    }
}
