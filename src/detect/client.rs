use std::time::Duration;

use serde::Serialize;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use super::{DetectError, LeakageDetector, parse_detect_response};
use crate::config::OverlaySettings;
use crate::report::{DetectRequest, DetectResponse};

const RETRY_BASE_DELAY_MS: u64 = 250;

#[derive(Debug, Clone)]
pub struct DetectClient {
    http_client: reqwest::Client,
    url: String,
    timeout_ms: u64,
    max_retries: u32,
}

impl DetectClient {
    pub fn new(settings: &OverlaySettings) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            url: settings.detect_url(),
            timeout_ms: settings.detect_timeout_ms,
            max_retries: settings.detect_max_retries,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn detect_with_retry(&self, name: &str) -> Result<DetectResponse, DetectError> {
        let request = DetectRequest {
            name: name.to_owned(),
        };
        let total_attempts = self.max_retries.saturating_add(1);
        let mut attempt: u32 = 1;

        loop {
            match self.detect_once(&request).await {
                Ok(response) => return Ok(response),
                Err(error) => {
                    let should_retry = attempt < total_attempts && error.is_retryable();
                    if !should_retry {
                        return Err(error);
                    }

                    let delay_ms = retry_delay_ms(attempt);
                    warn!(
                        attempt,
                        total_attempts,
                        delay_ms,
                        error = %error,
                        "detect request failed; retrying"
                    );

                    sleep(Duration::from_millis(delay_ms)).await;
                    attempt = attempt.saturating_add(1);
                }
            }
        }
    }

    async fn detect_once(&self, request: &DetectRequest) -> Result<DetectResponse, DetectError> {
        let timeout_duration = Duration::from_millis(self.timeout_ms);
        match timeout(timeout_duration, self.post_detect(request)).await {
            Ok(result) => result,
            Err(_) => Err(DetectError::Timeout {
                timeout_ms: self.timeout_ms,
            }),
        }
    }

    async fn post_detect(&self, request: &DetectRequest) -> Result<DetectResponse, DetectError> {
        debug!(url = %self.url, document = %request.name, "sending detect request");

        let response = self.post_json(&self.url, request).await?;
        let body = response.text().await?;
        parse_detect_response(&body)
    }

    async fn post_json<T: Serialize>(
        &self,
        url: &str,
        body: &T,
    ) -> Result<reqwest::Response, DetectError> {
        let response = self.http_client.post(url).json(body).send().await?;
        ensure_success(response).await
    }
}

impl LeakageDetector for DetectClient {
    async fn detect(&self, name: &str) -> Result<DetectResponse, DetectError> {
        self.detect_with_retry(name).await
    }
}

fn retry_delay_ms(attempt: u32) -> u64 {
    let exponent = attempt.saturating_sub(1).min(5);
    RETRY_BASE_DELAY_MS.saturating_mul(1_u64 << exponent)
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, DetectError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error response body>".to_owned());
    Err(DetectError::HttpStatus { status, body })
}
