//! Boundary to the external leakage analysis service.

use std::future::Future;

use reqwest::StatusCode;

use crate::report::DetectResponse;

pub mod client;

pub use self::client::DetectClient;

#[derive(Debug, thiserror::Error)]
pub enum DetectError {
    #[error("detect request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("analysis service returned HTTP {status}: {body}")]
    HttpStatus { status: StatusCode, body: String },

    #[error("invalid leakage report: {0}")]
    InvalidReport(String),
}

impl DetectError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Transport(error) => {
                error.is_timeout() || error.is_connect() || error.is_request()
            }
            Self::HttpStatus { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            Self::InvalidReport(_) => false,
        }
    }
}

/// Anything that can produce a `/detect` response for a document path.
pub trait LeakageDetector {
    fn detect(&self, name: &str) -> impl Future<Output = Result<DetectResponse, DetectError>>;
}

/// Parses a `/detect` body. A successful response must carry a report; a malformed one is
/// rejected whole rather than partially rendered.
pub fn parse_detect_response(body: &str) -> Result<DetectResponse, DetectError> {
    let response = serde_json::from_str::<DetectResponse>(body)
        .map_err(|error| DetectError::InvalidReport(error.to_string()))?;
    if response.ok && response.report.is_none() {
        return Err(DetectError::InvalidReport(
            "response has ok=true but no report".to_owned(),
        ));
    }
    Ok(response)
}
