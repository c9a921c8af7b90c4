use std::sync::Mutex;

use reqwest::StatusCode;
use serde_json::Value;

use crate::detect::{DetectError, LeakageDetector, parse_detect_response};
use crate::report::DetectResponse;
use crate::surface::ViewHandle;

/// What a [`ScriptedDetector`] answers with.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Body(Value),
    Status(u16),
    Timeout,
    /// Never answers.
    Hang,
}

/// In-process stand-in for the analysis service.
#[derive(Debug)]
pub struct ScriptedDetector {
    reply: ScriptedReply,
    close_view_on_request: Option<ViewHandle>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedDetector {
    pub fn new(reply: ScriptedReply) -> Self {
        Self {
            reply,
            close_view_on_request: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn responding(body: Value) -> Self {
        Self::new(ScriptedReply::Body(body))
    }

    /// Simulates the user switching away while the request is in flight.
    pub fn closing_view(mut self, view: ViewHandle) -> Self {
        self.close_view_on_request = Some(view);
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

impl LeakageDetector for ScriptedDetector {
    async fn detect(&self, name: &str) -> Result<DetectResponse, DetectError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(name.to_owned());
        }
        tokio::task::yield_now().await;
        if let Some(view) = &self.close_view_on_request {
            view.close();
        }

        match &self.reply {
            ScriptedReply::Body(body) => parse_detect_response(&body.to_string()),
            ScriptedReply::Status(code) => Err(DetectError::HttpStatus {
                status: StatusCode::from_u16(*code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                body: "scripted failure".to_owned(),
            }),
            ScriptedReply::Timeout => Err(DetectError::Timeout { timeout_ms: 0 }),
            ScriptedReply::Hang => std::future::pending().await,
        }
    }
}
