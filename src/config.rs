use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result, ensure};

pub const DEFAULT_DETECT_BASE_URL: &str = "http://localhost:8888/data-leakage-detection";
pub const DEFAULT_DETECT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_DETECT_MAX_RETRIES: u32 = 0;
pub const DEFAULT_SUPPRESSION_MARKER: &str = "# leakage: ignore";
pub const DEFAULT_FILE_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlaySettings {
    pub detect_base_url: String,
    pub detect_timeout_ms: u64,
    pub detect_max_retries: u32,
    pub messages_file: Option<PathBuf>,
    pub suppression_marker: String,
    pub log_dir: Option<PathBuf>,
    pub file_log_filter: String,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            detect_base_url: DEFAULT_DETECT_BASE_URL.to_owned(),
            detect_timeout_ms: DEFAULT_DETECT_TIMEOUT_MS,
            detect_max_retries: DEFAULT_DETECT_MAX_RETRIES,
            messages_file: None,
            suppression_marker: DEFAULT_SUPPRESSION_MARKER.to_owned(),
            log_dir: None,
            file_log_filter: DEFAULT_FILE_LOG_FILTER.to_owned(),
        }
    }
}

impl OverlaySettings {
    pub fn from_env() -> Result<Self> {
        // Load .env if present, but do not fail if file does not exist.
        let _ = dotenvy::dotenv();

        let detect_base_url = env::var("DETECT_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_DETECT_BASE_URL.to_owned());
        ensure!(
            !detect_base_url.trim().is_empty(),
            "DETECT_BASE_URL cannot be empty"
        );

        let detect_timeout_ms = parse_u64_env("DETECT_TIMEOUT_MS", DEFAULT_DETECT_TIMEOUT_MS)?;
        ensure!(
            detect_timeout_ms > 0,
            "DETECT_TIMEOUT_MS must be greater than 0"
        );

        let detect_max_retries =
            parse_u32_env("DETECT_MAX_RETRIES", DEFAULT_DETECT_MAX_RETRIES)?;

        let suppression_marker = env::var("LEAKAGE_SUPPRESSION_MARKER")
            .unwrap_or_else(|_| DEFAULT_SUPPRESSION_MARKER.to_owned());
        ensure!(
            !suppression_marker.trim().is_empty(),
            "LEAKAGE_SUPPRESSION_MARKER cannot be empty"
        );

        Ok(Self {
            detect_base_url,
            detect_timeout_ms,
            detect_max_retries,
            messages_file: read_optional_env("LEAKAGE_MESSAGES_FILE").map(PathBuf::from),
            suppression_marker: suppression_marker.trim().to_owned(),
            log_dir: read_optional_env("LEAKAGE_LOG_DIR").map(PathBuf::from),
            file_log_filter: read_optional_env("LEAKAGE_FILE_LOG")
                .unwrap_or_else(|| DEFAULT_FILE_LOG_FILTER.to_owned()),
        })
    }

    pub fn detect_url(&self) -> String {
        format!("{}/detect", self.detect_base_url.trim_end_matches('/'))
    }
}

fn read_optional_env(name: &str) -> Option<String> {
    env::var(name).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_owned())
        }
    })
}

fn parse_u32_env(name: &str, default: u32) -> Result<u32> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u32>()
            .with_context(|| format!("failed to parse {name} as u32")),
        Err(_) => Ok(default),
    }
}

fn parse_u64_env(name: &str, default: u64) -> Result<u64> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .with_context(|| format!("failed to parse {name} as u64")),
        Err(_) => Ok(default),
    }
}
