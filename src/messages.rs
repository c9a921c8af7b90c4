use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Warning,
    Info,
}

impl Severity {
    pub fn glyph(self) -> &'static str {
        match self {
            Self::Warning => "⚠",
            Self::Info => "ℹ",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MessageEntry {
    pub message: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub jump_label: Option<String>,
}

impl MessageEntry {
    fn new(message: &str, severity: Severity, jump_label: Option<&str>) -> Self {
        Self {
            message: message.to_owned(),
            severity,
            jump_label: jump_label.map(str::to_owned),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MessageCatalogError {
    #[error("failed to read message overrides `{}`: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse message overrides `{}`: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MessageOverrides {
    #[serde(default)]
    labels: BTreeMap<String, MessageEntry>,
}

/// Human-readable text for finding labels and tag ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageCatalog {
    entries: BTreeMap<String, MessageEntry>,
}

impl Default for MessageCatalog {
    fn default() -> Self {
        let defaults = [
            ("train", MessageEntry::new("training data", Severity::Info, None)),
            ("test", MessageEntry::new("test data", Severity::Info, None)),
            (
                "validation",
                MessageEntry::new("validation data", Severity::Info, None),
            ),
            (
                "train-test",
                MessageEntry::new(
                    "evaluated against test data",
                    Severity::Info,
                    Some("highlight train/test sites"),
                ),
            ),
            (
                "test-train",
                MessageEntry::new(
                    "evaluates a model trained here",
                    Severity::Info,
                    Some("highlight train/test sites"),
                ),
            ),
            (
                "test_overlap",
                MessageEntry::new(
                    "overlap with training data",
                    Severity::Warning,
                    Some("potential leak src"),
                ),
            ),
            (
                "train_overlap",
                MessageEntry::new("overlap with all test data", Severity::Warning, None),
            ),
            (
                "preprocessing_leak",
                MessageEntry::new(
                    "potential preprocessing leakage",
                    Severity::Warning,
                    Some("show and go to first leak src"),
                ),
            ),
            (
                "test_multiuse",
                MessageEntry::new(
                    "used multiple times",
                    Severity::Warning,
                    Some("highlight other usage"),
                ),
            ),
            (
                "no_test",
                MessageEntry::new("no independent test data", Severity::Warning, None),
            ),
        ];

        Self {
            entries: defaults
                .into_iter()
                .map(|(id, entry)| (id.to_owned(), entry))
                .collect(),
        }
    }
}

impl MessageCatalog {
    /// Built-in table, with entries from `overrides_path` replacing or extending it.
    pub fn load(overrides_path: Option<&Path>) -> Result<Self, MessageCatalogError> {
        let mut catalog = Self::default();
        let Some(path) = overrides_path else {
            return Ok(catalog);
        };

        let raw = fs::read_to_string(path).map_err(|source| MessageCatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        catalog.apply_overrides_yaml(&raw).map_err(|source| {
            MessageCatalogError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })?;
        Ok(catalog)
    }

    fn apply_overrides_yaml(&mut self, raw: &str) -> Result<(), serde_yaml::Error> {
        let overrides = serde_yaml::from_str::<MessageOverrides>(raw)?;
        self.entries.extend(overrides.labels);
        Ok(())
    }

    pub fn entry(&self, id: &str) -> Option<&MessageEntry> {
        self.entries.get(id)
    }

    pub fn is_known(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Message for a label, or the label itself when it is not in the table.
    pub fn message<'a>(&'a self, id: &'a str) -> &'a str {
        self.entry(id)
            .map(|entry| entry.message.as_str())
            .unwrap_or(id)
    }

    pub fn severity(&self, id: &str) -> Severity {
        self.entry(id)
            .map(|entry| entry.severity)
            .unwrap_or_default()
    }

    /// Caption for a tag's jump button: the jump label, then the message, then the raw id.
    pub fn jump_caption<'a>(&'a self, id: &'a str) -> &'a str {
        match self.entry(id) {
            Some(entry) => entry.jump_label.as_deref().unwrap_or(&entry.message),
            None => id,
        }
    }
}
