use serde::{Deserialize, Serialize};

/// One source line inside one cell of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Location {
    pub line: usize,
    pub cell: usize,
}

impl Location {
    pub fn new(cell: usize, line: usize) -> Self {
        Self { line, cell }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cell {} line {}", self.cell, self.line)
    }
}

/// A sub-classification of a finding, with the lines that justify it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    #[serde(default)]
    pub sources: Vec<Location>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub location: Location,
    pub label: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// Findings in render order. Overlapping locations are legal.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeakageReport {
    pub findings: Vec<Finding>,
}

impl LeakageReport {
    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }
}

impl From<Vec<Finding>> for LeakageReport {
    fn from(findings: Vec<Finding>) -> Self {
        Self { findings }
    }
}

/// Body of `POST /detect`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectRequest {
    pub name: String,
}

/// Envelope returned by `POST /detect`. `report` is only meaningful when `ok` is true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectResponse {
    pub ok: bool,
    #[serde(default)]
    pub report: Option<LeakageReport>,
    #[serde(default)]
    pub filename: Option<String>,
}
