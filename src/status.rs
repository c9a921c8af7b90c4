use std::fmt::{Display, Formatter};

use tracing::info;

pub const STATUS_SLOT_NAME: &str = "data-leakage-status";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusKind {
    Running,
    Finished { rendered: usize, skipped: usize },
    Declined,
    Error { message: String },
}

impl StatusKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Finished { .. } => "finished",
            Self::Declined => "declined",
            Self::Error { .. } => "error",
        }
    }
}

/// Display element published to the status surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusIndicator {
    pub kind: StatusKind,
    pub document: String,
}

impl StatusIndicator {
    pub fn new(kind: StatusKind, document: impl Into<String>) -> Self {
        Self {
            kind,
            document: document.into(),
        }
    }
}

impl Display for StatusIndicator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            StatusKind::Running => write!(f, "Leakage analysis running for {}", self.document),
            StatusKind::Finished { rendered, skipped } if *skipped > 0 => write!(
                f,
                "Leakage analysis finished for {}: {rendered} findings ({skipped} skipped)",
                self.document
            ),
            StatusKind::Finished { rendered, .. } => write!(
                f,
                "Leakage analysis finished for {}: {rendered} findings",
                self.document
            ),
            StatusKind::Declined => write!(
                f,
                "Leakage analysis declined for {}; no findings rendered",
                self.document
            ),
            StatusKind::Error { message } => write!(
                f,
                "Leakage analysis failed for {}: {message}",
                self.document
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IndicatorId(pub u64);

/// Host status bar: named registrations with an alignment hint.
pub trait StatusSurface {
    fn install(&mut self, name: &str, indicator: StatusIndicator, align: Alignment)
    -> IndicatorId;

    fn dispose(&mut self, id: IndicatorId);
}

/// Holds at most one published indicator; publishing disposes the previous one first.
#[derive(Debug)]
pub struct StatusSlot<S> {
    surface: S,
    name: String,
    align: Alignment,
    current: Option<IndicatorId>,
}

impl<S: StatusSurface> StatusSlot<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            name: STATUS_SLOT_NAME.to_owned(),
            align: Alignment::Left,
            current: None,
        }
    }

    pub fn publish(&mut self, indicator: StatusIndicator) {
        if let Some(previous) = self.current.take() {
            self.surface.dispose(previous);
        }
        info!(status = indicator.kind.as_str(), "{indicator}");
        self.current = Some(self.surface.install(&self.name, indicator, self.align));
    }

    pub fn clear(&mut self) {
        if let Some(previous) = self.current.take() {
            self.surface.dispose(previous);
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }
}

/// Status bar kept in memory, with the history of everything it showed.
#[derive(Debug, Default)]
pub struct MemoryStatusBar {
    installed: Vec<(IndicatorId, String, StatusIndicator)>,
    history: Vec<StatusIndicator>,
    next_id: u64,
}

impl MemoryStatusBar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visible(&self) -> Vec<&StatusIndicator> {
        self.installed
            .iter()
            .map(|(_, _, indicator)| indicator)
            .collect()
    }

    pub fn current(&self) -> Option<&StatusIndicator> {
        self.installed.last().map(|(_, _, indicator)| indicator)
    }

    pub fn history(&self) -> &[StatusIndicator] {
        &self.history
    }
}

impl StatusSurface for MemoryStatusBar {
    fn install(
        &mut self,
        name: &str,
        indicator: StatusIndicator,
        _align: Alignment,
    ) -> IndicatorId {
        self.next_id += 1;
        let id = IndicatorId(self.next_id);
        self.history.push(indicator.clone());
        self.installed.push((id, name.to_owned(), indicator));
        id
    }

    fn dispose(&mut self, id: IndicatorId) {
        self.installed.retain(|(installed, _, _)| *installed != id);
    }
}
