use serde::Serialize;

use crate::messages::Severity;
use crate::report::Location;

pub mod memory;
pub mod text_view;

pub use self::memory::{MemoryNotebook, ViewHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MarkerId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct WidgetId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Position {
    pub line: usize,
    pub ch: usize,
}

impl Position {
    pub fn new(line: usize, ch: usize) -> Self {
        Self { line, ch }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkStyle {
    Underline,
    Highlight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetKind {
    Primary,
    Secondary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JumpControl {
    pub tag: String,
    pub caption: String,
    pub sources: Vec<Location>,
}

impl JumpControl {
    pub fn is_enabled(&self) -> bool {
        !self.sources.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MuteControl {
    pub marker: MarkerId,
    pub widget: WidgetId,
    pub target: Location,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "control", rename_all = "snake_case")]
pub enum Control {
    Jump(JumpControl),
    Mute(MuteControl),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineWidget {
    pub kind: WidgetKind,
    pub severity: Severity,
    pub glyph: &'static str,
    pub message: String,
    pub controls: Vec<Control>,
}

impl LineWidget {
    pub fn jump_controls(&self) -> impl Iterator<Item = &JumpControl> {
        self.controls.iter().filter_map(|control| match control {
            Control::Jump(jump) => Some(jump),
            Control::Mute(_) => None,
        })
    }

    pub fn mute_control(&self) -> Option<&MuteControl> {
        self.controls.iter().find_map(|control| match control {
            Control::Mute(mute) => Some(mute),
            Control::Jump(_) => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SurfaceError {
    #[error("cell {cell} does not exist (document has {cell_count} cells)")]
    CellOutOfRange { cell: usize, cell_count: usize },

    #[error("line {line} does not exist in cell {cell} ({line_count} lines)")]
    LineOutOfRange {
        cell: usize,
        line: usize,
        line_count: usize,
    },

    #[error("column {ch} is past the end of cell {cell} line {line} ({line_len} chars)")]
    ColumnOutOfRange {
        cell: usize,
        line: usize,
        ch: usize,
        line_len: usize,
    },

    #[error("range in cell {cell} ends before it starts")]
    InvertedRange { cell: usize },
}

pub trait DocumentSurface {
    fn has_active_view(&self) -> bool;

    fn cell_count(&self) -> usize;

    fn line_text(&self, cell: usize, line: usize) -> Result<String, SurfaceError>;

    /// The only call that edits document content. Everything else is cosmetic.
    fn replace_range(
        &mut self,
        cell: usize,
        text: &str,
        from: Position,
        to: Position,
    ) -> Result<(), SurfaceError>;

    fn mark_range(
        &mut self,
        id: MarkerId,
        cell: usize,
        from: Position,
        to: Position,
        style: MarkStyle,
    ) -> Result<(), SurfaceError>;

    fn add_line_widget(
        &mut self,
        id: WidgetId,
        anchor: Location,
        widget: LineWidget,
    ) -> Result<(), SurfaceError>;

    fn clear_marker(&mut self, id: MarkerId) -> bool;

    fn clear_widget(&mut self, id: WidgetId) -> bool;

    fn deselect_all(&mut self);

    fn activate_cell(&mut self, cell: usize) -> Result<(), SurfaceError>;

    fn set_cursor(&mut self, cell: usize, position: Position) -> Result<(), SurfaceError>;

    fn full_line_span(&self, location: Location) -> Result<(Position, Position), SurfaceError> {
        let text = self.line_text(location.cell, location.line)?;
        Ok((
            Position::new(location.line, 0),
            Position::new(location.line, text.chars().count()),
        ))
    }
}
