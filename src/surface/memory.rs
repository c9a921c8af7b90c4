use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use super::{
    DocumentSurface, LineWidget, MarkStyle, MarkerId, Position, SurfaceError, WidgetId,
};
use crate::report::Location;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkerRecord {
    pub id: MarkerId,
    pub cell: usize,
    pub from: Position,
    pub to: Position,
    pub style: MarkStyle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WidgetRecord {
    pub id: WidgetId,
    pub anchor: Location,
    pub widget: LineWidget,
}

/// Overlays currently on a [`MemoryNotebook`], in creation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverlaySnapshot {
    pub markers: Vec<MarkerRecord>,
    pub widgets: Vec<WidgetRecord>,
}

/// Host-side switch for whether a document is still on screen.
#[derive(Debug, Clone)]
pub struct ViewHandle {
    active: Arc<AtomicBool>,
}

impl ViewHandle {
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn close(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    pub fn reopen(&self) {
        self.active.store(true, Ordering::SeqCst);
    }
}

#[derive(Debug, Deserialize)]
struct IpynbDocument {
    cells: Vec<IpynbCell>,
}

#[derive(Debug, Deserialize)]
struct IpynbCell {
    #[serde(default)]
    source: IpynbSource,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IpynbSource {
    Text(String),
    Lines(Vec<String>),
}

impl Default for IpynbSource {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl IpynbSource {
    fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Lines(lines) => lines.concat(),
        }
    }
}

/// In-memory notebook: an ordered list of line buffers with markers, widgets and a cursor.
#[derive(Debug, Clone)]
pub struct MemoryNotebook {
    cells: Vec<Vec<String>>,
    markers: BTreeMap<MarkerId, MarkerRecord>,
    widgets: BTreeMap<WidgetId, WidgetRecord>,
    active_cell: Option<usize>,
    cursor: Option<(usize, Position)>,
    selection: Option<(usize, Position, Position)>,
    view: ViewHandle,
}

impl MemoryNotebook {
    pub fn from_cells<I, S>(cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            cells: cells
                .into_iter()
                .map(|source| split_lines(source.as_ref()))
                .collect(),
            markers: BTreeMap::new(),
            widgets: BTreeMap::new(),
            active_cell: None,
            cursor: None,
            selection: None,
            view: ViewHandle {
                active: Arc::new(AtomicBool::new(true)),
            },
        }
    }

    /// Single-cell document holding a whole script.
    pub fn from_script(source: &str) -> Self {
        Self::from_cells([source])
    }

    /// Every cell of an `.ipynb` document, markdown included, in notebook order.
    pub fn from_ipynb(raw: &str) -> Result<Self, serde_json::Error> {
        let document = serde_json::from_str::<IpynbDocument>(raw)?;
        Ok(Self::from_cells(
            document
                .cells
                .into_iter()
                .map(|cell| cell.source.into_text()),
        ))
    }

    pub fn view_handle(&self) -> ViewHandle {
        self.view.clone()
    }

    pub fn cell_lines(&self, cell: usize) -> Option<&[String]> {
        self.cells.get(cell).map(Vec::as_slice)
    }

    pub fn markers(&self) -> impl Iterator<Item = &MarkerRecord> {
        self.markers.values()
    }

    pub fn widgets(&self) -> impl Iterator<Item = &WidgetRecord> {
        self.widgets.values()
    }

    pub fn markers_with_style(&self, style: MarkStyle) -> Vec<&MarkerRecord> {
        self.markers
            .values()
            .filter(|marker| marker.style == style)
            .collect()
    }

    pub fn widget(&self, id: WidgetId) -> Option<&WidgetRecord> {
        self.widgets.get(&id)
    }

    pub fn widgets_at(&self, anchor: Location) -> Vec<&WidgetRecord> {
        self.widgets
            .values()
            .filter(|record| record.anchor == anchor)
            .collect()
    }

    pub fn active_cell(&self) -> Option<usize> {
        self.active_cell
    }

    pub fn cursor(&self) -> Option<(usize, Position)> {
        self.cursor
    }

    pub fn selection(&self) -> Option<(usize, Position, Position)> {
        self.selection
    }

    pub fn select(&mut self, cell: usize, from: Position, to: Position) {
        self.selection = Some((cell, from, to));
    }

    pub fn snapshot(&self) -> OverlaySnapshot {
        OverlaySnapshot {
            markers: self.markers.values().cloned().collect(),
            widgets: self.widgets.values().cloned().collect(),
        }
    }

    fn lines(&self, cell: usize) -> Result<&Vec<String>, SurfaceError> {
        self.cells.get(cell).ok_or(SurfaceError::CellOutOfRange {
            cell,
            cell_count: self.cells.len(),
        })
    }

    fn check_position(&self, cell: usize, position: Position) -> Result<(), SurfaceError> {
        let lines = self.lines(cell)?;
        let text = lines.get(position.line).ok_or(SurfaceError::LineOutOfRange {
            cell,
            line: position.line,
            line_count: lines.len(),
        })?;
        let line_len = text.chars().count();
        if position.ch > line_len {
            return Err(SurfaceError::ColumnOutOfRange {
                cell,
                line: position.line,
                ch: position.ch,
                line_len,
            });
        }
        Ok(())
    }

    fn check_range(&self, cell: usize, from: Position, to: Position) -> Result<(), SurfaceError> {
        self.check_position(cell, from)?;
        self.check_position(cell, to)?;
        if to < from {
            return Err(SurfaceError::InvertedRange { cell });
        }
        Ok(())
    }
}

impl DocumentSurface for MemoryNotebook {
    fn has_active_view(&self) -> bool {
        self.view.is_active()
    }

    fn cell_count(&self) -> usize {
        self.cells.len()
    }

    fn line_text(&self, cell: usize, line: usize) -> Result<String, SurfaceError> {
        let lines = self.lines(cell)?;
        lines
            .get(line)
            .cloned()
            .ok_or(SurfaceError::LineOutOfRange {
                cell,
                line,
                line_count: lines.len(),
            })
    }

    fn replace_range(
        &mut self,
        cell: usize,
        text: &str,
        from: Position,
        to: Position,
    ) -> Result<(), SurfaceError> {
        self.check_range(cell, from, to)?;
        let buffer = &mut self.cells[cell];
        let head = buffer[from.line].chars().take(from.ch).collect::<String>();
        let tail = buffer[to.line].chars().skip(to.ch).collect::<String>();
        let replaced = format!("{head}{text}{tail}");
        let new_lines = replaced.split('\n').map(str::to_owned).collect::<Vec<_>>();
        buffer.splice(from.line..=to.line, new_lines);
        Ok(())
    }

    fn mark_range(
        &mut self,
        id: MarkerId,
        cell: usize,
        from: Position,
        to: Position,
        style: MarkStyle,
    ) -> Result<(), SurfaceError> {
        self.check_range(cell, from, to)?;
        self.markers.insert(
            id,
            MarkerRecord {
                id,
                cell,
                from,
                to,
                style,
            },
        );
        Ok(())
    }

    fn add_line_widget(
        &mut self,
        id: WidgetId,
        anchor: Location,
        widget: LineWidget,
    ) -> Result<(), SurfaceError> {
        self.check_position(anchor.cell, Position::new(anchor.line, 0))?;
        self.widgets.insert(id, WidgetRecord { id, anchor, widget });
        Ok(())
    }

    fn clear_marker(&mut self, id: MarkerId) -> bool {
        self.markers.remove(&id).is_some()
    }

    fn clear_widget(&mut self, id: WidgetId) -> bool {
        self.widgets.remove(&id).is_some()
    }

    fn deselect_all(&mut self) {
        self.selection = None;
    }

    fn activate_cell(&mut self, cell: usize) -> Result<(), SurfaceError> {
        self.lines(cell)?;
        self.active_cell = Some(cell);
        Ok(())
    }

    fn set_cursor(&mut self, cell: usize, position: Position) -> Result<(), SurfaceError> {
        self.check_position(cell, position)?;
        self.cursor = Some((cell, position));
        Ok(())
    }
}

fn split_lines(source: &str) -> Vec<String> {
    let source = source.strip_suffix('\n').unwrap_or(source);
    source.split('\n').map(str::to_owned).collect()
}
