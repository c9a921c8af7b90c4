use std::fmt::Write as _;

use super::memory::{MarkerRecord, MemoryNotebook};
use super::{Control, LineWidget, MarkStyle};
use crate::report::Location;

/// Plain-text rendering of a notebook and the overlays on it.
///
/// Underlines are drawn as `^` and highlights as `~` under the marked columns. Widgets
/// follow their anchor line, in creation order.
pub fn render_text(notebook: &MemoryNotebook) -> String {
    let mut output = String::new();
    let mut cell = 0;
    while let Some(lines) = notebook.cell_lines(cell) {
        let _ = writeln!(output, "── cell {cell} ──");
        let gutter = lines.len().saturating_sub(1).to_string().len();
        for (line_index, text) in lines.iter().enumerate() {
            let _ = writeln!(output, "{line_index:>gutter$} │ {text}");

            let markers = notebook
                .markers()
                .filter(|marker| marker.cell == cell && marker.from.line == line_index)
                .collect::<Vec<_>>();
            for style in [MarkStyle::Underline, MarkStyle::Highlight] {
                if let Some(row) = marker_row(&markers, style) {
                    let _ = writeln!(output, "{:>gutter$} │ {row}", "");
                }
            }

            for record in notebook.widgets_at(Location::new(cell, line_index)) {
                let _ = writeln!(output, "{:>gutter$} │ {}", "", widget_row(&record.widget));
            }
        }
        cell += 1;
    }
    output
}

fn marker_row(markers: &[&MarkerRecord], style: MarkStyle) -> Option<String> {
    let glyph = match style {
        MarkStyle::Underline => '^',
        MarkStyle::Highlight => '~',
    };
    let spans = markers
        .iter()
        .filter(|marker| marker.style == style)
        .map(|marker| {
            let end = if marker.to.line == marker.from.line {
                marker.to.ch
            } else {
                usize::MAX
            };
            (marker.from.ch, end)
        })
        .collect::<Vec<_>>();
    if spans.is_empty() {
        return None;
    }

    let width = spans
        .iter()
        .map(|(start, end)| if *end == usize::MAX { *start + 1 } else { *end })
        .max()
        .unwrap_or(0)
        .max(1);
    let row = (0..width)
        .map(|column| {
            let covered = spans
                .iter()
                .any(|(start, end)| column >= *start && column < *end);
            if covered { glyph } else { ' ' }
        })
        .collect::<String>();
    let row = row.trim_end();
    // Empty lines still get a visible mark.
    if row.is_empty() {
        Some(glyph.to_string())
    } else {
        Some(row.to_owned())
    }
}

fn widget_row(widget: &LineWidget) -> String {
    let mut row = format!("{} {}", widget.glyph, widget.message);
    for control in &widget.controls {
        match control {
            Control::Jump(jump) if jump.is_enabled() => {
                let _ = write!(row, "  [jump: {}]", jump.caption);
            }
            Control::Jump(jump) => {
                let _ = write!(row, "  [jump: {} (no sources)]", jump.caption);
            }
            Control::Mute(_) => row.push_str("  [mute]"),
        }
    }
    row
}
