use tracing::{debug, info, warn};

use super::registry::OverlayRegistry;
use crate::surface::{
    Control, DocumentSurface, JumpControl, MarkStyle, MuteControl, Position, SurfaceError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuteOutcome {
    /// `annotated` is false when the line already carried the marker or no longer exists.
    Muted { annotated: bool },
    AlreadyMuted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpOutcome {
    Navigated { highlighted: usize },
    Inert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOutcome {
    Mute(MuteOutcome),
    Jump(JumpOutcome),
}

pub fn activate_control(
    surface: &mut impl DocumentSurface,
    registry: &mut OverlayRegistry,
    control: &Control,
    suppression_marker: &str,
) -> Result<ControlOutcome, SurfaceError> {
    match control {
        Control::Mute(mute) => Ok(ControlOutcome::Mute(mute_overlay(
            surface,
            registry,
            mute,
            suppression_marker,
        ))),
        Control::Jump(jump) => jump_to_sources(surface, registry, jump).map(ControlOutcome::Jump),
    }
}

pub fn mute_overlay(
    surface: &mut impl DocumentSurface,
    registry: &mut OverlayRegistry,
    mute: &MuteControl,
    suppression_marker: &str,
) -> MuteOutcome {
    if !registry.forget_widget(mute.widget) {
        debug!(widget = mute.widget.0, "mute ignored; overlay already cleared");
        return MuteOutcome::AlreadyMuted;
    }
    registry.forget_marker(mute.marker);
    surface.clear_marker(mute.marker);
    surface.clear_widget(mute.widget);

    let annotated = match append_suppression(surface, mute, suppression_marker) {
        Ok(annotated) => annotated,
        Err(error) => {
            warn!(
                location = %mute.target,
                error = %error,
                "muted overlay but could not annotate its line"
            );
            false
        }
    };
    info!(location = %mute.target, annotated, "muted leakage overlay");
    MuteOutcome::Muted { annotated }
}

fn append_suppression(
    surface: &mut impl DocumentSurface,
    mute: &MuteControl,
    suppression_marker: &str,
) -> Result<bool, SurfaceError> {
    let text = surface.line_text(mute.target.cell, mute.target.line)?;
    if text.contains(suppression_marker) {
        return Ok(false);
    }

    let end = Position::new(mute.target.line, text.chars().count());
    let comment = if text.trim().is_empty() {
        suppression_marker.to_owned()
    } else {
        format!("  {suppression_marker}")
    };
    surface.replace_range(mute.target.cell, &comment, end, end)?;
    Ok(true)
}

/// Highlights from an earlier jump are replaced. Underlines and widgets are never touched.
pub fn jump_to_sources(
    surface: &mut impl DocumentSurface,
    registry: &mut OverlayRegistry,
    jump: &JumpControl,
) -> Result<JumpOutcome, SurfaceError> {
    let Some(first) = jump.sources.first().copied() else {
        return Ok(JumpOutcome::Inert);
    };
    let (_, line_end) = surface.full_line_span(first)?;

    surface.deselect_all();
    surface.activate_cell(first.cell)?;
    surface.set_cursor(first.cell, line_end)?;
    registry.clear_highlights(surface);

    let mut highlighted = 0;
    for source in &jump.sources {
        let (from, to) = match surface.full_line_span(*source) {
            Ok(span) => span,
            Err(error) => {
                warn!(source = %source, error = %error, "skipping jump source");
                continue;
            }
        };
        let id = registry.allocate_marker();
        surface.mark_range(id, source.cell, from, to, MarkStyle::Highlight)?;
        registry.register_highlight(id);
        highlighted += 1;
    }

    debug!(tag = %jump.tag, location = %first, highlighted, "jumped to tag sources");
    Ok(JumpOutcome::Navigated { highlighted })
}
