use tracing::debug;

use crate::surface::{DocumentSurface, MarkerId, WidgetId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MuteAllSummary {
    pub underlines: usize,
    pub highlights: usize,
    pub widgets: usize,
}

impl MuteAllSummary {
    pub fn total(&self) -> usize {
        self.underlines + self.highlights + self.widgets
    }
}

// `mute_all` and a render pass must not interleave on the same document.
#[derive(Debug, Default)]
pub struct OverlayRegistry {
    underlines: Vec<MarkerId>,
    highlights: Vec<MarkerId>,
    widgets: Vec<WidgetId>,
    next_id: u64,
}

impl OverlayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate_marker(&mut self) -> MarkerId {
        MarkerId(self.bump())
    }

    pub fn allocate_widget(&mut self) -> WidgetId {
        WidgetId(self.bump())
    }

    fn bump(&mut self) -> u64 {
        self.next_id = self.next_id.saturating_add(1);
        self.next_id
    }

    pub fn register_underline(&mut self, id: MarkerId) {
        self.underlines.push(id);
    }

    pub fn register_highlight(&mut self, id: MarkerId) {
        self.highlights.push(id);
    }

    pub fn register_widget(&mut self, id: WidgetId) {
        self.widgets.push(id);
    }

    pub fn forget_marker(&mut self, id: MarkerId) -> bool {
        remove_id(&mut self.underlines, id) || remove_id(&mut self.highlights, id)
    }

    pub fn forget_widget(&mut self, id: WidgetId) -> bool {
        remove_id(&mut self.widgets, id)
    }

    pub fn contains_widget(&self, id: WidgetId) -> bool {
        self.widgets.contains(&id)
    }

    pub fn contains_marker(&self, id: MarkerId) -> bool {
        self.underlines.contains(&id) || self.highlights.contains(&id)
    }

    pub fn underlines(&self) -> &[MarkerId] {
        &self.underlines
    }

    pub fn highlights(&self) -> &[MarkerId] {
        &self.highlights
    }

    pub fn widgets(&self) -> &[WidgetId] {
        &self.widgets
    }

    pub fn is_empty(&self) -> bool {
        self.underlines.is_empty() && self.highlights.is_empty() && self.widgets.is_empty()
    }

    pub fn clear_highlights(&mut self, surface: &mut impl DocumentSurface) -> usize {
        let cleared = self.highlights.len();
        for id in self.highlights.drain(..) {
            surface.clear_marker(id);
        }
        cleared
    }

    pub fn mute_all(&mut self, surface: &mut impl DocumentSurface) -> MuteAllSummary {
        let summary = MuteAllSummary {
            underlines: self.underlines.len(),
            highlights: self.highlights.len(),
            widgets: self.widgets.len(),
        };

        for id in self.underlines.drain(..).chain(self.highlights.drain(..)) {
            surface.clear_marker(id);
        }
        for id in self.widgets.drain(..) {
            surface.clear_widget(id);
        }

        if summary.total() > 0 {
            debug!(
                underlines = summary.underlines,
                highlights = summary.highlights,
                widgets = summary.widgets,
                "cleared overlays"
            );
        }
        summary
    }
}

fn remove_id<T: PartialEq + Copy>(ids: &mut Vec<T>, id: T) -> bool {
    match ids.iter().position(|candidate| *candidate == id) {
        Some(index) => {
            ids.swap_remove(index);
            true
        }
        None => false,
    }
}
