use tracing::{debug, warn};

use super::registry::OverlayRegistry;
use crate::messages::MessageCatalog;
use crate::report::{Finding, LeakageReport, Location};
use crate::surface::{
    Control, DocumentSurface, JumpControl, LineWidget, MarkStyle, MuteControl, Position,
    SurfaceError, WidgetKind,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFinding {
    pub index: usize,
    pub location: Location,
    pub error: SurfaceError,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RenderSummary {
    pub rendered: usize,
    pub skipped: Vec<SkippedFinding>,
    pub no_active_view: bool,
}

#[derive(Debug)]
struct LinePlan {
    location: Location,
    from: Position,
    to: Position,
}

#[derive(Debug)]
struct SecondaryPlan<'a> {
    tag_id: &'a str,
    line: LinePlan,
}

// Resolved before anything is drawn, so a finding is never half-rendered.
#[derive(Debug)]
struct FindingPlan<'a> {
    primary: LinePlan,
    secondaries: Vec<SecondaryPlan<'a>>,
}

pub struct AnnotationRenderer<'a> {
    catalog: &'a MessageCatalog,
}

impl<'a> AnnotationRenderer<'a> {
    pub fn new(catalog: &'a MessageCatalog) -> Self {
        Self { catalog }
    }

    pub fn render(
        &self,
        surface: &mut impl DocumentSurface,
        registry: &mut OverlayRegistry,
        report: &LeakageReport,
    ) -> RenderSummary {
        let mut summary = RenderSummary::default();
        if !surface.has_active_view() {
            debug!(findings = report.len(), "document has no active view; skipping render");
            summary.no_active_view = true;
            return summary;
        }

        for (index, finding) in report.findings.iter().enumerate() {
            let outcome = self
                .plan_finding(&*surface, finding)
                .and_then(|plan| self.apply_plan(surface, registry, finding, plan));
            match outcome {
                Ok(()) => summary.rendered += 1,
                Err(error) => {
                    warn!(
                        index,
                        label = %finding.label,
                        location = %finding.location,
                        error = %error,
                        "skipping finding that does not fit the document"
                    );
                    summary.skipped.push(SkippedFinding {
                        index,
                        location: finding.location,
                        error,
                    });
                }
            }
        }

        debug!(
            rendered = summary.rendered,
            skipped = summary.skipped.len(),
            "rendered leakage report"
        );
        summary
    }

    fn plan_finding<'f>(
        &self,
        surface: &impl DocumentSurface,
        finding: &'f Finding,
    ) -> Result<FindingPlan<'f>, SurfaceError> {
        let primary = plan_line(surface, finding.location)?;
        let mut secondaries = Vec::new();
        for tag in finding
            .tags
            .iter()
            .filter(|tag| self.catalog.is_known(&tag.id))
        {
            for source in &tag.sources {
                secondaries.push(SecondaryPlan {
                    tag_id: &tag.id,
                    line: plan_line(surface, *source)?,
                });
            }
        }
        Ok(FindingPlan {
            primary,
            secondaries,
        })
    }

    fn apply_plan(
        &self,
        surface: &mut impl DocumentSurface,
        registry: &mut OverlayRegistry,
        finding: &Finding,
        plan: FindingPlan<'_>,
    ) -> Result<(), SurfaceError> {
        let primary_marker = underline(surface, registry, &plan.primary)?;
        let primary_widget_id = registry.allocate_widget();

        let mut controls = finding
            .tags
            .iter()
            .map(|tag| {
                Control::Jump(JumpControl {
                    tag: tag.id.clone(),
                    caption: self.catalog.jump_caption(&tag.id).to_owned(),
                    sources: tag.sources.clone(),
                })
            })
            .collect::<Vec<_>>();
        controls.push(Control::Mute(MuteControl {
            marker: primary_marker,
            widget: primary_widget_id,
            target: finding.location,
        }));
        let primary_widget = self.widget(WidgetKind::Primary, &finding.label, controls);

        for secondary in &plan.secondaries {
            let marker = underline(surface, registry, &secondary.line)?;
            let widget_id = registry.allocate_widget();
            let widget = self.widget(
                WidgetKind::Secondary,
                secondary.tag_id,
                vec![Control::Mute(MuteControl {
                    marker,
                    widget: widget_id,
                    target: secondary.line.location,
                })],
            );
            surface.add_line_widget(widget_id, secondary.line.location, widget)?;
            registry.register_widget(widget_id);
        }

        surface.add_line_widget(primary_widget_id, finding.location, primary_widget)?;
        registry.register_widget(primary_widget_id);
        Ok(())
    }

    fn widget(&self, kind: WidgetKind, id: &str, controls: Vec<Control>) -> LineWidget {
        let severity = self.catalog.severity(id);
        LineWidget {
            kind,
            severity,
            glyph: severity.glyph(),
            message: self.catalog.message(id).to_owned(),
            controls,
        }
    }
}

fn plan_line(surface: &impl DocumentSurface, location: Location) -> Result<LinePlan, SurfaceError> {
    let (from, to) = surface.full_line_span(location)?;
    Ok(LinePlan { location, from, to })
}

fn underline(
    surface: &mut impl DocumentSurface,
    registry: &mut OverlayRegistry,
    line: &LinePlan,
) -> Result<crate::surface::MarkerId, SurfaceError> {
    let id = registry.allocate_marker();
    surface.mark_range(id, line.location.cell, line.from, line.to, MarkStyle::Underline)?;
    registry.register_underline(id);
    Ok(id)
}
