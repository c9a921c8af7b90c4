use tracing::{info, warn};

use crate::detect::{DetectError, LeakageDetector};
use crate::messages::MessageCatalog;
use crate::overlay::{
    AnnotationRenderer, ControlOutcome, MuteAllSummary, OverlayRegistry, RenderSummary,
    activate_control,
};
use crate::report::DetectResponse;
use crate::status::{StatusIndicator, StatusKind, StatusSlot, StatusSurface};
use crate::surface::{Control, DocumentSurface, SurfaceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisState {
    Idle,
    Running { run: u64 },
    Done { run: u64 },
    Failed { run: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalysisError {
    #[error("analysis run {run} is already in flight for `{document}`")]
    AlreadyRunning { run: u64, document: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunTicket {
    run: u64,
    document: String,
}

impl RunTicket {
    pub fn run(&self) -> u64 {
        self.run
    }

    pub fn document(&self) -> &str {
        &self.document
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Rendered(RenderSummary),
    /// The response arrived after the document lost its view; nothing was drawn.
    NoActiveView,
    Declined,
    Failed { error: String },
    Discarded,
}

pub struct AnalysisSession<D, S> {
    document: String,
    surface: D,
    registry: OverlayRegistry,
    status: StatusSlot<S>,
    catalog: MessageCatalog,
    suppression_marker: String,
    state: AnalysisState,
    last_run: u64,
}

impl<D: DocumentSurface, S: StatusSurface> AnalysisSession<D, S> {
    pub fn new(
        document: impl Into<String>,
        surface: D,
        status_surface: S,
        catalog: MessageCatalog,
        suppression_marker: impl Into<String>,
    ) -> Self {
        Self {
            document: document.into(),
            surface,
            registry: OverlayRegistry::new(),
            status: StatusSlot::new(status_surface),
            catalog,
            suppression_marker: suppression_marker.into(),
            state: AnalysisState::Idle,
            last_run: 0,
        }
    }

    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn state(&self) -> AnalysisState {
        self.state
    }

    pub fn surface(&self) -> &D {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut D {
        &mut self.surface
    }

    pub fn registry(&self) -> &OverlayRegistry {
        &self.registry
    }

    pub fn status_surface(&self) -> &S {
        self.status.surface()
    }

    pub async fn analyze(
        &mut self,
        detector: &impl LeakageDetector,
    ) -> Result<RunOutcome, AnalysisError> {
        let ticket = self.begin()?;
        let guard = RunGuard {
            session: self,
            run: ticket.run,
            armed: true,
        };
        let result = detector.detect(ticket.document()).await;
        Ok(guard.finish(ticket, result))
    }

    pub fn begin(&mut self) -> Result<RunTicket, AnalysisError> {
        if let AnalysisState::Running { run } = self.state {
            warn!(run, document = %self.document, "analysis already running; trigger rejected");
            return Err(AnalysisError::AlreadyRunning {
                run,
                document: self.document.clone(),
            });
        }

        self.last_run += 1;
        let run = self.last_run;
        self.state = AnalysisState::Running { run };
        self.publish(StatusKind::Running);
        let cleared = self.registry.mute_all(&mut self.surface);
        info!(
            run,
            document = %self.document,
            cleared_overlays = cleared.total(),
            "starting leakage analysis"
        );

        Ok(RunTicket {
            run,
            document: self.document.clone(),
        })
    }

    pub fn complete(
        &mut self,
        ticket: RunTicket,
        result: Result<DetectResponse, DetectError>,
    ) -> RunOutcome {
        if self.state != (AnalysisState::Running { run: ticket.run }) {
            warn!(
                run = ticket.run,
                state = ?self.state,
                "discarding result of a run that is not in flight"
            );
            return RunOutcome::Discarded;
        }

        let response = match result {
            Ok(response) => response,
            Err(error) => return self.fail(ticket.run, error),
        };

        if !response.ok {
            self.state = AnalysisState::Done { run: ticket.run };
            self.publish(StatusKind::Declined);
            info!(run = ticket.run, "analysis service declined the document");
            return RunOutcome::Declined;
        }

        let Some(report) = response.report else {
            return self.fail(
                ticket.run,
                DetectError::InvalidReport("response has ok=true but no report".to_owned()),
            );
        };

        let summary = AnnotationRenderer::new(&self.catalog).render(
            &mut self.surface,
            &mut self.registry,
            &report,
        );
        self.state = AnalysisState::Done { run: ticket.run };
        self.publish(StatusKind::Finished {
            rendered: summary.rendered,
            skipped: summary.skipped.len(),
        });
        info!(
            run = ticket.run,
            findings = report.len(),
            rendered = summary.rendered,
            skipped = summary.skipped.len(),
            "leakage analysis finished"
        );

        if summary.no_active_view {
            RunOutcome::NoActiveView
        } else {
            RunOutcome::Rendered(summary)
        }
    }

    /// Gives up on a run whose result will never be completed, so the next trigger is
    /// accepted. Returns false when the ticket is not the run in flight.
    pub fn abandon(&mut self, ticket: &RunTicket) -> bool {
        self.abandon_run(ticket.run)
    }

    fn abandon_run(&mut self, run: u64) -> bool {
        if self.state != (AnalysisState::Running { run }) {
            return false;
        }
        warn!(run, document = %self.document, "analysis run abandoned before completion");
        self.state = AnalysisState::Failed { run };
        self.publish(StatusKind::Error {
            message: format!("analysis run {run} was abandoned before completion"),
        });
        true
    }

    pub fn activate(&mut self, control: &Control) -> Result<ControlOutcome, SurfaceError> {
        activate_control(
            &mut self.surface,
            &mut self.registry,
            control,
            &self.suppression_marker,
        )
    }

    pub fn mute_all(&mut self) -> MuteAllSummary {
        self.registry.mute_all(&mut self.surface)
    }

    fn fail(&mut self, run: u64, error: DetectError) -> RunOutcome {
        warn!(run, document = %self.document, error = %error, "leakage analysis failed");
        self.state = AnalysisState::Failed { run };
        let message = error.to_string();
        self.publish(StatusKind::Error {
            message: message.clone(),
        });
        RunOutcome::Failed { error: message }
    }

    fn publish(&mut self, kind: StatusKind) {
        self.status
            .publish(StatusIndicator::new(kind, self.document.clone()));
    }
}

/// Fails the run if the `analyze` future is dropped while the request is in flight.
struct RunGuard<'a, D: DocumentSurface, S: StatusSurface> {
    session: &'a mut AnalysisSession<D, S>,
    run: u64,
    armed: bool,
}

impl<D: DocumentSurface, S: StatusSurface> RunGuard<'_, D, S> {
    fn finish(
        mut self,
        ticket: RunTicket,
        result: Result<DetectResponse, DetectError>,
    ) -> RunOutcome {
        self.armed = false;
        self.session.complete(ticket, result)
    }
}

impl<D: DocumentSurface, S: StatusSurface> Drop for RunGuard<'_, D, S> {
    fn drop(&mut self) {
        if self.armed {
            self.session.abandon_run(self.run);
        }
    }
}
