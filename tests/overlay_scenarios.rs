use std::time::Duration;

use leakage_overlay::messages::MessageCatalog;
use leakage_overlay::overlay::{ControlOutcome, JumpOutcome, MuteOutcome};
use leakage_overlay::report::Location;
use leakage_overlay::session::{AnalysisSession, AnalysisState, RunOutcome};
use leakage_overlay::status::{MemoryStatusBar, StatusKind};
use leakage_overlay::surface::{
    Control, DocumentSurface, MarkStyle, MemoryNotebook, Position, WidgetKind,
};
use leakage_overlay::test_support::{ScriptedDetector, ScriptedReply};
use serde_json::json;

const MARKER: &str = "# leakage: ignore";

fn notebook_with_cells(cell_count: usize, lines_per_cell: usize) -> MemoryNotebook {
    let cells = (0..cell_count)
        .map(|cell| {
            (0..lines_per_cell)
                .map(|line| format!("stmt_{cell}_{line}()"))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect::<Vec<_>>();
    MemoryNotebook::from_cells(cells)
}

fn session_for(notebook: MemoryNotebook) -> AnalysisSession<MemoryNotebook, MemoryStatusBar> {
    AnalysisSession::new(
        "work/leaky.ipynb",
        notebook,
        MemoryStatusBar::new(),
        MessageCatalog::default(),
        MARKER,
    )
}

#[tokio::test]
async fn scenario_a_single_finding_without_tags() {
    let mut session = session_for(notebook_with_cells(6, 8));
    let detector = ScriptedDetector::responding(json!({
        "ok": true,
        "report": [{"location": {"line": 5, "cell": 4}, "label": "preprocessing_leak", "tags": []}]
    }));

    let outcome = session.analyze(&detector).await.expect("run should start");

    assert!(matches!(outcome, RunOutcome::Rendered(ref summary) if summary.rendered == 1));
    assert_eq!(detector.requests(), vec!["work/leaky.ipynb".to_owned()]);

    let notebook = session.surface();
    let underlines = notebook.markers_with_style(MarkStyle::Underline);
    assert_eq!(underlines.len(), 1);
    assert_eq!(underlines[0].cell, 4);
    assert_eq!(underlines[0].from, Position::new(5, 0));
    assert_eq!(underlines[0].to, Position::new(5, "stmt_4_5()".len()));

    let widgets = notebook.widgets_at(Location::new(4, 5));
    assert_eq!(widgets.len(), 1);
    let widget = &widgets[0].widget;
    assert_eq!(widget.message, "potential preprocessing leakage");
    assert_eq!(widget.jump_controls().count(), 0);
    assert!(widget.mute_control().is_some());

    assert_eq!(session.registry().underlines().len(), 1);
    assert_eq!(session.registry().widgets().len(), 1);
    assert_eq!(
        session.status_surface().current().map(|status| &status.kind),
        Some(&StatusKind::Finished {
            rendered: 1,
            skipped: 0
        })
    );

    let mute = Control::Mute(*widget.mute_control().expect("mute control"));
    let muted = session.activate(&mute).expect("mute should succeed");
    assert_eq!(muted, ControlOutcome::Mute(MuteOutcome::Muted { annotated: true }));
    assert!(session.registry().is_empty());
}

#[tokio::test]
async fn scenario_b_tag_with_jump_and_secondary_overlays() {
    let mut session = session_for(notebook_with_cells(11, 4));
    let detector = ScriptedDetector::responding(json!({
        "ok": true,
        "filename": "work/leaky.ipynb",
        "report": [{
            "location": {"line": 2, "cell": 10},
            "label": "train",
            "tags": [{"id": "train_overlap", "sources": [{"line": 0, "cell": 5}, {"line": 1, "cell": 5}]}]
        }]
    }));

    session.analyze(&detector).await.expect("run should start");

    let primary = session.surface().widgets_at(Location::new(10, 2));
    assert_eq!(primary.len(), 1);
    assert_eq!(primary[0].widget.kind, WidgetKind::Primary);
    let jumps = primary[0].widget.jump_controls().cloned().collect::<Vec<_>>();
    assert_eq!(jumps.len(), 1);
    assert_eq!(jumps[0].caption, "overlap with all test data");

    for line in [0, 1] {
        let secondary = session.surface().widgets_at(Location::new(5, line));
        assert_eq!(secondary.len(), 1);
        assert_eq!(secondary[0].widget.kind, WidgetKind::Secondary);
        assert_eq!(secondary[0].widget.message, "overlap with all test data");
    }
    assert_eq!(session.registry().underlines().len(), 3);
    assert_eq!(session.registry().widgets().len(), 3);

    let outcome = session
        .activate(&Control::Jump(jumps[0].clone()))
        .expect("jump should succeed");
    assert_eq!(
        outcome,
        ControlOutcome::Jump(JumpOutcome::Navigated { highlighted: 2 })
    );
    assert_eq!(session.surface().active_cell(), Some(5));
    assert_eq!(
        session.surface().cursor(),
        Some((5, Position::new(0, "stmt_5_0()".len())))
    );
    let highlights = session.surface().markers_with_style(MarkStyle::Highlight);
    assert_eq!(
        highlights
            .iter()
            .map(|marker| (marker.cell, marker.from.line))
            .collect::<Vec<_>>(),
        vec![(5, 0), (5, 1)]
    );
    assert_eq!(session.registry().highlights().len(), 2);
    assert_eq!(session.registry().widgets().len(), 3);
    assert_eq!(session.state(), AnalysisState::Done { run: 1 });

    let secondary_mute = *session.surface().widgets_at(Location::new(5, 0))[0]
        .widget
        .mute_control()
        .expect("secondary mute");
    session
        .activate(&Control::Mute(secondary_mute))
        .expect("mute should succeed");
    assert!(session.surface().widgets_at(Location::new(5, 0)).is_empty());
    assert_eq!(session.surface().widgets_at(Location::new(5, 1)).len(), 1);
    assert_eq!(session.surface().widgets_at(Location::new(10, 2)).len(), 1);
    assert_eq!(
        session.surface().line_text(5, 0).as_deref(),
        Ok("stmt_5_0()  # leakage: ignore")
    );
}

#[tokio::test]
async fn scenario_c_failed_request_leaves_registry_empty() {
    let mut session = session_for(notebook_with_cells(2, 2));
    let first = ScriptedDetector::responding(json!({
        "ok": true,
        "report": [{"location": {"line": 1, "cell": 1}, "label": "test_multiuse"}]
    }));
    session.analyze(&first).await.expect("run should start");
    assert!(!session.registry().is_empty());

    let failing = ScriptedDetector::new(ScriptedReply::Status(502));
    let outcome = session.analyze(&failing).await.expect("run should start");

    assert!(matches!(outcome, RunOutcome::Failed { .. }));
    assert!(session.registry().is_empty());
    assert_eq!(session.surface().widgets().count(), 0);
    assert_eq!(session.state(), AnalysisState::Failed { run: 2 });
    let status = session.status_surface().current().expect("status shown");
    assert_eq!(status.kind.as_str(), "error");
    assert_eq!(session.status_surface().visible().len(), 1);
}

#[tokio::test]
async fn scenario_d_stale_response_renders_nothing() {
    let notebook = notebook_with_cells(1, 3);
    let view = notebook.view_handle();
    let mut session = session_for(notebook);
    let detector = ScriptedDetector::responding(json!({
        "ok": true,
        "report": [{"location": {"line": 0, "cell": 0}, "label": "train"}]
    }))
    .closing_view(view);

    let outcome = session.analyze(&detector).await.expect("run should start");

    assert_eq!(outcome, RunOutcome::NoActiveView);
    assert!(session.registry().is_empty());
    assert_eq!(session.surface().markers().count(), 0);
}

#[tokio::test]
async fn muting_one_finding_keeps_its_siblings() {
    let mut session = session_for(notebook_with_cells(1, 13));
    let detector = ScriptedDetector::responding(json!({
        "ok": true,
        "report": [
            {"location": {"line": 5, "cell": 0}, "label": "test_overlap"},
            {"location": {"line": 12, "cell": 0}, "label": "no_test"}
        ]
    }));
    session.analyze(&detector).await.expect("run should start");

    let mute = *session.surface().widgets_at(Location::new(0, 5))[0]
        .widget
        .mute_control()
        .expect("mute control");
    session
        .activate(&Control::Mute(mute))
        .expect("mute should succeed");
    let again = session
        .activate(&Control::Mute(mute))
        .expect("second mute should not fail");

    assert_eq!(again, ControlOutcome::Mute(MuteOutcome::AlreadyMuted));
    assert!(session.surface().widgets_at(Location::new(0, 5)).is_empty());
    assert_eq!(session.surface().widgets_at(Location::new(0, 12)).len(), 1);
    let underlines = session.surface().markers_with_style(MarkStyle::Underline);
    assert_eq!(underlines.len(), 1);
    assert_eq!(underlines[0].from.line, 12);
}

#[tokio::test]
async fn tag_without_sources_renders_inert_jump_button() {
    let mut session = session_for(notebook_with_cells(1, 2));
    let detector = ScriptedDetector::responding(json!({
        "ok": true,
        "report": [{
            "location": {"line": 0, "cell": 0},
            "label": "test",
            "tags": [{"id": "test_multiuse", "sources": []}]
        }]
    }));
    session.analyze(&detector).await.expect("run should start");

    let widget = session.surface().widgets_at(Location::new(0, 0))[0]
        .widget
        .clone();
    let jump = widget.jump_controls().next().cloned().expect("jump control");
    assert!(!jump.is_enabled());

    let outcome = session
        .activate(&Control::Jump(jump))
        .expect("inert jump should not fail");
    assert_eq!(outcome, ControlOutcome::Jump(JumpOutcome::Inert));
    assert!(session.registry().highlights().is_empty());
    assert_eq!(session.surface().active_cell(), None);
}

#[tokio::test]
async fn render_then_mute_all_restores_overlay_free_document() {
    let mut session = session_for(notebook_with_cells(3, 3));
    let detector = ScriptedDetector::responding(json!({
        "ok": true,
        "report": [
            {"location": {"line": 0, "cell": 0}, "label": "preprocessing_leak",
             "tags": [{"id": "test_multiuse", "sources": [{"line": 2, "cell": 2}]}]},
            {"location": {"line": 1, "cell": 1}, "label": "unknown_label",
             "tags": [{"id": "unknown_tag", "sources": [{"line": 0, "cell": 1}]}]}
        ]
    }));
    session.analyze(&detector).await.expect("run should start");
    let jump = session.surface().widgets_at(Location::new(0, 0))[0]
        .widget
        .jump_controls()
        .next()
        .cloned()
        .expect("jump control");
    session
        .activate(&Control::Jump(jump))
        .expect("jump should succeed");

    session.mute_all();
    session.mute_all();

    assert!(session.registry().is_empty());
    assert_eq!(session.surface().markers().count(), 0);
    assert_eq!(session.surface().widgets().count(), 0);
}

#[tokio::test]
async fn dropped_analysis_does_not_block_the_next_trigger() {
    let mut session = session_for(notebook_with_cells(1, 2));
    let hanging = ScriptedDetector::new(ScriptedReply::Hang);

    let timed_out =
        tokio::time::timeout(Duration::from_millis(20), session.analyze(&hanging)).await;

    assert!(timed_out.is_err(), "hanging detector should time out");
    assert_eq!(session.state(), AnalysisState::Failed { run: 1 });
    let status = session.status_surface().current().expect("status shown");
    assert_eq!(status.kind.as_str(), "error");

    let detector = ScriptedDetector::responding(json!({
        "ok": true,
        "report": [{"location": {"line": 1, "cell": 0}, "label": "no_test"}]
    }));
    let outcome = session
        .analyze(&detector)
        .await
        .expect("retrigger should be accepted");

    assert!(matches!(outcome, RunOutcome::Rendered(ref summary) if summary.rendered == 1));
    assert_eq!(session.state(), AnalysisState::Done { run: 2 });
    assert_eq!(session.status_surface().visible().len(), 1);
}

#[tokio::test]
async fn declined_analysis_is_visible_in_status() {
    let mut session = session_for(notebook_with_cells(1, 1));
    let detector = ScriptedDetector::responding(json!({"ok": false}));

    let outcome = session.analyze(&detector).await.expect("run should start");

    assert_eq!(outcome, RunOutcome::Declined);
    let status = session.status_surface().current().expect("status shown");
    assert_eq!(status.kind, StatusKind::Declined);
    assert_eq!(
        status.to_string(),
        "Leakage analysis declined for work/leaky.ipynb; no findings rendered"
    );
}
