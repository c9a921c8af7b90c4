use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use leakage_overlay::config::OverlaySettings;
use leakage_overlay::detect::{DetectClient, DetectError, LeakageDetector};
use leakage_overlay::messages::MessageCatalog;
use leakage_overlay::report::Location;
use leakage_overlay::session::{AnalysisSession, RunOutcome};
use leakage_overlay::status::MemoryStatusBar;
use leakage_overlay::surface::{MarkStyle, MemoryNotebook};
use serde_json::{Value, json};
use tokio::net::TcpListener;

type SeenNames = Arc<Mutex<Vec<String>>>;

struct MockService {
    base_url: String,
    seen: SeenNames,
}

async fn start_mock_service(reply: Value, status: StatusCode) -> Option<MockService> {
    let listener = match TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => listener,
        Err(error) if error.kind() == std::io::ErrorKind::PermissionDenied => return None,
        Err(error) => panic!("ephemeral port should be available for bind: {error}"),
    };
    let addr = listener
        .local_addr()
        .expect("ephemeral listener should have local address");
    let seen = SeenNames::default();

    let app = Router::new()
        .route(
            "/data-leakage-detection/detect",
            post(
                move |State(seen): State<SeenNames>, Json(body): Json<Value>| {
                    let reply = reply.clone();
                    async move {
                        if let Some(name) = body.get("name").and_then(Value::as_str) {
                            seen.lock().expect("names lock").push(name.to_owned());
                        }
                        (status, Json(reply))
                    }
                },
            ),
        )
        .with_state(seen.clone());

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Some(MockService {
        base_url: format!("http://{addr}/data-leakage-detection/"),
        seen,
    })
}

fn settings_for(base_url: &str) -> OverlaySettings {
    OverlaySettings {
        detect_base_url: base_url.to_owned(),
        detect_timeout_ms: 5_000,
        ..OverlaySettings::default()
    }
}

#[tokio::test]
async fn http_round_trip_renders_findings() {
    let reply = json!({
        "ok": true,
        "filename": "nb/leaky.ipynb",
        "report": [{
            "location": {"line": 1, "cell": 1},
            "label": "test",
            "tags": [{"id": "test_multiuse", "sources": [{"line": 0, "cell": 0}]}]
        }]
    });
    let Some(service) = start_mock_service(reply, StatusCode::OK).await else {
        eprintln!("skipping: local TCP bind is not permitted in this environment");
        return;
    };
    let client = DetectClient::new(&settings_for(&service.base_url));
    let mut session = AnalysisSession::new(
        "nb/leaky.ipynb",
        MemoryNotebook::from_cells(["X_test = load()", "a = 1\nevaluate(X_test)"]),
        MemoryStatusBar::new(),
        MessageCatalog::default(),
        "# leakage: ignore",
    );

    let outcome = session.analyze(&client).await.expect("run should start");

    assert!(matches!(outcome, RunOutcome::Rendered(ref summary) if summary.rendered == 1));
    assert_eq!(
        service.seen.lock().expect("names lock").as_slice(),
        ["nb/leaky.ipynb".to_owned()]
    );
    assert_eq!(
        session
            .surface()
            .markers_with_style(MarkStyle::Underline)
            .len(),
        2
    );
    let primary = session.surface().widgets_at(Location::new(1, 1));
    assert_eq!(primary.len(), 1);
    assert_eq!(
        primary[0]
            .widget
            .jump_controls()
            .map(|jump| jump.caption.as_str())
            .collect::<Vec<_>>(),
        vec!["highlight other usage"]
    );
}

#[tokio::test]
async fn http_error_status_surfaces_as_failed_run() {
    let Some(service) =
        start_mock_service(json!({"error": "boom"}), StatusCode::INTERNAL_SERVER_ERROR).await
    else {
        eprintln!("skipping: local TCP bind is not permitted in this environment");
        return;
    };
    let client = DetectClient::new(&settings_for(&service.base_url));

    let error = client
        .detect("broken.py")
        .await
        .expect_err("500 should not parse as a report");
    assert!(
        matches!(error, DetectError::HttpStatus { status, .. } if status.as_u16() == 500),
        "unexpected error: {error}"
    );

    let mut session = AnalysisSession::new(
        "broken.py",
        MemoryNotebook::from_script("fit(X)"),
        MemoryStatusBar::new(),
        MessageCatalog::default(),
        "# leakage: ignore",
    );
    let outcome = session.analyze(&client).await.expect("run should start");
    assert!(matches!(outcome, RunOutcome::Failed { .. }));
    assert!(session.registry().is_empty());
}

#[test]
fn cli_render_annotates_script_from_saved_report() {
    let dir = temp_dir("cli-render");
    let script = dir.join("train.py");
    let report = dir.join("report.json");
    fs::write(&script, "df = load()\nX = scale(df)\nfit(X)\n").expect("script should be writable");
    fs::write(
        &report,
        json!({
            "ok": true,
            "report": [{"location": {"line": 1, "cell": 0}, "label": "preprocessing_leak"}]
        })
        .to_string(),
    )
    .expect("report should be writable");

    let output = Command::new(bin_path())
        .arg("render")
        .arg(&script)
        .arg("--report")
        .arg(&report)
        .arg("--json")
        .env("RUST_LOG", "off")
        .env_remove("LEAKAGE_LOG_DIR")
        .env_remove("LEAKAGE_MESSAGES_FILE")
        .output()
        .expect("CLI command should execute");
    let _ = fs::remove_dir_all(&dir);

    assert!(
        output.status.success(),
        "CLI should succeed, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let snapshot: Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be a JSON snapshot");
    let widgets = snapshot["widgets"]
        .as_array()
        .expect("widgets should be an array");
    assert_eq!(widgets.len(), 1);
    assert_eq!(
        widgets[0]["widget"]["message"],
        "potential preprocessing leakage"
    );
    assert_eq!(widgets[0]["anchor"], json!({"line": 1, "cell": 0}));
}

#[test]
fn cli_render_fails_on_malformed_report() {
    let dir = temp_dir("cli-malformed");
    let script = dir.join("train.py");
    let report = dir.join("report.json");
    fs::write(&script, "fit(X)\n").expect("script should be writable");
    fs::write(&report, "{\"ok\": true, \"report\": 7}").expect("report should be writable");

    let output = Command::new(bin_path())
        .args(["render"])
        .arg(&script)
        .arg("--report")
        .arg(&report)
        .env("RUST_LOG", "off")
        .env_remove("LEAKAGE_LOG_DIR")
        .output()
        .expect("CLI command should execute");
    let _ = fs::remove_dir_all(&dir);

    assert!(!output.status.success(), "malformed report should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("leakage analysis failed"),
        "expected failure in stderr, got: {stderr}"
    );
}

#[test]
fn cli_help_does_not_depend_on_configuration() {
    let output = Command::new(bin_path())
        .arg("--help")
        .env("DETECT_TIMEOUT_MS", "not-a-number")
        .output()
        .expect("CLI command should execute");

    assert!(
        output.status.success(),
        "help should print despite bad config, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("render"), "expected subcommands in help, got: {stdout}");
}

#[test]
fn cli_rejects_malformed_configuration() {
    let dir = temp_dir("cli-bad-config");
    let script = dir.join("train.py");
    let report = dir.join("report.json");
    fs::write(&script, "fit(X)\n").expect("script should be writable");
    fs::write(&report, "{\"ok\": false}").expect("report should be writable");

    let output = Command::new(bin_path())
        .arg("render")
        .arg(&script)
        .arg("--report")
        .arg(&report)
        .env("DETECT_TIMEOUT_MS", "not-a-number")
        .output()
        .expect("CLI command should execute");
    let _ = fs::remove_dir_all(&dir);

    assert!(!output.status.success(), "bad config should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("DETECT_TIMEOUT_MS"),
        "expected the variable name in stderr, got: {stderr}"
    );
}

fn temp_dir(label: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "leakage-overlay-{label}-{}",
        std::process::id()
    ));
    fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn bin_path() -> &'static str {
    env!("CARGO_BIN_EXE_leakage_overlay")
}
