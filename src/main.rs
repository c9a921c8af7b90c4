use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use leakage_overlay::config::OverlaySettings;
use leakage_overlay::detect::{DetectClient, parse_detect_response};
use leakage_overlay::messages::MessageCatalog;
use leakage_overlay::session::{AnalysisSession, RunOutcome};
use leakage_overlay::status::MemoryStatusBar;
use leakage_overlay::surface::MemoryNotebook;
use leakage_overlay::surface::text_view::render_text;

#[derive(Debug, Parser)]
#[command(
    name = "leakage_overlay",
    about = "Overlay data leakage findings on notebooks and scripts"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Ask the analysis service about a document and print it annotated.
    Analyze {
        path: PathBuf,
        /// Print the overlay snapshot as JSON instead of the annotated text.
        #[arg(long)]
        json: bool,
    },
    /// Annotate a document with a saved `/detect` response.
    Render {
        path: PathBuf,
        #[arg(long)]
        report: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = OverlaySettings::from_env().context("failed to load configuration")?;
    init_tracing(&settings)?;

    let catalog = MessageCatalog::load(settings.messages_file.as_deref())
        .context("failed to load leakage messages")?;

    match cli.command {
        Commands::Analyze { path, json } => {
            let mut session = open_session(&path, &settings, catalog)?;
            let client = DetectClient::new(&settings);
            let outcome = session.analyze(&client).await?;
            print_session(&session, json)?;
            ensure_succeeded(outcome)
        }
        Commands::Render { path, report, json } => {
            let mut session = open_session(&path, &settings, catalog)?;
            let raw = fs::read_to_string(&report)
                .with_context(|| format!("failed to read report `{}`", report.display()))?;
            let ticket = session.begin()?;
            let outcome = session.complete(ticket, parse_detect_response(&raw));
            print_session(&session, json)?;
            ensure_succeeded(outcome)
        }
    }
}

fn open_session(
    path: &Path,
    settings: &OverlaySettings,
    catalog: MessageCatalog,
) -> Result<AnalysisSession<MemoryNotebook, MemoryStatusBar>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read document `{}`", path.display()))?;
    let notebook = if path.extension().is_some_and(|extension| extension == "ipynb") {
        MemoryNotebook::from_ipynb(&raw)
            .with_context(|| format!("failed to parse notebook `{}`", path.display()))?
    } else {
        MemoryNotebook::from_script(&raw)
    };

    Ok(AnalysisSession::new(
        path.to_string_lossy(),
        notebook,
        MemoryStatusBar::new(),
        catalog,
        settings.suppression_marker.clone(),
    ))
}

fn print_session(
    session: &AnalysisSession<MemoryNotebook, MemoryStatusBar>,
    json: bool,
) -> Result<()> {
    if json {
        let snapshot = serde_json::to_string_pretty(&session.surface().snapshot())
            .context("failed to serialize overlay snapshot")?;
        println!("{snapshot}");
    } else {
        print!("{}", render_text(session.surface()));
    }

    if let Some(status) = session.status_surface().current() {
        eprintln!("{status}");
    }
    Ok(())
}

fn ensure_succeeded(outcome: RunOutcome) -> Result<()> {
    match outcome {
        RunOutcome::Failed { error } => Err(anyhow!("leakage analysis failed: {error}")),
        RunOutcome::Rendered(_)
        | RunOutcome::NoActiveView
        | RunOutcome::Declined
        | RunOutcome::Discarded => Ok(()),
    }
}

fn init_tracing(settings: &OverlaySettings) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,leakage_overlay=debug"));
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .with_filter(env_filter);

    let file_layer = settings.log_dir.as_ref().map(|log_dir| {
        let appender = tracing_appender::rolling::daily(log_dir, "leakage_overlay.log");
        tracing_subscriber::fmt::layer()
            .with_writer(appender)
            .with_ansi(false)
            .with_filter(EnvFilter::new(&settings.file_log_filter))
    });

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))
}
