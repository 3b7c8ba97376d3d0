use std::sync::Arc;

use anyhow::Context;
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::LinesStream;
use tracing::{error, info, warn};

use smscode_relay::collaborators::{
    BroadcastAutoFill, Collaborators, ConsoleToast, PatternExtractor, ShellPrivilegedInput,
    SystemClipboard,
};
use smscode_relay::config::RelayConfig;
use smscode_relay::error::PipelineError;
use smscode_relay::intake::Intake;
use smscode_relay::interactive::InteractiveContext;
use smscode_relay::logging::{init_tracing, redact};
use smscode_relay::pipeline::{
    DEFAULT_QUEUE_CAPACITY, Pipeline, PipelineDeps, spawn_pipeline_worker,
};
use smscode_relay::settings::{JsonFileSettings, SettingsProvider, SharedSettings};
use smscode_relay::store::LibSqlStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = RelayConfig::from_env();
    let _log_guard = init_tracing(&config.log);

    eprintln!("📨 SMS Code Relay v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Database: {}", config.db_path.display());
    match &config.settings_path {
        Some(path) => eprintln!("   Settings: {}", path.display()),
        None => eprintln!("   Settings: built-in defaults"),
    }
    eprintln!("   Extraction rules: {}", config.code_patterns.len());
    eprintln!("   Reading JSON lines from stdin: {{\"sender\", \"body\", \"timestamp\"}}\n");

    // ── Store ────────────────────────────────────────────────────────────
    let store = Arc::new(
        LibSqlStore::new_local(&config.db_path)
            .await
            .with_context(|| format!("opening database at {}", config.db_path.display()))?,
    );

    // ── Settings ─────────────────────────────────────────────────────────
    let settings: Arc<dyn SettingsProvider> = match &config.settings_path {
        Some(path) => Arc::new(JsonFileSettings::new(path)),
        None => Arc::new(SharedSettings::default()),
    };

    // ── Collaborators ────────────────────────────────────────────────────
    let extractor =
        PatternExtractor::new(&config.code_patterns).context("compiling extraction rules")?;

    let auto_fill = Arc::new(BroadcastAutoFill::new());
    let mut fill_rx = auto_fill.subscribe();
    tokio::spawn(async move {
        loop {
            match fill_rx.recv().await {
                Ok(request) => info!(
                    code = %redact(&request.code),
                    at = %request.requested_at,
                    "Auto-fill request delivered to focus agent"
                ),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "Focus agent lagged behind auto-fill requests");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let collaborators = Collaborators {
        extractor: Arc::new(extractor),
        clipboard: Arc::new(SystemClipboard::new()),
        notifier: Arc::new(ConsoleToast),
        auto_fill,
        privileged: Arc::new(ShellPrivilegedInput::new(config.shell.clone())),
        store: store.clone(),
    };

    // ── Pipeline ─────────────────────────────────────────────────────────
    let interactive = InteractiveContext::spawn("interactive");
    let pipeline = Arc::new(Pipeline::new(
        PipelineDeps {
            settings,
            dedup_store: store.clone(),
            collaborators,
            agent_id: config.agent_id.clone(),
            timings: config.timings,
        },
        interactive.handle(),
    ));
    let (queue, worker) = spawn_pipeline_worker("sms", pipeline, DEFAULT_QUEUE_CAPACITY);
    let intake = Intake::new(store, queue, config.timings.dedup_window);

    // ── Trigger: stdin ───────────────────────────────────────────────────
    let mut lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());
    while let Some(line) = lines.next().await {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!(error = %e, "Error reading stdin");
                break;
            }
        };
        intake.accept_line(&line).await?;
    }

    // ── Shutdown ─────────────────────────────────────────────────────────
    drop(intake);
    let processed = worker
        .await
        .map_err(|e| PipelineError::Worker(e.to_string()))?;
    interactive.shutdown().await;
    info!(processed, "Relay stopped");

    Ok(())
}
