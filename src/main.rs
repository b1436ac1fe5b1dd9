use anyhow::Result;
use clap::Parser;
use narrative_guard::common::clock::SystemClock;
use narrative_guard::common::config::SecurityConfig;
use narrative_guard::common::guard_server::GuardServer;
use narrative_guard::common::security::{AuditEventKind, Security};
use narrative_guard::common::storage::FileBackend;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{self, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "narrative-guard", version, about = "Input-safety pipeline for content-generation forms")]
struct Args {
    /// JSON config file
    #[arg(long, env = "NARRATIVE_GUARD_CONFIG")]
    config: Option<PathBuf>,

    /// Persist storage to this JSON file instead of memory
    #[arg(long)]
    storage: Option<PathBuf>,
}

/// narrative-guard - input-safety pipeline for content-generation forms
/// Reads one JSON request per line on stdin and answers on stdout.
/// Run with: echo '{"action":"validate","form":"win-loss","fields":{"deal":"Q3"}}' | cargo run
fn main() -> Result<()> {
    // Logs go to stderr; stdout carries responses
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => SecurityConfig::from_file(path)?,
        None => SecurityConfig::default(),
    };

    let clock = Arc::new(SystemClock);
    let security = match &args.storage {
        Some(path) => Security::with_backend(config, clock, FileBackend::new(path)),
        None => Security::new(config, clock),
    };

    tracing::info!("Starting narrative-guard");
    security.record(
        AuditEventKind::AppInitialized,
        serde_json::json!({ "storage": args.storage.as_ref().map(|p| p.display().to_string()) }),
    );

    let server = GuardServer::new(security);
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    server
        .serve(stdin.lock(), stdout.lock())
        .inspect_err(|e| tracing::error!("serving error: {:?}", e))?;

    Ok(())
}
