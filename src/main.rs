//! # pitwall
//!
//! Race replay server binary. Loads settings, serves recordings from a
//! directory of JSON files and streams them to viewers over WebSocket.

#![deny(unsafe_code)]

mod logging;
mod source;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use pitwall_replay::{RegistryConfig, SessionRegistry};
use pitwall_server::{ReplayServer, ServerConfig};
use pitwall_settings::PitwallSettings;
use tracing::info;

use crate::source::JsonDirSource;

/// Race replay server.
#[derive(Parser, Debug)]
#[command(name = "pitwall", about = "Race telemetry replay server")]
struct Cli {
    /// Settings file (default `~/.pitwall/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to bind.
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,

    /// Directory of `<session_id>.json` recordings.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Log as JSON lines.
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    /// Settings from the file and environment, then command-line overrides.
    fn settings(&self) -> Result<PitwallSettings> {
        let path = self
            .config
            .clone()
            .unwrap_or_else(pitwall_settings::settings_path);
        let mut settings = pitwall_settings::load_settings_from_path(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;
        self.apply(&mut settings);
        settings.validate().context("Invalid settings")?;
        Ok(settings)
    }

    fn apply(&self, settings: &mut PitwallSettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(dir) = &self.data_dir {
            settings.telemetry.data_dir = dir.display().to_string();
        }
        if self.log_json {
            settings.logging.json = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.settings()?;

    logging::init_subscriber(&settings.logging.level, settings.logging.json);
    let metrics = pitwall_server::metrics::install_recorder();

    let source = Arc::new(JsonDirSource::new(&settings.telemetry.data_dir));
    info!(data_dir = %source.dir().display(), "serving recordings");
    let registry = Arc::new(SessionRegistry::new(
        source,
        RegistryConfig::from_settings(&settings.replay),
    ));

    let server = ReplayServer::new(
        ServerConfig::from_settings(&settings.server),
        registry,
        Some(metrics),
    );
    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    info!(
        tick_rate_hz = settings.replay.tick_rate_hz,
        max_sessions = settings.replay.max_concurrent_sessions,
        "pitwall listening on ws://{addr}/ws/replay/{{session_id}}"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    info!("Shutting down...");
    let report = server.stop(handle).await;
    info!(
        sessions_stopped = report.sessions_stopped,
        sessions_abandoned = report.sessions_abandoned,
        clean = report.is_clean(),
        "pitwall stopped"
    );
    Ok(())
}
