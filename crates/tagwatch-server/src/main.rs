use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::time::Duration;
use tracing_subscriber::EnvFilter;

use tagwatch_server::config::ServerConfig;
use tagwatch_server::health::{HealthChecker, HttpProbe};
use tagwatch_server::ingest::InboundMessage;
use tagwatch_server::seed::{apply_seed, SeedFile};
use tagwatch_server::state::AppState;
use tagwatch_storage::MemoryStore;

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  tagwatch-server [config.toml]    Read newline-delimited JSON messages from stdin");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("tagwatch=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(|s| s.as_str()) {
        Some("--help" | "-h") => {
            print_usage();
            Ok(())
        }
        other => run_server(other.unwrap_or("config/server.toml")).await,
    }
}

async fn run_server(config_path: &str) -> Result<()> {
    let config = if Path::new(config_path).exists() {
        ServerConfig::load(config_path)?
    } else {
        tracing::warn!(path = %config_path, "Config file not found, using defaults");
        ServerConfig::default()
    };

    let store = Arc::new(MemoryStore::new());
    if let Some(seed_path) = &config.seed_file {
        let seed = SeedFile::load(seed_path)?;
        apply_seed(&seed, store.as_ref(), store.as_ref()).await?;
    }

    let state = AppState::new(config, store);
    state.refresh_all().await?;

    let health_handle = if state.config.health_check.enabled {
        let probe = HttpProbe::new(Duration::from_secs(state.config.health_check.timeout_secs))?;
        let checker = HealthChecker::new(
            Arc::new(probe),
            state.messages.clone(),
            state.config.health_check.tick_secs,
        );
        Some(tokio::spawn(async move {
            checker.run().await;
        }))
    } else {
        tracing::info!("Device health checker disabled");
        None
    };

    tracing::info!("Server started, reading messages from stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => handle_line(&state, &line).await,
                    Ok(None) => {
                        tracing::info!("End of input");
                        break;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to read stdin");
                        break;
                    }
                }
            }
            _ = signal::ctrl_c() => {
                tracing::info!("Shutting down gracefully");
                break;
            }
        }
    }

    if let Some(h) = health_handle {
        h.abort();
    }
    tracing::info!("Server stopped");

    Ok(())
}

async fn handle_line(state: &AppState, line: &str) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }

    let inbound: InboundMessage = match serde_json::from_str(line) {
        Ok(inbound) => inbound,
        Err(e) => {
            tracing::warn!(error = %e, "Skipping malformed message");
            return;
        }
    };

    match state.messages.ingest(inbound).await {
        Ok(outcome) if outcome.notify => {
            tracing::info!(
                device_id = outcome.message.device_id,
                subject = %outcome.subject,
                delivery = ?outcome.delivery,
                "Message classified"
            );
        }
        Ok(outcome) => {
            tracing::debug!(device_id = outcome.message.device_id, "Message stored");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to ingest message");
        }
    }
}
