// =============================================================================
// Helios Signal Engine — Main Entry Point
// =============================================================================
//
// Wires the pipeline together: source feeds fill the intake, the evaluation
// loop runs the Normalizer → Aggregator → Scorer → Ranker → Publisher chain
// on a fixed cadence, and the API server exposes the published board to the
// dashboard.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod aggregate;
mod api;
mod app_state;
mod errors;
mod heatmap;
mod intake;
mod normalize;
mod pipeline;
mod publish;
mod rank;
mod runtime_config;
mod score;
mod sentiment;
mod types;

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::intake::{ReplaySource, SignalSource};
use crate::runtime_config::EngineConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Helios Signal Engine — starting up");

    let mut config = EngineConfig::load("engine_config.json").unwrap_or_else(|e| {
        warn!(error = %e, "failed to load config, using defaults");
        EngineConfig::default()
    });

    // Override symbols from env if available.
    if let Ok(syms) = std::env::var("HELIOS_SYMBOLS") {
        config.symbols = syms
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
    }
    if config.symbols.is_empty() {
        config.symbols = EngineConfig::default().symbols;
    }

    info!(
        symbols = ?config.symbols,
        window_minutes = config.window_minutes,
        eval_interval_secs = config.eval_interval_secs,
        "engine configured"
    );

    // ── 2. Build shared state ────────────────────────────────────────────
    let state = Arc::new(AppState::new(config));

    // ── 3. Source feeds ──────────────────────────────────────────────────
    // Live adapters register here; out of the box a JSONL replay file can
    // stand in for them. With no source configured the engine publishes
    // empty boards rather than fabricating data.
    if let Ok(path) = std::env::var("HELIOS_REPLAY_FILE") {
        let feed_state = state.clone();
        tokio::spawn(async move {
            let mut source = ReplaySource::new("replay", path);
            let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(2));
            loop {
                interval.tick().await;
                match source.poll().await {
                    Ok(records) => {
                        for record in records {
                            feed_state.intake.push_record(record);
                        }
                    }
                    Err(e) => {
                        warn!(source = source.source_id(), error = %e, "source poll failed");
                    }
                }
            }
        });
        info!("replay source feed launched");
    } else {
        warn!("HELIOS_REPLAY_FILE not set — no source feed registered");
    }

    // ── 4. Start the API server ──────────────────────────────────────────
    let api_state = state.clone();
    let bind_addr = std::env::var("HELIOS_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".into());
    let bind_addr_clone = bind_addr.clone();

    tokio::spawn(async move {
        let app = api::rest::router(api_state);
        let listener = tokio::net::TcpListener::bind(&bind_addr_clone)
            .await
            .expect("Failed to bind API server");
        info!(addr = %bind_addr_clone, "API server listening");
        axum::serve(listener, app).await.expect("API server failed");
    });

    // ── 5. Evaluation loop ───────────────────────────────────────────────
    let eval_state = state.clone();
    tokio::spawn(async move {
        let interval_secs = eval_state.engine_config.read().eval_interval_secs.max(1);
        let mut interval =
            tokio::time::interval(tokio::time::Duration::from_secs(interval_secs));
        loop {
            interval.tick().await;
            if let Err(e) = pipeline::run_cycle(&eval_state, Utc::now()) {
                // The previous board stays live; a failed cycle publishes
                // nothing partial.
                error!(error = %e, "evaluation cycle aborted");
                eval_state.push_error(e.to_string(), true);
            }
        }
    });

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 6. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received — stopping gracefully");

    if let Err(e) = state.engine_config.read().save("engine_config.json") {
        error!(error = %e, "failed to save engine config on shutdown");
    }

    info!("Helios Signal Engine shut down complete.");
    Ok(())
}
