// =============================================================================
// REST API Endpoints — Axum
// =============================================================================
//
// All endpoints live under `/api/v1/`. Health is public; everything else
// requires a valid Bearer token via the `AuthBearer` extractor. These are
// read endpoints over the latest published board plus a config endpoint for
// between-cycle tuning.
//
// CORS is configured permissively for development; tighten `allowed_origins`
// in production.
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Json, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::api::auth::AuthBearer;
use crate::app_state::AppState;
use crate::score::Thresholds;

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // ── Public ──────────────────────────────────────────────────
        .route("/api/v1/health", get(health))
        // ── Authenticated ───────────────────────────────────────────
        .route("/api/v1/board", get(board))
        .route("/api/v1/signals", get(signals))
        .route("/api/v1/sentiment", get(sentiment))
        .route("/api/v1/opportunities", get(opportunities))
        .route("/api/v1/heatmap", get(heatmap))
        .route("/api/v1/config", get(get_config))
        .route("/api/v1/config", post(update_config))
        // ── Middleware & State ───────────────────────────────────────
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Health (public)
// =============================================================================

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let board = state.board();
    Json(serde_json::json!({
        "status": "ok",
        "state_version": state.current_state_version(),
        "cycles_completed": state.cycles_completed.load(std::sync::atomic::Ordering::Relaxed),
        "board_generated_at": board.generated_at.to_rfc3339(),
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "recent_errors": state.recent_errors.read().clone(),
        "server_time": Utc::now().timestamp_millis(),
    }))
}

// =============================================================================
// Board reads (authenticated)
// =============================================================================

/// Full snapshot: signals, sentiment, live opportunities and heatmap.
async fn board(_auth: AuthBearer, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let board = state.board();
    Json(serde_json::json!({
        "generated_at": board.generated_at.to_rfc3339(),
        "signals": board.signals,
        "sentiment": board.sentiment,
        "opportunities": board.live_opportunities(Utc::now()),
        "heatmap": board.heatmap,
    }))
}

async fn signals(_auth: AuthBearer, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.board().signals.clone())
}

async fn sentiment(_auth: AuthBearer, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.board().sentiment.clone())
}

/// Expired cards never reach the wire: the filter runs against the request
/// clock, not the cycle clock.
async fn opportunities(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    Json(state.board().live_opportunities(Utc::now()))
}

async fn heatmap(_auth: AuthBearer, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.board().heatmap.clone())
}

// =============================================================================
// Configuration (authenticated)
// =============================================================================

async fn get_config(_auth: AuthBearer, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.engine_config.read().clone())
}

#[derive(Deserialize)]
struct ConfigUpdate {
    #[serde(default)]
    symbols: Option<Vec<String>>,
    #[serde(default)]
    weights: Option<HashMap<String, f64>>,
    #[serde(default)]
    thresholds: Option<Thresholds>,
    #[serde(default)]
    min_opportunity_score: Option<f64>,
    #[serde(default)]
    cooldown_secs: Option<i64>,
}

/// Apply a partial config update. The running cycle is unaffected; the new
/// table is picked up at the next cycle boundary.
async fn update_config(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Json(update): Json<ConfigUpdate>,
) -> impl IntoResponse {
    let mut changes = Vec::new();
    let config_clone = {
        let mut config = state.engine_config.write();

        if let Some(symbols) = update.symbols {
            if config.symbols != symbols {
                changes.push(format!("symbols: {:?} -> {:?}", config.symbols, symbols));
                config.symbols = symbols;
            }
        }
        if let Some(weights) = update.weights {
            changes.push("weights updated".to_string());
            config.weights.weights = weights;
        }
        if let Some(thresholds) = update.thresholds {
            changes.push(format!(
                "thresholds: strong {} moderate {} floor {}",
                thresholds.strong, thresholds.moderate, thresholds.actionability_floor
            ));
            config.thresholds = thresholds;
        }
        if let Some(min_score) = update.min_opportunity_score {
            if (config.min_opportunity_score - min_score).abs() > f64::EPSILON {
                changes.push(format!(
                    "min_opportunity_score: {} -> {}",
                    config.min_opportunity_score, min_score
                ));
                config.min_opportunity_score = min_score;
            }
        }
        if let Some(cooldown) = update.cooldown_secs {
            if config.cooldown_secs != cooldown {
                changes.push(format!(
                    "cooldown_secs: {} -> {}",
                    config.cooldown_secs, cooldown
                ));
                config.cooldown_secs = cooldown;
            }
        }

        config.clone()
    };

    if !changes.is_empty() {
        info!(changes = ?changes, "engine config updated via API");

        // Persist best-effort; a failed save never rejects the update.
        if let Err(e) = config_clone.save("engine_config.json") {
            warn!(error = %e, "failed to save engine config to disk");
        }
        state.increment_version();
    }

    Json(serde_json::json!({
        "config": config_clone,
        "changes": changes,
    }))
}
