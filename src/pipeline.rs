// =============================================================================
// Evaluation Pipeline — one cycle through the engine
// =============================================================================
//
// Per cycle:
//   1. Snapshot the configuration (updates apply only at cycle boundaries)
//   2. Per symbol: drain the window, normalize, aggregate, score
//   3. Derive opportunity candidates and rank them against the live board
//   4. Rebuild sentiment snapshots and the heatmap
//   5. Assemble and atomically swap the published board
//
// Per-symbol failures are isolated: a bad record or degenerate geometry on
// one symbol never blocks the others. Only a publish-boundary violation
// aborts the cycle, in which case the previous board stays live.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::aggregate::{aggregate, Window};
use crate::app_state::AppState;
use crate::heatmap::build_heatmap;
use crate::intake::SignalIntake;
use crate::normalize::{normalize, FEATURE_LIQUIDITY};
use crate::publish::assemble_board;
use crate::rank::candidates_from_signal;
use crate::score::ScoredSignal;
use crate::sentiment::{build_snapshot, SentimentSnapshot};

/// Counters for one cycle, logged in the cycle summary.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct CycleReport {
    pub symbols_evaluated: usize,
    pub signals_emitted: usize,
    pub candidates_proposed: usize,
    pub opportunities_published: usize,
    pub records_dropped: usize,
    pub vectors_skipped: usize,
}

/// Run one evaluation cycle at `now` and swap the board on success.
pub fn run_cycle(state: &Arc<AppState>, now: DateTime<Utc>) -> anyhow::Result<CycleReport> {
    let config = state.engine_config.read().clone();
    let scorer = config.scorer();
    let ranker = config.ranker();
    let window = Window::ending_at(now, config.window_minutes);

    let mut report = CycleReport::default();
    let mut signals: Vec<ScoredSignal> = Vec::new();
    let mut candidates = Vec::new();
    let mut snapshots: Vec<SentimentSnapshot> = Vec::new();

    for symbol in &config.symbols {
        report.symbols_evaluated += 1;

        // ── Normalize this symbol's window ───────────────────────────────
        let raws = state.intake.raw_in_window(symbol, window.start, window.end);
        let mut features = Vec::with_capacity(raws.len());
        for raw in &raws {
            match normalize(raw) {
                Ok(feature) => features.push(feature),
                Err(e) => {
                    report.records_dropped += 1;
                    warn!(symbol = %symbol, error = %e, "raw signal dropped");
                }
            }
        }

        // ── Aggregate & score ────────────────────────────────────────────
        // Raw signals are already symbol-scoped, so at most one vector.
        let Some(vector) = aggregate(&features, window).into_iter().next() else {
            debug!(symbol = %symbol, "no features in window");
            report.vectors_skipped += 1;
            continue;
        };

        let Some(stat) = state.intake.latest_market(symbol) else {
            debug!(symbol = %symbol, "no reference price, skipping scoring");
            report.vectors_skipped += 1;
            continue;
        };

        match scorer.score(&vector, stat.last_price, now) {
            Ok(Some(signal)) => {
                let liquidity = vector.get(FEATURE_LIQUIDITY).map(|f| f.score);
                let proposed = candidates_from_signal(
                    &signal,
                    liquidity,
                    config.min_driver_contribution,
                    now,
                );
                report.candidates_proposed += proposed.len();
                candidates.extend(proposed);
                report.signals_emitted += 1;
                signals.push(signal);
            }
            Ok(None) => {
                report.vectors_skipped += 1;
            }
            Err(e) => {
                report.vectors_skipped += 1;
                warn!(symbol = %symbol, error = %e, "signal rejected");
                state.push_error(e.to_string(), false);
            }
        }

        // ── Sentiment ────────────────────────────────────────────────────
        let news = state
            .intake
            .news_since(symbol, now - Duration::minutes(config.news_window_minutes));
        if let Some(snapshot) = build_snapshot(symbol, &news, config.max_news_per_symbol) {
            snapshots.push(snapshot);
        }
    }

    // ── Rank against the live board ──────────────────────────────────────
    let prior = state.board();
    let ranked = ranker.rank(candidates, &prior.opportunities, now);
    report.opportunities_published = ranked.len();

    // ── Heatmap ──────────────────────────────────────────────────────────
    let heatmap = build_heatmap(&state.intake.all_market(), &config.sectors);

    // ── Publish ──────────────────────────────────────────────────────────
    let board = assemble_board(now, &signals, &snapshots, ranked, heatmap)?;
    state.swap_board(board);

    // Records too old for any future window can go.
    state.intake.prune(SignalIntake::retention_cutoff(
        now,
        config.window_minutes,
        config.news_window_minutes,
    ));

    info!(
        symbols = report.symbols_evaluated,
        signals = report.signals_emitted,
        opportunities = report.opportunities_published,
        dropped = report.records_dropped,
        skipped = report.vectors_skipped,
        "evaluation cycle complete"
    );

    Ok(report)
}
