// =============================================================================
// Central Application State — Helios Signal Engine
// =============================================================================
//
// Ties the shared pieces together: the configuration lock, the intake
// buffers, the most recently published board and the error ring. Everything
// is reachable through a single `Arc<AppState>` handed to each task.
//
// The board itself is an `Arc` snapshot replaced wholesale at the end of a
// cycle. Readers clone the `Arc` and work off an immutable, complete board;
// an abandoned cycle simply never swaps, leaving the previous board intact.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;

use crate::intake::SignalIntake;
use crate::publish::PublishedBoard;
use crate::runtime_config::EngineConfig;

/// Maximum number of recent errors to retain.
const MAX_RECENT_ERRORS: usize = 50;

/// A recorded error event for the dashboard health payload.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub message: String,
    /// ISO 8601 timestamp.
    pub at: String,
    pub fatal: bool,
}

/// Shared state across all async tasks via `Arc<AppState>`.
pub struct AppState {
    /// Monotonically increasing version, bumped on every board swap and
    /// config change so pollers can cheaply detect staleness.
    pub state_version: AtomicU64,

    pub engine_config: Arc<RwLock<EngineConfig>>,
    pub intake: Arc<SignalIntake>,

    board: RwLock<Arc<PublishedBoard>>,

    pub recent_errors: RwLock<Vec<ErrorRecord>>,
    pub cycles_completed: AtomicU64,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            state_version: AtomicU64::new(1),
            engine_config: Arc::new(RwLock::new(config)),
            intake: Arc::new(SignalIntake::new()),
            board: RwLock::new(Arc::new(PublishedBoard::empty(Utc::now()))),
            recent_errors: RwLock::new(Vec::new()),
            cycles_completed: AtomicU64::new(0),
            start_time: std::time::Instant::now(),
        }
    }

    // ── Version management ──────────────────────────────────────────────

    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    // ── Board snapshot ──────────────────────────────────────────────────

    /// The latest complete board.
    pub fn board(&self) -> Arc<PublishedBoard> {
        self.board.read().clone()
    }

    /// Replace the board atomically and bump the version.
    pub fn swap_board(&self, board: PublishedBoard) {
        *self.board.write() = Arc::new(board);
        self.cycles_completed.fetch_add(1, Ordering::Relaxed);
        self.increment_version();
    }

    // ── Error logging ───────────────────────────────────────────────────

    /// Record an error message in the capped ring buffer.
    pub fn push_error(&self, message: String, fatal: bool) {
        let record = ErrorRecord {
            message,
            at: Utc::now().to_rfc3339(),
            fatal,
        };

        let mut errors = self.recent_errors.write();
        errors.push(record);
        while errors.len() > MAX_RECENT_ERRORS {
            errors.remove(0);
        }
        drop(errors);

        self.increment_version();
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_swap_bumps_version_and_cycle_count() {
        let state = AppState::new(EngineConfig::default());
        let before = state.current_state_version();
        state.swap_board(PublishedBoard::empty(Utc::now()));
        assert!(state.current_state_version() > before);
        assert_eq!(state.cycles_completed.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn readers_keep_their_snapshot_across_swaps() {
        let state = AppState::new(EngineConfig::default());
        let first = state.board();
        state.swap_board(PublishedBoard::empty(Utc::now()));
        // The old Arc is still a complete, consistent board.
        assert!(first.signals.is_empty());
        assert!(!Arc::ptr_eq(&first, &state.board()));
    }

    #[test]
    fn error_ring_is_capped() {
        let state = AppState::new(EngineConfig::default());
        for i in 0..80 {
            state.push_error(format!("error {i}"), false);
        }
        let errors = state.recent_errors.read();
        assert_eq!(errors.len(), 50);
        assert_eq!(errors.last().unwrap().message, "error 79");
    }
}
