// =============================================================================
// Engine Configuration — hot-reloadable tunables with atomic save
// =============================================================================
//
// Every tunable of the scoring pipeline lives here: fusion weights,
// classification thresholds, risk templates, admission/cool-down settings and
// per-kind TTLs. The table is read once per evaluation cycle (cloned under
// the lock), so updates become visible only at cycle boundaries — never
// partially mid-cycle.
//
// Persistence uses a tmp + rename write so a crash cannot corrupt the file.
// Every field carries a serde default so older files keep loading as fields
// are added.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::aggregate::FeatureRequirement;
use crate::rank::{Ranker, TtlConfig};
use crate::score::{RiskTemplates, Scorer, ScoringWeights, Thresholds};

// =============================================================================
// Default-value helpers (required by serde `default = "..."`)
// =============================================================================

fn default_symbols() -> Vec<String> {
    vec![
        "BTCUSDT".to_string(),
        "ETHUSDT".to_string(),
        "BNBUSDT".to_string(),
        "XRPUSDT".to_string(),
        "SOLUSDT".to_string(),
    ]
}

fn default_window_minutes() -> i64 {
    5
}

fn default_news_window_minutes() -> i64 {
    240
}

fn default_eval_interval_secs() -> u64 {
    15
}

fn default_min_opportunity_score() -> f64 {
    50.0
}

fn default_cooldown_secs() -> i64 {
    300
}

fn default_min_driver_contribution() -> f64 {
    10.0
}

fn default_max_news_per_symbol() -> usize {
    10
}

fn default_sectors() -> HashMap<String, String> {
    let mut sectors = HashMap::new();
    sectors.insert("BTCUSDT".to_string(), "Layer 1".to_string());
    sectors.insert("ETHUSDT".to_string(), "Layer 1".to_string());
    sectors.insert("SOLUSDT".to_string(), "Layer 1".to_string());
    sectors.insert("BNBUSDT".to_string(), "Exchange".to_string());
    sectors.insert("XRPUSDT".to_string(), "Payments".to_string());
    sectors
}

// =============================================================================
// EngineConfig
// =============================================================================

/// Top-level runtime configuration for the Helios engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    // --- Universe & cadence --------------------------------------------------

    /// Symbols the engine evaluates each cycle.
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,

    /// Evaluation window length for raw signals.
    #[serde(default = "default_window_minutes")]
    pub window_minutes: i64,

    /// Look-back for news feeding sentiment snapshots.
    #[serde(default = "default_news_window_minutes")]
    pub news_window_minutes: i64,

    /// Seconds between evaluation cycles.
    #[serde(default = "default_eval_interval_secs")]
    pub eval_interval_secs: u64,

    // --- Scoring -------------------------------------------------------------

    /// Fusion weights keyed by feature name.
    #[serde(default)]
    pub weights: ScoringWeights,

    /// Strength thresholds and the neutral actionability floor.
    #[serde(default)]
    pub thresholds: Thresholds,

    /// Stop/target placement per strength tier.
    #[serde(default)]
    pub risk_templates: RiskTemplates,

    /// Minimum feature content a vector needs before scoring.
    #[serde(default)]
    pub requirement: FeatureRequirement,

    // --- Ranking -------------------------------------------------------------

    /// Minimum score for an opportunity card to be admitted.
    #[serde(default = "default_min_opportunity_score")]
    pub min_opportunity_score: f64,

    /// Cool-down between admitting two cards of the same kind per symbol.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: i64,

    /// Per-kind time-to-live for admitted cards.
    #[serde(default)]
    pub ttls: TtlConfig,

    /// Minimum absolute contribution for a feature to propose a card.
    #[serde(default = "default_min_driver_contribution")]
    pub min_driver_contribution: f64,

    // --- Presentation --------------------------------------------------------

    /// Cap on news items attached to one sentiment snapshot.
    #[serde(default = "default_max_news_per_symbol")]
    pub max_news_per_symbol: usize,

    /// Sector tag per symbol for the heatmap.
    #[serde(default = "default_sectors")]
    pub sectors: HashMap<String, String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            window_minutes: default_window_minutes(),
            news_window_minutes: default_news_window_minutes(),
            eval_interval_secs: default_eval_interval_secs(),
            weights: ScoringWeights::default(),
            thresholds: Thresholds::default(),
            risk_templates: RiskTemplates::default(),
            requirement: FeatureRequirement::default(),
            min_opportunity_score: default_min_opportunity_score(),
            cooldown_secs: default_cooldown_secs(),
            ttls: TtlConfig::default(),
            min_driver_contribution: default_min_driver_contribution(),
            max_news_per_symbol: default_max_news_per_symbol(),
            sectors: default_sectors(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file at `path`. Missing file is an
    /// error so the caller can fall back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read engine config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse engine config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbols = ?config.symbols,
            window_minutes = config.window_minutes,
            "engine config loaded"
        );

        Ok(config)
    }

    /// Persist to `path` via tmp + rename so a crash mid-write cannot leave
    /// a truncated file behind.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise engine config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "engine config saved (atomic)");
        Ok(())
    }

    /// Scorer built from this config's tables.
    pub fn scorer(&self) -> Scorer {
        Scorer {
            weights: self.weights.clone(),
            thresholds: self.thresholds,
            templates: self.risk_templates,
            requirement: self.requirement.clone(),
        }
    }

    /// Ranker built from this config's tables.
    pub fn ranker(&self) -> Ranker {
        Ranker {
            min_score: self.min_opportunity_score,
            cooldown: chrono::Duration::seconds(self.cooldown_secs.max(0)),
            ttls: self.ttls,
        }
    }
}
