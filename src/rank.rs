// =============================================================================
// Opportunity Ranker — dedup, admission, expiry, ordering
// =============================================================================
//
// Candidates are derived from scored signals, merged with the still-live
// cards from the previous cycle, deduplicated per symbol+kind inside the
// cool-down window, admitted against a minimum score, stamped with a
// kind-specific TTL, and returned in descending score order with a recency
// tie-break. Expiry is lazy: expired cards are filtered at read time, never
// actively evicted.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::score::ScoredSignal;
use crate::types::{Direction, OpportunityKind, RiskLevel, Strength};

// =============================================================================
// Configuration blocks (embedded in EngineConfig)
// =============================================================================

/// Time-to-live per opportunity kind. Arbitrage windows close in minutes;
/// trader-copy windows stay open up to an hour.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TtlConfig {
    pub arbitrage_secs: i64,
    pub timing_secs: i64,
    pub volume_secs: i64,
    pub trader_secs: i64,
}

impl TtlConfig {
    pub fn for_kind(&self, kind: OpportunityKind) -> Duration {
        let secs = match kind {
            OpportunityKind::Arbitrage => self.arbitrage_secs,
            OpportunityKind::Timing => self.timing_secs,
            OpportunityKind::Volume => self.volume_secs,
            OpportunityKind::Trader => self.trader_secs,
        };
        Duration::seconds(secs.max(1))
    }
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            arbitrage_secs: 300,
            timing_secs: 900,
            volume_secs: 1800,
            trader_secs: 3600,
        }
    }
}

// =============================================================================
// Candidate derivation
// =============================================================================

/// A proposed opportunity card, before admission and expiry stamping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpportunityCandidate {
    pub symbol: String,
    pub kind: OpportunityKind,
    pub score: f64,
    pub risk_level: RiskLevel,
    pub action: String,
    pub current_price: f64,
    pub target_price: f64,
    pub risk_factors: Vec<String>,
    pub reasoning: Vec<String>,
    pub best_time: Option<String>,
    pub created_at: DateTime<Utc>,
}

fn kind_for_feature(feature: &str) -> Option<OpportunityKind> {
    match feature {
        crate::normalize::FEATURE_PRICE_TREND | crate::normalize::FEATURE_RSI => {
            Some(OpportunityKind::Timing)
        }
        crate::normalize::FEATURE_VOLUME => Some(OpportunityKind::Volume),
        crate::normalize::FEATURE_ONCHAIN => Some(OpportunityKind::Trader),
        _ => None,
    }
}

fn risk_level_for(signal: &ScoredSignal) -> RiskLevel {
    if signal.confidence >= 75.0 {
        RiskLevel::Low
    } else if signal.confidence >= 50.0 {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    }
}

fn risk_factors_for(signal: &ScoredSignal) -> Vec<String> {
    let mut factors = Vec::new();
    for c in &signal.contributions {
        if c.component != 0.0 && c.component.signum() != signal.composite.signum() {
            factors.push(format!("{} reads against the composite direction", c.feature));
        }
    }
    if signal.risk_reward < 2.0 {
        factors.push(format!("risk/reward {:.2} below 2.0", signal.risk_reward));
    }
    if signal.strength == Strength::Weak {
        factors.push("weak composite magnitude".to_string());
    }
    factors
}

/// Derive opportunity candidates from a scored signal.
///
/// Each driving feature with a contribution past `min_driver_contribution`
/// proposes a card of its kind; a high liquidity reading on a STRONG signal
/// additionally proposes an arbitrage card. Candidate scores blend signal
/// confidence with the driver's own reading, so opportunity `score` and
/// signal `confidence` come from the same scoring model.
pub fn candidates_from_signal(
    signal: &ScoredSignal,
    liquidity_score: Option<f64>,
    min_driver_contribution: f64,
    now: DateTime<Utc>,
) -> Vec<OpportunityCandidate> {
    let side = match signal.direction {
        Direction::Long => "BUY",
        _ => "SELL",
    };
    let action = format!("{side} {}", signal.symbol);
    let risk_level = risk_level_for(signal);
    let risk_factors = risk_factors_for(signal);

    let mut candidates: Vec<OpportunityCandidate> = Vec::new();
    let mut push = |kind: OpportunityKind, driver_reading: f64| {
        // Contributions arrive sorted by magnitude, so the first driver that
        // proposes a given kind is also its strongest.
        if candidates.iter().any(|c| c.kind == kind) {
            return;
        }
        let score = (0.6 * signal.confidence + 0.4 * driver_reading.abs()).clamp(0.0, 100.0);
        candidates.push(OpportunityCandidate {
            symbol: signal.symbol.clone(),
            kind,
            score,
            risk_level,
            action: action.clone(),
            current_price: signal.entry_price,
            target_price: signal.take_profit,
            risk_factors: risk_factors.clone(),
            reasoning: signal.reasoning.clone(),
            best_time: None,
            created_at: now,
        });
    };

    for c in &signal.contributions {
        if c.contribution.abs() < min_driver_contribution {
            continue;
        }
        if let Some(kind) = kind_for_feature(&c.feature) {
            push(kind, c.component);
        }
    }

    if let Some(liquidity) = liquidity_score {
        if liquidity >= 70.0 && signal.strength == Strength::Strong {
            push(OpportunityKind::Arbitrage, liquidity);
        }
    }

    candidates
}

// =============================================================================
// Opportunity
// =============================================================================

/// An admitted, expiry-stamped opportunity card. Created only by the ranker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: String,
    pub symbol: String,
    pub kind: OpportunityKind,
    pub score: f64,
    pub risk_level: RiskLevel,
    pub action: String,
    pub current_price: f64,
    pub target_price: f64,
    pub potential_profit_percent: f64,
    pub valid_until: DateTime<Utc>,
    pub best_time: Option<String>,
    pub risk_factors: Vec<String>,
    pub reasoning: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Opportunity {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now <= self.valid_until
    }
}

fn profit_percent(current: f64, target: f64) -> f64 {
    if current == 0.0 {
        return 0.0;
    }
    (target - current) / current * 100.0
}

// =============================================================================
// Ranker
// =============================================================================

pub struct Ranker {
    pub min_score: f64,
    pub cooldown: Duration,
    pub ttls: TtlConfig,
}

impl Default for Ranker {
    fn default() -> Self {
        Self {
            min_score: 50.0,
            cooldown: Duration::seconds(300),
            ttls: TtlConfig::default(),
        }
    }
}

impl Ranker {
    /// Rank this cycle's candidates against the still-live cards from the
    /// previous cycle. Deterministic for a fixed `now`.
    pub fn rank(
        &self,
        candidates: Vec<OpportunityCandidate>,
        prior: &[Opportunity],
        now: DateTime<Utc>,
    ) -> Vec<Opportunity> {
        // ── Admission ───────────────────────────────────────────────────
        let mut admitted: Vec<OpportunityCandidate> = Vec::new();
        for candidate in candidates {
            if candidate.score < self.min_score {
                debug!(
                    symbol = %candidate.symbol,
                    kind = %candidate.kind,
                    score = candidate.score,
                    "candidate below admission threshold"
                );
                continue;
            }
            admitted.push(candidate);
        }

        // ── Dedup per symbol+kind ───────────────────────────────────────
        // Within the candidate set the highest score wins; on an exact tie
        // the most recently created candidate wins (favors freshness).
        admitted.sort_by(|a, b| {
            (a.symbol.as_str(), a.kind)
                .cmp(&(b.symbol.as_str(), b.kind))
                .then(
                    b.score
                        .partial_cmp(&a.score)
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
                .then(b.created_at.cmp(&a.created_at))
        });
        admitted.dedup_by(|a, b| a.symbol == b.symbol && a.kind == b.kind);

        // ── Merge with live prior cards ─────────────────────────────────
        let mut output: Vec<Opportunity> = Vec::new();
        for candidate in admitted {
            let carried = prior.iter().find(|p| {
                p.symbol == candidate.symbol && p.kind == candidate.kind && p.is_live(now)
            });
            match carried {
                // A live card inside the cool-down only yields to a higher
                // scoring replacement; equal scores favor the fresher card.
                Some(existing)
                    if now - existing.created_at < self.cooldown
                        && existing.score > candidate.score =>
                {
                    output.push(existing.clone());
                }
                _ => output.push(self.admit(candidate, now)),
            }
        }

        // Carry forward live cards whose symbol+kind produced no candidate
        // this cycle; they drop off on expiry.
        for existing in prior {
            if existing.is_live(now)
                && !output
                    .iter()
                    .any(|o| o.symbol == existing.symbol && o.kind == existing.kind)
            {
                output.push(existing.clone());
            }
        }

        // ── Total order: score desc, recency, then stable keys ──────────
        output.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.created_at.cmp(&a.created_at))
                .then(a.symbol.cmp(&b.symbol))
                .then(a.kind.cmp(&b.kind))
        });
        output
    }

    fn admit(&self, candidate: OpportunityCandidate, now: DateTime<Utc>) -> Opportunity {
        let ttl = self.ttls.for_kind(candidate.kind);
        let best_time = candidate.best_time.or_else(|| {
            (candidate.kind == OpportunityKind::Timing)
                .then(|| format!("next {} minutes", ttl.num_minutes().max(1)))
        });
        Opportunity {
            id: uuid::Uuid::new_v4().to_string(),
            symbol: candidate.symbol,
            kind: candidate.kind,
            score: candidate.score,
            risk_level: candidate.risk_level,
            action: candidate.action,
            current_price: candidate.current_price,
            target_price: candidate.target_price,
            potential_profit_percent: profit_percent(
                candidate.current_price,
                candidate.target_price,
            ),
            valid_until: now + ttl,
            best_time,
            risk_factors: candidate.risk_factors,
            reasoning: candidate.reasoning,
            created_at: candidate.created_at,
        }
    }
}
