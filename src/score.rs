// =============================================================================
// Scorer — weighted feature fusion into directional, risk-bounded signals
// =============================================================================
//
// Pipeline per feature vector:
//   1. Convert each feature reading into a directional component in [-100, 100]
//   2. Weighted linear fusion, weights renormalized over the features present
//   3. Classify direction and strength against configured thresholds
//   4. Confidence from magnitude and feature agreement
//   5. Stop/target placement from the per-strength risk template
//   6. Deterministic reasoning trace, ordered by contribution magnitude
//
// The scorer is a pure function of (vector, price, now); reruns on the same
// inputs reproduce the same signal byte for byte.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aggregate::{FeatureRequirement, FeatureVector};
use crate::errors::EngineError;
use crate::normalize::{
    FEATURE_LIQUIDITY, FEATURE_ONCHAIN, FEATURE_PRICE_TREND, FEATURE_RSI, FEATURE_SENTIMENT,
    FEATURE_VOLUME,
};
use crate::types::{Direction, Strength};

// =============================================================================
// Configuration blocks (embedded in EngineConfig)
// =============================================================================

/// Fusion weights keyed by feature name. Features absent from this table do
/// not participate in the composite (liquidity feeds classification and the
/// heatmap instead).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub weights: HashMap<String, f64>,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        let mut weights = HashMap::new();
        weights.insert(FEATURE_PRICE_TREND.to_string(), 0.35);
        weights.insert(FEATURE_RSI.to_string(), 0.15);
        weights.insert(FEATURE_SENTIMENT.to_string(), 0.20);
        weights.insert(FEATURE_VOLUME.to_string(), 0.15);
        weights.insert(FEATURE_ONCHAIN.to_string(), 0.15);
        Self { weights }
    }
}

/// Strength classification thresholds on the composite magnitude.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Thresholds {
    pub strong: f64,
    pub moderate: f64,
    /// Composite magnitudes inside this floor are treated as neutral and
    /// produce no signal.
    pub actionability_floor: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            strong: 70.0,
            moderate: 40.0,
            actionability_floor: 10.0,
        }
    }
}

/// Stop/target placement for one strength tier, as percentages of entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RiskTemplate {
    pub stop_pct: f64,
    pub target_pct: f64,
}

/// Risk templates per strength tier. Stronger conviction runs a tighter stop
/// and a wider target.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RiskTemplates {
    pub strong: RiskTemplate,
    pub moderate: RiskTemplate,
    pub weak: RiskTemplate,
}

impl RiskTemplates {
    pub fn for_strength(&self, strength: Strength) -> RiskTemplate {
        match strength {
            Strength::Strong => self.strong,
            Strength::Moderate => self.moderate,
            Strength::Weak => self.weak,
        }
    }
}

impl Default for RiskTemplates {
    fn default() -> Self {
        Self {
            strong: RiskTemplate { stop_pct: 1.8, target_pct: 5.6 },
            moderate: RiskTemplate { stop_pct: 2.5, target_pct: 5.0 },
            weak: RiskTemplate { stop_pct: 3.0, target_pct: 4.5 },
        }
    }
}

// =============================================================================
// Output types
// =============================================================================

/// One feature's share of the composite score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureContribution {
    pub feature: String,
    /// Renormalized weight over the features present in this vector.
    pub weight: f64,
    /// Directional reading in [-100, 100].
    pub component: f64,
    pub contribution: f64,
}

/// Indicator readings surfaced alongside the signal on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub rsi: Option<f64>,
    pub trend: String,
}

/// A fully classified directional signal. Read-only downstream of the scorer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredSignal {
    pub symbol: String,
    pub direction: Direction,
    pub strength: Strength,
    /// Percentage in [0, 100].
    pub confidence: f64,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub risk_reward: f64,
    pub reasoning: Vec<String>,
    pub indicators: IndicatorSnapshot,
    pub contributions: Vec<FeatureContribution>,
    /// Composite directional magnitude in [-100, 100].
    pub composite: f64,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Scorer
// =============================================================================

pub struct Scorer {
    pub weights: ScoringWeights,
    pub thresholds: Thresholds,
    pub templates: RiskTemplates,
    pub requirement: FeatureRequirement,
}

impl Default for Scorer {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            thresholds: Thresholds::default(),
            templates: RiskTemplates::default(),
            requirement: FeatureRequirement::default(),
        }
    }
}

/// `|take_profit - entry| / |entry - stop_loss|` — the published contract.
pub fn risk_reward(entry: f64, stop: f64, target: f64) -> f64 {
    (target - entry).abs() / (entry - stop).abs()
}

impl Scorer {
    /// Score one feature vector against the current reference price.
    ///
    /// Returns `Ok(None)` when the vector is insufficient or the composite
    /// falls inside the actionability floor; `Err` only for degenerate risk
    /// geometry.
    pub fn score(
        &self,
        vector: &FeatureVector,
        current_price: f64,
        now: DateTime<Utc>,
    ) -> Result<Option<ScoredSignal>, EngineError> {
        if let Err(e) = vector.require(&self.requirement) {
            debug!(symbol = %vector.symbol, error = %e, "vector excluded from scoring");
            return Ok(None);
        }

        // ── 1. Directional components for weighted features ──────────────
        let mut present: Vec<(&str, f64, f64)> = Vec::new(); // (name, component, raw weight)
        for (name, raw_weight) in &self.weights.weights {
            if *raw_weight <= 0.0 {
                continue;
            }
            let Some(feature) = vector.get(name) else { continue };
            let Some(component) = directional_component(name, feature.score) else {
                continue;
            };
            present.push((name.as_str(), component, *raw_weight));
        }
        // Fixed summation order keeps the composite reproducible; the weight
        // table is a HashMap and iterates in arbitrary order.
        present.sort_by(|a, b| a.0.cmp(b.0));

        let total_weight: f64 = present.iter().map(|(_, _, w)| w).sum();
        if total_weight <= 0.0 {
            debug!(symbol = %vector.symbol, "no weighted features present");
            return Ok(None);
        }

        // ── 2. Renormalized fusion ───────────────────────────────────────
        // Missing features must not drag the composite toward neutral, so
        // the weight mass is redistributed over what is actually present.
        let mut contributions: Vec<FeatureContribution> = present
            .iter()
            .map(|(name, component, raw_weight)| {
                let weight = raw_weight / total_weight;
                FeatureContribution {
                    feature: name.to_string(),
                    weight,
                    component: *component,
                    contribution: weight * component,
                }
            })
            .collect();
        let composite: f64 = contributions.iter().map(|c| c.contribution).sum();

        // ── 3. Direction & strength ──────────────────────────────────────
        let magnitude = composite.abs();
        // A perfectly neutral composite is never directional, even with the
        // floor configured down to zero.
        if magnitude < self.thresholds.actionability_floor || composite == 0.0 {
            debug!(symbol = %vector.symbol, composite, "composite inside actionability floor");
            return Ok(None);
        }
        let direction = if composite > 0.0 { Direction::Long } else { Direction::Short };
        let strength = if magnitude >= self.thresholds.strong {
            Strength::Strong
        } else if magnitude >= self.thresholds.moderate {
            Strength::Moderate
        } else {
            Strength::Weak
        };

        // ── 4. Confidence ────────────────────────────────────────────────
        let nonzero = contributions.iter().filter(|c| c.component != 0.0).count();
        let agreeing = contributions
            .iter()
            .filter(|c| c.component != 0.0 && c.component.signum() == composite.signum())
            .count();
        let agreement = if nonzero == 0 { 0.0 } else { agreeing as f64 / nonzero as f64 };
        let confidence = (magnitude * (0.5 + 0.5 * agreement)).clamp(0.0, 100.0);

        // ── 5. Risk geometry ─────────────────────────────────────────────
        let template = self.templates.for_strength(strength);
        let (stop_loss, take_profit, ratio) =
            place_risk_geometry(&vector.symbol, direction, current_price, template)?;

        // ── 6. Reasoning trace ───────────────────────────────────────────
        contributions.sort_by(|a, b| {
            b.contribution
                .abs()
                .partial_cmp(&a.contribution.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.feature.cmp(&b.feature))
        });
        let reasoning: Vec<String> = contributions
            .iter()
            .map(|c| {
                format!(
                    "{}: reading {:+.1} at weight {:.2} contributed {:+.1}",
                    c.feature, c.component, c.weight, c.contribution
                )
            })
            .collect();

        let indicators = IndicatorSnapshot {
            rsi: vector.get(FEATURE_RSI).map(|f| f.score),
            trend: trend_label(vector.get(FEATURE_PRICE_TREND).map(|f| f.score)),
        };

        Ok(Some(ScoredSignal {
            symbol: vector.symbol.clone(),
            direction,
            strength,
            confidence,
            entry_price: current_price,
            stop_loss,
            take_profit,
            risk_reward: ratio,
            reasoning,
            indicators,
            contributions,
            composite,
            created_at: now,
        }))
    }
}

/// Map a feature reading onto a directional component in [-100, 100].
/// Returns `None` for non-directional features.
fn directional_component(name: &str, score: f64) -> Option<f64> {
    match name {
        // Oversold is a long read, overbought a short read.
        FEATURE_RSI => Some((50.0 - score) * 2.0),
        FEATURE_SENTIMENT => Some((score - 50.0) * 2.0),
        FEATURE_LIQUIDITY => None,
        // Bipolar features carry their own sign.
        _ => Some(score),
    }
}

fn trend_label(price_trend: Option<f64>) -> String {
    match price_trend {
        Some(score) if score >= 15.0 => "UP".to_string(),
        Some(score) if score <= -15.0 => "DOWN".to_string(),
        _ => "FLAT".to_string(),
    }
}

/// Place stop and target around `entry` per the template and validate the
/// resulting ratio. A non-positive or non-finite ratio never leaves this
/// function as a signal.
fn place_risk_geometry(
    symbol: &str,
    direction: Direction,
    entry: f64,
    template: RiskTemplate,
) -> Result<(f64, f64, f64), EngineError> {
    if !entry.is_finite() || entry <= 0.0 {
        return Err(EngineError::InvalidRiskGeometry {
            symbol: symbol.to_string(),
            entry,
            stop: 0.0,
            target: 0.0,
        });
    }

    let stop_dist = entry * (template.stop_pct / 100.0);
    let target_dist = entry * (template.target_pct / 100.0);
    let (stop, target) = match direction {
        Direction::Long => (entry - stop_dist, entry + target_dist),
        _ => (entry + stop_dist, entry - target_dist),
    };

    let ratio = risk_reward(entry, stop, target);
    if !ratio.is_finite() || ratio <= 0.0 || stop == entry {
        return Err(EngineError::InvalidRiskGeometry {
            symbol: symbol.to_string(),
            entry,
            stop,
            target,
        });
    }
    Ok((stop, target, ratio))
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{aggregate, Window};
    use crate::normalize::NormalizedFeature;

    fn feature(name: &str, score: f64, ts: DateTime<Utc>) -> NormalizedFeature {
        let (lo, hi) = match name {
            FEATURE_RSI | FEATURE_SENTIMENT | FEATURE_LIQUIDITY => (0.0, 100.0),
            _ => (-100.0, 100.0),
        };
        NormalizedFeature {
            symbol: "BTCUSDT".into(),
            feature_name: name.into(),
            score,
            bound_min: lo,
            bound_max: hi,
            timestamp: ts,
            source_id: "test".into(),
        }
    }

    fn vector(features: &[(&str, f64)]) -> FeatureVector {
        let now = Utc::now();
        let window = Window::ending_at(now, 5);
        let normalized: Vec<NormalizedFeature> = features
            .iter()
            .map(|(name, score)| feature(name, *score, now))
            .collect();
        aggregate(&normalized, window).remove(0)
    }

    #[test]
    fn risk_reward_matches_contract_formula() {
        // STRONG BTCUSDT example from the dashboard contract.
        let rr = risk_reward(45000.0, 44200.0, 47500.0);
        assert!((rr - 3.125).abs() < 1e-9);
    }

    #[test]
    fn trend_only_vector_yields_no_signal() {
        let scorer = Scorer::default();
        let v = vector(&[(FEATURE_PRICE_TREND, 80.0)]);
        let result = scorer.score(&v, 45000.0, Utc::now()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn negative_sixty_composite_is_short_moderate() {
        let scorer = Scorer::default();
        // Equal components renormalize to the component value itself.
        let v = vector(&[(FEATURE_PRICE_TREND, -60.0), (FEATURE_VOLUME, -60.0)]);
        let signal = scorer.score(&v, 45000.0, Utc::now()).unwrap().unwrap();
        assert!((signal.composite + 60.0).abs() < 1e-9);
        assert_eq!(signal.direction, Direction::Short);
        assert_eq!(signal.strength, Strength::Moderate);
    }

    #[test]
    fn weights_renormalize_over_present_features() {
        let scorer = Scorer::default();
        // price_trend 0.35, volume 0.15 -> (0.35*80 + 0.15*40) / 0.5 = 68.
        let v = vector(&[(FEATURE_PRICE_TREND, 80.0), (FEATURE_VOLUME, 40.0)]);
        let signal = scorer.score(&v, 45000.0, Utc::now()).unwrap().unwrap();
        assert!((signal.composite - 68.0).abs() < 1e-9);
    }

    #[test]
    fn confidence_reflects_magnitude_and_agreement() {
        let scorer = Scorer::default();

        // Fully agreeing: composite 60, agreement 1.0 -> confidence 60.
        let v = vector(&[(FEATURE_PRICE_TREND, 60.0), (FEATURE_VOLUME, 60.0)]);
        let signal = scorer.score(&v, 45000.0, Utc::now()).unwrap().unwrap();
        assert!((signal.confidence - 60.0).abs() < 1e-9);

        // One dissenter: (0.35*100 - 0.15*20) / 0.5 = 64, agreement 0.5
        // -> confidence 64 * 0.75 = 48.
        let v = vector(&[(FEATURE_PRICE_TREND, 100.0), (FEATURE_VOLUME, -20.0)]);
        let signal = scorer.score(&v, 45000.0, Utc::now()).unwrap().unwrap();
        assert!((signal.confidence - 48.0).abs() < 1e-9);
        assert!(signal.confidence <= 100.0 && signal.confidence >= 0.0);
    }

    #[test]
    fn neutral_composite_inside_floor_yields_no_signal() {
        let scorer = Scorer::default();
        let v = vector(&[(FEATURE_PRICE_TREND, 5.0), (FEATURE_VOLUME, 5.0)]);
        assert!(scorer.score(&v, 45000.0, Utc::now()).unwrap().is_none());
    }

    #[test]
    fn zero_composite_yields_no_signal_even_with_a_zero_floor() {
        let mut scorer = Scorer::default();
        scorer.thresholds.actionability_floor = 0.0;
        let v = vector(&[(FEATURE_PRICE_TREND, 0.0), (FEATURE_VOLUME, 0.0)]);
        assert!(scorer.score(&v, 45000.0, Utc::now()).unwrap().is_none());
    }

    #[test]
    fn risk_reward_is_positive_and_finite() {
        let scorer = Scorer::default();
        let v = vector(&[(FEATURE_PRICE_TREND, -60.0), (FEATURE_VOLUME, -60.0)]);
        let signal = scorer.score(&v, 200.0, Utc::now()).unwrap().unwrap();
        assert!(signal.risk_reward.is_finite());
        assert!(signal.risk_reward > 0.0);
        let expected = risk_reward(signal.entry_price, signal.stop_loss, signal.take_profit);
        assert!((signal.risk_reward - expected).abs() < 1e-12);
    }

    #[test]
    fn invalid_price_is_rejected_as_risk_geometry_error() {
        let scorer = Scorer::default();
        let v = vector(&[(FEATURE_PRICE_TREND, 60.0), (FEATURE_VOLUME, 60.0)]);
        let err = scorer.score(&v, 0.0, Utc::now()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidRiskGeometry { .. }));
    }

    #[test]
    fn reasoning_is_ordered_by_contribution_and_reproducible() {
        let scorer = Scorer::default();
        let v = vector(&[
            (FEATURE_PRICE_TREND, 80.0),
            (FEATURE_VOLUME, 20.0),
            (FEATURE_SENTIMENT, 75.0),
        ]);
        let now = Utc::now();
        let a = scorer.score(&v, 45000.0, now).unwrap().unwrap();
        let b = scorer.score(&v, 45000.0, now).unwrap().unwrap();
        assert_eq!(a.reasoning, b.reasoning);
        assert!(a.reasoning[0].starts_with(FEATURE_PRICE_TREND));
        for pair in a.contributions.windows(2) {
            assert!(pair[0].contribution.abs() >= pair[1].contribution.abs());
        }
    }

    #[test]
    fn short_signals_place_stop_above_and_target_below_entry() {
        let scorer = Scorer::default();
        let v = vector(&[(FEATURE_PRICE_TREND, -80.0), (FEATURE_ONCHAIN, -80.0)]);
        let signal = scorer.score(&v, 100.0, Utc::now()).unwrap().unwrap();
        assert_eq!(signal.direction, Direction::Short);
        assert!(signal.stop_loss > signal.entry_price);
        assert!(signal.take_profit < signal.entry_price);
    }
}
