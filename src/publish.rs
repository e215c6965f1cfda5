// =============================================================================
// Output Publisher — internal records onto the frontend wire contracts
// =============================================================================
//
// Field names here are the external contract consumed by the dashboard and
// must remain stable. No business logic: this module only maps and validates.
// Structural invariants (finite scores and prices) are re-checked at this
// boundary; a violation means an upstream bug, so assembly fails loudly and
// the previous board stays in place rather than letting a partial or
// malformed object reach the wire.
//
// Expiry is enforced at read time: the board retains every admitted card and
// `live_opportunities` filters against the caller's clock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::EngineError;
use crate::heatmap::HeatmapCell;
use crate::rank::Opportunity;
use crate::score::ScoredSignal;
use crate::sentiment::{time_ago, SentimentSnapshot};
use crate::types::{Direction, OpportunityKind, RiskLevel, Sentiment, Strength};

// =============================================================================
// Wire contracts
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorsOut {
    pub rsi: Option<f64>,
    pub trend: String,
}

/// `Signal` contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalOut {
    pub symbol: String,
    #[serde(rename = "type")]
    pub signal_type: Direction,
    pub strength: Strength,
    pub confidence: f64,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub risk_reward: f64,
    pub reasoning: Vec<String>,
    pub indicators: IndicatorsOut,
}

/// `SentimentData.news[]` contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsItemOut {
    pub id: String,
    pub title: String,
    pub source: String,
    pub sentiment: Sentiment,
    pub impact_score: i64,
    pub time_ago: String,
}

/// `SentimentData` contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentDataOut {
    pub symbol: String,
    pub overall_score: i64,
    pub label: String,
    pub top_narrative: String,
    pub news: Vec<NewsItemOut>,
}

/// `GoldenOpportunity` contract. The symbol rides inside `action`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoldenOpportunityOut {
    #[serde(rename = "type")]
    pub kind: OpportunityKind,
    pub score: f64,
    pub action: String,
    pub current_price: f64,
    pub target_price: f64,
    pub potential_profit_percent: f64,
    pub risk_level: RiskLevel,
    pub risk_factors: Vec<String>,
    pub valid_until: String,
    pub best_time: Option<String>,
    pub reasoning: Vec<String>,
}

// =============================================================================
// Published board
// =============================================================================

/// Complete output of one evaluation cycle. Swapped in atomically as an `Arc`
/// snapshot; readers always see a consistent board, never a partial one.
#[derive(Debug, Clone, Serialize)]
pub struct PublishedBoard {
    pub generated_at: DateTime<Utc>,
    pub signals: Vec<SignalOut>,
    pub sentiment: Vec<SentimentDataOut>,
    /// Internal form; filtered and mapped at read time for lazy expiry.
    pub opportunities: Vec<Opportunity>,
    pub heatmap: Vec<HeatmapCell>,
}

impl PublishedBoard {
    pub fn empty(generated_at: DateTime<Utc>) -> Self {
        Self {
            generated_at,
            signals: Vec::new(),
            sentiment: Vec::new(),
            opportunities: Vec::new(),
            heatmap: Vec::new(),
        }
    }

    /// Unexpired opportunity cards in ranked order.
    pub fn live_opportunities(&self, now: DateTime<Utc>) -> Vec<GoldenOpportunityOut> {
        self.opportunities
            .iter()
            .filter(|o| o.is_live(now))
            .map(opportunity_to_wire)
            .collect()
    }
}

fn opportunity_to_wire(o: &Opportunity) -> GoldenOpportunityOut {
    GoldenOpportunityOut {
        kind: o.kind,
        score: o.score,
        action: o.action.clone(),
        current_price: o.current_price,
        target_price: o.target_price,
        potential_profit_percent: o.potential_profit_percent,
        risk_level: o.risk_level,
        risk_factors: o.risk_factors.clone(),
        valid_until: o.valid_until.to_rfc3339(),
        best_time: o.best_time.clone(),
        reasoning: o.reasoning.clone(),
    }
}

// =============================================================================
// Assembly with boundary validation
// =============================================================================

fn ensure_finite(context: &str, values: &[(&str, f64)]) -> Result<(), EngineError> {
    for (field, value) in values {
        if !value.is_finite() {
            return Err(EngineError::Serialization(format!(
                "{context}: field '{field}' is not finite ({value})"
            )));
        }
    }
    Ok(())
}

fn signal_to_wire(signal: &ScoredSignal) -> Result<SignalOut, EngineError> {
    ensure_finite(
        &format!("signal {}", signal.symbol),
        &[
            ("confidence", signal.confidence),
            ("entry_price", signal.entry_price),
            ("stop_loss", signal.stop_loss),
            ("take_profit", signal.take_profit),
            ("risk_reward", signal.risk_reward),
        ],
    )?;
    if !(0.0..=100.0).contains(&signal.confidence) {
        return Err(EngineError::Serialization(format!(
            "signal {}: confidence {} outside [0, 100]",
            signal.symbol, signal.confidence
        )));
    }
    Ok(SignalOut {
        symbol: signal.symbol.clone(),
        signal_type: signal.direction,
        strength: signal.strength,
        confidence: signal.confidence,
        entry_price: signal.entry_price,
        stop_loss: signal.stop_loss,
        take_profit: signal.take_profit,
        risk_reward: signal.risk_reward,
        reasoning: signal.reasoning.clone(),
        indicators: IndicatorsOut {
            rsi: signal.indicators.rsi,
            trend: signal.indicators.trend.clone(),
        },
    })
}

fn sentiment_to_wire(
    snapshot: &SentimentSnapshot,
    now: DateTime<Utc>,
) -> Result<SentimentDataOut, EngineError> {
    ensure_finite(
        &format!("sentiment {}", snapshot.symbol),
        &[("overall_score", snapshot.overall_score)],
    )?;
    Ok(SentimentDataOut {
        symbol: snapshot.symbol.clone(),
        overall_score: snapshot.overall_score.round() as i64,
        label: snapshot.label.clone(),
        top_narrative: snapshot.top_narrative.clone(),
        news: snapshot
            .news
            .iter()
            .map(|item| NewsItemOut {
                id: item.id.clone(),
                title: item.title.clone(),
                source: item.source.clone(),
                sentiment: item.sentiment,
                impact_score: item.impact_score.round() as i64,
                time_ago: time_ago(item.published_at, now),
            })
            .collect(),
    })
}

fn validate_opportunity(o: &Opportunity) -> Result<(), EngineError> {
    ensure_finite(
        &format!("opportunity {} {}", o.kind, o.symbol),
        &[
            ("score", o.score),
            ("current_price", o.current_price),
            ("target_price", o.target_price),
            ("potential_profit_percent", o.potential_profit_percent),
        ],
    )
}

/// Assemble one cycle's board. Any invariant violation fails the whole
/// assembly so the previous board stays live.
pub fn assemble_board(
    now: DateTime<Utc>,
    signals: &[ScoredSignal],
    snapshots: &[SentimentSnapshot],
    opportunities: Vec<Opportunity>,
    heatmap: Vec<HeatmapCell>,
) -> Result<PublishedBoard, EngineError> {
    let signals = signals
        .iter()
        .map(signal_to_wire)
        .collect::<Result<Vec<_>, _>>()?;
    let sentiment = snapshots
        .iter()
        .map(|s| sentiment_to_wire(s, now))
        .collect::<Result<Vec<_>, _>>()?;
    for opportunity in &opportunities {
        validate_opportunity(opportunity)?;
    }

    Ok(PublishedBoard {
        generated_at: now,
        signals,
        sentiment,
        opportunities,
        heatmap,
    })
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::{FeatureContribution, IndicatorSnapshot};
    use chrono::Duration;

    fn signal() -> ScoredSignal {
        ScoredSignal {
            symbol: "BTCUSDT".into(),
            direction: Direction::Long,
            strength: Strength::Strong,
            confidence: 82.0,
            entry_price: 45000.0,
            stop_loss: 44200.0,
            take_profit: 47500.0,
            risk_reward: 3.125,
            reasoning: vec!["price_trend: reading +80.0 at weight 0.70 contributed +56.0".into()],
            indicators: IndicatorSnapshot {
                rsi: Some(28.0),
                trend: "UP".into(),
            },
            contributions: vec![FeatureContribution {
                feature: "price_trend".into(),
                weight: 0.7,
                component: 80.0,
                contribution: 56.0,
            }],
            composite: 72.0,
            created_at: Utc::now(),
        }
    }

    fn opportunity(now: DateTime<Utc>, ttl_secs: i64) -> Opportunity {
        Opportunity {
            id: "op-1".into(),
            symbol: "BTCUSDT".into(),
            kind: OpportunityKind::Timing,
            score: 82.0,
            risk_level: RiskLevel::Low,
            action: "BUY BTCUSDT".into(),
            current_price: 45000.0,
            target_price: 47500.0,
            potential_profit_percent: (47500.0 - 45000.0) / 45000.0 * 100.0,
            valid_until: now + Duration::seconds(ttl_secs),
            best_time: Some("next 15 minutes".into()),
            risk_factors: vec![],
            reasoning: vec!["test".into()],
            created_at: now,
        }
    }

    #[test]
    fn signal_wire_uses_the_contract_field_names() {
        let now = Utc::now();
        let board = assemble_board(now, &[signal()], &[], vec![], vec![]).unwrap();
        let value = serde_json::to_value(&board.signals[0]).unwrap();
        let obj = value.as_object().unwrap();
        for key in [
            "symbol",
            "type",
            "strength",
            "confidence",
            "entry_price",
            "stop_loss",
            "take_profit",
            "risk_reward",
            "reasoning",
            "indicators",
        ] {
            assert!(obj.contains_key(key), "missing key {key}");
        }
        assert_eq!(obj["type"], "LONG");
        assert_eq!(obj["strength"], "STRONG");
        assert!(obj["indicators"].as_object().unwrap().contains_key("rsi"));
        assert!(obj["indicators"].as_object().unwrap().contains_key("trend"));
    }

    #[test]
    fn golden_opportunity_wire_matches_contract() {
        let now = Utc::now();
        let board =
            assemble_board(now, &[], &[], vec![opportunity(now, 300)], vec![]).unwrap();
        let live = board.live_opportunities(now);
        let value = serde_json::to_value(&live[0]).unwrap();
        let obj = value.as_object().unwrap();
        for key in [
            "type",
            "score",
            "action",
            "current_price",
            "target_price",
            "potential_profit_percent",
            "risk_level",
            "risk_factors",
            "valid_until",
            "best_time",
            "reasoning",
        ] {
            assert!(obj.contains_key(key), "missing key {key}");
        }
        assert_eq!(obj["type"], "TIMING");
        assert_eq!(obj["risk_level"], "LOW");
        // The symbol travels inside the action string.
        assert!(obj["action"].as_str().unwrap().contains("BTCUSDT"));
    }

    #[test]
    fn expired_cards_are_filtered_at_read_time() {
        let now = Utc::now();
        let board = assemble_board(now, &[], &[], vec![opportunity(now, 60)], vec![]).unwrap();
        assert_eq!(board.live_opportunities(now).len(), 1);
        assert!(board
            .live_opportunities(now + Duration::seconds(120))
            .is_empty());
    }

    #[test]
    fn nan_confidence_fails_assembly() {
        let mut bad = signal();
        bad.confidence = f64::NAN;
        let err = assemble_board(Utc::now(), &[bad], &[], vec![], vec![]).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn out_of_range_confidence_fails_assembly() {
        let mut bad = signal();
        bad.confidence = 140.0;
        assert!(assemble_board(Utc::now(), &[bad], &[], vec![], vec![]).is_err());
    }

    #[test]
    fn sentiment_wire_humanizes_item_age() {
        let now = Utc::now();
        let snapshot = crate::sentiment::build_snapshot(
            "BTCUSDT",
            &[crate::intake::NewsEvent {
                id: "n-1".into(),
                symbol: "BTCUSDT".into(),
                title: "ETF flows accelerate".into(),
                source: "wire".into(),
                polarity: 0.7,
                impact_score: 85.0,
                published_at: now - Duration::minutes(42),
            }],
            10,
        )
        .unwrap();
        let board = assemble_board(now, &[], &[snapshot], vec![], vec![]).unwrap();
        assert_eq!(board.sentiment[0].news[0].time_ago, "42m ago");
        assert_eq!(board.sentiment[0].news[0].sentiment, Sentiment::Bullish);
    }
}
