// =============================================================================
// Normalizer — heterogeneous raw metrics onto comparable scales
// =============================================================================
//
// Each supported metric has a fixed scaling rule selected by `metric_name`.
// Scores are value-clamped to the declared bound after scaling; magnitude
// overflow is not an error. An unknown metric is an error and the record is
// dropped by the caller — silently defaulting it would corrupt downstream
// scoring.
//
// Pure functions only; no state is carried between records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::EngineError;
use crate::intake::RawSignal;

// Canonical feature names the rest of the pipeline keys on.
pub const FEATURE_RSI: &str = "rsi";
pub const FEATURE_PRICE_TREND: &str = "price_trend";
pub const FEATURE_SENTIMENT: &str = "sentiment";
pub const FEATURE_VOLUME: &str = "volume";
pub const FEATURE_ONCHAIN: &str = "onchain";
pub const FEATURE_LIQUIDITY: &str = "liquidity";

/// A raw signal rescaled into its declared bound.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedFeature {
    pub symbol: String,
    pub feature_name: String,
    pub score: f64,
    pub bound_min: f64,
    pub bound_max: f64,
    pub timestamp: DateTime<Utc>,
    pub source_id: String,
}

/// Scale `raw` onto its feature's declared bound.
///
/// Supported metrics:
///   - `rsi`                — linear passthrough, clamped to [0, 100]
///   - `price_change_pct`   — tanh compression onto [-100, 100]
///   - `sentiment_polarity` — [-1, 1] remapped linearly to [0, 100]
///   - `volume_change_pct`  — tanh compression onto [-100, 100]
///   - `whale_netflow_usd`  — tanh compression onto [-100, 100]
///   - `spread_bps`         — inverse-linear liquidity score on [0, 100]
pub fn normalize(raw: &RawSignal) -> Result<NormalizedFeature, EngineError> {
    let (feature_name, score, bound_min, bound_max) = match raw.metric_name.as_str() {
        "rsi" => (FEATURE_RSI, raw.value, 0.0, 100.0),
        "price_change_pct" => {
            // A ±10% move saturates around ±76; extreme prints stay bounded.
            (FEATURE_PRICE_TREND, (raw.value / 10.0).tanh() * 100.0, -100.0, 100.0)
        }
        "sentiment_polarity" => {
            (FEATURE_SENTIMENT, (raw.value + 1.0) / 2.0 * 100.0, 0.0, 100.0)
        }
        "volume_change_pct" => {
            (FEATURE_VOLUME, (raw.value / 50.0).tanh() * 100.0, -100.0, 100.0)
        }
        "whale_netflow_usd" => {
            // Net exchange flow in USD; $1M either way is a strong read.
            (FEATURE_ONCHAIN, (raw.value / 1_000_000.0).tanh() * 100.0, -100.0, 100.0)
        }
        "spread_bps" => {
            // Tight books score high; anything past 50bps is illiquid.
            (FEATURE_LIQUIDITY, 100.0 - raw.value * 2.0, 0.0, 100.0)
        }
        other => {
            return Err(EngineError::UnsupportedMetric {
                metric: other.to_string(),
                source_id: raw.source_id.clone(),
            })
        }
    };

    // NaN input would poison every comparison downstream; treat it like an
    // unsupported reading from this source.
    if !score.is_finite() {
        return Err(EngineError::UnsupportedMetric {
            metric: format!("{} (non-finite value)", raw.metric_name),
            source_id: raw.source_id.clone(),
        });
    }

    Ok(NormalizedFeature {
        symbol: raw.symbol.clone(),
        feature_name: feature_name.to_string(),
        score: score.clamp(bound_min, bound_max),
        bound_min,
        bound_max,
        timestamp: raw.timestamp,
        source_id: raw.source_id.clone(),
    })
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn raw(metric: &str, value: f64) -> RawSignal {
        RawSignal {
            source_id: "test".into(),
            symbol: "BTCUSDT".into(),
            timestamp: Utc::now(),
            metric_name: metric.into(),
            value,
            unit: String::new(),
        }
    }

    #[test]
    fn rsi_passes_through_within_bounds() {
        let f = normalize(&raw("rsi", 62.5)).unwrap();
        assert_eq!(f.feature_name, FEATURE_RSI);
        assert!((f.score - 62.5).abs() < 1e-12);
    }

    #[test]
    fn out_of_domain_values_are_clamped_not_wrapped() {
        let f = normalize(&raw("rsi", 140.0)).unwrap();
        assert!((f.score - 100.0).abs() < 1e-12);

        let f = normalize(&raw("rsi", -12.0)).unwrap();
        assert!(f.score.abs() < 1e-12);

        let f = normalize(&raw("spread_bps", 500.0)).unwrap();
        assert!(f.score.abs() < 1e-12);
    }

    #[test]
    fn price_delta_compression_bounds_extreme_moves() {
        let f = normalize(&raw("price_change_pct", 400.0)).unwrap();
        assert!(f.score <= 100.0);
        assert!(f.score > 99.0);

        let f = normalize(&raw("price_change_pct", -400.0)).unwrap();
        assert!(f.score >= -100.0);
        assert!(f.score < -99.0);
    }

    #[test]
    fn sentiment_polarity_remaps_linearly() {
        let f = normalize(&raw("sentiment_polarity", 0.0)).unwrap();
        assert!((f.score - 50.0).abs() < 1e-12);
        let f = normalize(&raw("sentiment_polarity", 1.0)).unwrap();
        assert!((f.score - 100.0).abs() < 1e-12);
        let f = normalize(&raw("sentiment_polarity", -1.0)).unwrap();
        assert!(f.score.abs() < 1e-12);
    }

    #[test]
    fn unknown_metric_is_an_error_not_a_default() {
        let err = normalize(&raw("astrology_index", 7.0)).unwrap_err();
        match err {
            EngineError::UnsupportedMetric { metric, .. } => {
                assert_eq!(metric, "astrology_index")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_finite_input_is_rejected() {
        assert!(normalize(&raw("rsi", f64::NAN)).is_err());
    }

    #[test]
    fn score_always_within_declared_bound() {
        for value in [-1e9, -100.0, -1.0, 0.0, 1.0, 100.0, 1e9] {
            for metric in [
                "rsi",
                "price_change_pct",
                "sentiment_polarity",
                "volume_change_pct",
                "whale_netflow_usd",
                "spread_bps",
            ] {
                let f = normalize(&raw(metric, value)).unwrap();
                assert!(f.score >= f.bound_min && f.score <= f.bound_max, "{metric} {value}");
            }
        }
    }
}
