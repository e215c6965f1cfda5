// =============================================================================
// Feature Aggregator — per-symbol feature vectors for one evaluation window
// =============================================================================
//
// Groups normalized features by symbol within a fixed window. When the same
// feature name arrives twice in a window, the latest timestamp wins and the
// earlier value is discarded. The aggregator holds no state across windows;
// each window is computed independently from its inputs.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::EngineError;
use crate::normalize::{NormalizedFeature, FEATURE_ONCHAIN, FEATURE_PRICE_TREND, FEATURE_SENTIMENT, FEATURE_VOLUME};

/// Half-open evaluation window; features are admitted on `[start, end]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    pub fn ending_at(end: DateTime<Utc>, minutes: i64) -> Self {
        Self {
            start: end - chrono::Duration::minutes(minutes.max(1)),
            end,
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts <= self.end
    }
}

/// Minimum feature content a vector needs before scoring is meaningful.
/// One trend print alone must not produce a high-conviction signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureRequirement {
    pub required: String,
    pub supporting: Vec<String>,
}

impl Default for FeatureRequirement {
    fn default() -> Self {
        Self {
            required: FEATURE_PRICE_TREND.to_string(),
            supporting: vec![
                FEATURE_SENTIMENT.to_string(),
                FEATURE_VOLUME.to_string(),
                FEATURE_ONCHAIN.to_string(),
            ],
        }
    }
}

/// All features observed for one symbol in one window, keyed by feature name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureVector {
    pub symbol: String,
    pub window: Window,
    pub features: HashMap<String, NormalizedFeature>,
}

impl FeatureVector {
    pub fn get(&self, feature_name: &str) -> Option<&NormalizedFeature> {
        self.features.get(feature_name)
    }

    /// Check the minimum feature requirement.
    pub fn require(&self, req: &FeatureRequirement) -> Result<(), EngineError> {
        let has_required = self.features.contains_key(&req.required);
        let has_supporting = req
            .supporting
            .iter()
            .any(|name| self.features.contains_key(name));
        if has_required && has_supporting {
            Ok(())
        } else {
            Err(EngineError::InsufficientData {
                symbol: self.symbol.clone(),
                present: self.features.len(),
                required: req.required.clone(),
            })
        }
    }
}

/// Build per-symbol feature vectors from `features`, keeping only records
/// inside `window`. Output is sorted by symbol so downstream iteration is
/// deterministic regardless of input order.
pub fn aggregate(features: &[NormalizedFeature], window: Window) -> Vec<FeatureVector> {
    let mut by_symbol: HashMap<String, HashMap<String, NormalizedFeature>> = HashMap::new();

    for feature in features {
        if !window.contains(feature.timestamp) {
            continue;
        }
        let bucket = by_symbol.entry(feature.symbol.clone()).or_default();
        match bucket.get(&feature.feature_name) {
            // Latest observation wins; on an exact timestamp tie the record
            // seen later in the sequence wins.
            Some(existing) if existing.timestamp > feature.timestamp => {}
            _ => {
                bucket.insert(feature.feature_name.clone(), feature.clone());
            }
        }
    }

    let mut vectors: Vec<FeatureVector> = by_symbol
        .into_iter()
        .map(|(symbol, features)| FeatureVector {
            symbol,
            window,
            features,
        })
        .collect();
    vectors.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    vectors
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn feature(symbol: &str, name: &str, score: f64, ts: DateTime<Utc>) -> NormalizedFeature {
        NormalizedFeature {
            symbol: symbol.into(),
            feature_name: name.into(),
            score,
            bound_min: -100.0,
            bound_max: 100.0,
            timestamp: ts,
            source_id: "test".into(),
        }
    }

    #[test]
    fn latest_observation_wins_within_window() {
        let now = Utc::now();
        let window = Window::ending_at(now, 5);
        let features = vec![
            feature("BTCUSDT", FEATURE_PRICE_TREND, 20.0, now - Duration::minutes(3)),
            feature("BTCUSDT", FEATURE_PRICE_TREND, 55.0, now - Duration::minutes(1)),
        ];
        let vectors = aggregate(&features, window);
        assert_eq!(vectors.len(), 1);
        let v = vectors[0].get(FEATURE_PRICE_TREND).unwrap();
        assert!((v.score - 55.0).abs() < f64::EPSILON);
    }

    #[test]
    fn last_writer_wins_regardless_of_input_order() {
        let now = Utc::now();
        let window = Window::ending_at(now, 5);
        let newer = feature("BTCUSDT", FEATURE_PRICE_TREND, 55.0, now - Duration::minutes(1));
        let older = feature("BTCUSDT", FEATURE_PRICE_TREND, 20.0, now - Duration::minutes(3));
        let vectors = aggregate(&[newer.clone(), older], window);
        let v = vectors[0].get(FEATURE_PRICE_TREND).unwrap();
        assert!((v.score - 55.0).abs() < f64::EPSILON);
    }

    #[test]
    fn records_outside_window_are_excluded() {
        let now = Utc::now();
        let window = Window::ending_at(now, 5);
        let features = vec![feature(
            "BTCUSDT",
            FEATURE_PRICE_TREND,
            20.0,
            now - Duration::minutes(30),
        )];
        assert!(aggregate(&features, window).is_empty());
    }

    #[test]
    fn symbols_are_grouped_and_sorted() {
        let now = Utc::now();
        let window = Window::ending_at(now, 5);
        let features = vec![
            feature("ETHUSDT", FEATURE_PRICE_TREND, 10.0, now),
            feature("BTCUSDT", FEATURE_PRICE_TREND, 20.0, now),
        ];
        let vectors = aggregate(&features, window);
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0].symbol, "BTCUSDT");
        assert_eq!(vectors[1].symbol, "ETHUSDT");
    }

    #[test]
    fn trend_only_vector_is_insufficient() {
        let now = Utc::now();
        let window = Window::ending_at(now, 5);
        let vectors = aggregate(
            &[feature("BTCUSDT", FEATURE_PRICE_TREND, 80.0, now)],
            window,
        );
        let err = vectors[0].require(&FeatureRequirement::default()).unwrap_err();
        assert!(matches!(err, EngineError::InsufficientData { present: 1, .. }));
    }

    #[test]
    fn trend_plus_supporting_feature_is_sufficient() {
        let now = Utc::now();
        let window = Window::ending_at(now, 5);
        let vectors = aggregate(
            &[
                feature("BTCUSDT", FEATURE_PRICE_TREND, 80.0, now),
                feature("BTCUSDT", FEATURE_VOLUME, 30.0, now),
            ],
            window,
        );
        assert!(vectors[0].require(&FeatureRequirement::default()).is_ok());
    }
}
