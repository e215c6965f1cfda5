// =============================================================================
// Engine error taxonomy
// =============================================================================
//
// Severity policy:
//   - UnsupportedMetric    — drop the record, log, continue the cycle.
//   - InsufficientData     — skip scoring for that symbol/window, not fatal.
//   - InvalidRiskGeometry  — drop the candidate signal, not fatal.
//   - Serialization        — invariant broken at the publish boundary. This
//                            indicates an upstream bug; the board swap is
//                            skipped and the error is escalated.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// A raw signal carried a metric the normalizer has no scaling rule for.
    #[error("unsupported metric '{metric}' from source '{source_id}'")]
    UnsupportedMetric { metric: String, source_id: String },

    /// A feature vector fell below the minimum feature requirement.
    #[error("insufficient features for {symbol}: {present} present, require '{required}' plus one supporting feature")]
    InsufficientData {
        symbol: String,
        present: usize,
        required: String,
    },

    /// Stop/target placement degenerated (stop at entry, non-finite ratio).
    #[error("invalid risk geometry for {symbol}: entry {entry}, stop {stop}, target {target}")]
    InvalidRiskGeometry {
        symbol: String,
        entry: f64,
        stop: f64,
        target: f64,
    },

    /// Structurally invalid internal state reached the publish boundary.
    #[error("publish invariant violated: {0}")]
    Serialization(String),
}

impl EngineError {
    /// Fatal errors indicate a programming bug rather than bad input data.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Serialization(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_serialization_is_fatal() {
        let e = EngineError::UnsupportedMetric {
            metric: "vibes".into(),
            source_id: "feed-a".into(),
        };
        assert!(!e.is_fatal());
        assert!(EngineError::Serialization("NaN score".into()).is_fatal());
    }

    #[test]
    fn messages_name_the_offending_input() {
        let e = EngineError::UnsupportedMetric {
            metric: "funding_rate".into(),
            source_id: "derivs".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("funding_rate"));
        assert!(msg.contains("derivs"));
    }
}
