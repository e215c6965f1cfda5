// =============================================================================
// Shared types used across the Helios signal engine
// =============================================================================

use serde::{Deserialize, Serialize};

/// Directional call produced by the scorer.
///
/// `BUY`/`SELL` are accepted as aliases on input for compatibility with
/// upstream feeds that phrase direction as an order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    #[serde(alias = "BUY")]
    Long,
    #[serde(alias = "SELL")]
    Short,
    Neutral,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Long => write!(f, "LONG"),
            Self::Short => write!(f, "SHORT"),
            Self::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Conviction tier of a scored signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Strength {
    Strong,
    Moderate,
    Weak,
}

impl std::fmt::Display for Strength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Strong => write!(f, "STRONG"),
            Self::Moderate => write!(f, "MODERATE"),
            Self::Weak => write!(f, "WEAK"),
        }
    }
}

/// Risk classification attached to an opportunity card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
        }
    }
}

/// Category of a published opportunity card. `Ord` follows declaration
/// order; the ranker uses it only as a stable tie-break key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OpportunityKind {
    Arbitrage,
    Timing,
    Trader,
    Volume,
}

impl std::fmt::Display for OpportunityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Arbitrage => write!(f, "ARBITRAGE"),
            Self::Timing => write!(f, "TIMING"),
            Self::Trader => write!(f, "TRADER"),
            Self::Volume => write!(f, "VOLUME"),
        }
    }
}

/// Polarity label for a single news item. Lowercase on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Bullish,
    Bearish,
    Neutral,
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bullish => write!(f, "bullish"),
            Self::Bearish => write!(f, "bearish"),
            Self::Neutral => write!(f, "neutral"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_wire_format_is_uppercase() {
        assert_eq!(serde_json::to_string(&Direction::Long).unwrap(), "\"LONG\"");
        assert_eq!(serde_json::to_string(&Direction::Short).unwrap(), "\"SHORT\"");
    }

    #[test]
    fn direction_accepts_order_side_aliases() {
        let d: Direction = serde_json::from_str("\"BUY\"").unwrap();
        assert_eq!(d, Direction::Long);
        let d: Direction = serde_json::from_str("\"SELL\"").unwrap();
        assert_eq!(d, Direction::Short);
    }

    #[test]
    fn sentiment_wire_format_is_lowercase() {
        assert_eq!(
            serde_json::to_string(&Sentiment::Bullish).unwrap(),
            "\"bullish\""
        );
    }

    #[test]
    fn opportunity_kind_display_matches_wire() {
        assert_eq!(OpportunityKind::Arbitrage.to_string(), "ARBITRAGE");
        assert_eq!(
            serde_json::to_string(&OpportunityKind::Trader).unwrap(),
            "\"TRADER\""
        );
    }
}
