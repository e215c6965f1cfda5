// =============================================================================
// Liquidity Heatmap — 24h activity per symbol
// =============================================================================
//
// Pure mapping from the latest market stats onto heatmap cells, tagged with a
// sector from configuration. Symbols without a reported stat simply do not
// appear; nothing is synthesized.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::intake::MarketStat;

pub const DEFAULT_SECTOR: &str = "Other";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeatmapCell {
    pub symbol: String,
    pub sector: String,
    pub change_24h: f64,
    pub volume_usd: f64,
}

/// Build heatmap cells from the latest stat per symbol, sorted by volume
/// descending (then symbol, for a stable order on ties).
pub fn build_heatmap(stats: &[MarketStat], sectors: &HashMap<String, String>) -> Vec<HeatmapCell> {
    let mut cells: Vec<HeatmapCell> = stats
        .iter()
        .filter(|s| s.volume_usd_24h.is_finite() && s.change_24h_pct.is_finite())
        .map(|s| HeatmapCell {
            symbol: s.symbol.clone(),
            sector: sectors
                .get(&s.symbol)
                .cloned()
                .unwrap_or_else(|| DEFAULT_SECTOR.to_string()),
            change_24h: s.change_24h_pct,
            volume_usd: s.volume_usd_24h,
        })
        .collect();
    cells.sort_by(|a, b| {
        b.volume_usd
            .partial_cmp(&a.volume_usd)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.symbol.cmp(&b.symbol))
    });
    cells
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn stat(symbol: &str, volume: f64, change: f64) -> MarketStat {
        MarketStat {
            symbol: symbol.into(),
            last_price: 100.0,
            change_24h_pct: change,
            volume_usd_24h: volume,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn cells_are_sorted_by_volume_descending() {
        let sectors = HashMap::new();
        let cells = build_heatmap(
            &[stat("ETHUSDT", 5e8, 1.0), stat("BTCUSDT", 2e9, -0.5)],
            &sectors,
        );
        assert_eq!(cells[0].symbol, "BTCUSDT");
        assert_eq!(cells[1].symbol, "ETHUSDT");
    }

    #[test]
    fn sector_comes_from_config_with_default_fallback() {
        let mut sectors = HashMap::new();
        sectors.insert("BTCUSDT".to_string(), "Layer 1".to_string());
        let cells = build_heatmap(&[stat("BTCUSDT", 1e9, 0.2), stat("DOGEUSDT", 1e8, 4.0)], &sectors);
        assert_eq!(cells[0].sector, "Layer 1");
        assert_eq!(cells[1].sector, DEFAULT_SECTOR);
    }

    #[test]
    fn non_finite_stats_are_filtered_out() {
        let sectors = HashMap::new();
        let cells = build_heatmap(&[stat("BTCUSDT", f64::NAN, 0.2)], &sectors);
        assert!(cells.is_empty());
    }
}
