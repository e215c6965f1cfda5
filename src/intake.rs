// =============================================================================
// Signal Intake — the boundary between external feeds and the pipeline
// =============================================================================
//
// Concrete exchange/news clients live outside this crate. They implement
// `SignalSource` and hand the engine timestamped, symbol-scoped records; the
// intake buffers them until the next evaluation cycle drains its window.
//
// The intake never invents data: a symbol with no records simply produces
// nothing downstream.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

// =============================================================================
// Source records
// =============================================================================

/// A single raw observation from an upstream feed. Immutable; consumed once
/// by the normalizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSignal {
    pub source_id: String,
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub metric_name: String,
    pub value: f64,
    #[serde(default)]
    pub unit: String,
}

/// A news/narrative event from a sentiment feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsEvent {
    pub id: String,
    pub symbol: String,
    pub title: String,
    pub source: String,
    /// Polarity in [-1, 1].
    pub polarity: f64,
    /// Estimated market impact in [0, 100].
    pub impact_score: f64,
    pub published_at: DateTime<Utc>,
}

/// Rolling 24h market statistics for one symbol. Feeds the heatmap and
/// provides the reference price for risk geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketStat {
    pub symbol: String,
    pub last_price: f64,
    pub change_24h_pct: f64,
    pub volume_usd_24h: f64,
    pub timestamp: DateTime<Utc>,
}

/// Envelope for anything a source can emit, tagged for JSONL transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "record_type", rename_all = "snake_case")]
pub enum SourceRecord {
    Signal(RawSignal),
    News(NewsEvent),
    Market(MarketStat),
}

// =============================================================================
// Source trait
// =============================================================================

/// A pollable upstream feed. Implementations may block or await network IO;
/// the pipeline stages themselves never do.
#[async_trait]
pub trait SignalSource: Send + Sync {
    fn source_id(&self) -> &str;

    /// Return any records produced since the last poll.
    async fn poll(&mut self) -> anyhow::Result<Vec<SourceRecord>>;
}

// =============================================================================
// Replay source
// =============================================================================

/// Reads `SourceRecord` JSONL from a file, emitting only lines appended since
/// the previous poll. Stands in for live adapters in demos and integration
/// runs without fabricating values.
pub struct ReplaySource {
    source_id: String,
    path: PathBuf,
    lines_consumed: usize,
}

impl ReplaySource {
    pub fn new(source_id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            source_id: source_id.into(),
            path: path.into(),
            lines_consumed: 0,
        }
    }
}

#[async_trait]
impl SignalSource for ReplaySource {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    async fn poll(&mut self) -> anyhow::Result<Vec<SourceRecord>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "replay file not present yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            if idx < self.lines_consumed {
                continue;
            }
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<SourceRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(source = %self.source_id, line = idx + 1, error = %e, "skipping malformed replay record");
                }
            }
        }
        self.lines_consumed = content.lines().count();
        Ok(records)
    }
}

// =============================================================================
// Intake buffers
// =============================================================================

/// Thread-safe buffers between the source feeds and the evaluation loop.
///
/// Raw signals and news are retained until pruned; market stats keep only the
/// latest observation per symbol.
pub struct SignalIntake {
    raw: RwLock<HashMap<String, Vec<RawSignal>>>,
    news: RwLock<HashMap<String, Vec<NewsEvent>>>,
    market: RwLock<HashMap<String, MarketStat>>,
}

impl SignalIntake {
    pub fn new() -> Self {
        Self {
            raw: RwLock::new(HashMap::new()),
            news: RwLock::new(HashMap::new()),
            market: RwLock::new(HashMap::new()),
        }
    }

    pub fn push_record(&self, record: SourceRecord) {
        match record {
            SourceRecord::Signal(raw) => {
                self.raw.write().entry(raw.symbol.clone()).or_default().push(raw);
            }
            SourceRecord::News(event) => {
                let mut news = self.news.write();
                let bucket = news.entry(event.symbol.clone()).or_default();
                // News ids are unique within a snapshot; drop replays of the
                // same id rather than double-counting impact.
                if !bucket.iter().any(|n| n.id == event.id) {
                    bucket.push(event);
                }
            }
            SourceRecord::Market(stat) => {
                let mut market = self.market.write();
                match market.get(&stat.symbol) {
                    Some(existing) if existing.timestamp > stat.timestamp => {}
                    _ => {
                        market.insert(stat.symbol.clone(), stat);
                    }
                }
            }
        }
    }

    /// Raw signals for `symbol` with timestamps inside `[start, end]`.
    pub fn raw_in_window(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<RawSignal> {
        self.raw
            .read()
            .get(symbol)
            .map(|v| {
                v.iter()
                    .filter(|r| r.timestamp >= start && r.timestamp <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// News published at or after `since` for `symbol`.
    pub fn news_since(&self, symbol: &str, since: DateTime<Utc>) -> Vec<NewsEvent> {
        self.news
            .read()
            .get(symbol)
            .map(|v| {
                v.iter()
                    .filter(|n| n.published_at >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Latest market stat for `symbol`, if any feed has reported one.
    pub fn latest_market(&self, symbol: &str) -> Option<MarketStat> {
        self.market.read().get(symbol).cloned()
    }

    /// Latest market stat per symbol, for the heatmap.
    pub fn all_market(&self) -> Vec<MarketStat> {
        self.market.read().values().cloned().collect()
    }

    /// Drop raw signals and news older than `cutoff`. Called once per cycle
    /// so abandoned windows cannot accumulate unbounded state.
    pub fn prune(&self, cutoff: DateTime<Utc>) {
        let mut raw = self.raw.write();
        for bucket in raw.values_mut() {
            bucket.retain(|r| r.timestamp >= cutoff);
        }
        raw.retain(|_, bucket| !bucket.is_empty());

        let mut news = self.news.write();
        for bucket in news.values_mut() {
            bucket.retain(|n| n.published_at >= cutoff);
        }
        news.retain(|_, bucket| !bucket.is_empty());
    }

    /// Cutoff below which records can no longer contribute to any window:
    /// twice the longer of the evaluation and news windows.
    pub fn retention_cutoff(now: DateTime<Utc>, window_minutes: i64, news_window_minutes: i64) -> DateTime<Utc> {
        let retain = window_minutes.max(news_window_minutes).max(1) * 2;
        now - Duration::minutes(retain)
    }
}

impl Default for SignalIntake {
    fn default() -> Self {
        Self::new()
    }
}
