// =============================================================================
// Sentiment Snapshot — per-symbol news aggregation
// =============================================================================
//
// One snapshot per symbol per evaluation cycle, fully replaced on
// recomputation (never merged). The overall score is the impact-weighted mean
// of item polarities remapped onto [0, 100]. A symbol with no news produces
// no snapshot; the engine reports "no data" rather than fabricating a neutral
// reading.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::intake::NewsEvent;
use crate::types::Sentiment;

/// A news item attached to a snapshot. Immutable once attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: String,
    pub title: String,
    pub source: String,
    pub sentiment: Sentiment,
    pub impact_score: f64,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentSnapshot {
    pub symbol: String,
    /// Impact-weighted crowd read in [0, 100].
    pub overall_score: f64,
    pub label: String,
    pub top_narrative: String,
    /// Ordered by impact, highest first.
    pub news: Vec<NewsItem>,
}

fn item_sentiment(polarity: f64) -> Sentiment {
    if polarity >= 0.15 {
        Sentiment::Bullish
    } else if polarity <= -0.15 {
        Sentiment::Bearish
    } else {
        Sentiment::Neutral
    }
}

fn label_for(score: f64) -> &'static str {
    if score >= 75.0 {
        "Very Bullish"
    } else if score >= 60.0 {
        "Bullish"
    } else if score > 40.0 {
        "Neutral"
    } else if score > 25.0 {
        "Bearish"
    } else {
        "Very Bearish"
    }
}

/// Build one symbol's snapshot from its recent news, or `None` when there is
/// nothing to aggregate.
pub fn build_snapshot(
    symbol: &str,
    events: &[NewsEvent],
    max_items: usize,
) -> Option<SentimentSnapshot> {
    if events.is_empty() {
        return None;
    }

    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    for event in events {
        // Zero-impact items still appear in the feed but carry no weight; a
        // uniform fallback weight keeps an all-zero batch defined.
        let weight = event.impact_score.clamp(0.0, 100.0);
        weighted_sum += (event.polarity.clamp(-1.0, 1.0) + 1.0) / 2.0 * 100.0 * weight;
        weight_total += weight;
    }
    let overall_score = if weight_total > 0.0 {
        (weighted_sum / weight_total).clamp(0.0, 100.0)
    } else {
        let mean: f64 = events
            .iter()
            .map(|e| (e.polarity.clamp(-1.0, 1.0) + 1.0) / 2.0 * 100.0)
            .sum::<f64>()
            / events.len() as f64;
        mean.clamp(0.0, 100.0)
    };

    let mut items: Vec<NewsItem> = events
        .iter()
        .map(|e| NewsItem {
            id: e.id.clone(),
            title: e.title.clone(),
            source: e.source.clone(),
            sentiment: item_sentiment(e.polarity),
            impact_score: e.impact_score.clamp(0.0, 100.0),
            published_at: e.published_at,
        })
        .collect();
    items.sort_by(|a, b| {
        b.impact_score
            .partial_cmp(&a.impact_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.published_at.cmp(&a.published_at))
            .then(a.id.cmp(&b.id))
    });
    items.truncate(max_items.max(1));

    let top_narrative = items[0].title.clone();

    Some(SentimentSnapshot {
        symbol: symbol.to_string(),
        overall_score,
        label: label_for(overall_score).to_string(),
        top_narrative,
        news: items,
    })
}

/// Humanized age for the wire contract ("time_ago" field).
pub fn time_ago(published_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let age = now - published_at;
    let secs = age.num_seconds();
    if secs < 60 {
        "just now".to_string()
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else if secs < 86_400 {
        format!("{}h ago", secs / 3600)
    } else {
        format!("{}d ago", secs / 86_400)
    }
}
