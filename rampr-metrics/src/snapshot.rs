use std::collections::BTreeMap;

use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RateValue {
    pub successes: u64,
    pub total: u64,
}

impl RateValue {
    /// Fraction of successes, `None` when nothing was recorded.
    #[must_use]
    pub fn ratio(&self) -> Option<f64> {
        (self.total > 0).then(|| self.successes as f64 / self.total as f64)
    }

    #[must_use]
    pub fn failures(&self) -> u64 {
        self.total.saturating_sub(self.successes)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrendSummary {
    pub count: u64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub p50: Option<f64>,
    pub p90: Option<f64>,
    pub p95: Option<f64>,
    pub p99: Option<f64>,
}

/// Immutable copy of every registered metric.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSnapshot {
    pub counters: BTreeMap<String, i64>,
    pub rates: BTreeMap<String, RateValue>,
    /// Retained samples per trend, in buffer order.
    pub trends: BTreeMap<String, Vec<f64>>,
    pub trend_summaries: BTreeMap<String, TrendSummary>,
}

impl RunSnapshot {
    pub fn counter(&self, name: &str) -> Option<i64> {
        self.counters.get(name).copied()
    }

    pub fn rate(&self, name: &str) -> Option<RateValue> {
        self.rates.get(name).copied()
    }

    pub fn trend(&self, name: &str) -> Option<&[f64]> {
        self.trends.get(name).map(Vec::as_slice)
    }

    pub fn trend_summary(&self, name: &str) -> Option<&TrendSummary> {
        self.trend_summaries.get(name)
    }
}
