use std::collections::BTreeMap;

use rampr_core::runner::{METRIC_CHECKS, METRIC_ITERATIONS};
use rampr_core::{RateValue, RunSnapshot, RunSummary, TrendSummary};
use serde::Serialize;

/// Failed evaluations across every check of the run.
pub(crate) fn checks_failed_total(snapshot: &RunSnapshot) -> u64 {
    snapshot
        .rate(METRIC_CHECKS)
        .map(|r| r.failures())
        .unwrap_or_default()
}

/// Run-level figures shared by the JSON summary line and the export file.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct RunTotals {
    pub elapsed_secs: f64,
    pub cancelled: bool,
    pub peak_vus: u64,
    pub iterations_total: u64,
    pub abandoned_iterations: u64,
    pub checks_failed_total: u64,
}

impl RunTotals {
    pub(crate) fn new(summary: &RunSummary) -> Self {
        Self {
            elapsed_secs: summary.elapsed.as_secs_f64(),
            cancelled: summary.cancelled,
            peak_vus: summary.peak_vus,
            iterations_total: summary
                .snapshot
                .counter(METRIC_ITERATIONS)
                .and_then(|n| u64::try_from(n).ok())
                .unwrap_or_default(),
            abandoned_iterations: summary.abandoned_iterations,
            checks_failed_total: checks_failed_total(&summary.snapshot),
        }
    }
}

/// Aggregated metrics without the raw trend samples.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct MetricsView<'a> {
    pub counters: &'a BTreeMap<String, i64>,
    pub rates: &'a BTreeMap<String, RateValue>,
    pub trends: &'a BTreeMap<String, TrendSummary>,
}

impl<'a> MetricsView<'a> {
    pub(crate) fn new(snapshot: &'a RunSnapshot) -> Self {
        Self {
            counters: &snapshot.counters,
            rates: &snapshot.rates,
            trends: &snapshot.trend_summaries,
        }
    }
}

/// Document written by `--summary-export`: the totals plus the full snapshot.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct SummaryExport<'a> {
    #[serde(flatten)]
    pub totals: RunTotals,
    pub snapshot: &'a RunSnapshot,
}

impl<'a> SummaryExport<'a> {
    pub(crate) fn new(summary: &'a RunSummary) -> Self {
        Self {
            totals: RunTotals::new(summary),
            snapshot: &summary.snapshot,
        }
    }
}
