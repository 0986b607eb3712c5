use serde::Serialize;
use std::io::Write as _;
use std::sync::Arc;

use rampr_core::{ProgressFn, ProgressUpdate, RunSummary};

use super::report::{MetricsView, RunTotals};
use super::{OutputFormatter, RunHeader};

pub(crate) struct JsonOutput;

impl OutputFormatter for JsonOutput {
    fn print_header(&self, _header: &RunHeader<'_>) {}

    fn progress(&self) -> Option<ProgressFn> {
        Some(Arc::new(move |u| {
            let line = build_progress_line(&u);
            emit_json_line(&line);
        }))
    }

    fn print_summary(&self, summary: &RunSummary) -> anyhow::Result<()> {
        let line = build_summary_line(summary);
        emit_json_line(&line);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonProgressLine {
    pub kind: &'static str,
    pub tick: u64,
    pub elapsed_secs: f64,
    pub stage: Option<usize>,
    pub stages: Option<usize>,
    pub stage_remaining_secs: Option<f64>,
    pub target: u64,
    pub live_vus: u64,
    pub iterations_total: u64,
}

fn build_progress_line(u: &ProgressUpdate) -> JsonProgressLine {
    JsonProgressLine {
        kind: "progress",
        tick: u.tick,
        elapsed_secs: u.elapsed.as_secs_f64(),
        stage: u.stage.as_ref().map(|s| s.stage),
        stages: u.stage.as_ref().map(|s| s.stages),
        stage_remaining_secs: u.stage.as_ref().map(|s| s.stage_remaining.as_secs_f64()),
        target: u.target,
        live_vus: u.live_vus,
        iterations_total: u.iterations_total,
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonSummaryLine<'a> {
    pub kind: &'static str,
    #[serde(flatten)]
    pub totals: RunTotals,
    pub metrics: MetricsView<'a>,
}

fn build_summary_line(summary: &RunSummary) -> JsonSummaryLine<'_> {
    JsonSummaryLine {
        kind: "summary",
        totals: RunTotals::new(summary),
        metrics: MetricsView::new(&summary.snapshot),
    }
}

fn emit_json_line<T: Serialize>(line: &T) {
    let mut out = std::io::stdout().lock();
    if serde_json::to_writer(&mut out, line).is_ok() {
        let _ = writeln!(out);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rampr_core::{RateValue, RunSnapshot, StageProgress};
    use serde_json::Value;

    use super::*;

    #[test]
    fn progress_line_has_kind_and_stage() {
        let u = ProgressUpdate {
            tick: 3,
            elapsed: Duration::from_millis(2_500),
            stage: Some(StageProgress {
                stage: 2,
                stages: 3,
                stage_elapsed: Duration::from_millis(500),
                stage_remaining: Duration::from_millis(2_500),
                start_target: 10,
                end_target: 10,
                current_target: 10,
            }),
            target: 10,
            live_vus: 9,
            iterations_total: 120,
        };

        let v: Value = match serde_json::to_value(build_progress_line(&u)) {
            Ok(v) => v,
            Err(err) => panic!("to_value failed: {err}"),
        };
        assert_eq!(v.get("kind").and_then(Value::as_str), Some("progress"));
        assert_eq!(v.get("stage").and_then(Value::as_u64), Some(2));
        assert_eq!(v.get("elapsed_secs").and_then(Value::as_f64), Some(2.5));
        assert_eq!(v.get("live_vus").and_then(Value::as_u64), Some(9));
    }

    #[test]
    fn summary_line_omits_raw_samples() {
        let mut snapshot = RunSnapshot::default();
        snapshot.counters.insert("http_requests".to_string(), 40);
        snapshot.rates.insert(
            "checks".to_string(),
            RateValue {
                successes: 38,
                total: 40,
            },
        );
        snapshot
            .trends
            .insert("iteration_duration".to_string(), vec![1.0; 4]);

        let summary = RunSummary {
            snapshot,
            elapsed: Duration::from_secs(10),
            cancelled: true,
            abandoned_iterations: 0,
            peak_vus: 5,
        };

        let v: Value = match serde_json::to_value(build_summary_line(&summary)) {
            Ok(v) => v,
            Err(err) => panic!("to_value failed: {err}"),
        };

        assert_eq!(v.get("kind").and_then(Value::as_str), Some("summary"));
        assert_eq!(v.get("cancelled").and_then(Value::as_bool), Some(true));
        assert_eq!(
            v.get("checks_failed_total").and_then(Value::as_u64),
            Some(2)
        );
        assert_eq!(
            v.pointer("/metrics/counters/http_requests")
                .and_then(Value::as_i64),
            Some(40)
        );
        assert!(v.pointer("/metrics/trends/iteration_duration").is_none());
    }
}
