use std::fmt::Write as _;

use rampr_core::RunSummary;
use rampr_core::runner::{METRIC_CHECKS, check_metric_name};

use super::format::{format_duration, format_millis_opt, format_rate, format_ratio};
use crate::output::report::RunTotals;

pub(crate) fn render(summary: &RunSummary) -> String {
    let totals = RunTotals::new(summary);
    let snap = &summary.snapshot;
    let mut out = String::new();

    out.push_str("summary\n");
    writeln!(
        &mut out,
        "  elapsed: {}{}",
        format_duration(summary.elapsed),
        if summary.cancelled { " (cancelled)" } else { "" }
    )
    .ok();
    writeln!(&mut out, "  vus: peak {}", summary.peak_vus).ok();
    writeln!(
        &mut out,
        "  iterations: {} (abandoned {})",
        totals.iterations_total, totals.abandoned_iterations
    )
    .ok();
    let secs = summary.elapsed.as_secs_f64().max(1e-9);
    writeln!(
        &mut out,
        "  rates: iters/s={}",
        format_rate(totals.iterations_total as f64 / secs)
    )
    .ok();

    if !snap.counters.is_empty() {
        out.push_str("\ncounters\n");
        for (name, value) in &snap.counters {
            writeln!(&mut out, "  {name}: {value}").ok();
        }
    }

    let check_prefix = check_metric_name("");
    let rates: Vec<_> = snap
        .rates
        .iter()
        .filter(|(name, _)| !name.starts_with(&check_prefix))
        .collect();
    if !rates.is_empty() {
        out.push_str("\nrates\n");
        for (name, value) in rates {
            writeln!(&mut out, "  {name}: {}", format_ratio(value)).ok();
        }
    }

    if !snap.trend_summaries.is_empty() {
        out.push_str("\ntrends\n");
        for (name, t) in &snap.trend_summaries {
            writeln!(
                &mut out,
                "  {name}: p50={} p90={} p95={} p99={} mean={} min={} max={} (n={})",
                format_millis_opt(t.p50),
                format_millis_opt(t.p90),
                format_millis_opt(t.p95),
                format_millis_opt(t.p99),
                format_millis_opt(t.mean),
                format_millis_opt(t.min),
                format_millis_opt(t.max),
                t.count
            )
            .ok();
        }
    }

    let checks: Vec<_> = snap
        .rates
        .iter()
        .filter_map(|(name, value)| name.strip_prefix(&check_prefix).map(|n| (n, value)))
        .collect();
    if !checks.is_empty() {
        out.push_str("\nchecks\n");
        for (name, value) in checks {
            let mark = if value.failures() == 0 { "ok  " } else { "FAIL" };
            writeln!(&mut out, "  {mark} {name}: {}", format_ratio(value)).ok();
        }
        if let Some(all) = snap.rate(METRIC_CHECKS) {
            writeln!(&mut out, "  checks_failed_total: {}", all.failures()).ok();
        }
    }

    out
}
