use std::time::Duration;

use rampr_metrics::{MetricHandle, MetricKind, Registry};

pub const METRIC_ITERATIONS: &str = "iterations";
pub const METRIC_ITERATION_SUCCESS: &str = "iteration_success";
/// Iteration duration in milliseconds.
pub const METRIC_ITERATION_DURATION: &str = "iteration_duration";
pub const METRIC_CHECKS: &str = "checks";
pub const METRIC_SCENARIO_FAULTS: &str = "scenario_faults";
pub const METRIC_ITERATIONS_ABANDONED: &str = "iterations_abandoned";

const CHECK_METRIC_PREFIX: &str = "check::";

/// Name of the per-check rate metric.
pub fn check_metric_name(check: &str) -> String {
    format!("{CHECK_METRIC_PREFIX}{check}")
}

#[derive(Debug, Clone)]
pub(crate) struct IterationMetrics {
    iterations: MetricHandle,
    iteration_success: MetricHandle,
    iteration_duration: MetricHandle,
    checks: MetricHandle,
    scenario_faults: MetricHandle,
    iterations_abandoned: MetricHandle,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct IterationSample<'a> {
    pub success: bool,
    pub duration: Duration,
    pub faulted: bool,
    pub checks: &'a [(&'a str, bool)],
}

impl IterationMetrics {
    pub(crate) fn register(metrics: &Registry) -> rampr_metrics::Result<Self> {
        let handle = |name: &str, kind: MetricKind| -> rampr_metrics::Result<MetricHandle> {
            let id = metrics.register(name, kind)?;
            metrics
                .get_handle(id)
                .ok_or_else(|| rampr_metrics::Error::UnknownMetric(name.to_string()))
        };

        Ok(Self {
            iterations: handle(METRIC_ITERATIONS, MetricKind::Counter)?,
            iteration_success: handle(METRIC_ITERATION_SUCCESS, MetricKind::Rate)?,
            iteration_duration: handle(METRIC_ITERATION_DURATION, MetricKind::Trend)?,
            checks: handle(METRIC_CHECKS, MetricKind::Rate)?,
            scenario_faults: handle(METRIC_SCENARIO_FAULTS, MetricKind::Counter)?,
            iterations_abandoned: handle(METRIC_ITERATIONS_ABANDONED, MetricKind::Counter)?,
        })
    }

    pub(crate) fn record_iteration(&self, metrics: &Registry, sample: IterationSample<'_>) {
        self.iterations.increment(1);
        self.iteration_success.add_rate(sample.success);
        self.iteration_duration
            .observe(sample.duration.as_micros() as f64 / 1_000.0);

        if sample.faulted {
            self.scenario_faults.increment(1);
        }

        for (name, passed) in sample.checks {
            self.checks.add_rate(*passed);

            match metrics.register(&check_metric_name(name), MetricKind::Rate) {
                Ok(id) => {
                    if let Some(h) = metrics.get_handle(id) {
                        h.add_rate(*passed);
                    }
                }
                Err(err) => {
                    tracing::warn!(check = %name, error = %err, "failed to record check");
                }
            }
        }
    }

    /// Counts an iteration that was cut off by the shutdown timeout as failed.
    pub(crate) fn record_abandoned(&self) {
        self.iterations.increment(1);
        self.iteration_success.add_rate(false);
        self.iterations_abandoned.increment(1);
    }

    pub(crate) fn iterations_total(&self) -> i64 {
        self.iterations.get_counter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_iteration_updates_builtin_and_check_metrics() -> rampr_metrics::Result<()> {
        let registry = Registry::default();
        let m = IterationMetrics::register(&registry)?;

        m.record_iteration(
            &registry,
            IterationSample {
                success: true,
                duration: Duration::from_millis(12),
                faulted: false,
                checks: &[("status is 200", true), ("body ok", false)],
            },
        );
        m.record_abandoned();

        let snap = registry.snapshot();
        assert_eq!(snap.counter(METRIC_ITERATIONS), Some(2));
        assert_eq!(snap.counter(METRIC_ITERATIONS_ABANDONED), Some(1));
        assert_eq!(
            snap.rate(METRIC_ITERATION_SUCCESS).map(|r| (r.successes, r.total)),
            Some((1, 2))
        );
        assert_eq!(snap.rate(METRIC_CHECKS).map(|r| (r.successes, r.total)), Some((1, 2)));
        assert_eq!(
            snap.rate("check::status is 200").map(|r| (r.successes, r.total)),
            Some((1, 1))
        );
        assert_eq!(snap.trend(METRIC_ITERATION_DURATION), Some(&[12.0][..]));
        Ok(())
    }

    #[test]
    fn check_metric_clash_does_not_stop_recording() -> rampr_metrics::Result<()> {
        let registry = Registry::default();
        let m = IterationMetrics::register(&registry)?;
        registry.register("check::taken", MetricKind::Counter)?;

        m.record_iteration(
            &registry,
            IterationSample {
                success: true,
                duration: Duration::from_millis(1),
                faulted: false,
                checks: &[("taken", true)],
            },
        );

        let snap = registry.snapshot();
        assert_eq!(snap.counter("check::taken"), Some(0));
        assert_eq!(snap.rate(METRIC_CHECKS).map(|r| r.total), Some(1));
        Ok(())
    }
}
