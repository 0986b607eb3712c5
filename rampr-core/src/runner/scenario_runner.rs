use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use rampr_metrics::Registry;
use tokio::time::Instant;

use super::config::FailurePolicy;
use super::error::Result;
use super::iteration_metrics::{IterationMetrics, IterationSample};
use super::scenario::{
    CheckSet, IterationContext, IterationStatus, Scenario, ScenarioFault, UNCAUGHT_CHECK,
};

/// Outcome of a single scenario invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationResult {
    pub success: bool,
    pub duration_micros: u64,
    pub checks: BTreeMap<String, bool>,
    pub fault: Option<ScenarioFault>,
}

impl IterationResult {
    pub fn duration(&self) -> Duration {
        Duration::from_micros(self.duration_micros)
    }
}

/// Runs iterations of one scenario and feeds their outcomes into the run registry.
#[derive(Debug)]
pub struct ScenarioRunner<S> {
    scenario: S,
    policy: FailurePolicy,
    metrics: Arc<Registry>,
    builtins: IterationMetrics,
}

impl<S: Scenario> ScenarioRunner<S> {
    /// Registers the built-in iteration metrics on `metrics`.
    pub fn new(scenario: S, policy: FailurePolicy, metrics: Arc<Registry>) -> Result<Self> {
        let builtins = IterationMetrics::register(&metrics)?;
        Ok(Self {
            scenario,
            policy,
            metrics,
            builtins,
        })
    }

    pub fn metrics(&self) -> &Arc<Registry> {
        &self.metrics
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Invokes the scenario once. Faults and panics are captured in the result.
    pub async fn run(&self, vu_id: u64, iteration: u64) -> IterationResult {
        let checks = Arc::new(Mutex::new(CheckSet::default()));
        let ctx = IterationContext::new(vu_id, iteration, checks.clone(), self.metrics.clone());

        let started = Instant::now();
        let outcome = AssertUnwindSafe(self.scenario.iteration(ctx))
            .catch_unwind()
            .await;
        let duration = started.elapsed();

        let mut checks = std::mem::take(&mut *checks.lock());

        let (success, fault) = match outcome {
            Ok(Ok(status)) => {
                let success = match self.policy {
                    FailurePolicy::ThrowOnly => true,
                    FailurePolicy::ReturnCode => status == IterationStatus::Ok,
                };
                (success, None)
            }
            Ok(Err(fault)) => (false, Some(fault)),
            Err(panic) => (
                false,
                Some(ScenarioFault::new(format!(
                    "scenario panicked: {}",
                    panic_message(panic.as_ref())
                ))),
            ),
        };

        if let Some(fault) = &fault {
            tracing::debug!(vu_id, iteration, error = %fault, "iteration faulted");
            checks.record(UNCAUGHT_CHECK, false);
        }

        IterationResult {
            success,
            duration_micros: duration.as_micros().try_into().unwrap_or(u64::MAX),
            checks: checks.into_map(),
            fault,
        }
    }

    /// Feeds one finished iteration into the built-in metrics.
    pub fn record(&self, result: &IterationResult) {
        let checks: Vec<(&str, bool)> = result
            .checks
            .iter()
            .map(|(name, passed)| (name.as_str(), *passed))
            .collect();

        self.builtins.record_iteration(
            &self.metrics,
            IterationSample {
                success: result.success,
                duration: result.duration(),
                faulted: result.fault.is_some(),
                checks: &checks,
            },
        );
    }

    /// Counts an iteration aborted by the shutdown timeout as a failed iteration.
    pub fn record_abandoned(&self, vu_id: u64) {
        tracing::debug!(vu_id, "iteration abandoned at shutdown");
        self.builtins.record_abandoned();
    }

    pub fn iterations_total(&self) -> u64 {
        u64::try_from(self.builtins.iterations_total()).unwrap_or(0)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
