use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use rampr_metrics::Registry;

/// Check name under which a faulted iteration is recorded.
pub const UNCAUGHT_CHECK: &str = "__uncaught";

/// A single iteration's scenario failure.
///
/// Faults are absorbed into metrics; they never stop the VU or the run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ScenarioFault {
    message: String,
}

impl ScenarioFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Builds a fault from any error, keeping its source chain in the message.
    ///
    /// Causes already rendered by an outer `Display` are not repeated.
    pub fn from_error<E>(err: &E) -> Self
    where
        E: std::error::Error + ?Sized,
    {
        let mut message = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            let text = cause.to_string();
            if !text.is_empty() && !message.contains(&text) {
                message.push_str(": ");
                message.push_str(&text);
            }
            source = cause.source();
        }
        Self { message }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for ScenarioFault {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for ScenarioFault {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Non-fault outcome of an iteration. Only consulted under `FailurePolicy::ReturnCode`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IterationStatus {
    #[default]
    Ok,
    Failed,
}

impl From<bool> for IterationStatus {
    fn from(success: bool) -> Self {
        if success { Self::Ok } else { Self::Failed }
    }
}

pub type ScenarioResult = std::result::Result<IterationStatus, ScenarioFault>;

/// Named boolean checks collected during one iteration.
///
/// Recording the same name twice keeps the conjunction, so a check passes only if every
/// evaluation passed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckSet {
    checks: BTreeMap<String, bool>,
}

impl CheckSet {
    pub fn record(&mut self, name: &str, passed: bool) {
        match self.checks.get_mut(name) {
            Some(cur) => *cur &= passed,
            None => {
                self.checks.insert(name.to_string(), passed);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<bool> {
        self.checks.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    pub fn into_map(self) -> BTreeMap<String, bool> {
        self.checks
    }
}

/// Per-iteration view handed to the scenario.
#[derive(Debug, Clone)]
pub struct IterationContext {
    vu_id: u64,
    iteration: u64,
    checks: Arc<Mutex<CheckSet>>,
    metrics: Arc<Registry>,
}

impl IterationContext {
    pub(crate) fn new(
        vu_id: u64,
        iteration: u64,
        checks: Arc<Mutex<CheckSet>>,
        metrics: Arc<Registry>,
    ) -> Self {
        Self {
            vu_id,
            iteration,
            checks,
            metrics,
        }
    }

    /// 1-based id of the virtual user running this iteration.
    pub fn vu_id(&self) -> u64 {
        self.vu_id
    }

    /// 0-based iteration index, strictly increasing per VU.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Evaluates `predicate` and records the result under `name`.
    ///
    /// Returns the predicate's value; a failing check never aborts the iteration.
    pub fn checkpoint<P>(&self, name: &str, predicate: P) -> bool
    where
        P: FnOnce() -> bool,
    {
        let passed = predicate();
        self.checks.lock().record(name, passed);
        passed
    }

    /// Shared run registry for scenario-defined metrics.
    pub fn metrics(&self) -> &Registry {
        &self.metrics
    }
}

/// User workload executed once per iteration.
pub trait Scenario: Send + Sync + 'static {
    fn iteration(&self, ctx: IterationContext) -> impl Future<Output = ScenarioResult> + Send;
}

impl<F, Fut> Scenario for F
where
    F: Fn(IterationContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ScenarioResult> + Send,
{
    fn iteration(&self, ctx: IterationContext) -> impl Future<Output = ScenarioResult> + Send {
        (self)(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_set_ands_repeated_names() {
        let mut checks = CheckSet::default();
        checks.record("status is 200", true);
        checks.record("status is 200", false);
        checks.record("status is 200", true);
        checks.record("body ok", true);

        assert_eq!(checks.get("status is 200"), Some(false));
        assert_eq!(checks.get("body ok"), Some(true));
        assert_eq!(checks.len(), 2);
    }

    #[test]
    fn checkpoint_returns_predicate_value() {
        let checks = Arc::new(Mutex::new(CheckSet::default()));
        let ctx = IterationContext::new(3, 7, checks.clone(), Arc::new(Registry::default()));

        assert!(ctx.checkpoint("a", || true));
        assert!(!ctx.checkpoint("b", || false));
        assert_eq!(ctx.vu_id(), 3);
        assert_eq!(ctx.iteration(), 7);

        let checks = checks.lock();
        assert_eq!(checks.get("a"), Some(true));
        assert_eq!(checks.get("b"), Some(false));
    }

    #[derive(Debug, thiserror::Error)]
    #[error("request failed")]
    struct Outer(#[source] Inner);

    #[derive(Debug, thiserror::Error)]
    #[error("connection refused")]
    struct Inner;

    #[test]
    fn fault_from_error_keeps_source_chain() {
        let fault = ScenarioFault::from_error(&Outer(Inner));
        assert_eq!(fault.message(), "request failed: connection refused");
    }

    #[derive(Debug, thiserror::Error)]
    #[error("http request failed: {0}")]
    struct Wrapped(#[from] Outer);

    #[test]
    fn fault_from_error_skips_causes_already_in_the_message() {
        let fault = ScenarioFault::from_error(&Wrapped(Outer(Inner)));
        assert_eq!(
            fault.message(),
            "http request failed: request failed: connection refused"
        );
    }
}
