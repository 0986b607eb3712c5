use std::sync::Arc;
use std::time::Duration;

use rampr_metrics::{Registry, RunSnapshot};
use tokio_util::sync::CancellationToken;

use super::config::RunConfig;
use super::error::Result;
use super::pool::{PoolOptions, VirtualUserPool};
use super::progress::ProgressFn;
use super::scenario::Scenario;
use super::scenario_runner::ScenarioRunner;
use super::schedule::RampingU64Schedule;
use super::scheduler::StageScheduler;

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub snapshot: RunSnapshot,
    pub elapsed: Duration,
    pub cancelled: bool,
    pub abandoned_iterations: u64,
    pub peak_vus: u64,
}

/// Wires a scenario, a VU pool and a stage scheduler into a single run.
pub struct RunController {
    config: RunConfig,
    metrics: Arc<Registry>,
    progress: Option<ProgressFn>,
}

impl RunController {
    pub fn new(config: RunConfig) -> Result<Self> {
        config.validate()?;
        let metrics = Arc::new(Registry::with_trend_cap(config.trend_sample_cap));
        Ok(Self {
            config,
            metrics,
            progress: None,
        })
    }

    #[must_use]
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Registry the run records into. Scenario metrics may be registered here before
    /// `execute`.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.metrics
    }

    pub async fn execute<S: Scenario>(
        self,
        scenario: S,
        cancel: CancellationToken,
    ) -> Result<RunSummary> {
        let runner = Arc::new(ScenarioRunner::new(
            scenario,
            self.config.failure_policy,
            self.metrics.clone(),
        )?);

        let schedule = RampingU64Schedule::new(self.config.start_vus, self.config.stages.clone());
        let mut scheduler = StageScheduler::new(schedule, self.config.scheduler_tick_interval);
        if let Some(progress) = self.progress {
            scheduler = scheduler.with_progress(progress);
        }

        let pool = VirtualUserPool::start(
            runner,
            PoolOptions {
                vu_pacing_delay: self.config.vu_pacing_delay,
                shutdown_timeout: self.config.shutdown_timeout,
            },
        );

        tracing::info!(
            stages = self.config.stages.len(),
            duration = ?self.config.total_duration(),
            max_vus = self.config.max_target(),
            "run started"
        );

        let outcome = scheduler.run(&pool, &cancel).await?;

        let summary = RunSummary {
            snapshot: self.metrics.snapshot(),
            elapsed: outcome.elapsed,
            cancelled: outcome.cancelled,
            abandoned_iterations: outcome.stop.abandoned,
            peak_vus: pool.peak_vus(),
        };

        tracing::info!(
            elapsed = ?summary.elapsed,
            cancelled = summary.cancelled,
            peak_vus = summary.peak_vus,
            abandoned = summary.abandoned_iterations,
            "run finished"
        );

        Ok(summary)
    }
}

/// Validates `config` and runs `scenario` through every stage.
pub async fn execute<S: Scenario>(
    config: RunConfig,
    scenario: S,
    cancel: CancellationToken,
) -> Result<RunSummary> {
    RunController::new(config)?.execute(scenario, cancel).await
}
