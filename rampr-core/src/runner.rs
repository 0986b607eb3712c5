mod config;
mod error;
mod iteration_metrics;
mod pool;
mod progress;
mod run;
mod scenario;
mod scenario_runner;
mod schedule;
mod scheduler;

pub use config::{
    DEFAULT_SCHEDULER_TICK_INTERVAL, DEFAULT_SHUTDOWN_TIMEOUT, DEFAULT_VU_PACING_DELAY,
    FailurePolicy, RunConfig, RunOptions, Stage, StageOptions,
};
pub use error::{Error, Result};
pub use iteration_metrics::{
    METRIC_CHECKS, METRIC_ITERATION_DURATION, METRIC_ITERATION_SUCCESS, METRIC_ITERATIONS,
    METRIC_ITERATIONS_ABANDONED, METRIC_SCENARIO_FAULTS, check_metric_name,
};
pub use pool::{PoolOptions, StopReport, VirtualUserPool};
pub use progress::{ProgressFn, ProgressUpdate, StageProgress};
pub use run::{RunController, RunSummary, execute};
pub use scenario::{
    CheckSet, IterationContext, IterationStatus, Scenario, ScenarioFault, ScenarioResult,
    UNCAUGHT_CHECK,
};
pub use scenario_runner::{IterationResult, ScenarioRunner};
pub use schedule::{RampingU64Schedule, StageSnapshot};
pub use scheduler::{SchedulerOutcome, SchedulerState, StageScheduler};
