pub mod runner;

pub use rampr_metrics::{
    MetricHandle, MetricId, MetricKind, RateValue, Registry, RunSnapshot, TrendSummary,
};
pub use runner::{
    CheckSet, Error, FailurePolicy, IterationContext, IterationResult, IterationStatus,
    PoolOptions, ProgressFn, ProgressUpdate, RampingU64Schedule, Result, RunConfig,
    RunController, RunOptions, RunSummary, Scenario, ScenarioFault, ScenarioResult,
    ScenarioRunner, SchedulerOutcome, SchedulerState, Stage, StageOptions, StageProgress,
    StageScheduler, StageSnapshot, StopReport, UNCAUGHT_CHECK, VirtualUserPool,
    check_metric_name, execute,
};
pub use tokio_util::sync::CancellationToken;
