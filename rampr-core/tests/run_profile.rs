use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rampr_core::runner::{
    METRIC_ITERATION_SUCCESS, METRIC_ITERATIONS, METRIC_ITERATIONS_ABANDONED,
    METRIC_SCENARIO_FAULTS, check_metric_name,
};
use rampr_core::{
    CancellationToken, Error, FailurePolicy, IterationContext, IterationStatus, ProgressUpdate,
    RunConfig, RunController, ScenarioFault, ScenarioResult, Stage, UNCAUGHT_CHECK, execute,
};

fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

fn ms(m: u64) -> Duration {
    Duration::from_millis(m)
}

fn config(stages: Vec<Stage>) -> RunConfig {
    let mut cfg = RunConfig::new(stages);
    cfg.vu_pacing_delay = ms(100);
    cfg.scheduler_tick_interval = ms(100);
    cfg
}

async fn short_request(ctx: IterationContext) -> ScenarioResult {
    tokio::time::sleep(ms(50)).await;
    ctx.checkpoint("status is 200", || true);
    Ok(IterationStatus::Ok)
}

async fn always_faults(_ctx: IterationContext) -> ScenarioResult {
    tokio::time::sleep(ms(10)).await;
    Err(ScenarioFault::new("connection refused"))
}

async fn always_reports_failure(_ctx: IterationContext) -> ScenarioResult {
    Ok(IterationStatus::Failed)
}

async fn hangs(_ctx: IterationContext) -> ScenarioResult {
    tokio::time::sleep(secs(10)).await;
    Ok(IterationStatus::Ok)
}

#[tokio::test(start_paused = true)]
async fn ramp_hold_drain_follows_the_stage_profile() -> anyhow::Result<()> {
    let cfg = config(vec![
        Stage::new(secs(2), 10),
        Stage::new(secs(3), 10),
        Stage::new(secs(1), 0),
    ]);
    let tick = cfg.scheduler_tick_interval;

    let updates: Arc<Mutex<Vec<ProgressUpdate>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = updates.clone();

    let summary = RunController::new(cfg)?
        .with_progress(Arc::new(move |u| sink.lock().push(u)))
        .execute(short_request, CancellationToken::new())
        .await?;

    assert!(!summary.cancelled);
    assert!(summary.elapsed >= secs(6), "{:?}", summary.elapsed);
    assert!(summary.elapsed <= secs(6) + tick, "{:?}", summary.elapsed);
    assert_eq!(summary.peak_vus, 10);
    assert_eq!(summary.abandoned_iterations, 0);

    let updates = updates.lock();
    let target_at = |at: Duration| {
        updates
            .iter()
            .find(|u| u.elapsed == at)
            .map(|u| u.target)
    };
    assert_eq!(target_at(Duration::ZERO), Some(0));
    assert_eq!(target_at(secs(1)), Some(5));
    assert_eq!(target_at(secs(2)), Some(10));
    assert_eq!(target_at(secs(4)), Some(10));
    assert_eq!(target_at(ms(5_500)), Some(5));

    assert_eq!(updates.first().map(|u| u.tick), Some(1));
    assert!(updates.windows(2).all(|w| w[1].tick == w[0].tick + 1));

    let stage_at = |at: Duration| {
        updates
            .iter()
            .find(|u| u.elapsed == at)
            .and_then(|u| u.stage.as_ref())
            .map(|s| (s.stage, s.stages))
    };
    assert_eq!(stage_at(secs(1)), Some((1, 3)));
    assert_eq!(stage_at(secs(3)), Some((2, 3)));
    assert_eq!(stage_at(ms(5_500)), Some((3, 3)));

    // Retiring VUs finish within a tick, so live VUs never exceed the larger of two
    // consecutive targets.
    for w in updates.windows(2) {
        let bound = w[0].target.max(w[1].target);
        assert!(
            w[1].live_vus <= bound,
            "tick {}: live {} > {}",
            w[1].tick,
            w[1].live_vus,
            bound
        );
    }

    let snap = &summary.snapshot;
    let iterations = snap.counter(METRIC_ITERATIONS).unwrap_or_default();
    assert!(iterations > 0);

    let success = snap.rate(METRIC_ITERATION_SUCCESS).unwrap_or_default();
    assert_eq!(success.total, u64::try_from(iterations)?);
    assert_eq!(success.successes, success.total);

    let check = snap
        .rate(&check_metric_name("status is 200"))
        .unwrap_or_default();
    assert_eq!(check.successes, check.total);
    assert_eq!(check.total, success.total);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn always_faulting_scenario_completes_with_zero_successes() -> anyhow::Result<()> {
    let summary = execute(
        config(vec![Stage::new(secs(1), 4), Stage::new(secs(1), 4)]),
        always_faults,
        CancellationToken::new(),
    )
    .await?;

    let snap = &summary.snapshot;
    let success = snap.rate(METRIC_ITERATION_SUCCESS).unwrap_or_default();
    assert!(success.total > 0);
    assert_eq!(success.successes, 0);
    assert_eq!(
        snap.counter(METRIC_SCENARIO_FAULTS),
        Some(i64::try_from(success.total)?)
    );

    let uncaught = snap
        .rate(&check_metric_name(UNCAUGHT_CHECK))
        .unwrap_or_default();
    assert_eq!(uncaught.successes, 0);
    assert_eq!(uncaught.total, success.total);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn return_code_policy_fails_reported_iterations() -> anyhow::Result<()> {
    let mut cfg = config(vec![Stage::new(secs(1), 2)]);
    cfg.start_vus = 2;
    cfg.failure_policy = FailurePolicy::ReturnCode;

    let summary = execute(cfg, always_reports_failure, CancellationToken::new()).await?;

    let snap = &summary.snapshot;
    let success = snap.rate(METRIC_ITERATION_SUCCESS).unwrap_or_default();
    assert!(success.total > 0);
    assert_eq!(success.successes, 0);
    assert_eq!(snap.counter(METRIC_SCENARIO_FAULTS), Some(0));
    assert!(snap.rate(&check_metric_name(UNCAUGHT_CHECK)).is_none());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn shutdown_timeout_abandons_stuck_iterations() -> anyhow::Result<()> {
    let mut cfg = config(vec![Stage::new(secs(1), 2)]);
    cfg.start_vus = 2;
    cfg.shutdown_timeout = secs(1);

    let summary = execute(cfg, hangs, CancellationToken::new()).await?;

    assert_eq!(summary.abandoned_iterations, 2);
    assert!(summary.elapsed >= secs(2));
    assert!(summary.elapsed < secs(3));

    let snap = &summary.snapshot;
    assert_eq!(snap.counter(METRIC_ITERATIONS_ABANDONED), Some(2));
    assert_eq!(snap.counter(METRIC_ITERATIONS), Some(2));
    assert_eq!(
        snap.rate(METRIC_ITERATION_SUCCESS)
            .map(|r| (r.successes, r.total)),
        Some((0, 2))
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_the_run_early() -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(secs(2)).await;
        trigger.cancel();
    });

    let summary = execute(config(vec![Stage::new(secs(60), 3)]), short_request, cancel).await?;

    assert!(summary.cancelled);
    assert!(summary.elapsed >= secs(2));
    assert!(summary.elapsed < secs(3), "{:?}", summary.elapsed);
    assert_eq!(summary.abandoned_iterations, 0);
    Ok(())
}

#[tokio::test]
async fn invalid_config_starts_no_vus() {
    let mut cfg = config(vec![Stage::new(secs(1), 1)]);
    cfg.scheduler_tick_interval = Duration::ZERO;
    assert!(matches!(
        RunController::new(cfg),
        Err(Error::InvalidConfig(_))
    ));

    let res = execute(RunConfig::new(Vec::new()), short_request, CancellationToken::new()).await;
    assert!(matches!(res, Err(Error::InvalidConfig(_))));
}

#[tokio::test]
async fn metric_kind_clash_is_reported_before_the_run() -> anyhow::Result<()> {
    let controller = RunController::new(config(vec![Stage::new(secs(1), 1)]))?;
    controller
        .registry()
        .register(METRIC_ITERATIONS, rampr_core::MetricKind::Rate)?;

    let res = controller
        .execute(short_request, CancellationToken::new())
        .await;
    assert!(matches!(res, Err(Error::Metric(_))));
    Ok(())
}
