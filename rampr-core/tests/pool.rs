use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rampr_core::{
    CancellationToken, Error, FailurePolicy, IterationContext, IterationStatus, PoolOptions,
    RampingU64Schedule, Registry, Scenario, ScenarioFault, ScenarioRunner, SchedulerState, Stage,
    StageScheduler, VirtualUserPool,
};

fn ms(m: u64) -> Duration {
    Duration::from_millis(m)
}

fn options() -> PoolOptions {
    PoolOptions {
        vu_pacing_delay: ms(100),
        shutdown_timeout: Duration::from_secs(5),
    }
}

type Seen = Arc<Mutex<Vec<(u64, u64)>>>;

fn recording_pool(seen: Seen) -> anyhow::Result<VirtualUserPool<impl Scenario>> {
    let scenario = move |ctx: IterationContext| {
        let seen = seen.clone();
        async move {
            seen.lock().push((ctx.vu_id(), ctx.iteration()));
            tokio::time::sleep(ms(10)).await;
            Ok::<_, ScenarioFault>(IterationStatus::Ok)
        }
    };

    let runner = ScenarioRunner::new(
        scenario,
        FailurePolicy::ThrowOnly,
        Arc::new(Registry::default()),
    )?;
    Ok(VirtualUserPool::start(Arc::new(runner), options()))
}

#[tokio::test(start_paused = true)]
async fn negative_target_is_rejected() -> anyhow::Result<()> {
    let pool = recording_pool(Seen::default())?;
    assert!(matches!(pool.set_target(-1), Err(Error::InvalidConfig(_))));
    assert_eq!(pool.target(), 0);
    assert_eq!(pool.live_vus(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn ramp_down_retires_newest_vus_and_ids_are_not_reused() -> anyhow::Result<()> {
    let seen = Seen::default();
    let pool = recording_pool(seen.clone())?;

    pool.set_target(3)?;
    assert_eq!(pool.live_vus(), 3);
    tokio::time::sleep(ms(250)).await;

    pool.set_target(1)?;
    assert_eq!(pool.target(), 1);
    tokio::time::sleep(ms(50)).await;
    assert_eq!(pool.live_vus(), 1);

    seen.lock().clear();
    tokio::time::sleep(ms(500)).await;
    let ids: BTreeSet<u64> = seen.lock().iter().map(|(vu, _)| *vu).collect();
    assert_eq!(ids, BTreeSet::from([1]));

    pool.set_target(2)?;
    seen.lock().clear();
    tokio::time::sleep(ms(500)).await;
    let ids: BTreeSet<u64> = seen.lock().iter().map(|(vu, _)| *vu).collect();
    assert_eq!(ids, BTreeSet::from([1, 4]));
    assert_eq!(pool.peak_vus(), 3);

    let report = pool.stop().await;
    assert_eq!(report.abandoned, 0);
    assert_eq!(pool.live_vus(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn iterations_are_strictly_increasing_per_vu() -> anyhow::Result<()> {
    let seen = Seen::default();
    let pool = recording_pool(seen.clone())?;

    pool.set_target(4)?;
    tokio::time::sleep(ms(1_000)).await;
    pool.stop().await;

    let seen = seen.lock();
    for vu in 1..=4 {
        let iterations: Vec<u64> = seen
            .iter()
            .filter(|(id, _)| *id == vu)
            .map(|(_, it)| *it)
            .collect();
        assert!(!iterations.is_empty(), "vu {vu} never ran");
        assert_eq!(iterations.first(), Some(&0));
        assert!(iterations.windows(2).all(|w| w[1] == w[0] + 1));
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn set_target_after_stop_is_ignored() -> anyhow::Result<()> {
    let pool = recording_pool(Seen::default())?;
    pool.set_target(2)?;
    let report = pool.stop().await;
    assert_eq!(report.drained, 2);

    pool.set_target(5)?;
    assert_eq!(pool.live_vus(), 0);
    assert_eq!(pool.target(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn scheduler_walks_through_every_stage() -> anyhow::Result<()> {
    let pool = recording_pool(Seen::default())?;
    let scheduler = StageScheduler::new(
        RampingU64Schedule::new(
            0,
            vec![
                Stage::new(ms(500), 2),
                Stage::new(ms(500), 2),
                Stage::new(ms(500), 0),
            ],
        ),
        ms(100),
    );

    let mut rx = scheduler.subscribe();
    let observed = tokio::spawn(async move {
        let mut states = Vec::new();
        while rx.changed().await.is_ok() {
            let state = *rx.borrow_and_update();
            states.push(state);
            if state == SchedulerState::Completed {
                break;
            }
        }
        states
    });

    let outcome = scheduler.run(&pool, &CancellationToken::new()).await?;
    assert!(!outcome.cancelled);
    assert_eq!(scheduler.state(), SchedulerState::Completed);

    let states = observed.await?;
    assert_eq!(
        states,
        vec![
            SchedulerState::Ramping { stage: 0 },
            SchedulerState::Ramping { stage: 1 },
            SchedulerState::Ramping { stage: 2 },
            SchedulerState::Completed,
        ]
    );
    Ok(())
}
