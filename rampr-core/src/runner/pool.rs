use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::config::{DEFAULT_SHUTDOWN_TIMEOUT, DEFAULT_VU_PACING_DELAY};
use super::error::{Error, Result};
use super::scenario::Scenario;
use super::scenario_runner::ScenarioRunner;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolOptions {
    /// Pause between two iterations of the same VU.
    pub vu_pacing_delay: Duration,
    /// How long `stop` waits for in-flight iterations before aborting them.
    pub shutdown_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            vu_pacing_delay: DEFAULT_VU_PACING_DELAY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StopReport {
    /// Workers that finished on their own.
    pub drained: u64,
    /// Workers aborted mid-iteration after the shutdown timeout.
    pub abandoned: u64,
}

#[derive(Debug, Default)]
struct VuCounters {
    live: AtomicU64,
    peak: AtomicU64,
}

// Counts a worker task as live for as long as the task exists.
struct LiveVuGuard {
    counters: Arc<VuCounters>,
}

impl LiveVuGuard {
    fn enter(counters: Arc<VuCounters>) -> Self {
        let now = counters.live.fetch_add(1, Ordering::Relaxed).saturating_add(1);
        counters.peak.fetch_max(now, Ordering::Relaxed);
        Self { counters }
    }
}

impl Drop for LiveVuGuard {
    fn drop(&mut self) {
        self.counters.live.fetch_sub(1, Ordering::Relaxed);
    }
}

struct Worker {
    vu_id: u64,
    retire: CancellationToken,
    in_flight: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct PoolState {
    target: u64,
    next_vu_id: u64,
    active: Vec<Worker>,
    retiring: Vec<Worker>,
    stopped: bool,
}

/// Set of virtual users running one scenario in a loop.
///
/// The pool holds no VUs until the first `set_target`. Lowering the target retires the most
/// recently started VUs; a retiring VU always finishes its current iteration first.
pub struct VirtualUserPool<S> {
    runner: Arc<ScenarioRunner<S>>,
    options: PoolOptions,
    stop: CancellationToken,
    counters: Arc<VuCounters>,
    state: Mutex<PoolState>,
}

impl<S: Scenario> VirtualUserPool<S> {
    pub fn start(runner: Arc<ScenarioRunner<S>>, options: PoolOptions) -> Self {
        Self {
            runner,
            options,
            stop: CancellationToken::new(),
            counters: Arc::new(VuCounters::default()),
            state: Mutex::new(PoolState {
                next_vu_id: 1,
                ..PoolState::default()
            }),
        }
    }

    pub fn runner(&self) -> &Arc<ScenarioRunner<S>> {
        &self.runner
    }

    /// Grows or shrinks the pool to `target` VUs. A no-op once the pool is stopped.
    pub fn set_target(&self, target: i64) -> Result<()> {
        let target = u64::try_from(target).map_err(|_| {
            Error::InvalidConfig(format!("VU target must not be negative (got {target})"))
        })?;

        let mut st = self.state.lock();
        if st.stopped {
            return Ok(());
        }
        st.target = target;
        st.retiring.retain(|w| !w.handle.is_finished());

        while (st.active.len() as u64) < target {
            let vu_id = st.next_vu_id;
            st.next_vu_id = st.next_vu_id.saturating_add(1);
            let worker = self.spawn_worker(vu_id);
            st.active.push(worker);
        }

        while (st.active.len() as u64) > target {
            let Some(worker) = st.active.pop() else {
                break;
            };
            worker.retire.cancel();
            st.retiring.push(worker);
        }

        Ok(())
    }

    fn spawn_worker(&self, vu_id: u64) -> Worker {
        let retire = self.stop.child_token();
        let in_flight = Arc::new(AtomicBool::new(false));
        let guard = LiveVuGuard::enter(self.counters.clone());

        let handle = tokio::spawn(vu_loop(
            self.runner.clone(),
            vu_id,
            retire.clone(),
            in_flight.clone(),
            self.options.vu_pacing_delay,
            guard,
        ));

        Worker {
            vu_id,
            retire,
            in_flight,
            handle,
        }
    }

    /// Current VU target.
    pub fn target(&self) -> u64 {
        self.state.lock().target
    }

    /// Worker tasks still running, including retiring ones finishing an iteration.
    pub fn live_vus(&self) -> u64 {
        self.counters.live.load(Ordering::Relaxed)
    }

    pub fn peak_vus(&self) -> u64 {
        self.counters.peak.load(Ordering::Relaxed)
    }

    /// Signals every VU to stop and waits for them to drain.
    ///
    /// VUs still running when `shutdown_timeout` elapses are aborted; those that were
    /// mid-iteration are recorded as failed, abandoned iterations.
    pub async fn stop(&self) -> StopReport {
        let workers = {
            let mut st = self.state.lock();
            st.stopped = true;
            st.target = 0;
            let mut all = std::mem::take(&mut st.active);
            all.append(&mut st.retiring);
            all
        };

        self.stop.cancel();

        let deadline = Instant::now() + self.options.shutdown_timeout;
        let mut report = StopReport::default();
        let mut timed_out = false;

        for mut worker in workers {
            match tokio::time::timeout_at(deadline, &mut worker.handle).await {
                Ok(Ok(())) => report.drained += 1,
                Ok(Err(err)) => {
                    tracing::warn!(vu_id = worker.vu_id, error = %err, "VU task failed");
                    report.drained += 1;
                }
                Err(_) => {
                    timed_out = true;
                    worker.handle.abort();
                    let _ = (&mut worker.handle).await;

                    if worker.in_flight.load(Ordering::Acquire) {
                        self.runner.record_abandoned(worker.vu_id);
                        report.abandoned += 1;
                    } else {
                        report.drained += 1;
                    }
                }
            }
        }

        if timed_out {
            tracing::warn!(
                timeout = ?self.options.shutdown_timeout,
                abandoned = report.abandoned,
                "shutdown timeout elapsed, aborted remaining VUs"
            );
        }

        report
    }
}

impl<S> Drop for VirtualUserPool<S> {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

async fn vu_loop<S: Scenario>(
    runner: Arc<ScenarioRunner<S>>,
    vu_id: u64,
    retire: CancellationToken,
    in_flight: Arc<AtomicBool>,
    pacing: Duration,
    _live: LiveVuGuard,
) {
    let mut iteration: u64 = 0;

    while !retire.is_cancelled() {
        in_flight.store(true, Ordering::Release);
        let result = runner.run(vu_id, iteration).await;
        runner.record(&result);
        in_flight.store(false, Ordering::Release);

        iteration = iteration.saturating_add(1);

        if pacing.is_zero() {
            tokio::task::yield_now().await;
            continue;
        }

        tokio::select! {
            _ = retire.cancelled() => break,
            _ = tokio::time::sleep(pacing) => {}
        }
    }
}
