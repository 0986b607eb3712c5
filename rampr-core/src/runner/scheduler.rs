use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::error::Result;
use super::pool::{StopReport, VirtualUserPool};
use super::progress::{ProgressFn, ProgressUpdate, StageProgress};
use super::scenario::Scenario;
use super::schedule::RampingU64Schedule;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    /// 0-based index of the stage being executed.
    Ramping {
        stage: usize,
    },
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerOutcome {
    pub elapsed: Duration,
    pub cancelled: bool,
    pub stop: StopReport,
}

/// Drives a pool's VU target along a stage schedule.
pub struct StageScheduler {
    schedule: RampingU64Schedule,
    tick: Duration,
    progress: Option<ProgressFn>,
    state: watch::Sender<SchedulerState>,
}

impl StageScheduler {
    pub fn new(schedule: RampingU64Schedule, tick: Duration) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self {
            schedule,
            tick,
            progress: None,
            state,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    pub fn schedule(&self) -> &RampingU64Schedule {
        &self.schedule
    }

    /// Applies the schedule to `pool` once per tick until the last stage ends or `cancel`
    /// fires, then stops the pool.
    pub async fn run<S: Scenario>(
        &self,
        pool: &VirtualUserPool<S>,
        cancel: &CancellationToken,
    ) -> Result<SchedulerOutcome> {
        let total = self.schedule.total_duration();
        let started = Instant::now();
        let end = started + total;

        let mut next_at = started;
        let mut tick_id: u64 = 0;
        let mut current_stage: Option<usize> = None;
        let mut cancelled = false;

        loop {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let elapsed = started.elapsed();
            if elapsed >= total {
                break;
            }

            let snapshot = self.schedule.stage_snapshot_at(elapsed);
            if let Some(s) = &snapshot
                && current_stage != Some(s.index)
            {
                tracing::debug!(
                    stage = s.index + 1,
                    stages = s.count,
                    target = s.end_target,
                    "entering stage"
                );
                current_stage = Some(s.index);
                self.state
                    .send_replace(SchedulerState::Ramping { stage: s.index });
            }

            let target = self.schedule.target_at(elapsed);
            if let Err(err) = pool.set_target(i64::try_from(target).unwrap_or(i64::MAX)) {
                pool.stop().await;
                self.state.send_replace(SchedulerState::Completed);
                return Err(err);
            }

            tick_id = tick_id.saturating_add(1);
            if let Some(progress) = &self.progress {
                progress(ProgressUpdate {
                    tick: tick_id,
                    elapsed,
                    stage: snapshot.map(StageProgress::from),
                    target,
                    live_vus: pool.live_vus(),
                    iterations_total: pool.runner().iterations_total(),
                });
            }

            next_at += self.tick;
            tokio::select! {
                _ = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                _ = tokio::time::sleep_until(next_at.min(end)) => {}
            }
        }

        let stop = pool.stop().await;
        let elapsed = started.elapsed();
        self.state.send_replace(SchedulerState::Completed);

        if cancelled {
            tracing::info!(elapsed = ?elapsed, "run cancelled");
        }

        Ok(SchedulerOutcome {
            elapsed,
            cancelled,
            stop,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::config::Stage;

    #[test]
    fn starts_idle() {
        let s = StageScheduler::new(
            RampingU64Schedule::new(0, vec![Stage::new(Duration::from_secs(1), 1)]),
            Duration::from_secs(1),
        );
        assert_eq!(s.state(), SchedulerState::Idle);
        assert_eq!(*s.subscribe().borrow(), SchedulerState::Idle);
    }
}
