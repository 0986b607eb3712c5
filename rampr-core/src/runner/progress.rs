use std::time::Duration;

use super::schedule::StageSnapshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageProgress {
    /// 1-based stage index.
    pub stage: usize,
    pub stages: usize,
    pub stage_elapsed: Duration,
    pub stage_remaining: Duration,
    pub start_target: u64,
    pub end_target: u64,
    pub current_target: u64,
}

impl From<StageSnapshot> for StageProgress {
    fn from(s: StageSnapshot) -> Self {
        Self {
            stage: s.index.saturating_add(1),
            stages: s.count,
            stage_elapsed: s.stage_elapsed,
            stage_remaining: s.stage_remaining,
            start_target: s.start_target,
            end_target: s.end_target,
            current_target: s.current_target,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Monotonic tick counter (1-based) for progress emissions.
    pub tick: u64,
    pub elapsed: Duration,
    pub stage: Option<StageProgress>,
    /// VU target applied at this tick.
    pub target: u64,
    pub live_vus: u64,
    pub iterations_total: u64,
}

pub type ProgressFn = std::sync::Arc<dyn Fn(ProgressUpdate) + Send + Sync + 'static>;
