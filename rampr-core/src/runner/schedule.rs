use std::time::Duration;

use super::config::Stage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSnapshot {
    pub index: usize,
    pub count: usize,
    pub stage_elapsed: Duration,
    pub stage_remaining: Duration,
    pub start_target: u64,
    pub end_target: u64,
    pub current_target: u64,
}

/// Piecewise-linear VU target over a sequence of stages.
///
/// Each stage ramps from the previous stage's target (or `start` for the first stage) to its
/// own target across its duration.
#[derive(Debug, Clone)]
pub struct RampingU64Schedule {
    start: u64,
    stages: Vec<Stage>,
    cumulative_ends: Vec<Duration>,
}

struct Position {
    index: usize,
    stage_start: Duration,
    stage_end: Duration,
}

impl RampingU64Schedule {
    pub fn new(start: u64, stages: Vec<Stage>) -> Self {
        let mut cumulative_ends = Vec::with_capacity(stages.len());
        let mut acc = Duration::ZERO;
        for s in &stages {
            acc = acc.saturating_add(s.duration);
            cumulative_ends.push(acc);
        }

        Self {
            start,
            stages,
            cumulative_ends,
        }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn total_duration(&self) -> Duration {
        self.cumulative_ends
            .last()
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    pub fn is_done(&self, elapsed: Duration) -> bool {
        elapsed >= self.total_duration()
    }

    fn start_target_of(&self, index: usize) -> u64 {
        if index == 0 {
            self.start
        } else {
            self.stages[index - 1].target
        }
    }

    // Stage containing `elapsed`; a boundary instant belongs to the stage that ends there.
    fn locate(&self, elapsed: Duration) -> Option<Position> {
        if self.stages.is_empty() {
            return None;
        }

        let index = match self.cumulative_ends.binary_search(&elapsed) {
            Ok(i) | Err(i) => i.min(self.stages.len() - 1),
        };

        let stage_start = index
            .checked_sub(1)
            .map_or(Duration::ZERO, |prev| self.cumulative_ends[prev]);

        Some(Position {
            index,
            stage_start,
            stage_end: self.cumulative_ends[index],
        })
    }

    pub fn target_at(&self, elapsed: Duration) -> u64 {
        if elapsed.is_zero() {
            // Leading zero-duration stages have already completed at t=0.
            let done = self.cumulative_ends.partition_point(Duration::is_zero);
            return done
                .checked_sub(1)
                .map_or(self.start, |last| self.stages[last].target);
        }
        if elapsed >= self.total_duration() {
            return self.stages.last().map_or(self.start, |s| s.target);
        }

        let Some(pos) = self.locate(elapsed) else {
            return self.start;
        };

        let start_target = self.start_target_of(pos.index);
        let end_target = self.stages[pos.index].target;

        let stage_duration = pos.stage_end.saturating_sub(pos.stage_start);
        if stage_duration.is_zero() {
            return end_target;
        }

        let stage_elapsed = elapsed.saturating_sub(pos.stage_start);
        let delta = end_target as i128 - start_target as i128;
        let num = stage_elapsed.as_nanos() as i128;
        let den = stage_duration.as_nanos() as i128;

        let cur = start_target as i128 + delta.saturating_mul(num) / den.max(1);
        cur.clamp(0, u64::MAX as i128) as u64
    }

    pub fn stage_snapshot_at(&self, elapsed: Duration) -> Option<StageSnapshot> {
        let clamped = elapsed.min(self.total_duration());
        let pos = self.locate(clamped)?;

        let stage_duration = pos.stage_end.saturating_sub(pos.stage_start);
        let stage_elapsed = clamped.saturating_sub(pos.stage_start);

        Some(StageSnapshot {
            index: pos.index,
            count: self.stages.len(),
            stage_elapsed,
            stage_remaining: stage_duration.saturating_sub(stage_elapsed),
            start_target: self.start_target_of(pos.index),
            end_target: self.stages[pos.index].target,
            current_target: self.target_at(clamped),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn ramp_hold_drain() -> RampingU64Schedule {
        RampingU64Schedule::new(
            0,
            vec![
                Stage::new(secs(2), 10),
                Stage::new(secs(3), 10),
                Stage::new(secs(1), 0),
            ],
        )
    }

    #[test]
    fn interpolates_linearly_within_a_ramp() {
        let s = ramp_hold_drain();
        assert_eq!(s.target_at(Duration::ZERO), 0);
        assert_eq!(s.target_at(secs(1)), 5);
        assert_eq!(s.target_at(Duration::from_millis(1_500)), 7);
        assert_eq!(s.target_at(secs(2)), 10);
    }

    #[test]
    fn hold_stage_keeps_target() {
        let s = ramp_hold_drain();
        for ms in [2_000, 2_500, 3_000, 4_999] {
            assert_eq!(s.target_at(Duration::from_millis(ms)), 10, "at {ms}ms");
        }
    }

    #[test]
    fn ramp_down_reaches_zero_at_end() {
        let s = ramp_hold_drain();
        assert_eq!(s.target_at(Duration::from_millis(5_500)), 5);
        assert_eq!(s.target_at(secs(6)), 0);
        assert_eq!(s.target_at(secs(60)), 0);
        assert!(s.is_done(secs(6)));
        assert!(!s.is_done(Duration::from_millis(5_999)));
    }

    #[test]
    fn start_target_seeds_first_stage() {
        let s = RampingU64Schedule::new(4, vec![Stage::new(secs(4), 8)]);
        assert_eq!(s.target_at(Duration::ZERO), 4);
        assert_eq!(s.target_at(secs(2)), 6);
    }

    #[test]
    fn zero_duration_stage_jumps_to_target() {
        let s = RampingU64Schedule::new(0, vec![Stage::new(Duration::ZERO, 7), Stage::new(secs(2), 7)]);
        assert_eq!(s.target_at(Duration::from_millis(1)), 7);
        assert_eq!(s.total_duration(), secs(2));
    }

    #[test]
    fn leading_zero_duration_stages_apply_at_start() {
        let s = RampingU64Schedule::new(
            1,
            vec![
                Stage::new(Duration::ZERO, 4),
                Stage::new(Duration::ZERO, 7),
                Stage::new(secs(2), 9),
            ],
        );
        assert_eq!(s.target_at(Duration::ZERO), 7);
        assert_eq!(s.target_at(secs(1)), 8);
        assert_eq!(
            s.stage_snapshot_at(Duration::ZERO).map(|st| st.current_target),
            Some(7)
        );
    }

    #[test]
    fn stage_snapshot_reports_position() {
        let s = ramp_hold_drain();
        let snap = s.stage_snapshot_at(secs(3));
        assert_eq!(
            snap,
            Some(StageSnapshot {
                index: 1,
                count: 3,
                stage_elapsed: secs(1),
                stage_remaining: secs(2),
                start_target: 10,
                end_target: 10,
                current_target: 10,
            })
        );

        let last = s.stage_snapshot_at(secs(100)).map(|st| st.index);
        assert_eq!(last, Some(2));
    }

    #[test]
    fn empty_schedule_is_immediately_done() {
        let s = RampingU64Schedule::new(3, Vec::new());
        assert_eq!(s.total_duration(), Duration::ZERO);
        assert_eq!(s.target_at(secs(1)), 3);
        assert!(s.stage_snapshot_at(secs(1)).is_none());
    }
}
