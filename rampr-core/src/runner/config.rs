use std::time::Duration;

use rampr_metrics::DEFAULT_TREND_SAMPLE_CAP;

use super::error::{Error, Result};

pub const DEFAULT_VU_PACING_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_SCHEDULER_TICK_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Stage {
    pub duration: Duration,
    pub target: u64,
}

impl Stage {
    #[must_use]
    pub fn new(duration: Duration, target: u64) -> Self {
        Self { duration, target }
    }
}

/// Unvalidated stage as read from a config file or flags.
///
/// Signed so that negative inputs reach validation instead of failing to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageOptions {
    pub duration_ms: i64,
    pub target: i64,
}

impl StageOptions {
    #[must_use]
    pub fn new(duration: Duration, target: i64) -> Self {
        Self {
            duration_ms: duration.as_millis().try_into().unwrap_or(i64::MAX),
            target,
        }
    }
}

/// How a scenario reports a failed iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, strum::EnumString, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum FailurePolicy {
    /// Only a fault (returned error or panic) fails an iteration.
    #[default]
    ThrowOnly,

    /// A returned `IterationStatus::Failed` also fails the iteration.
    ReturnCode,
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub stages: Vec<StageOptions>,
    pub start_vus: Option<i64>,
    pub vu_pacing_delay: Option<Duration>,
    pub scheduler_tick_interval: Option<Duration>,
    pub trend_sample_cap: Option<usize>,
    pub shutdown_timeout: Option<Duration>,
    pub failure_policy: Option<FailurePolicy>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub stages: Vec<Stage>,
    /// VU target the first stage ramps from.
    pub start_vus: u64,
    pub vu_pacing_delay: Duration,
    pub scheduler_tick_interval: Duration,
    pub trend_sample_cap: usize,
    pub shutdown_timeout: Duration,
    pub failure_policy: FailurePolicy,
}

impl RunConfig {
    #[must_use]
    pub fn new(stages: Vec<Stage>) -> Self {
        Self {
            stages,
            start_vus: 0,
            vu_pacing_delay: DEFAULT_VU_PACING_DELAY,
            scheduler_tick_interval: DEFAULT_SCHEDULER_TICK_INTERVAL,
            trend_sample_cap: DEFAULT_TREND_SAMPLE_CAP,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            failure_policy: FailurePolicy::default(),
        }
    }

    pub fn from_options(opts: RunOptions) -> Result<Self> {
        if opts.stages.is_empty() {
            return Err(Error::InvalidConfig(
                "`stages` must be a non-empty array of { duration, target }".to_string(),
            ));
        }

        let mut stages = Vec::with_capacity(opts.stages.len());
        for (idx, s) in opts.stages.iter().enumerate() {
            let duration_ms = u64::try_from(s.duration_ms).map_err(|_| {
                Error::InvalidConfig(format!(
                    "stage {idx}: duration must not be negative (got {}ms)",
                    s.duration_ms
                ))
            })?;
            let target = u64::try_from(s.target).map_err(|_| {
                Error::InvalidConfig(format!(
                    "stage {idx}: target must not be negative (got {})",
                    s.target
                ))
            })?;
            stages.push(Stage::new(Duration::from_millis(duration_ms), target));
        }

        let start_vus = match opts.start_vus {
            None => 0,
            Some(v) => u64::try_from(v).map_err(|_| {
                Error::InvalidConfig(format!("`start_vus` must not be negative (got {v})"))
            })?,
        };

        let cfg = Self {
            stages,
            start_vus,
            vu_pacing_delay: opts.vu_pacing_delay.unwrap_or(DEFAULT_VU_PACING_DELAY),
            scheduler_tick_interval: opts
                .scheduler_tick_interval
                .unwrap_or(DEFAULT_SCHEDULER_TICK_INTERVAL),
            trend_sample_cap: opts.trend_sample_cap.unwrap_or(DEFAULT_TREND_SAMPLE_CAP),
            shutdown_timeout: opts.shutdown_timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT),
            failure_policy: opts.failure_policy.unwrap_or_default(),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.stages.is_empty() {
            return Err(Error::InvalidConfig(
                "`stages` must be a non-empty array of { duration, target }".to_string(),
            ));
        }
        if self.scheduler_tick_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "`scheduler_tick_interval` must be a positive duration".to_string(),
            ));
        }
        if self.trend_sample_cap == 0 {
            return Err(Error::InvalidConfig(
                "`trend_sample_cap` must be a positive integer".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn total_duration(&self) -> Duration {
        self.stages
            .iter()
            .fold(Duration::ZERO, |acc, s| acc.saturating_add(s.duration))
    }

    #[must_use]
    pub fn max_target(&self) -> u64 {
        self.stages
            .iter()
            .map(|s| s.target)
            .max()
            .unwrap_or(0)
            .max(self.start_vus)
    }
}
