use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

mod duration;
mod format;
mod progress;
mod summary;

use format::{format_duration, format_rate};
use progress::HumanProgress;
use rampr_core::{ProgressFn, RunSummary};
use summary::render;

use super::{OutputFormatter, RunHeader};

pub(crate) struct HumanReadableOutput {
    progress: Arc<HumanProgress>,
    total_duration: Arc<Mutex<Duration>>,
}

impl HumanReadableOutput {
    pub(crate) fn new() -> Self {
        Self {
            progress: Arc::new(HumanProgress::new()),
            total_duration: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }
}

impl OutputFormatter for HumanReadableOutput {
    fn print_header(&self, header: &RunHeader<'_>) {
        let cfg = header.config;
        *self
            .total_duration
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = cfg.total_duration();

        println!("config: {}", header.config_path.display());
        println!(
            "scenario: {} base_url={} failure_policy={}",
            header.scenario, header.base_url, cfg.failure_policy
        );
        println!(
            "stages: {} duration={} start_vus={} max_vus={} pacing={} tick={}",
            cfg.stages.len(),
            format_duration(cfg.total_duration()),
            cfg.start_vus,
            cfg.max_target(),
            humantime::format_duration(cfg.vu_pacing_delay),
            humantime::format_duration(cfg.scheduler_tick_interval),
        );
        println!();
    }

    fn progress(&self) -> Option<ProgressFn> {
        let progress = self.progress.clone();
        let total_duration = self.total_duration.clone();
        let prev: Arc<Mutex<Option<(Duration, u64)>>> = Arc::new(Mutex::new(None));

        Some(Arc::new(move |u| {
            let total = *total_duration
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());

            let prev_sample = prev
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .replace((u.elapsed, u.iterations_total));

            let iters_per_sec = match prev_sample {
                Some((prev_elapsed, prev_iters)) => {
                    let dt = u.elapsed.saturating_sub(prev_elapsed).as_secs_f64().max(1e-9);
                    (u.iterations_total.saturating_sub(prev_iters) as f64) / dt
                }
                None => 0.0,
            };

            let mut message = match &u.stage {
                Some(stage) => format!(
                    "stage={}/{} target={} stage_remaining={}",
                    stage.stage,
                    stage.stages,
                    u.target,
                    format_duration(stage.stage_remaining)
                ),
                None => format!("target={}", u.target),
            };
            message.push_str(&format!(
                " vus={} iters={} iters/s={} elapsed={}",
                u.live_vus,
                u.iterations_total,
                format_rate(iters_per_sec),
                format_duration(u.elapsed)
            ));

            progress.update("run", total, u.elapsed, message);
        }))
    }

    fn print_summary(&self, summary: &RunSummary) -> anyhow::Result<()> {
        self.progress.finish();
        print!("{}", render(summary));
        Ok(())
    }
}
