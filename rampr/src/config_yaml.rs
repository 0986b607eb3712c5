use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use rampr_core::{FailurePolicy, RunOptions, StageOptions};
use serde::Deserialize;

use crate::scenarios::BuiltinScenario;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct RunDocYaml {
    #[serde(default)]
    pub scenario: Option<String>,

    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default)]
    pub stages: Vec<StageYaml>,

    #[serde(rename = "startVUs", default)]
    pub start_vus: Option<i64>,

    #[serde(default)]
    pub vu_pacing_delay: Option<YamlDuration>,

    #[serde(default)]
    pub scheduler_tick_interval: Option<YamlDuration>,

    #[serde(default)]
    pub trend_sample_cap: Option<usize>,

    #[serde(default)]
    pub shutdown_timeout: Option<YamlDuration>,

    #[serde(default)]
    pub failure_policy: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct StageYaml {
    pub target: i64,

    #[serde(default)]
    pub duration: YamlDuration,
}

/// Duration that keeps its sign so negative values can be rejected by validation with a
/// field-specific message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct YamlDuration {
    negative: bool,
    magnitude: Duration,
}

impl YamlDuration {
    fn positive(magnitude: Duration) -> Self {
        Self {
            negative: false,
            magnitude,
        }
    }

    fn signed_millis(self) -> i64 {
        let ms = i64::try_from(self.magnitude.as_millis()).unwrap_or(i64::MAX);
        if self.negative { -ms } else { ms }
    }

    fn non_negative(self, field: &str) -> anyhow::Result<Duration> {
        if self.negative && !self.magnitude.is_zero() {
            anyhow::bail!(
                "`{field}` must not be negative (got -{})",
                humantime::format_duration(self.magnitude)
            );
        }
        Ok(self.magnitude)
    }
}

impl<'de> Deserialize<'de> for YamlDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct V;

        impl<'de> serde::de::Visitor<'de> for V {
            type Value = YamlDuration;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("duration as string (e.g. 10s), integer seconds, or float seconds")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(YamlDuration::positive(Duration::from_secs(v)))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(YamlDuration {
                    negative: v < 0,
                    magnitude: Duration::from_secs(v.unsigned_abs()),
                })
            }

            fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                if !v.is_finite() {
                    return Err(E::custom("duration must be a finite number"));
                }
                let magnitude =
                    Duration::try_from_secs_f64(v.abs()).map_err(E::custom)?;
                Ok(YamlDuration {
                    negative: v < 0.0,
                    magnitude,
                })
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let s = v.trim();
                let (negative, rest) = match s.strip_prefix('-') {
                    Some(rest) => (true, rest.trim_start()),
                    None => (false, s),
                };
                let magnitude = humantime::parse_duration(rest).map_err(E::custom)?;
                Ok(YamlDuration {
                    negative,
                    magnitude,
                })
            }

            fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                self.visit_str(&v)
            }
        }

        deserializer.deserialize_any(V)
    }
}

pub(crate) fn parse_run_doc(yaml: &str) -> anyhow::Result<RunDocYaml> {
    serde_yaml::from_str(yaml).context("failed to parse run config yaml")
}

pub(crate) async fn load_run_doc(path: &Path) -> anyhow::Result<RunDocYaml> {
    let yaml = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read run config: {}", path.display()))?;
    parse_run_doc(&yaml).with_context(|| format!("invalid run config: {}", path.display()))
}

impl RunDocYaml {
    pub(crate) fn scenario(&self) -> anyhow::Result<Option<BuiltinScenario>> {
        self.scenario
            .as_deref()
            .map(|name| {
                name.parse::<BuiltinScenario>().map_err(|_| {
                    anyhow::anyhow!(
                        "unknown scenario `{name}` (expected one of: {})",
                        BuiltinScenario::names().join(", ")
                    )
                })
            })
            .transpose()
    }

    /// Engine options exactly as written; range checks happen in `RunConfig::from_options`.
    pub(crate) fn run_options(&self) -> anyhow::Result<RunOptions> {
        let failure_policy = self
            .failure_policy
            .as_deref()
            .map(|raw| {
                raw.parse::<FailurePolicy>().map_err(|_| {
                    anyhow::anyhow!(
                        "invalid `failurePolicy` `{raw}` (expected throw-only or return-code)"
                    )
                })
            })
            .transpose()?;

        Ok(RunOptions {
            stages: self
                .stages
                .iter()
                .map(|s| StageOptions {
                    duration_ms: s.duration.signed_millis(),
                    target: s.target,
                })
                .collect(),
            start_vus: self.start_vus,
            vu_pacing_delay: self
                .vu_pacing_delay
                .map(|d| d.non_negative("vuPacingDelay"))
                .transpose()?,
            scheduler_tick_interval: self
                .scheduler_tick_interval
                .map(|d| d.non_negative("schedulerTickInterval"))
                .transpose()?,
            trend_sample_cap: self.trend_sample_cap,
            shutdown_timeout: self
                .shutdown_timeout
                .map(|d| d.non_negative("shutdownTimeout"))
                .transpose()?,
            failure_policy,
        })
    }
}
