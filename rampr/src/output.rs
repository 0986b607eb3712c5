use std::path::Path;

use anyhow::Context as _;
use rampr_core::{ProgressFn, RunConfig, RunSummary};

use crate::cli::OutputFormat;
use crate::scenarios::BuiltinScenario;

mod human;
mod json;
mod report;

pub(crate) use report::{SummaryExport, checks_failed_total};

/// What is about to run, as resolved from the config file and flags.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RunHeader<'a> {
    pub config_path: &'a Path,
    pub scenario: BuiltinScenario,
    pub base_url: &'a str,
    pub config: &'a RunConfig,
}

pub(crate) trait OutputFormatter: Send + Sync {
    fn print_header(&self, header: &RunHeader<'_>);
    fn progress(&self) -> Option<ProgressFn>;
    fn print_summary(&self, summary: &RunSummary) -> anyhow::Result<()>;
}

pub(crate) fn formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::HumanReadable => Box::new(human::HumanReadableOutput::new()),
        OutputFormat::Json => Box::new(json::JsonOutput),
    }
}

pub(crate) async fn write_summary_export(path: &Path, summary: &RunSummary) -> anyhow::Result<()> {
    let json = serde_json::to_vec_pretty(&SummaryExport::new(summary))
        .context("failed to serialize summary export")?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.with_context(|| {
            format!("failed to create summary export dir: {}", parent.display())
        })?;
    }
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("failed to write summary export: {}", path.display()))
}
