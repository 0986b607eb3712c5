use anyhow::Context as _;
use rampr_core::{CancellationToken, RunConfig, RunController, RunOptions, RunSummary, Scenario};

use crate::cli::RunArgs;
use crate::config_yaml::{self, RunDocYaml};
use crate::exit_codes::ExitCode;
use crate::output::{self, OutputFormatter, RunHeader};
use crate::run_error::{RunError, classify_core_error};
use crate::scenarios::{BuiltinScenario, Noop, UserFlow};

pub(crate) const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Run inputs after flags have been layered over the config file.
#[derive(Debug, Clone)]
pub(crate) struct RunPlan {
    pub scenario: BuiltinScenario,
    pub base_url: String,
    pub options: RunOptions,
}

impl RunPlan {
    pub(crate) fn resolve(doc: &RunDocYaml, args: &RunArgs) -> anyhow::Result<Self> {
        let mut options = doc.run_options()?;
        if let Some(pacing) = args.pacing {
            options.vu_pacing_delay = Some(pacing);
        }
        if let Some(tick) = args.tick {
            options.scheduler_tick_interval = Some(tick);
        }
        if let Some(timeout) = args.shutdown_timeout {
            options.shutdown_timeout = Some(timeout);
        }

        let scenario = match args.scenario {
            Some(s) => s,
            None => doc.scenario()?.unwrap_or_default(),
        };
        let base_url = args
            .base_url
            .clone()
            .or_else(|| doc.base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(Self {
            scenario,
            base_url,
            options,
        })
    }
}

pub async fn run(args: RunArgs) -> Result<ExitCode, RunError> {
    let out = output::formatter(args.output);

    let doc = config_yaml::load_run_doc(&args.config)
        .await
        .map_err(RunError::InvalidInput)?;
    let plan = RunPlan::resolve(&doc, &args)
        .with_context(|| format!("invalid run config: {}", args.config.display()))
        .map_err(RunError::InvalidInput)?;
    let config = RunConfig::from_options(plan.options.clone())
        .map_err(|err| classify_core_error(err, "invalid run config"))?;
    let mut controller =
        RunController::new(config).map_err(|err| classify_core_error(err, "invalid run config"))?;

    out.print_header(&RunHeader {
        config_path: &args.config,
        scenario: plan.scenario,
        base_url: &plan.base_url,
        config: controller.config(),
    });
    if let Some(progress) = out.progress() {
        controller = controller.with_progress(progress);
    }

    let summary = match plan.scenario {
        BuiltinScenario::UserFlow => {
            let flow = UserFlow::new(&plan.base_url, controller.registry())
                .map_err(RunError::InvalidInput)?;
            execute_until_interrupted(controller, flow).await?
        }
        BuiltinScenario::Noop => execute_until_interrupted(controller, Noop).await?,
    };

    report(out.as_ref(), &args, &summary).await?;

    Ok(ExitCode::from_checks(
        output::checks_failed_total(&summary.snapshot) > 0,
    ))
}

async fn execute_until_interrupted<S: Scenario>(
    controller: RunController,
    scenario: S,
) -> Result<RunSummary, RunError> {
    let cancel = CancellationToken::new();
    let interrupt = tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    let res = controller.execute(scenario, cancel).await;
    interrupt.abort();

    res.map_err(|err| classify_core_error(err, "run failed"))
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("interrupt received, stopping run");
            cancel.cancel();
        }
        Err(err) => tracing::warn!(error = %err, "failed to listen for ctrl-c"),
    }
}

async fn report(
    out: &dyn OutputFormatter,
    args: &RunArgs,
    summary: &RunSummary,
) -> Result<(), RunError> {
    out.print_summary(summary).map_err(RunError::RuntimeError)?;

    if let Some(path) = &args.summary_export {
        output::write_summary_export(path, summary)
            .await
            .map_err(RunError::RuntimeError)?;
    }
    Ok(())
}
