use rampr_core::{IterationContext, IterationStatus, Scenario, ScenarioResult};

pub(crate) struct Noop;

impl Scenario for Noop {
    async fn iteration(&self, _ctx: IterationContext) -> ScenarioResult {
        Ok(IterationStatus::Ok)
    }
}
