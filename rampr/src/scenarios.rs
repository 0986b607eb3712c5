mod noop;
mod user_flow;

pub(crate) use noop::Noop;
pub(crate) use user_flow::UserFlow;

use strum::VariantNames as _;

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    clap::ValueEnum,
    strum::Display,
    strum::EnumString,
    strum::VariantNames,
)]
#[strum(serialize_all = "kebab-case")]
pub enum BuiltinScenario {
    /// Register, look up and promote one account per iteration.
    #[default]
    UserFlow,
    /// No I/O; useful for dry runs of a stage profile.
    Noop,
}

impl BuiltinScenario {
    pub(crate) fn names() -> &'static [&'static str] {
        Self::VARIANTS
    }
}
