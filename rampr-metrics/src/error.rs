use crate::metrics::MetricKind;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("metric `{name}` is already registered as a {existing} (requested {requested})")]
    DuplicateMetric {
        name: String,
        existing: MetricKind,
        requested: MetricKind,
    },

    #[error("unknown metric `{0}`")]
    UnknownMetric(String),
}
