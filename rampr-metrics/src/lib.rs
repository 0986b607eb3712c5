pub mod error;
pub mod metrics;
pub mod registry;
pub mod snapshot;

pub use error::{Error, Result};
pub use metrics::{DEFAULT_TREND_SAMPLE_CAP, MetricHandle, MetricKind, Rate, Trend};
pub use registry::{MetricId, Registry};
pub use snapshot::{RateValue, RunSnapshot, TrendSummary};
