use std::time::Duration;

use rampr_core::RateValue;

use super::duration::format_duration_single;

pub(crate) fn format_rate(v: f64) -> String {
    if v.is_finite() {
        format!("{v:.0}")
    } else {
        "0".to_string()
    }
}

pub(crate) fn format_duration(d: Duration) -> String {
    humantime::format_duration(Duration::from_secs(d.as_secs())).to_string()
}

/// Trend samples are recorded in milliseconds.
pub(crate) fn format_millis_opt(v: Option<f64>) -> String {
    match v {
        Some(ms) if ms.is_finite() && ms >= 0.0 => {
            format_duration_single(Duration::from_secs_f64(ms / 1_000.0))
        }
        _ => "-".to_string(),
    }
}

pub(crate) fn format_ratio(r: &RateValue) -> String {
    match r.ratio() {
        Some(ratio) => format!("{:.2}% ({}/{})", ratio * 100.0, r.successes, r.total),
        None => "n/a (0/0)".to_string(),
    }
}
