use hdrhistogram::Histogram;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use crate::snapshot::{RateValue, TrendSummary};

/// Samples retained per trend before reservoir sampling kicks in.
pub const DEFAULT_TREND_SAMPLE_CAP: usize = 100_000;

// Trend values are recorded into the histogram with 3 decimal places.
const TREND_SCALE: f64 = 1_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum MetricKind {
    Counter,
    Rate,
    Trend,
}

pub(crate) fn new_default_histogram() -> Histogram<u64> {
    // Upper bound: 1 hour expressed in milliseconds, scaled.
    match Histogram::<u64>::new_with_bounds(1, 3_600_000_000, 3) {
        Ok(h) => h,
        Err(err) => panic!("failed to create histogram: {err}"),
    }
}

#[derive(Debug, Default)]
pub struct Rate {
    successes: AtomicU64,
    total: AtomicU64,
}

impl Rate {
    #[inline]
    pub fn add(&self, success: bool) {
        // `total` is bumped first and `successes` published with Release, so any reader that
        // observes a success also observes its matching total.
        self.total.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successes.fetch_add(1, Ordering::Release);
        }
    }

    pub fn value(&self) -> RateValue {
        let successes = self.successes.load(Ordering::Acquire);
        let total = self.total.load(Ordering::Relaxed);
        RateValue {
            successes: successes.min(total),
            total,
        }
    }
}

/// Ordered sample buffer capped at `cap` entries.
///
/// Once full, Algorithm R keeps a uniform sample of every observed value. The histogram and the
/// exact min/max/sum always see every value, so summaries do not depend on the cap.
#[derive(Debug)]
pub struct Trend {
    cap: usize,
    seen: u64,
    samples: Vec<f64>,
    min: f64,
    max: f64,
    sum: f64,
    histogram: Histogram<u64>,
}

impl Trend {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            seen: 0,
            samples: Vec::new(),
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            sum: 0.0,
            histogram: new_default_histogram(),
        }
    }

    pub fn observe(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }

        self.seen = self.seen.saturating_add(1);
        if self.samples.len() < self.cap {
            self.samples.push(value);
        } else if self.cap > 0 {
            let slot = fastrand::u64(0..self.seen);
            if slot < self.cap as u64 {
                self.samples[slot as usize] = value;
            }
        }

        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sum += value;

        let scaled = (value.max(0.0) * TREND_SCALE).round() as u64;
        self.histogram.saturating_record(scaled.max(1));
    }

    pub fn seen(&self) -> u64 {
        self.seen
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn summary(&self) -> TrendSummary {
        if self.seen == 0 {
            return TrendSummary::default();
        }

        let q = |quantile: f64| Some(self.histogram.value_at_quantile(quantile) as f64 / TREND_SCALE);

        TrendSummary {
            count: self.seen,
            min: Some(self.min),
            max: Some(self.max),
            mean: Some(self.sum / self.seen as f64),
            p50: q(0.50),
            p90: q(0.90),
            p95: q(0.95),
            p99: q(0.99),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum MetricStorage {
    Counter(Arc<AtomicI64>),
    Rate(Arc<Rate>),
    Trend(Arc<Mutex<Trend>>),
}

impl MetricStorage {
    pub(crate) fn new(kind: MetricKind, trend_cap: usize) -> Self {
        match kind {
            MetricKind::Counter => MetricStorage::Counter(Arc::new(AtomicI64::new(0))),
            MetricKind::Rate => MetricStorage::Rate(Arc::new(Rate::default())),
            MetricKind::Trend => MetricStorage::Trend(Arc::new(Mutex::new(Trend::new(trend_cap)))),
        }
    }

    pub(crate) fn handle(&self) -> MetricHandle {
        match self {
            MetricStorage::Counter(a) => MetricHandle::Counter(a.clone()),
            MetricStorage::Rate(a) => MetricHandle::Rate(a.clone()),
            MetricStorage::Trend(a) => MetricHandle::Trend(a.clone()),
        }
    }
}

// Public handle for writing metrics
#[derive(Debug, Clone)]
pub enum MetricHandle {
    Counter(Arc<AtomicI64>),
    Rate(Arc<Rate>),
    Trend(Arc<Mutex<Trend>>),
}

impl MetricHandle {
    pub fn kind(&self) -> MetricKind {
        match self {
            MetricHandle::Counter(_) => MetricKind::Counter,
            MetricHandle::Rate(_) => MetricKind::Rate,
            MetricHandle::Trend(_) => MetricKind::Trend,
        }
    }

    /// Records `value` according to the metric kind.
    ///
    /// Counters add the rounded value, rates count a success for any non-zero value, trends
    /// append the sample.
    pub fn record(&self, value: f64) {
        match self {
            MetricHandle::Counter(c) => {
                c.fetch_add(value.round() as i64, Ordering::Relaxed);
            }
            MetricHandle::Rate(r) => r.add(value != 0.0),
            MetricHandle::Trend(t) => t.lock().observe(value),
        }
    }

    #[inline]
    pub fn increment(&self, value: i64) {
        if let MetricHandle::Counter(c) = self {
            c.fetch_add(value, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn add_rate(&self, success: bool) {
        if let MetricHandle::Rate(r) = self {
            r.add(success);
        }
    }

    #[inline]
    pub fn observe(&self, value: f64) {
        if let MetricHandle::Trend(t) = self {
            t.lock().observe(value);
        }
    }

    pub fn get_counter(&self) -> i64 {
        if let MetricHandle::Counter(c) = self {
            c.load(Ordering::Relaxed)
        } else {
            0
        }
    }

    pub fn get_rate(&self) -> RateValue {
        if let MetricHandle::Rate(r) = self {
            r.value()
        } else {
            RateValue::default()
        }
    }
}
