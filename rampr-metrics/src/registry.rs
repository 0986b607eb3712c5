use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::metrics::{DEFAULT_TREND_SAMPLE_CAP, MetricHandle, MetricKind, MetricStorage};
use crate::snapshot::RunSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MetricId(u32);

#[derive(Debug)]
struct MetricDef {
    name: Arc<str>,
    kind: MetricKind,
    storage: MetricStorage,
}

/// Named metrics shared by every virtual user.
///
/// Registration takes a write lock; recording goes through atomics (counters, rates) or a
/// per-trend mutex, so unrelated metrics never contend.
#[derive(Debug)]
pub struct Registry {
    trend_cap: usize,
    names: DashMap<Arc<str>, MetricId>,
    defs: RwLock<Vec<MetricDef>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_trend_cap(DEFAULT_TREND_SAMPLE_CAP)
    }
}

impl Registry {
    pub fn with_trend_cap(trend_cap: usize) -> Self {
        Self {
            trend_cap,
            names: DashMap::new(),
            defs: RwLock::new(Vec::new()),
        }
    }

    pub fn trend_cap(&self) -> usize {
        self.trend_cap
    }

    /// Registers `name` as `kind`.
    ///
    /// Registering an existing name with the same kind returns the existing id.
    pub fn register(&self, name: &str, kind: MetricKind) -> Result<MetricId> {
        if let Some(id) = self.names.get(name).map(|e| *e.value()) {
            return self.ensure_kind(name, id, kind);
        }

        let mut defs = self.defs.write();

        // Check again to avoid race
        if let Some(id) = self.names.get(name).map(|e| *e.value()) {
            drop(defs);
            return self.ensure_kind(name, id, kind);
        }

        let id = MetricId(defs.len() as u32);
        let name: Arc<str> = Arc::from(name);
        defs.push(MetricDef {
            name: name.clone(),
            kind,
            storage: MetricStorage::new(kind, self.trend_cap),
        });
        self.names.insert(name, id);
        Ok(id)
    }

    fn ensure_kind(&self, name: &str, id: MetricId, requested: MetricKind) -> Result<MetricId> {
        let existing = self.kind_of(id)?;
        if existing != requested {
            return Err(Error::DuplicateMetric {
                name: name.to_string(),
                existing,
                requested,
            });
        }
        Ok(id)
    }

    fn kind_of(&self, id: MetricId) -> Result<MetricKind> {
        let defs = self.defs.read();
        defs.get(id.0 as usize)
            .map(|d| d.kind)
            .ok_or_else(|| Error::UnknownMetric(format!("#{}", id.0)))
    }

    pub fn lookup(&self, name: &str) -> Option<MetricId> {
        self.names.get(name).map(|e| *e.value())
    }

    pub fn get_handle(&self, metric: MetricId) -> Option<MetricHandle> {
        let defs = self.defs.read();
        defs.get(metric.0 as usize).map(|d| d.storage.handle())
    }

    pub fn handle(&self, name: &str) -> Result<MetricHandle> {
        self.lookup(name)
            .and_then(|id| self.get_handle(id))
            .ok_or_else(|| Error::UnknownMetric(name.to_string()))
    }

    pub fn record(&self, name: &str, value: f64) -> Result<()> {
        self.handle(name)?.record(value);
        Ok(())
    }

    pub fn record_by_id(&self, metric: MetricId, value: f64) -> Result<()> {
        let handle = self
            .get_handle(metric)
            .ok_or_else(|| Error::UnknownMetric(format!("#{}", metric.0)))?;
        handle.record(value);
        Ok(())
    }

    /// Adds `n` to a counter.
    pub fn add(&self, metric: MetricId, n: i64) -> Result<()> {
        self.typed_handle(metric, MetricKind::Counter)?.increment(n);
        Ok(())
    }

    pub fn add_rate(&self, metric: MetricId, success: bool) -> Result<()> {
        self.typed_handle(metric, MetricKind::Rate)?.add_rate(success);
        Ok(())
    }

    pub fn observe(&self, metric: MetricId, value: f64) -> Result<()> {
        self.typed_handle(metric, MetricKind::Trend)?.observe(value);
        Ok(())
    }

    fn typed_handle(&self, metric: MetricId, kind: MetricKind) -> Result<MetricHandle> {
        let defs = self.defs.read();
        let def = defs
            .get(metric.0 as usize)
            .ok_or_else(|| Error::UnknownMetric(format!("#{}", metric.0)))?;
        if def.kind != kind {
            return Err(Error::DuplicateMetric {
                name: def.name.to_string(),
                existing: def.kind,
                requested: kind,
            });
        }
        Ok(def.storage.handle())
    }

    pub fn len(&self) -> usize {
        self.defs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> RunSnapshot {
        let mut out = RunSnapshot::default();
        let defs = self.defs.read();

        for def in defs.iter() {
            let name = def.name.to_string();
            match &def.storage {
                MetricStorage::Counter(c) => {
                    out.counters
                        .insert(name, c.load(std::sync::atomic::Ordering::Relaxed));
                }
                MetricStorage::Rate(r) => {
                    out.rates.insert(name, r.value());
                }
                MetricStorage::Trend(t) => {
                    let t = t.lock();
                    out.trends.insert(name.clone(), t.samples().to_vec());
                    out.trend_summaries.insert(name, t.summary());
                }
            }
        }

        out
    }
}
