//! The metric instruments the owned-series service publishes through.
//!
//! Deliberately small: plain counters and gauges on atomics, labeled
//! variants on a sharded map keyed by tenant or reason, and a fixed-bounds
//! duration histogram for reconciliation passes. Labeled series come and go
//! with tenants, so the labeled types support removal but not resets.

use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

/// A monotonically increasing counter.
#[derive(Debug)]
pub struct Counter {
    name: &'static str,
    help: &'static str,
    value: AtomicU64,
}

impl Counter {
    pub fn new(name: &'static str, help: &'static str) -> Self {
        Self {
            name,
            help,
            value: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn help(&self) -> &'static str {
        self.help
    }

    /// Count one occurrence.
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// A gauge holding one signed value.
#[derive(Debug)]
pub struct Gauge {
    name: &'static str,
    help: &'static str,
    value: AtomicI64,
}

impl Gauge {
    pub fn new(name: &'static str, help: &'static str) -> Self {
        Self {
            name,
            help,
            value: AtomicI64::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn help(&self) -> &'static str {
        self.help
    }

    pub fn set(&self, value: i64) {
        self.value.store(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// A counter partitioned by label values, e.g. reconciliations by reason.
#[derive(Debug)]
pub struct LabeledCounter<const N: usize> {
    name: &'static str,
    help: &'static str,
    labels: [&'static str; N],
    series: DashMap<[String; N], u64>,
}

impl<const N: usize> LabeledCounter<N> {
    pub fn new(name: &'static str, help: &'static str, labels: [&'static str; N]) -> Self {
        Self {
            name,
            help,
            labels,
            series: DashMap::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn help(&self) -> &'static str {
        self.help
    }

    pub fn labels(&self) -> &[&'static str; N] {
        &self.labels
    }

    /// Count one occurrence for the given label values.
    pub fn inc(&self, values: [&str; N]) {
        *self.series.entry(values.map(|v| v.to_owned())).or_insert(0) += 1;
    }

    pub fn get(&self, values: [&str; N]) -> u64 {
        self.series
            .get(&values.map(|v| v.to_owned()))
            .map(|entry| *entry)
            .unwrap_or(0)
    }

    /// All series with their label values, in map order.
    pub fn series(&self) -> Vec<([String; N], u64)> {
        self.series
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }
}

/// A gauge partitioned by label values, e.g. owned series by tenant.
#[derive(Debug)]
pub struct LabeledGauge<const N: usize> {
    name: &'static str,
    help: &'static str,
    labels: [&'static str; N],
    series: DashMap<[String; N], i64>,
}

impl<const N: usize> LabeledGauge<N> {
    pub fn new(name: &'static str, help: &'static str, labels: [&'static str; N]) -> Self {
        Self {
            name,
            help,
            labels,
            series: DashMap::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn help(&self) -> &'static str {
        self.help
    }

    pub fn labels(&self) -> &[&'static str; N] {
        &self.labels
    }

    pub fn set(&self, values: [&str; N], value: i64) {
        self.series.insert(values.map(|v| v.to_owned()), value);
    }

    pub fn get(&self, values: [&str; N]) -> i64 {
        self.series
            .get(&values.map(|v| v.to_owned()))
            .map(|entry| *entry)
            .unwrap_or(0)
    }

    /// Drop the series with these label values, e.g. when a tenant closes.
    pub fn remove(&self, values: [&str; N]) {
        self.series.remove(&values.map(|v| v.to_owned()));
    }

    /// All series with their label values, in map order.
    pub fn series(&self) -> Vec<([String; N], i64)> {
        self.series
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }
}

/// A histogram of durations over fixed, ascending bucket bounds (seconds).
///
/// Observation is two atomic adds: the duration accumulates as integer
/// microseconds, and exactly one interval slot is bumped (the last slot
/// catches everything past the largest bound). The snapshot cumulates the
/// intervals into Prometheus-style `le` counts.
#[derive(Debug)]
pub struct Histogram {
    name: &'static str,
    help: &'static str,
    bounds: &'static [f64],
    // One slot per bound, plus the overflow slot.
    interval_counts: Vec<AtomicU64>,
    sum_micros: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    pub fn new(name: &'static str, help: &'static str, bounds: &'static [f64]) -> Self {
        debug_assert!(bounds.windows(2).all(|pair| pair[0] < pair[1]));
        Self {
            name,
            help,
            bounds,
            interval_counts: (0..=bounds.len()).map(|_| AtomicU64::new(0)).collect(),
            sum_micros: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn help(&self) -> &'static str {
        self.help
    }

    /// Record one observed duration.
    pub fn observe(&self, duration: Duration) {
        let seconds = duration.as_secs_f64();
        let slot = self
            .bounds
            .iter()
            .position(|&bound| seconds <= bound)
            .unwrap_or(self.bounds.len());
        self.interval_counts[slot].fetch_add(1, Ordering::Relaxed);
        self.sum_micros
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Total number of observations.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> HistogramSnapshot {
        let mut cumulative_counts = Vec::with_capacity(self.bounds.len());
        let mut running = 0;
        for slot in &self.interval_counts[..self.bounds.len()] {
            running += slot.load(Ordering::Relaxed);
            cumulative_counts.push(running);
        }
        HistogramSnapshot {
            bounds: self.bounds,
            cumulative_counts,
            sum_seconds: self.sum_micros.load(Ordering::Relaxed) as f64 / 1e6,
            count: self.count(),
        }
    }
}

/// A point-in-time copy of histogram data, counts cumulated per bound.
#[derive(Debug, Clone)]
pub struct HistogramSnapshot {
    pub bounds: &'static [f64],
    pub cumulative_counts: Vec<u64>,
    pub sum_seconds: f64,
    pub count: u64,
}
