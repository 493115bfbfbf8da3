//! Metrics published by the owned-series service.
//!
//! Prometheus-style instruments backed by atomics and sharded maps,
//! aggregated into [`OwnedSeriesMetrics`]. The host process scrapes them
//! through [`OwnedSeriesMetrics::to_prometheus`].

mod instruments;

pub use instruments::{
    Counter, Gauge, Histogram, HistogramSnapshot, LabeledCounter, LabeledGauge,
};

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

use crate::tenant::RecomputeReason;

/// Buckets (in seconds) sized for reconciliation passes: usually
/// milliseconds, occasionally seconds for very large tenants.
pub const PASS_DURATION_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

/// Metrics for owned-series reconciliation.
#[derive(Debug)]
pub struct OwnedSeriesMetrics {
    /// Owned series per tenant, as of the last reconciliation.
    pub owned_series_per_tenant: LabeledGauge<1>,
    /// Info gauge: the reason of each tenant's last reconciliation.
    pub last_reason_per_tenant: LabeledGauge<2>,
    /// Reconciliations by reason.
    pub reconciliations_total: LabeledCounter<1>,
    /// Ring reads that failed and skipped a pass.
    pub ring_read_failures_total: Counter,
    /// Duration of full reconciliation passes.
    pub pass_duration: Histogram,
    /// Tenants currently open.
    pub tenants: Gauge,

    // Previous reason label per tenant, so the info gauge exposes exactly
    // one series per tenant.
    last_reason: Mutex<HashMap<String, &'static str>>,
}

impl OwnedSeriesMetrics {
    /// Create a new metrics instance.
    pub fn new() -> Self {
        Self {
            owned_series_per_tenant: LabeledGauge::new(
                "owned_series_per_tenant",
                "Series this ingester owns, per tenant",
                ["tenant"],
            ),
            last_reason_per_tenant: LabeledGauge::new(
                "reconciliation_last_reason_per_tenant",
                "Reason of the last reconciliation, per tenant",
                ["tenant", "reason"],
            ),
            reconciliations_total: LabeledCounter::new(
                "reconciliations_total",
                "Completed tenant reconciliations by reason",
                ["reason"],
            ),
            ring_read_failures_total: Counter::new(
                "reconciliation_ring_read_failures_total",
                "Reconciliation passes skipped because the ring could not be read",
            ),
            pass_duration: Histogram::new(
                "reconciliation_pass_duration_seconds",
                "Duration of full reconciliation passes",
                PASS_DURATION_BUCKETS,
            ),
            tenants: Gauge::new("owned_series_tenants", "Tenants currently tracked"),
            last_reason: Mutex::new(HashMap::new()),
        }
    }

    /// Record one successful tenant reconciliation.
    pub fn record_reconciliation(&self, tenant: &str, reason: RecomputeReason, owned: usize) {
        self.reconciliations_total.inc([reason.as_str()]);
        self.owned_series_per_tenant.set([tenant], owned as i64);

        let mut last = self.last_reason.lock();
        if let Some(previous) = last.insert(tenant.to_string(), reason.as_str()) {
            if previous != reason.as_str() {
                self.last_reason_per_tenant.remove([tenant, previous]);
            }
        }
        self.last_reason_per_tenant.set([tenant, reason.as_str()], 1);
    }

    /// Record the duration of a full pass.
    pub fn record_pass(&self, duration: Duration) {
        self.pass_duration.observe(duration);
    }

    /// Drop a closed tenant's series.
    pub fn remove_tenant(&self, tenant: &str) {
        self.owned_series_per_tenant.remove([tenant]);
        if let Some(previous) = self.last_reason.lock().remove(tenant) {
            self.last_reason_per_tenant.remove([tenant, previous]);
        }
    }

    /// Format all metrics in Prometheus exposition format.
    pub fn to_prometheus(&self) -> String {
        let mut output = String::new();

        write_labeled_gauge(&mut output, &self.owned_series_per_tenant);
        write_labeled_gauge(&mut output, &self.last_reason_per_tenant);

        output.push_str(&format!(
            "# HELP {name} {help}\n# TYPE {name} counter\n",
            name = self.reconciliations_total.name(),
            help = self.reconciliations_total.help(),
        ));
        for (values, value) in sorted(self.reconciliations_total.series()) {
            output.push_str(&format!(
                "{}{{{}}} {}\n",
                self.reconciliations_total.name(),
                format_labels(self.reconciliations_total.labels(), &values),
                value
            ));
        }

        output.push_str(&format!(
            "# HELP {name} {help}\n# TYPE {name} counter\n{name} {value}\n",
            name = self.ring_read_failures_total.name(),
            help = self.ring_read_failures_total.help(),
            value = self.ring_read_failures_total.get(),
        ));

        output.push_str(&format!(
            "# HELP {name} {help}\n# TYPE {name} gauge\n{name} {value}\n",
            name = self.tenants.name(),
            help = self.tenants.help(),
            value = self.tenants.get(),
        ));

        let pass = self.pass_duration.snapshot();
        output.push_str(&format!(
            "# HELP {name} {help}\n# TYPE {name} histogram\n{name}_sum {sum}\n{name}_count {count}\n",
            name = self.pass_duration.name(),
            help = self.pass_duration.help(),
            sum = pass.sum_seconds,
            count = pass.count,
        ));

        output
    }
}

impl Default for OwnedSeriesMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn write_labeled_gauge<const N: usize>(output: &mut String, gauge: &LabeledGauge<N>) {
    output.push_str(&format!(
        "# HELP {name} {help}\n# TYPE {name} gauge\n",
        name = gauge.name(),
        help = gauge.help(),
    ));
    for (values, value) in sorted(gauge.series()) {
        output.push_str(&format!(
            "{}{{{}}} {}\n",
            gauge.name(),
            format_labels(gauge.labels(), &values),
            value
        ));
    }
}

fn format_labels<const N: usize>(names: &[&'static str; N], values: &[String; N]) -> String {
    names
        .iter()
        .zip(values.iter())
        .map(|(name, value)| format!("{name}=\"{value}\""))
        .collect::<Vec<_>>()
        .join(",")
}

fn sorted<const N: usize, V>(mut entries: Vec<([String; N], V)>) -> Vec<([String; N], V)> {
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries
}
