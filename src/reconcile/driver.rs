//! The reconciliation driver.

use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::OwnedSeriesConfig;
use crate::error::{Error, Result};
use crate::limits::{LimitsProvider, ShardSizeSanitizer};
use crate::metrics::OwnedSeriesMetrics;
use crate::reconcile::compute::compute_owned_series;
use crate::ring::{RingChangeDetector, RingSource};
use crate::shard::zone_local_shard_size;
use crate::tenant::{RecomputeReason, TenantRegistry};

/// Drives owned-series reconciliation for every tenant on this ingester.
///
/// A single long-lived loop reconciles periodically and whenever the ring
/// watcher nudges it; both entry points ask the change detector first, so
/// gossip noise (heartbeats, state flips) never triggers work. A tenant is
/// never recomputed concurrently with itself because the loop is the only
/// recomputing caller.
pub struct OwnedSeriesService {
    config: OwnedSeriesConfig,
    ring: Arc<dyn RingSource>,
    registry: Arc<TenantRegistry>,
    limits: Arc<dyn LimitsProvider>,
    metrics: Arc<OwnedSeriesMetrics>,
    detector: RingChangeDetector,
    sanitizer: ShardSizeSanitizer,
    ring_changed: Arc<Notify>,
}

impl OwnedSeriesService {
    /// Create the service. Fails on invalid configuration.
    pub fn new(
        config: OwnedSeriesConfig,
        ring: Arc<dyn RingSource>,
        registry: Arc<TenantRegistry>,
        limits: Arc<dyn LimitsProvider>,
        metrics: Arc<OwnedSeriesMetrics>,
    ) -> Result<Self> {
        config.validate().map_err(Error::Config)?;
        Ok(Self {
            config,
            ring,
            registry,
            limits,
            metrics,
            detector: RingChangeDetector::new(),
            sanitizer: ShardSizeSanitizer::new(),
            ring_changed: Arc::new(Notify::new()),
        })
    }

    /// Ask the detector whether the ring's ownership projection changed
    /// since the last successful check. The first check after startup always
    /// reports a change; errors from the ring layer leave the detector cache
    /// untouched, so the next call retries against the same baseline.
    pub fn check_ring_for_changes(&self) -> Result<bool> {
        let snapshot = self.ring.current_snapshot()?;
        Ok(self.detector.check(&snapshot))
    }

    /// Reconcile all tenants once. Returns how many tenants were
    /// recomputed.
    ///
    /// `ring_changed` is the caller's verdict, normally obtained from
    /// [`check_ring_for_changes`]; passing `false` restricts the pass to
    /// tenants with a pending reason or a shard-size drift. Failures never
    /// propagate: they are logged and counted, and pending reasons survive
    /// for the next pass.
    ///
    /// [`check_ring_for_changes`]: OwnedSeriesService::check_ring_for_changes
    pub fn update_all_tenants(&self, cancel: &CancellationToken, ring_changed: bool) -> usize {
        let start = Instant::now();

        let snapshot = match self.ring.current_snapshot() {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(%err, "failed to read ring, skipping reconciliation pass");
                self.metrics.ring_read_failures_total.inc();
                return 0;
            }
        };

        let tenants = self.registry.list();
        self.metrics.tenants.set(tenants.len() as i64);

        let mut updated = 0;
        for tenant in tenants {
            if cancel.is_cancelled() {
                debug!(updated, "reconciliation pass cancelled");
                break;
            }

            let Some(db) = self.registry.get(&tenant) else {
                // Closed between enumeration and processing.
                continue;
            };

            let observed = db.recompute_reason();
            let configured = self
                .sanitizer
                .sanitize(&tenant, self.limits.tenant_shard_size(&tenant));

            let reason = match observed {
                Some(reason) => reason,
                None => {
                    let stored = db.load_owned().shard_size;
                    let current = zone_local_shard_size(
                        configured,
                        &snapshot,
                        self.config.zone_awareness_enabled,
                        &self.config.zone,
                    );
                    if stored != current {
                        RecomputeReason::ShardSizeChanged
                    } else if ring_changed {
                        RecomputeReason::RingChanged
                    } else {
                        continue;
                    }
                }
            };

            let computation = compute_owned_series(&snapshot, &db, configured, &self.config);
            db.store_owned(
                computation.owned_count,
                computation.shard_size,
                computation.limit_shards,
            );
            // Clear only the reason we acted on; a higher-priority reason
            // raised mid-recomputation stays set for the next pass.
            if let Some(observed) = observed {
                db.clear_reason_if(observed);
            }

            self.metrics
                .record_reconciliation(&tenant, reason, computation.owned_count);
            debug!(
                tenant = %tenant,
                reason = %reason,
                owned = computation.owned_count,
                shard_size = computation.shard_size,
                "recomputed owned series"
            );
            updated += 1;
        }

        self.metrics.record_pass(start.elapsed());
        updated
    }

    /// Run one scheduled reconciliation: consult the detector, then pass
    /// over all tenants. A failed ring check skips the pass entirely and is
    /// retried on the next trigger.
    fn reconcile(&self, cancel: &CancellationToken) {
        match self.check_ring_for_changes() {
            Ok(ring_changed) => {
                self.update_all_tenants(cancel, ring_changed);
            }
            Err(err) => {
                warn!(%err, "failed to check ring for changes, skipping reconciliation pass");
                self.metrics.ring_read_failures_total.inc();
            }
        }
    }

    /// Subscribe to ring updates so the loop reconciles promptly after
    /// topology changes instead of waiting out the period.
    pub fn register_ring_watcher(&self) {
        let notify = self.ring_changed.clone();
        self.ring.watch(Box::new(move || {
            notify.notify_one();
        }));
    }

    /// Drop a closed tenant and its per-tenant metric series.
    pub fn close_tenant(&self, tenant: &str) -> bool {
        let existed = self.registry.close(tenant);
        if existed {
            self.metrics.remove_tenant(tenant);
        }
        existed
    }

    /// The background reconciliation loop. Runs until cancelled.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let period = self.config.reconciliation_period;

        // Stagger fleet members restarted together.
        let jitter_ms = rand::thread_rng().gen_range(0..=(period.as_millis() as u64) / 10);
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(Duration::from_millis(jitter_ms)) => {}
        }

        info!(?period, "owned series reconciliation loop started");
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("owned series reconciliation loop stopped");
                    return;
                }
                _ = ticker.tick() => {
                    self.reconcile(&cancel);
                }
                _ = self.ring_changed.notified() => {
                    self.reconcile(&cancel);
                }
            }
        }
    }

    /// Spawn [`run`](OwnedSeriesService::run) on the current runtime.
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    /// The registry this service reconciles.
    pub fn registry(&self) -> &Arc<TenantRegistry> {
        &self.registry
    }

    /// The metrics this service publishes.
    pub fn metrics(&self) -> &Arc<OwnedSeriesMetrics> {
        &self.metrics
    }
}

impl std::fmt::Debug for OwnedSeriesService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnedSeriesService")
            .field("instance_id", &self.config.instance_id)
            .field("zone", &self.config.zone)
            .field("tenants", &self.registry.len())
            .finish()
    }
}
