//! Fixtures shared by the end-to-end scenarios.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::OwnedSeriesConfig;
use crate::limiter::SeriesLimiter;
use crate::limits::InMemoryLimits;
use crate::metrics::OwnedSeriesMetrics;
use crate::reconcile::OwnedSeriesService;
use crate::ring::{InMemoryRing, InstanceDesc};
use crate::shard::{series_token, shard_probe_token};
use crate::tenant::{TenantDb, TenantRegistry};
use crate::types::{SeriesLabels, Token};

/// Tenant used by the scenarios.
pub const SCENARIO_TENANT: &str = "test-user";
/// Number of generated series.
pub const SCENARIO_SERIES_COUNT: usize = 10;
/// The single zone the scenario ring lives in.
pub const SCENARIO_ZONE: &str = "zone";

/// The ingester under test.
pub const FIRST_INGESTER: &str = "first-ingester";
/// The optional second ingester.
pub const SECOND_INGESTER: &str = "second-ingester";

/// Timestamp the scenario samples are written at.
pub const SCENARIO_SAMPLE_TS: i64 = 1_000_000;

/// A full owned-series service wired out of in-memory collaborators, plus
/// deterministic series and ring fixtures.
pub struct ScenarioBench {
    pub config: OwnedSeriesConfig,
    pub ring: Arc<InMemoryRing>,
    pub registry: Arc<TenantRegistry>,
    pub limits: Arc<InMemoryLimits>,
    pub metrics: Arc<OwnedSeriesMetrics>,
    pub service: Arc<OwnedSeriesService>,
    pub limiter: SeriesLimiter,
    /// Generated series sorted by token; the first half is covered by the
    /// first ingester's tokens, the second half by the second ingester's.
    pub series: Vec<(SeriesLabels, Token)>,
    cancel: CancellationToken,
}

impl ScenarioBench {
    /// A bench with the scenario defaults: zone-aware, owned-for-limits on.
    pub fn new() -> Self {
        Self::with_config(
            OwnedSeriesConfig::new(FIRST_INGESTER, SCENARIO_ZONE)
                .with_zone_awareness(true)
                .with_reconciliation_period(Duration::from_secs(600)),
        )
    }

    /// A bench with a custom config.
    pub fn with_config(config: OwnedSeriesConfig) -> Self {
        let ring = Arc::new(InMemoryRing::new());
        let registry = Arc::new(TenantRegistry::new());
        let limits = Arc::new(InMemoryLimits::new());
        let metrics = Arc::new(OwnedSeriesMetrics::new());
        let service = Arc::new(
            OwnedSeriesService::new(
                config.clone(),
                ring.clone(),
                registry.clone(),
                limits.clone(),
                metrics.clone(),
            )
            .expect("scenario config must be valid"),
        );
        let limiter = SeriesLimiter::new(
            &config,
            registry.clone(),
            ring.clone(),
            limits.clone(),
        );

        Self {
            config,
            ring,
            registry,
            limits,
            metrics,
            service,
            limiter,
            series: generate_scenario_series(),
            cancel: CancellationToken::new(),
        }
    }

    /// Run one reconciliation pass with the given ring-changed verdict.
    pub fn update(&self, ring_changed: bool) -> usize {
        self.service.update_all_tenants(&self.cancel, ring_changed)
    }

    /// The cancellation token passed to passes.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Push all generated series for the scenario tenant.
    pub fn push_scenario_series(&self) -> Arc<TenantDb> {
        let db = self.registry.get_or_create(SCENARIO_TENANT);
        for (labels, _) in &self.series {
            db.push_series(labels, SCENARIO_SAMPLE_TS);
        }
        db
    }

    /// Register the tested ingester: its tokens land just past the first
    /// half of the series tokens, plus the tenant's second shuffle-shard
    /// anchor so it comes second in single-member shard selection.
    pub fn register_first_ingester(&self) {
        let mut tokens: Vec<Token> = self.series[..SCENARIO_SERIES_COUNT / 2]
            .iter()
            .map(|(_, token)| token + 1)
            .collect();
        tokens.push(shard_probe_token(SCENARIO_TENANT, Some(SCENARIO_ZONE), 1) + 1);
        self.ring.upsert_instance(InstanceDesc::new(
            FIRST_INGESTER,
            SCENARIO_ZONE,
            "localhost:11111",
            tokens,
        ));
    }

    /// Register the second ingester: the other half of the series tokens,
    /// plus the tenant's first shuffle-shard anchor so a single-member shard
    /// selects it.
    pub fn register_second_ingester(&self) {
        let mut tokens: Vec<Token> = self.series[SCENARIO_SERIES_COUNT / 2..]
            .iter()
            .map(|(_, token)| token + 1)
            .collect();
        tokens.push(shard_probe_token(SCENARIO_TENANT, Some(SCENARIO_ZONE), 0) + 1);
        self.ring.upsert_instance(InstanceDesc::new(
            SECOND_INGESTER,
            SCENARIO_ZONE,
            "localhost:22222",
            tokens,
        ));
    }

    /// Remove the second ingester from the ring.
    pub fn remove_second_ingester(&self) {
        self.ring.remove_instance(SECOND_INGESTER);
    }

    /// The scenario tenant's `(owned_count, shard_size)` pair.
    pub fn owned_and_shards(&self) -> (usize, u32) {
        self.registry
            .get(SCENARIO_TENANT)
            .map(|db| db.owned_series_and_shards())
            .unwrap_or((0, 0))
    }

    /// Set the scenario tenant's shard size.
    pub fn set_tenant_shard_size(&self, shard_size: i32) {
        self.limits.set_shard_size(SCENARIO_TENANT, shard_size);
    }
}

impl Default for ScenarioBench {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate the scenario series with strictly separated tokens.
///
/// Candidates whose token lands within 4 positions of another accepted
/// token, of a shuffle-shard anchor probe, or of the u32 wrap point are
/// skipped, so the `token + 1` instance-token construction above can never
/// collide or change the clockwise owner.
fn generate_scenario_series() -> Vec<(SeriesLabels, Token)> {
    let probes = [
        shard_probe_token(SCENARIO_TENANT, Some(SCENARIO_ZONE), 0),
        shard_probe_token(SCENARIO_TENANT, Some(SCENARIO_ZONE), 1),
    ];

    let mut series: Vec<(SeriesLabels, Token)> = Vec::with_capacity(SCENARIO_SERIES_COUNT);
    let mut candidate = 0usize;
    while series.len() < SCENARIO_SERIES_COUNT {
        let name = format!("lbl_{candidate:05}");
        let labels = SeriesLabels::from_pairs([("__name__", "test"), (name.as_str(), "value")]);
        candidate += 1;

        let token = series_token(SCENARIO_TENANT, &labels);
        let clear_of_probes = probes.iter().all(|p| p.abs_diff(token) >= 4);
        let clear_of_others = series.iter().all(|(_, t)| t.abs_diff(token) >= 4);
        let clear_of_wrap = token >= 4 && token <= Token::MAX - 4;
        if clear_of_probes && clear_of_others && clear_of_wrap {
            series.push((labels, token));
        }
    }

    series.sort_by_key(|(_, token)| *token);
    series
}

/// Wait until `condition` holds, polling, or give up after `timeout`.
pub async fn wait_for<F>(condition: F, timeout: Duration) -> bool
where
    F: Fn() -> bool,
{
    let start = Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
