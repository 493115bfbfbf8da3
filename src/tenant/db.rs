//! The per-tenant series database surface.

use parking_lot::RwLock;
use std::collections::HashMap;

use crate::shard::{series_id, series_token};
use crate::tenant::reason::{ReasonRegister, RecomputeReason};
use crate::types::{OwnedState, SeriesLabels, TenantId, Token};

#[derive(Debug)]
struct HeadSeries {
    token: Token,
    last_sample_ts: i64,
}

/// One tenant's in-memory state: the active head series and the
/// owned-series scalars the reconciliation service maintains.
///
/// The head map stands in for the tenant TSDB head block; the ingestion and
/// compaction paths of the host process drive it through `push_series` and
/// `compact_head`, which also raise the recompute triggers the driver reads.
#[derive(Debug)]
pub struct TenantDb {
    tenant: TenantId,
    head: RwLock<HashMap<u64, HeadSeries>>,
    owned: RwLock<OwnedState>,
    reason: ReasonRegister,
}

impl TenantDb {
    /// Create the tenant's database. New tenants start flagged for
    /// recomputation with reason `NewUser`.
    pub fn new(tenant: impl Into<TenantId>) -> Self {
        Self {
            tenant: tenant.into(),
            head: RwLock::new(HashMap::new()),
            owned: RwLock::new(OwnedState::default()),
            reason: ReasonRegister::with(RecomputeReason::NewUser),
        }
    }

    /// The tenant this database belongs to.
    pub fn tenant_id(&self) -> &str {
        &self.tenant
    }

    /// Record a sample for a series, creating the series if needed.
    ///
    /// A newly created series is provisionally counted as owned: this
    /// ingester admitted the write, so until the next reconciliation says
    /// otherwise the series is its responsibility. Returns whether the
    /// series was created.
    pub fn push_series(&self, labels: &SeriesLabels, timestamp_ms: i64) -> bool {
        let id = series_id(labels);
        let token = series_token(&self.tenant, labels);

        let created = {
            let mut head = self.head.write();
            match head.get_mut(&id) {
                Some(series) => {
                    series.last_sample_ts = series.last_sample_ts.max(timestamp_ms);
                    false
                }
                None => {
                    head.insert(
                        id,
                        HeadSeries {
                            token,
                            last_sample_ts: timestamp_ms,
                        },
                    );
                    true
                }
            }
        };

        if created {
            self.owned.write().owned_count += 1;
        }
        created
    }

    /// Number of active head series.
    pub fn head_series_count(&self) -> usize {
        self.head.read().len()
    }

    /// A consistent snapshot of the head series' ring tokens.
    ///
    /// The snapshot is taken under the head read lock and iterated outside
    /// it, so concurrent removals at worst leave the caller counting series
    /// that were alive when the snapshot was taken.
    pub fn head_series_snapshot(&self) -> Vec<Token> {
        self.head.read().values().map(|s| s.token).collect()
    }

    /// Drop head series whose last sample is older than `cutoff_ms`,
    /// returning how many were removed.
    ///
    /// `early` marks an out-of-schedule compaction that evicts series ahead
    /// of the normal block boundary; it flags the tenant for prompt
    /// recomputation. Scheduled compactions stay silent and rely on the
    /// periodic pass.
    pub fn compact_head(&self, cutoff_ms: i64, early: bool) -> usize {
        let before;
        let after;
        {
            let mut head = self.head.write();
            before = head.len();
            head.retain(|_, series| series.last_sample_ts >= cutoff_ms);
            after = head.len();
        }

        if early {
            self.reason.set(RecomputeReason::EarlyCompaction);
        }
        before - after
    }

    /// Flag the tenant for recomputation. Lower-priority reasons never
    /// overwrite a pending higher one.
    pub fn set_recompute_reason(&self, reason: RecomputeReason) {
        self.reason.set(reason);
    }

    /// The pending recompute reason, if any.
    pub fn recompute_reason(&self) -> Option<RecomputeReason> {
        self.reason.get()
    }

    /// Clear the pending reason only if it is still `expected`.
    pub fn clear_reason_if(&self, expected: RecomputeReason) -> bool {
        self.reason.clear_if(expected)
    }

    /// Store the outcome of a successful recomputation.
    pub fn store_owned(&self, owned_count: usize, shard_size: u32, limit_shards: u32) {
        *self.owned.write() = OwnedState {
            owned_count,
            shard_size,
            limit_shards,
        };
    }

    /// The owned-series scalars as one consistent unit.
    pub fn load_owned(&self) -> OwnedState {
        *self.owned.read()
    }

    /// Convenience accessor mirroring what observability publishes.
    pub fn owned_series_and_shards(&self) -> (usize, u32) {
        let state = self.load_owned();
        (state.owned_count, state.shard_size)
    }
}
