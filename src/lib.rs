//! Owned-series tracking and reconciliation for ring-sharded time-series
//! ingesters.
//!
//! A fleet of ingesters forms a consistent-hash ring, and each tenant's
//! writes land on a shuffle shard of that ring. As the ring and per-tenant
//! shard sizes change, the set of series an ingester *holds* drifts from the
//! set it would be responsible for today. This crate keeps two derived
//! quantities correct and fresh under that drift:
//!
//! - the **owned series count** per tenant, published for observability and
//!   billing, and
//! - the **local per-tenant series limit**, the global limit divided over
//!   the ingesters actually sharing the tenant's series.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use serac::{
//!     InMemoryLimits, InMemoryRing, OwnedSeriesConfig, OwnedSeriesMetrics,
//!     OwnedSeriesService, SeriesLimiter, TenantRegistry,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = OwnedSeriesConfig::new("ingester-1", "zone-a").with_zone_awareness(true);
//!     let ring = Arc::new(InMemoryRing::new());
//!     let registry = Arc::new(TenantRegistry::new());
//!     let limits = Arc::new(InMemoryLimits::new());
//!     let metrics = Arc::new(OwnedSeriesMetrics::new());
//!
//!     let service = Arc::new(OwnedSeriesService::new(
//!         config.clone(),
//!         ring.clone(),
//!         registry.clone(),
//!         limits.clone(),
//!         metrics,
//!     )?);
//!     service.register_ring_watcher();
//!
//!     let cancel = CancellationToken::new();
//!     let handle = service.spawn(cancel.clone());
//!
//!     // The write path consults the limiter before admitting series.
//!     let limiter = SeriesLimiter::new(&config, registry, ring, limits);
//!     let _limit = limiter.local_series_limit("tenant-a");
//!
//!     cancel.cancel();
//!     handle.await?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ingestion ──► TenantDb ◄────────── compaction
//!  (new_user)     │ head, owned       (early_compaction)
//!                 │ scalars, reason
//!                 ▼
//! ┌─────────────────────────────────────────────┐
//! │           OwnedSeriesService                │
//! │  periodic tick ──► RingChangeDetector       │
//! │  ring watch  ──►   │                        │
//! │                    ▼                        │
//! │        update_all_tenants(ring_changed)     │
//! │          reason? shard drift? recompute     │
//! └─────────────────────────────────────────────┘
//!                 │                    ▲
//!                 ▼                    │ current_snapshot
//!          SeriesLimiter           RingSource
//!          (write path)            (gossip/KV)
//! ```
//!
//! # Consistency model
//!
//! - A tenant's `(owned_count, shard_size, limit_shards)` triple changes
//!   atomically under the tenant lock, only on successful recomputation.
//! - Recompute triggers are a raise-only priority register: one
//!   recomputation serves every pending cause, labeled with the most
//!   significant one.
//! - Limiter reads tolerate a one-cycle lag; scale-downs clamp immediately
//!   so local limits never exceed what the live ring justifies.

pub mod config;
pub mod error;
pub mod limiter;
pub mod limits;
pub mod metrics;
pub mod reconcile;
pub mod ring;
pub mod shard;
pub mod tenant;
pub mod testing;
pub mod types;

// Re-export main types for convenience.
pub use config::{OwnedSeriesConfig, DEFAULT_RECONCILIATION_PERIOD};
pub use error::{Error, Result, RingError};
pub use limiter::SeriesLimiter;
pub use limits::{InMemoryLimits, LimitsProvider, ShardSizeSanitizer, TenantLimits};
pub use metrics::{
    Counter, Gauge, Histogram, HistogramSnapshot, LabeledCounter, LabeledGauge,
    OwnedSeriesMetrics,
};
pub use reconcile::{compute_owned_series, OwnedComputation, OwnedSeriesService};
pub use ring::{
    InMemoryRing, InstanceDesc, InstanceState, RingChangeDetector, RingProjection, RingSnapshot,
    RingSource, WatchCallback,
};
pub use shard::{
    effective_shard_size, series_token, shard_probe_token, shuffle_shard, zone_local_shard_size,
};
pub use tenant::{ReasonRegister, RecomputeReason, TenantDb, TenantRegistry};
pub use types::{InstanceId, Label, OwnedState, SeriesLabels, TenantId, Token, Zone};
