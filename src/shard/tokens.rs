//! Token hashing.
//!
//! Two hash streams live here. `series_token` maps a tenant's series onto
//! the ring and is shared between the write path and the owned-series
//! recomputer: the two must agree bit for bit or reconciliation counts the
//! wrong series. `shard_probe_token` yields the deterministic probe sequence
//! that drives shuffle-shard selection; it is a pure function of
//! `(tenant, zone, index)`, so selection carries no state between calls.

use std::hash::Hasher;
use twox_hash::XxHash64;

use crate::types::{SeriesLabels, Token};

/// Seed separating the probe stream from series hashing.
const PROBE_SEED: u64 = 0x7363_7261_7368_6172;

/// Hash a tenant's series to its ring position.
pub fn series_token(tenant: &str, labels: &SeriesLabels) -> Token {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(tenant.as_bytes());
    hasher.write(&[0xff]);
    hasher.write(&labels.canonical_bytes());
    hasher.finish() as Token
}

/// Identity hash for a series within its tenant, used as the head map key.
pub fn series_id(labels: &SeriesLabels) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(&labels.canonical_bytes());
    hasher.finish()
}

/// The `idx`-th probe token of a tenant's shuffle-shard selection.
///
/// Zone-aware selection seeds a separate stream per zone so that scaling one
/// zone never reshuffles another.
pub fn shard_probe_token(tenant: &str, zone: Option<&str>, idx: u64) -> Token {
    let mut hasher = XxHash64::with_seed(PROBE_SEED);
    hasher.write(tenant.as_bytes());
    hasher.write(&[0xff]);
    if let Some(zone) = zone {
        hasher.write(zone.as_bytes());
    }
    hasher.write(&[0xff]);
    hasher.write(&idx.to_le_bytes());
    hasher.finish() as Token
}
