//! Shuffle-shard selection.
//!
//! A tenant's shuffle shard is a stable subset of ring instances derived
//! from the tenant id alone: the same `(tenant, ring, size)` always selects
//! the same subset. Selection walks the ring clockwise from each probe token
//! (see `shard_probe_token`) and takes the first instance not yet selected.

use std::collections::{BTreeMap, HashSet};

use crate::ring::RingSnapshot;
use crate::shard::tokens::shard_probe_token;
use crate::types::{InstanceId, Token};

/// The shard size selection actually uses, after clamping and zone rounding.
///
/// `0` and anything at or above the ring size mean the whole ring. With zone
/// awareness the size is rounded up to a multiple of the zone count so every
/// zone contributes equally.
pub fn effective_shard_size(configured: u32, snapshot: &RingSnapshot, zone_aware: bool) -> u32 {
    let instances = snapshot.instance_count() as u32;
    if configured == 0 || configured >= instances {
        return instances;
    }
    if zone_aware {
        let zones = snapshot.zone_count().max(1) as u32;
        configured.div_ceil(zones) * zones
    } else {
        configured
    }
}

/// The shard size as seen from this ingester's zone, stored per tenant and
/// used as the local series-limit denominator.
///
/// `0` is preserved as "no explicit shard". With zone awareness a zone can
/// only contribute as many shard members as it has instances, so the
/// per-zone share is clamped to the local zone's population.
pub fn zone_local_shard_size(
    configured: u32,
    snapshot: &RingSnapshot,
    zone_aware: bool,
    local_zone: &str,
) -> u32 {
    if configured == 0 {
        return 0;
    }
    if zone_aware {
        let zones = snapshot.zone_count().max(1) as u32;
        let per_zone = configured.div_ceil(zones);
        per_zone.min(snapshot.instances_in_zone(local_zone) as u32)
    } else {
        configured.min(snapshot.instance_count() as u32)
    }
}

/// Select the tenant's shuffle-shard subset from the ring.
pub fn shuffle_shard(
    snapshot: &RingSnapshot,
    tenant: &str,
    configured: u32,
    zone_aware: bool,
) -> HashSet<InstanceId> {
    let instances = snapshot.instance_count() as u32;
    if instances == 0 {
        return HashSet::new();
    }

    let size = effective_shard_size(configured, snapshot, zone_aware);
    if size >= instances {
        return snapshot.instance_ids().cloned().collect();
    }

    let mut selected = HashSet::new();
    if zone_aware {
        let per_zone = size / snapshot.zone_count().max(1) as u32;
        let zones: Vec<_> = snapshot.zones().cloned().collect();
        for zone in &zones {
            let index = snapshot.token_index_for_zone(Some(zone));
            select_from_index(&index, tenant, Some(zone), per_zone, &mut selected);
        }
    } else {
        let index = snapshot.token_index_for_zone(None);
        select_from_index(&index, tenant, None, size, &mut selected);
    }
    selected
}

/// Pick up to `count` distinct instances from a token index by walking the
/// ring clockwise from successive probe tokens.
fn select_from_index(
    index: &BTreeMap<Token, &InstanceId>,
    tenant: &str,
    zone: Option<&str>,
    count: u32,
    selected: &mut HashSet<InstanceId>,
) {
    let available: HashSet<&InstanceId> = index.values().copied().collect();
    let want = (count as usize).min(available.len());
    if want == 0 {
        return;
    }

    let mut picked = 0;
    let mut probe = 0u64;
    // Enough probes to find `want` distinct instances with overwhelming
    // probability; the fallback below keeps selection total regardless.
    let max_probes = (want as u64) * 64 + 64;

    while picked < want && probe < max_probes {
        let token = shard_probe_token(tenant, zone, probe);
        probe += 1;
        let owner = index
            .range(token..)
            .next()
            .or_else(|| index.iter().next())
            .map(|(_, id)| (*id).clone());
        if let Some(owner) = owner {
            if selected.insert(owner) {
                picked += 1;
            }
        }
    }

    // Pathological probe streak: fill deterministically in token order.
    if picked < want {
        for id in index.values() {
            if picked >= want {
                break;
            }
            if selected.insert((*id).clone()) {
                picked += 1;
            }
        }
    }
}
