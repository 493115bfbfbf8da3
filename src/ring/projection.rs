//! The ownership projection of a ring snapshot.

use std::collections::BTreeMap;

use crate::ring::snapshot::RingSnapshot;
use crate::types::{InstanceId, Token, Zone};

/// The part of a ring snapshot that matters for series ownership: which
/// instances exist, in which zone, holding which tokens.
///
/// Heartbeats, addresses, and state transitions are deliberately excluded.
/// The gossip layer republishes the ring on every heartbeat; recomputing
/// owned series is `O(head)` per tenant, so reconciliation only reacts when
/// this projection actually differs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingProjection {
    entries: BTreeMap<InstanceId, (Zone, Vec<Token>)>,
}

impl From<&RingSnapshot> for RingProjection {
    fn from(snapshot: &RingSnapshot) -> Self {
        let entries = snapshot
            .instances()
            .map(|d| (d.id.clone(), (d.zone.clone(), d.tokens.clone())))
            .collect();
        Self { entries }
    }
}
