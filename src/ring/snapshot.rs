//! Immutable ring snapshots.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::types::{InstanceId, Token, Zone};

/// Lifecycle state of a ring instance.
///
/// Ownership is a property of token placement alone; the state is carried in
/// the descriptor but never affects owner lookups or change detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceState {
    Active,
    Joining,
    Leaving,
    Pending,
}

/// One instance entry in a ring snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceDesc {
    pub id: InstanceId,
    pub zone: Zone,
    pub addr: String,
    /// Ring positions owned by this instance; sorted on snapshot build.
    pub tokens: Vec<Token>,
    pub state: InstanceState,
    /// Last heartbeat, unix seconds. Informational only.
    pub heartbeat: u64,
}

impl InstanceDesc {
    /// Create an active instance descriptor.
    pub fn new(
        id: impl Into<InstanceId>,
        zone: impl Into<Zone>,
        addr: impl Into<String>,
        tokens: Vec<Token>,
    ) -> Self {
        Self {
            id: id.into(),
            zone: zone.into(),
            addr: addr.into(),
            tokens,
            state: InstanceState::Active,
            heartbeat: 0,
        }
    }

    /// Set the instance state.
    pub fn with_state(mut self, state: InstanceState) -> Self {
        self.state = state;
        self
    }
}

/// An immutable view of the ingester fleet at one instant.
///
/// Built once per reconciliation pass and shared by reference; owner lookups
/// walk the token index clockwise, wrapping at the ring end. Instances that
/// registered the same token are disambiguated at build time: the
/// lexicographically smallest instance id wins the slot.
#[derive(Debug, Clone)]
pub struct RingSnapshot {
    instances: BTreeMap<InstanceId, InstanceDesc>,
    token_index: BTreeMap<Token, InstanceId>,
    zones: BTreeSet<Zone>,
}

impl RingSnapshot {
    /// Build a snapshot from instance descriptors.
    ///
    /// Duplicate descriptors for the same id keep the last one. Token lists
    /// are sorted and deduplicated per instance.
    pub fn new(descs: impl IntoIterator<Item = InstanceDesc>) -> Self {
        let mut instances: BTreeMap<InstanceId, InstanceDesc> = BTreeMap::new();
        for mut desc in descs {
            desc.tokens.sort_unstable();
            desc.tokens.dedup();
            instances.insert(desc.id.clone(), desc);
        }

        let mut token_index: BTreeMap<Token, InstanceId> = BTreeMap::new();
        for desc in instances.values() {
            for &token in &desc.tokens {
                token_index
                    .entry(token)
                    .and_modify(|owner| {
                        if desc.id < *owner {
                            *owner = desc.id.clone();
                        }
                    })
                    .or_insert_with(|| desc.id.clone());
            }
        }

        let zones = instances.values().map(|d| d.zone.clone()).collect();

        Self {
            instances,
            token_index,
            zones,
        }
    }

    /// An empty ring.
    pub fn empty() -> Self {
        Self::new([])
    }

    /// Number of instances in the ring.
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Whether the ring has no instances.
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Whether the given instance is registered.
    pub fn contains_instance(&self, id: &str) -> bool {
        self.instances.contains_key(id)
    }

    /// Get an instance descriptor.
    pub fn instance(&self, id: &str) -> Option<&InstanceDesc> {
        self.instances.get(id)
    }

    /// Iterate all instance descriptors in id order.
    pub fn instances(&self) -> impl Iterator<Item = &InstanceDesc> {
        self.instances.values()
    }

    /// All instance ids, in order.
    pub fn instance_ids(&self) -> impl Iterator<Item = &InstanceId> {
        self.instances.keys()
    }

    /// The distinct zones present in the ring, sorted.
    pub fn zones(&self) -> impl Iterator<Item = &Zone> {
        self.zones.iter()
    }

    /// Number of distinct zones.
    pub fn zone_count(&self) -> usize {
        self.zones.len()
    }

    /// Number of instances registered in the given zone.
    pub fn instances_in_zone(&self, zone: &str) -> usize {
        self.instances.values().filter(|d| d.zone == zone).count()
    }

    /// The instance owning the given ring position: the owner of the first
    /// token at or after `token`, wrapping around.
    pub fn owner_of(&self, token: Token) -> Option<&InstanceId> {
        self.token_index
            .range(token..)
            .next()
            .or_else(|| self.token_index.iter().next())
            .map(|(_, id)| id)
    }

    /// A token index restricted to the given instances, for repeated owner
    /// lookups within a shard subset.
    pub fn token_index_for(&self, subset: &HashSet<InstanceId>) -> BTreeMap<Token, &InstanceId> {
        self.filtered_index(|desc| subset.contains(&desc.id))
    }

    /// A token index restricted to one zone, used by shard selection.
    pub fn token_index_for_zone(&self, zone: Option<&str>) -> BTreeMap<Token, &InstanceId> {
        self.filtered_index(|desc| zone.map(|z| desc.zone == z).unwrap_or(true))
    }

    /// Rebuilt from the kept descriptors rather than filtered from the
    /// global index, so an instance that lost a global token tie to a
    /// filtered-out instance still appears at its token here.
    fn filtered_index(
        &self,
        keep: impl Fn(&InstanceDesc) -> bool,
    ) -> BTreeMap<Token, &InstanceId> {
        let mut index = BTreeMap::new();
        // Instances iterate in id order, so the first insert wins ties
        // lexicographically.
        for desc in self.instances.values().filter(|desc| keep(desc)) {
            for &token in &desc.tokens {
                index.entry(token).or_insert(&desc.id);
            }
        }
        index
    }
}

/// Clockwise owner lookup within a restricted token index.
pub(crate) fn owner_in_index<'a>(
    index: &BTreeMap<Token, &'a InstanceId>,
    token: Token,
) -> Option<&'a InstanceId> {
    index
        .range(token..)
        .next()
        .or_else(|| index.iter().next())
        .map(|(_, id)| *id)
}
