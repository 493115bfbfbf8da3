//! Recomputation triggers.
//!
//! Producers (ingestion, compaction, the driver itself) race to demand a
//! recomputation; one recomputation serves all of them, labeled with the
//! most significant cause. The register is a single atomic holding the
//! highest-priority reason seen since the last clear.

use std::sync::atomic::{AtomicU8, Ordering};

/// Why a tenant needs its owned-series count recomputed.
///
/// Discriminants encode priority: a `set` only overwrites a strictly lower
/// one, so `NewUser` beats everything and `RingChanged` beats nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum RecomputeReason {
    /// The relevant ring projection changed.
    RingChanged = 1,
    /// The tenant's effective shard size changed.
    ShardSizeChanged = 2,
    /// A head compaction outside the scheduled cycle removed series.
    Compaction = 3,
    /// An early compaction evicted head series ahead of the block boundary.
    EarlyCompaction = 4,
    /// The tenant was just created on this ingester.
    NewUser = 5,
}

impl RecomputeReason {
    /// Stable label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecomputeReason::RingChanged => "ring_changed",
            RecomputeReason::ShardSizeChanged => "shard_size_changed",
            RecomputeReason::Compaction => "compaction",
            RecomputeReason::EarlyCompaction => "early_compaction",
            RecomputeReason::NewUser => "new_user",
        }
    }

    fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(RecomputeReason::RingChanged),
            2 => Some(RecomputeReason::ShardSizeChanged),
            3 => Some(RecomputeReason::Compaction),
            4 => Some(RecomputeReason::EarlyCompaction),
            5 => Some(RecomputeReason::NewUser),
            _ => None,
        }
    }
}

impl std::fmt::Display for RecomputeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const EMPTY: u8 = 0;

/// Lock-free raise-only register for a tenant's pending recompute reason.
#[derive(Debug, Default)]
pub struct ReasonRegister(AtomicU8);

impl ReasonRegister {
    /// An empty register.
    pub fn new() -> Self {
        Self(AtomicU8::new(EMPTY))
    }

    /// A register pre-loaded with a reason.
    pub fn with(reason: RecomputeReason) -> Self {
        Self(AtomicU8::new(reason as u8))
    }

    /// Record a reason. Only raises: an equal or lower priority than the
    /// stored one leaves the register untouched. Returns whether the stored
    /// value changed.
    pub fn set(&self, reason: RecomputeReason) -> bool {
        let new = reason as u8;
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            if current != EMPTY && current >= new {
                return false;
            }
            match self
                .0
                .compare_exchange_weak(current, new, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }

    /// The pending reason, if any.
    pub fn get(&self) -> Option<RecomputeReason> {
        RecomputeReason::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Unconditionally empty the register.
    pub fn clear(&self) {
        self.0.store(EMPTY, Ordering::Release);
    }

    /// Empty the register only if it still holds `expected`; a reason raised
    /// concurrently survives for the next pass. Returns whether it cleared.
    pub fn clear_if(&self, expected: RecomputeReason) -> bool {
        self.0
            .compare_exchange(expected as u8, EMPTY, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
