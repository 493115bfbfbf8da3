//! Ring change detection.

use parking_lot::Mutex;

use crate::ring::projection::RingProjection;
use crate::ring::snapshot::RingSnapshot;

/// Detects whether the ownership projection of the ring changed since the
/// last check.
///
/// The first check after construction always reports a change, so a freshly
/// started ingester reconciles every tenant once against whatever ring it
/// finds. The cached projection is only replaced when the new one differs;
/// callers that fail to read the ring simply don't call `check`, leaving the
/// cache for the retry.
#[derive(Debug, Default)]
pub struct RingChangeDetector {
    previous: Mutex<Option<RingProjection>>,
}

impl RingChangeDetector {
    /// Create a detector with no cached projection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare the snapshot's ownership projection against the cached one.
    ///
    /// Returns true (and caches the new projection) when they differ.
    pub fn check(&self, snapshot: &RingSnapshot) -> bool {
        let projection = RingProjection::from(snapshot);
        let mut previous = self.previous.lock();
        match previous.as_ref() {
            Some(cached) if *cached == projection => false,
            _ => {
                *previous = Some(projection);
                true
            }
        }
    }
}
