//! Ring views consumed by the owned-series service.
//!
//! The gossip/KV layer that maintains the ring is an external collaborator;
//! this module only defines the immutable snapshots it hands out, the
//! ownership projection used to decide whether a ring update is worth
//! reacting to, and the source trait the service reads through.

mod detector;
mod projection;
mod snapshot;
mod source;

pub(crate) use snapshot::owner_in_index;

pub use detector::RingChangeDetector;
pub use projection::RingProjection;
pub use snapshot::{InstanceDesc, InstanceState, RingSnapshot};
pub use source::{InMemoryRing, RingSource, WatchCallback};
