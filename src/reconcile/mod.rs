//! Owned-series reconciliation: the recomputer and the driver loop.

mod compute;
mod driver;

pub use compute::{compute_owned_series, OwnedComputation};
pub use driver::OwnedSeriesService;
