//! Testing utilities and end-to-end scenarios for the owned-series service.
//!
//! [`ScenarioBench`] wires a full service out of in-memory collaborators and
//! provides the deterministic series/ring fixtures the scenarios are built
//! on: ten generated series with well-separated tokens, a first ingester
//! whose tokens cover the first half of them, and an optional second
//! ingester covering the other half plus the tenant's shuffle-shard anchor.

mod utils;

#[cfg(test)]
mod limiter_scenarios;
#[cfg(test)]
mod owned_series_scenarios;

pub use utils::{
    wait_for, ScenarioBench, SCENARIO_SERIES_COUNT, SCENARIO_TENANT, SCENARIO_ZONE,
};
