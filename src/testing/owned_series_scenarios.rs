//! End-to-end scenarios for the reconciliation service.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::OwnedSeriesConfig;
use crate::ring::InstanceState;
use crate::tenant::RecomputeReason;
use crate::testing::utils::{
    wait_for, ScenarioBench, FIRST_INGESTER, SCENARIO_SERIES_COUNT, SCENARIO_TENANT,
    SCENARIO_ZONE, SECOND_INGESTER,
};

fn reason_of(bench: &ScenarioBench) -> Option<RecomputeReason> {
    bench
        .registry
        .get(SCENARIO_TENANT)
        .and_then(|db| db.recompute_reason())
}

#[test]
fn empty_ingester_updates_nothing() {
    let bench = ScenarioBench::new();
    bench.register_first_ingester();

    assert_eq!(bench.update(false), 0);
    assert!(bench.registry.is_empty());
    assert_eq!(bench.metrics.pass_duration.count(), 1);
}

#[test]
fn update_due_to_new_user() {
    let bench = ScenarioBench::new();
    bench.register_first_ingester();
    bench.push_scenario_series();

    // Every created series is provisionally owned before any pass runs.
    assert_eq!(reason_of(&bench), Some(RecomputeReason::NewUser));
    assert_eq!(bench.owned_and_shards(), (SCENARIO_SERIES_COUNT, 0));

    assert_eq!(bench.update(false), 1);
    assert_eq!(reason_of(&bench), None);
    assert_eq!(bench.owned_and_shards(), (SCENARIO_SERIES_COUNT, 0));
    assert_eq!(bench.metrics.reconciliations_total.get(["new_user"]), 1);
}

#[test]
fn no_ring_change_after_adding_ingester() {
    let bench = ScenarioBench::new();
    bench.register_first_ingester();
    bench.push_scenario_series();
    assert_eq!(bench.update(false), 1);

    bench.register_second_ingester();

    // No pending reason and no ring-changed verdict: nothing to do.
    assert_eq!(reason_of(&bench), None);
    assert_eq!(bench.update(false), 0);
    assert_eq!(bench.owned_and_shards(), (SCENARIO_SERIES_COUNT, 0));
}

#[test]
fn ring_change_after_adding_ingester() {
    let bench = ScenarioBench::new();
    bench.register_first_ingester();
    bench.push_scenario_series();
    assert_eq!(bench.update(false), 1);

    bench.register_second_ingester();

    assert_eq!(bench.update(true), 1);
    assert_eq!(reason_of(&bench), None);
    assert_eq!(bench.owned_and_shards(), (SCENARIO_SERIES_COUNT / 2, 0));
    assert_eq!(bench.metrics.reconciliations_total.get(["ring_changed"]), 1);
}

#[test]
fn shard_size_change_from_0_to_2_with_unchanged_ring() {
    let bench = ScenarioBench::new();
    bench.register_first_ingester();
    bench.push_scenario_series();
    bench.register_second_ingester();
    assert_eq!(bench.update(true), 1);
    assert_eq!(bench.owned_and_shards(), (SCENARIO_SERIES_COUNT / 2, 0));

    // Both ingesters are already in use, so ownership stays put, but the
    // snapshot must follow the new shard size.
    bench.set_tenant_shard_size(2);

    assert_eq!(bench.update(false), 1);
    assert_eq!(reason_of(&bench), None);
    assert_eq!(bench.owned_and_shards(), (SCENARIO_SERIES_COUNT / 2, 2));
    assert_eq!(
        bench.metrics.reconciliations_total.get(["shard_size_changed"]),
        1
    );
}

#[test]
fn shard_size_change_from_2_to_1_evicts_this_ingester() {
    let bench = ScenarioBench::new();
    bench.set_tenant_shard_size(2);
    bench.register_first_ingester();
    bench.push_scenario_series();
    bench.register_second_ingester();
    assert_eq!(bench.update(true), 1);
    assert_eq!(bench.owned_and_shards(), (SCENARIO_SERIES_COUNT / 2, 2));

    // A single-member shard selects only the second ingester, whose token
    // anchors the tenant's first probe.
    bench.set_tenant_shard_size(1);

    assert_eq!(bench.update(true), 1);
    assert_eq!(reason_of(&bench), None);
    assert_eq!(bench.owned_and_shards(), (0, 1));
}

#[test]
fn shard_size_change_from_1_to_2_adds_this_ingester() {
    let bench = ScenarioBench::new();
    bench.set_tenant_shard_size(1);
    bench.register_first_ingester();
    bench.push_scenario_series();
    bench.register_second_ingester();
    assert_eq!(bench.update(true), 1);
    assert_eq!(bench.owned_and_shards(), (0, 1));

    bench.set_tenant_shard_size(2);

    assert_eq!(bench.update(true), 1);
    assert_eq!(bench.owned_and_shards(), (SCENARIO_SERIES_COUNT / 2, 2));
}

#[test]
fn unregistering_the_owning_ingester_hands_series_back() {
    let bench = ScenarioBench::new();
    bench.set_tenant_shard_size(1);
    bench.register_first_ingester();
    bench.push_scenario_series();
    bench.register_second_ingester();
    assert_eq!(bench.update(true), 1);
    assert_eq!(bench.owned_and_shards(), (0, 1));

    bench.remove_second_ingester();

    assert_eq!(bench.update(true), 1);
    assert_eq!(bench.owned_and_shards(), (SCENARIO_SERIES_COUNT, 1));
    assert_eq!(bench.metrics.reconciliations_total.get(["ring_changed"]), 1);
}

#[test]
fn early_compaction_empties_owned_series() {
    let bench = ScenarioBench::new();
    bench.register_first_ingester();
    let db = bench.push_scenario_series();
    assert_eq!(bench.update(true), 1);
    assert_eq!(bench.owned_and_shards(), (SCENARIO_SERIES_COUNT, 0));

    let removed = db.compact_head(i64::MAX, true);
    assert_eq!(removed, SCENARIO_SERIES_COUNT);
    assert_eq!(db.head_series_count(), 0);
    assert_eq!(reason_of(&bench), Some(RecomputeReason::EarlyCompaction));

    assert_eq!(bench.update(false), 1);
    assert_eq!(bench.owned_and_shards(), (0, 0));
    assert_eq!(
        bench.metrics.reconciliations_total.get(["early_compaction"]),
        1
    );
}

#[test]
fn scheduled_compaction_waits_for_periodic_pass() {
    let bench = ScenarioBench::new();
    bench.register_first_ingester();
    let db = bench.push_scenario_series();
    assert_eq!(bench.update(false), 1);

    // A scheduled compaction that drops everything raises no trigger...
    assert_eq!(db.compact_head(i64::MAX, false), SCENARIO_SERIES_COUNT);
    assert_eq!(reason_of(&bench), None);
    assert_eq!(bench.update(false), 0);
    assert_eq!(bench.owned_and_shards(), (SCENARIO_SERIES_COUNT, 0));

    // ...and the count converges on the next ring-checked pass.
    assert_eq!(bench.update(true), 1);
    assert_eq!(bench.owned_and_shards(), (0, 0));
}

#[test]
fn back_to_back_passes_are_idempotent() {
    let bench = ScenarioBench::new();
    bench.register_first_ingester();
    bench.push_scenario_series();

    assert_eq!(bench.update(false), 1);
    let first = bench.owned_and_shards();

    assert_eq!(bench.update(false), 0);
    assert_eq!(bench.owned_and_shards(), first);
}

#[test]
fn cancellation_leaves_reasons_pending() {
    let bench = ScenarioBench::new();
    bench.register_first_ingester();
    bench.push_scenario_series();

    let cancelled = CancellationToken::new();
    cancelled.cancel();
    assert_eq!(bench.service.update_all_tenants(&cancelled, false), 0);

    // The tenant is still flagged; the next healthy pass catches up.
    assert_eq!(reason_of(&bench), Some(RecomputeReason::NewUser));
    assert_eq!(bench.update(false), 1);
    assert_eq!(reason_of(&bench), None);
}

#[test]
fn ring_read_failure_preserves_state_and_retries() {
    let bench = ScenarioBench::new();
    bench.register_first_ingester();
    bench.push_scenario_series();

    bench.ring.set_fail_reads(true);
    assert_eq!(bench.update(false), 0);
    assert!(bench.service.check_ring_for_changes().is_err());
    assert_eq!(reason_of(&bench), Some(RecomputeReason::NewUser));
    assert_eq!(bench.metrics.ring_read_failures_total.get(), 1);

    bench.ring.set_fail_reads(false);
    assert_eq!(bench.update(false), 1);
    // The failed attempt did not consume the detector baseline either: the
    // first successful check still reports the initial change.
    assert!(bench.service.check_ring_for_changes().unwrap());
}

#[test]
fn negative_shard_size_is_treated_as_zero() {
    let bench = ScenarioBench::new();
    bench.set_tenant_shard_size(-5);
    bench.register_first_ingester();
    bench.push_scenario_series();

    assert_eq!(bench.update(false), 1);
    assert_eq!(bench.owned_and_shards(), (SCENARIO_SERIES_COUNT, 0));
}

#[test]
fn detector_scenarios_through_the_service() {
    let bench = ScenarioBench::new();
    bench.register_first_ingester();

    // First call reports a change regardless of contents; the second is
    // quiet.
    assert!(bench.service.check_ring_for_changes().unwrap());
    assert!(!bench.service.check_ring_for_changes().unwrap());

    bench.register_second_ingester();
    assert!(bench.service.check_ring_for_changes().unwrap());

    // State flips and heartbeats are gossip noise, not topology.
    bench
        .ring
        .set_instance_state(SECOND_INGESTER, InstanceState::Leaving);
    assert!(!bench.service.check_ring_for_changes().unwrap());
    bench.ring.heartbeat(FIRST_INGESTER, 12345);
    assert!(!bench.service.check_ring_for_changes().unwrap());

    bench.remove_second_ingester();
    assert!(bench.service.check_ring_for_changes().unwrap());
}

#[test]
fn closing_a_tenant_drops_registry_and_metrics() {
    let bench = ScenarioBench::new();
    bench.register_first_ingester();
    bench.push_scenario_series();
    assert_eq!(bench.update(false), 1);
    assert_eq!(bench.metrics.owned_series_per_tenant.series().len(), 1);

    assert!(bench.service.close_tenant(SCENARIO_TENANT));
    assert!(!bench.service.close_tenant(SCENARIO_TENANT));
    assert!(bench.registry.is_empty());
    assert!(bench.metrics.owned_series_per_tenant.series().is_empty());
}

#[tokio::test]
async fn background_loop_reconciles_on_ring_updates() {
    let bench = Arc::new(ScenarioBench::with_config(
        OwnedSeriesConfig::new(FIRST_INGESTER, SCENARIO_ZONE)
            .with_zone_awareness(true)
            .with_reconciliation_period(Duration::from_millis(100)),
    ));
    bench.register_first_ingester();
    bench.service.register_ring_watcher();

    let cancel = CancellationToken::new();
    let handle = bench.service.clone().spawn(cancel.clone());

    bench.push_scenario_series();

    // The periodic tick picks up the new tenant.
    let b = bench.clone();
    assert!(
        wait_for(
            move || b.owned_and_shards() == (SCENARIO_SERIES_COUNT, 0)
                && reason_of(&b).is_none(),
            Duration::from_secs(5)
        )
        .await
    );

    // A ring update nudges the loop without waiting for the next tick.
    bench.register_second_ingester();
    let b = bench.clone();
    assert!(
        wait_for(
            move || b.owned_and_shards() == (SCENARIO_SERIES_COUNT / 2, 0),
            Duration::from_secs(5)
        )
        .await
    );

    cancel.cancel();
    handle.await.unwrap();
}
