//! Limiter coupling scenarios: local series limits tracking ring and shard
//! changes through reconciliation.

use std::time::Duration;

use crate::config::OwnedSeriesConfig;
use crate::limits::TenantLimits;
use crate::ring::InstanceDesc;
use crate::testing::utils::{ScenarioBench, SCENARIO_TENANT};
use crate::types::Token;

const GLOBAL_LIMIT: u64 = 10_000;

/// A bench whose tested ingester is `ingester-1-1` in `zone-1`, with
/// `per_zone` ingesters registered in each of `zones` zones.
fn limiter_bench(zones: u32, per_zone: u32, shard_size: i32) -> ScenarioBench {
    let bench = ScenarioBench::with_config(
        OwnedSeriesConfig::new("ingester-1-1", "zone-1")
            .with_zone_awareness(true)
            .with_reconciliation_period(Duration::from_secs(600)),
    );
    for zone in 1..=zones {
        for i in 1..=per_zone {
            add_ingester(&bench, zone, i);
        }
    }
    bench.limits.set(
        SCENARIO_TENANT,
        TenantLimits {
            shard_size,
            global_series_limit: GLOBAL_LIMIT,
        },
    );
    bench.push_scenario_series();
    bench
}

fn add_ingester(bench: &ScenarioBench, zone: u32, i: u32) {
    bench.ring.upsert_instance(InstanceDesc::new(
        format!("ingester-{zone}-{i}"),
        format!("zone-{zone}"),
        "localhost",
        vec![(zone * 100 + i) as Token],
    ));
}

fn remove_ingester(bench: &ScenarioBench, zone: u32, i: u32) {
    bench.ring.remove_instance(&format!("ingester-{zone}-{i}"));
}

fn local_limit(bench: &ScenarioBench) -> u64 {
    bench.limiter.local_series_limit(SCENARIO_TENANT)
}

#[test]
fn starting_limits_before_first_reconciliation() {
    // The tenant exists (series were pushed) but no pass has run yet, so
    // the captured denominator is still zero. The limit must already honor
    // the configured shard size, not the raw ring population.

    // Shards below the zone population: one member caps the denominator.
    let bench = limiter_bench(1, 2, 1);
    assert_eq!(local_limit(&bench), 10_000);

    // Shards above the zone population clamp to what exists.
    let bench = limiter_bench(1, 1, 2);
    assert_eq!(local_limit(&bench), 10_000);

    // No explicit shard spreads over the zone.
    let bench = limiter_bench(1, 1, 0);
    assert_eq!(local_limit(&bench), 10_000);

    // Three zones asked for five members each, three present locally.
    let bench = limiter_bench(3, 3, 15);
    assert_eq!(local_limit(&bench), 3_333);

    // Reconciling confirms the starting values rather than changing them.
    bench.update(true);
    assert_eq!(local_limit(&bench), 3_333);
}

#[test]
fn single_zone_shards_below_ingesters_add_and_remove() {
    let bench = limiter_bench(1, 2, 1);
    bench.update(true);
    assert_eq!(local_limit(&bench), 10_000);

    // A third ingester changes nothing: the shard still has one member.
    add_ingester(&bench, 1, 3);
    assert_eq!(local_limit(&bench), 10_000);
    bench.update(true);
    assert_eq!(local_limit(&bench), 10_000);

    remove_ingester(&bench, 1, 3);
    assert_eq!(local_limit(&bench), 10_000);
    bench.update(true);
    assert_eq!(local_limit(&bench), 10_000);
}

#[test]
fn single_zone_shards_above_ingesters_add_and_remove() {
    let bench = limiter_bench(1, 1, 2);
    bench.update(true);
    assert_eq!(local_limit(&bench), 10_000);

    // The second ingester only counts once reconciliation confirms it.
    add_ingester(&bench, 1, 2);
    assert_eq!(local_limit(&bench), 10_000);
    bench.update(true);
    assert_eq!(local_limit(&bench), 5_000);

    // A scale-down clamps immediately; the pass then agrees.
    remove_ingester(&bench, 1, 2);
    assert_eq!(local_limit(&bench), 10_000);
    bench.update(true);
    assert_eq!(local_limit(&bench), 10_000);
}

#[test]
fn single_zone_shard_zero_add_and_remove() {
    let bench = limiter_bench(1, 1, 0);
    bench.update(true);
    assert_eq!(local_limit(&bench), 10_000);

    add_ingester(&bench, 1, 2);
    assert_eq!(local_limit(&bench), 10_000);
    bench.update(true);
    assert_eq!(local_limit(&bench), 5_000);

    remove_ingester(&bench, 1, 2);
    assert_eq!(local_limit(&bench), 10_000);
    bench.update(true);
    assert_eq!(local_limit(&bench), 10_000);
}

#[test]
fn single_zone_increase_shards_below_ingesters() {
    let bench = limiter_bench(1, 2, 1);
    bench.update(true);
    assert_eq!(local_limit(&bench), 10_000);

    bench.set_tenant_shard_size(2);
    assert_eq!(local_limit(&bench), 10_000);

    // No ring change needed: the pass notices the shard-size drift itself.
    assert_eq!(bench.update(false), 1);
    assert_eq!(local_limit(&bench), 5_000);
}

#[test]
fn single_zone_increase_shards_beyond_ingesters_is_inert() {
    let bench = limiter_bench(1, 2, 2);
    bench.update(true);
    assert_eq!(local_limit(&bench), 5_000);

    // Both ingesters are already shard members; asking for a third changes
    // nothing effective, so the pass skips the tenant entirely.
    bench.set_tenant_shard_size(3);
    assert_eq!(bench.update(false), 0);
    assert_eq!(local_limit(&bench), 5_000);
}

#[test]
fn multi_zone_shards_below_ingesters_scale_up_and_down() {
    let bench = limiter_bench(3, 3, 3); // one shard member per zone
    bench.update(true);
    assert_eq!(local_limit(&bench), 10_000);

    // Scaling zones up never changes a one-member-per-zone shard.
    for zone in 1..=3 {
        add_ingester(&bench, zone, 4);
        add_ingester(&bench, zone, 5);
        assert_eq!(local_limit(&bench), 10_000);
        bench.update(true);
        assert_eq!(local_limit(&bench), 10_000);
    }

    for zone in 1..=3 {
        for i in 2..=5 {
            remove_ingester(&bench, zone, i);
        }
        assert_eq!(local_limit(&bench), 10_000);
        bench.update(true);
        assert_eq!(local_limit(&bench), 10_000);
    }
}

#[test]
fn multi_zone_shards_above_ingesters_scale_up_and_down() {
    let bench = limiter_bench(3, 3, 15); // asks for 5 per zone, only 3 exist
    bench.update(true);
    assert_eq!(local_limit(&bench), 3_333);

    // Scale up the local zone to the full 5 per-zone members.
    add_ingester(&bench, 1, 4);
    add_ingester(&bench, 1, 5);
    assert_eq!(local_limit(&bench), 3_333);
    bench.update(true);
    assert_eq!(local_limit(&bench), 2_000);

    // Other zones don't affect this zone's denominator.
    for zone in 2..=3 {
        add_ingester(&bench, zone, 4);
        add_ingester(&bench, zone, 5);
        assert_eq!(local_limit(&bench), 2_000);
        bench.update(true);
        assert_eq!(local_limit(&bench), 2_000);
    }

    // Scale the local zone down to one ingester: the clamp is immediate.
    for i in 2..=5 {
        remove_ingester(&bench, 1, i);
    }
    assert_eq!(local_limit(&bench), 10_000);
    bench.update(true);
    assert_eq!(local_limit(&bench), 10_000);
}

#[test]
fn owned_limits_disabled_falls_back_to_ring_count() {
    let bench = ScenarioBench::with_config(
        OwnedSeriesConfig::new("ingester-1-1", "zone-1")
            .with_zone_awareness(true)
            .with_use_owned_for_limits(false),
    );
    add_ingester(&bench, 1, 1);
    add_ingester(&bench, 1, 2);
    bench.limits.set(
        SCENARIO_TENANT,
        TenantLimits {
            shard_size: 1,
            global_series_limit: GLOBAL_LIMIT,
        },
    );
    bench.push_scenario_series();
    bench.update(true);

    // The captured one-member shard is ignored; the live zone count rules.
    assert_eq!(local_limit(&bench), 5_000);

    add_ingester(&bench, 1, 3);
    assert_eq!(local_limit(&bench), 3_333);
}

#[test]
fn unlimited_tenant_stays_unlimited() {
    let bench = limiter_bench(1, 2, 1);
    bench.limits.set(
        SCENARIO_TENANT,
        TenantLimits {
            shard_size: 1,
            global_series_limit: 0,
        },
    );
    bench.update(true);
    assert_eq!(local_limit(&bench), 0);
}
