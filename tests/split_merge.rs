use castleguard::{
    AttributeDomain, AttributeSpec, AttributeValue, AuditKind, CastleEngine, ClusterManager,
    OutputEvent, PrivacyConfig, StreamTuple,
};
use std::collections::BTreeMap;

fn config(k: usize, l: usize, mu: usize, span: f64) -> PrivacyConfig {
    PrivacyConfig::new(
        k,
        l,
        50,
        1.0,
        mu,
        vec![AttributeSpec::new("value", AttributeDomain::numeric(0.0, span))],
    )
    .unwrap()
}

fn tuple(id: u64, value: f64, sensitive: &str) -> StreamTuple {
    StreamTuple::new(id, id, vec![AttributeValue::numeric(value)], sensitive)
}

fn ingest(manager: &mut ClusterManager, tuples: &[StreamTuple]) -> BTreeMap<u64, StreamTuple> {
    let mut store = BTreeMap::new();
    for t in tuples {
        manager.assign(t, t.arrival());
        store.insert(t.id(), t.clone());
    }
    store
}

#[test]
fn split_bisects_along_the_widest_attribute() {
    let mut manager = ClusterManager::new(&config(1, 1, 1, 12.0));
    let tuples = vec![
        tuple(1, 1.0, "s"),
        tuple(2, 2.0, "s"),
        tuple(3, 11.0, "s"),
        tuple(4, 12.0, "s"),
    ];
    let store = ingest(&mut manager, &tuples);
    // mu = 1 forces everything into one cluster of size 4 > 2k.
    assert_eq!(manager.clusters().len(), 1);
    let id = manager.clusters().owner_of(1).unwrap();

    let fragments = manager.split(id, &store, 5);
    assert_eq!(fragments.len(), 2);
    assert!(manager.clusters().get(id).is_none());
    assert_eq!(manager.clusters().len(), 2);

    let low = manager.clusters().owner_of(1).unwrap();
    let high = manager.clusters().owner_of(3).unwrap();
    assert_ne!(low, high);
    assert_eq!(manager.clusters().owner_of(2), Some(low));
    assert_eq!(manager.clusters().owner_of(4), Some(high));
    // Fragment ranges are recomputed tight, not inherited.
    let low_cluster = manager.clusters().get(low).unwrap();
    assert!(low_cluster.ranges()[0].contains(&AttributeValue::numeric(2.0)));
    assert!(!low_cluster.ranges()[0].contains(&AttributeValue::numeric(11.0)));
}

#[test]
fn split_is_a_no_op_below_the_size_bound() {
    let mut manager = ClusterManager::new(&config(1, 1, 1, 12.0));
    let tuples = vec![tuple(1, 1.0, "s"), tuple(2, 2.0, "s")];
    let store = ingest(&mut manager, &tuples);
    let id = manager.clusters().owner_of(1).unwrap();
    assert!(manager.split(id, &store, 3).is_empty());
    assert_eq!(manager.clusters().owner_of(1), Some(id));
}

#[test]
fn split_with_identical_values_cannot_cut() {
    let mut manager = ClusterManager::new(&config(1, 1, 1, 12.0));
    let tuples: Vec<StreamTuple> = (1..=4).map(|id| tuple(id, 7.0, "s")).collect();
    let store = ingest(&mut manager, &tuples);
    let id = manager.clusters().owner_of(1).unwrap();

    let fragments = manager.split(id, &store, 5);
    // No useful bisection exists; the cluster survives whole under a new id.
    assert_eq!(fragments.len(), 1);
    assert_eq!(manager.clusters().len(), 1);
    assert_eq!(manager.clusters().get(fragments[0]).unwrap().size(), 4);
}

#[test]
fn undersized_fragments_land_in_the_small_set() {
    let mut manager = ClusterManager::new(&config(3, 1, 3, 12.0));
    let mut tuples: Vec<StreamTuple> = (1..=6).map(|id| tuple(id, 1.0, "s")).collect();
    tuples.push(tuple(7, 2.0, "s"));
    let store = ingest(&mut manager, &tuples);
    assert_eq!(manager.clusters().len(), 1);
    let id = manager.clusters().owner_of(1).unwrap();

    let fragments = manager.split(id, &store, 8);
    assert_eq!(fragments.len(), 2);
    let outlier = manager.clusters().owner_of(7).unwrap();
    assert_eq!(manager.clusters().get(outlier).unwrap().size(), 1);
    // The lone fragment stays live in the small subset, never emitted directly.
    assert!(manager.clusters().small().contains(&outlier));
    let bulk = manager.clusters().owner_of(1).unwrap();
    assert!(manager.clusters().big().contains(&bulk));
}

#[test]
fn merge_transfers_ownership_and_unions_ranges() {
    let mut manager = ClusterManager::new(&config(3, 1, 3, 12.0));
    let tuples = vec![tuple(1, 1.0, "flu"), tuple(2, 11.0, "cold"), tuple(3, 2.0, "flu")];
    ingest(&mut manager, &tuples);
    assert_eq!(manager.clusters().len(), 2);
    let target = manager.clusters().owner_of(1).unwrap();
    let source = manager.clusters().owner_of(2).unwrap();

    manager.merge(source, target, 4);
    assert!(manager.clusters().get(source).is_none());
    let merged = manager.clusters().get(target).unwrap();
    assert_eq!(merged.size(), 3);
    assert_eq!(merged.distinct_sensitive(), 2);
    assert_eq!(manager.clusters().owner_of(2), Some(target));
    for value in [1.0, 2.0, 11.0] {
        assert!(merged.ranges()[0].contains(&AttributeValue::numeric(value)));
    }
    // Partition reflects the post-merge size immediately.
    assert!(manager.clusters().big().contains(&target));
}

#[test]
fn find_nearest_picks_the_cheapest_union() {
    let mut manager = ClusterManager::new(&config(3, 1, 3, 100.0));
    ingest(
        &mut manager,
        &[tuple(1, 1.0, "s"), tuple(2, 99.0, "s")],
    );
    let a = manager.clusters().owner_of(1).unwrap();
    let b = manager.clusters().owner_of(2).unwrap();
    assert_eq!(manager.find_nearest(a), Some(b));
    assert_eq!(manager.find_nearest(b), Some(a));

    let mut lonely = ClusterManager::new(&config(3, 1, 3, 100.0));
    ingest(&mut lonely, &[tuple(1, 1.0, "s")]);
    let only = lonely.clusters().owner_of(1).unwrap();
    assert_eq!(lonely.find_nearest(only), None);
}

#[test]
fn diversifying_search_skips_same_sensitive_neighbors() {
    let mut manager = ClusterManager::new(&config(3, 2, 3, 100.0));
    ingest(
        &mut manager,
        &[tuple(1, 1.0, "flu"), tuple(2, 99.0, "cold")],
    );
    let a = manager.clusters().owner_of(1).unwrap();
    let b = manager.clusters().owner_of(2).unwrap();
    assert_eq!(manager.find_nearest_diversifying(a), Some(b));

    let mut uniform = ClusterManager::new(&config(3, 2, 3, 100.0));
    ingest(
        &mut uniform,
        &[tuple(1, 1.0, "flu"), tuple(2, 99.0, "flu")],
    );
    let a = uniform.clusters().owner_of(1).unwrap();
    assert_eq!(uniform.find_nearest_diversifying(a), None);
}

#[test]
fn engine_splits_overgrown_clusters_and_enforces_capacity() {
    let config = PrivacyConfig::new(
        2,
        2,
        50,
        1.0,
        2,
        vec![AttributeSpec::new(
            "value",
            AttributeDomain::numeric(0.0, 100.0),
        )],
    )
    .unwrap();
    let mut engine = CastleEngine::new(config);

    // All sensitive values identical: clusters can never satisfy l = 2, so
    // nothing is released while the cluster at the low end grows past 2k.
    for (id, value) in [(1, 1.0), (2, 99.0), (3, 2.0), (4, 3.0), (5, 4.0), (6, 5.0)] {
        let events = engine.push(tuple(id, value, "X")).unwrap();
        assert!(events.is_empty());
    }

    assert_eq!(engine.audit().count(AuditKind::ForcedSplit), 1);
    assert_eq!(engine.audit().count(AuditKind::ForcedMerge), 1);
    let telemetry = engine.telemetry();
    assert_eq!(telemetry.live_clusters, 2);
    assert_eq!(telemetry.queue_depth, 6);

    // Shutdown drains both clusters through the relaxed path; nothing is lost.
    let events = engine.finish();
    assert_eq!(events.len(), 6);
    let ids: Vec<u64> = events
        .iter()
        .map(|event| match event {
            OutputEvent::Emitted { record, .. } => record.tuple_id,
            OutputEvent::Suppressed { tuple_id } => *tuple_id,
        })
        .collect();
    assert_eq!(ids, vec![1, 3, 4, 2, 5, 6]);
    for event in &events {
        match event {
            OutputEvent::Emitted {
                relaxed_diversity, ..
            } => assert!(relaxed_diversity),
            OutputEvent::Suppressed { .. } => panic!("beta = 1.0 never suppresses"),
        }
    }
    assert_eq!(engine.audit().count(AuditKind::RelaxedDiversity), 2);
    assert_eq!(engine.stats().relaxed_diversity, 6);
}
