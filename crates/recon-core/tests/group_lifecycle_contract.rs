//! Architectural Contract Test: Security Group Lifecycle
//!
//! Groups have no update verb on the remote system: create, check,
//! destroy only. Drift in a tracked group's attributes is reported,
//! never repaired in place.

mod common;

use common::*;
use recon_core::engine::EngineEvent;
use recon_core::resource::SecurityGroupSpec;
use recon_core::traits::TrackedStore;
use recon_core::ConvergeEngine;
use recon_core::MemoryTrackedStore;

fn web_group() -> SecurityGroupSpec {
    SecurityGroupSpec {
        name: "web".to_string(),
        description: "HTTP and HTTPS ingress".to_string(),
        tags: Default::default(),
    }
}

#[tokio::test]
async fn untracked_group_is_created_and_identity_recorded() {
    let dns = MockDnsApi::new();
    let compute = MockComputeApi::new();
    let store = MemoryTrackedStore::new();

    let config = minimal_config(vec![], vec![web_group()]);

    let (engine, _event_rx) = ConvergeEngine::new(
        Box::new(dns),
        Box::new(compute.clone()),
        Box::new(store.clone()),
        config,
    )
    .expect("engine construction succeeds");

    let report = engine.converge().await.expect("pass succeeds");

    assert_eq!(report.created, 1);
    assert_eq!(compute.create_call_count(), 1);

    let tracked = store
        .get_group("web")
        .await
        .unwrap()
        .expect("identity recorded after create");
    assert!(compute.has_group(&tracked.id));
}

#[tokio::test]
async fn converged_group_is_left_alone() {
    let dns = MockDnsApi::new();
    let compute = MockComputeApi::new();
    let store = MemoryTrackedStore::new();

    let config = minimal_config(vec![], vec![web_group()]);

    let (engine, _event_rx) = ConvergeEngine::new(
        Box::new(dns),
        Box::new(compute.clone()),
        Box::new(store.clone()),
        config,
    )
    .expect("engine construction succeeds");

    engine.converge().await.expect("first pass succeeds");
    let report = engine.converge().await.expect("second pass succeeds");

    assert_eq!(report.unchanged, 1);
    assert_eq!(compute.create_call_count(), 1);
    assert_eq!(compute.delete_call_count(), 0);
}

#[tokio::test]
async fn group_drift_is_reported_not_repaired() {
    let dns = MockDnsApi::new();
    let compute = MockComputeApi::new();
    let store = MemoryTrackedStore::new();

    let config = minimal_config(vec![], vec![web_group()]);

    let (engine, mut event_rx) = ConvergeEngine::new(
        Box::new(dns),
        Box::new(compute.clone()),
        Box::new(store.clone()),
        config,
    )
    .expect("engine construction succeeds");

    engine.converge().await.expect("first pass succeeds");
    let tracked = store.get_group("web").await.unwrap().unwrap();

    // Someone edits the description out-of-band
    compute.alter_group_description(&tracked.id, "edited elsewhere");

    let report = engine.converge().await.expect("second pass succeeds");

    // No verb to repair with: the pass still counts as unchanged and
    // nothing was deleted or re-created
    assert_eq!(report.unchanged, 1);
    assert_eq!(compute.create_call_count(), 1);
    assert_eq!(compute.delete_call_count(), 0);

    let mut saw_drift = false;
    while let Ok(event) = event_rx.try_recv() {
        if matches!(&event, EngineEvent::GroupDrift { name } if name == "web") {
            saw_drift = true;
        }
    }
    assert!(saw_drift, "drift must be surfaced as an event");
}

#[tokio::test]
async fn out_of_band_deletion_evicts_and_recreates_group() {
    let dns = MockDnsApi::new();
    let compute = MockComputeApi::new();
    let store = MemoryTrackedStore::new();

    let config = minimal_config(vec![], vec![web_group()]);

    let (engine, _event_rx) = ConvergeEngine::new(
        Box::new(dns),
        Box::new(compute.clone()),
        Box::new(store.clone()),
        config,
    )
    .expect("engine construction succeeds");

    engine.converge().await.expect("first pass succeeds");
    let original = store.get_group("web").await.unwrap().unwrap();

    compute.remove_group(&original.id);

    let report = engine.converge().await.expect("second pass succeeds");

    assert_eq!(report.created, 1, "evicted group should be re-created");
    assert_eq!(compute.create_call_count(), 2);

    let replacement = store.get_group("web").await.unwrap().unwrap();
    assert_ne!(replacement.id, original.id);
    assert!(compute.has_group(&replacement.id));
}

#[tokio::test]
async fn undeclared_group_is_pruned_only_on_successful_delete() {
    let dns = MockDnsApi::new();
    let compute = MockComputeApi::new();
    let store = MemoryTrackedStore::new();

    // Create a group under one declaration...
    let config = minimal_config(vec![], vec![web_group()]);
    {
        let (engine, _event_rx) = ConvergeEngine::new(
            Box::new(dns.clone()),
            Box::new(compute.clone()),
            Box::new(store.clone()),
            config,
        )
        .expect("engine construction succeeds");
        engine.converge().await.expect("pass succeeds");
    }
    let tracked = store.get_group("web").await.unwrap().unwrap();

    // ...then drop the declaration and fail the delete
    let other = SecurityGroupSpec {
        name: "db".to_string(),
        description: String::new(),
        tags: Default::default(),
    };
    let config = minimal_config(vec![], vec![other]);
    let (engine, _event_rx) = ConvergeEngine::new(
        Box::new(dns),
        Box::new(compute.clone()),
        Box::new(store.clone()),
        config,
    )
    .expect("engine construction succeeds");

    compute.fail_deletes(true);
    let report = engine.converge().await.unwrap();
    assert_eq!(report.deleted, 0);
    assert!(
        store.get_group("web").await.unwrap().is_some(),
        "identity retained after failed delete"
    );

    compute.fail_deletes(false);
    let report = engine.converge().await.unwrap();
    assert_eq!(report.deleted, 1);
    assert!(store.get_group("web").await.unwrap().is_none());
    assert!(!compute.has_group(&tracked.id));
}

#[tokio::test]
async fn unhonored_group_delete_keeps_identity_for_retry() {
    // Delete acknowledged but the group survives: verification keeps
    // the identity so a later pass can finish the removal
    let dns = MockDnsApi::new();
    let compute = MockComputeApi::new();
    let store = MemoryTrackedStore::new();

    let config = minimal_config(vec![], vec![web_group()]);
    {
        let (engine, _event_rx) = ConvergeEngine::new(
            Box::new(dns.clone()),
            Box::new(compute.clone()),
            Box::new(store.clone()),
            config,
        )
        .expect("engine construction succeeds");
        engine.converge().await.expect("pass succeeds");
    }
    let tracked = store.get_group("web").await.unwrap().unwrap();

    let other = SecurityGroupSpec {
        name: "db".to_string(),
        description: String::new(),
        tags: Default::default(),
    };
    let config = minimal_config(vec![], vec![other]);
    let (engine, _event_rx) = ConvergeEngine::new(
        Box::new(dns),
        Box::new(compute.clone()),
        Box::new(store.clone()),
        config,
    )
    .expect("engine construction succeeds");

    compute.ghost_deletes(true);
    let report = engine.converge().await.unwrap();
    assert_eq!(report.deleted, 0);
    assert_eq!(report.failed, 1);
    assert!(compute.has_group(&tracked.id), "remote group survived");
    assert!(
        store.get_group("web").await.unwrap().is_some(),
        "identity retained while the group survives"
    );

    compute.ghost_deletes(false);
    let report = engine.converge().await.unwrap();
    assert_eq!(report.deleted, 1);
    assert!(store.get_group("web").await.unwrap().is_none());
    assert!(!compute.has_group(&tracked.id));
}
