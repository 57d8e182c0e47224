//! Prefilter stage against in-memory mocks: NEW → PREFILTER_PASS | PREFILTER_FAIL.

use std::sync::Arc;

use chrono::Utc;
use reveal_common::{PrefilterCacheEntry, TrackingState};
use reveal_pipeline::testing::{
    clean_ip_response, datacenter_ip_response, MockPrefilterCache, MockWorld,
};

#[tokio::test]
async fn clean_ip_passes_and_is_cached() {
    let world = MockWorld::new();
    world.ipdata.respond("198.51.100.4", clean_ip_response("198.51.100.4"));
    let id = world.visit("t1", "198.51.100.4", TrackingState::New, 60);

    let stats = world.pipeline().prefilter().run().await.unwrap();

    assert_eq!(stats.examined, 1);
    assert_eq!(stats.advanced, 1);
    assert_eq!(world.record(id).state, TrackingState::PrefilterPass);

    let cached = world.prefilter_cache.get("198.51.100.4").expect("cache entry");
    assert_eq!(cached.should_identify, Some(true));
    assert_eq!(cached.response["ip"], "198.51.100.4");
}

#[tokio::test]
async fn datacenter_ip_fails() {
    let world = MockWorld::new();
    world.ipdata.respond("203.0.113.9", datacenter_ip_response("203.0.113.9"));
    let id = world.visit("t1", "203.0.113.9", TrackingState::New, 60);

    world.pipeline().prefilter().run().await.unwrap();

    assert_eq!(world.record(id).state, TrackingState::PrefilterFail);
    assert_eq!(
        world.prefilter_cache.get("203.0.113.9").unwrap().should_identify,
        Some(false)
    );
}

#[tokio::test]
async fn shared_ip_costs_one_provider_call() {
    let world = MockWorld::new();
    world.ipdata.respond("198.51.100.4", clean_ip_response("198.51.100.4"));
    let ids: Vec<_> = (0..3)
        .map(|i| world.visit(&format!("t{i}"), "198.51.100.4", TrackingState::New, 60 - i))
        .collect();

    let stats = world.pipeline().prefilter().run().await.unwrap();

    assert_eq!(stats.advanced, 3);
    assert_eq!(world.ipdata.calls_for("198.51.100.4"), 1);
    for id in ids {
        assert_eq!(world.record(id).state, TrackingState::PrefilterPass);
    }
}

#[tokio::test]
async fn cache_hit_skips_provider() {
    let world = MockWorld::new();
    world.prefilter_cache.insert(PrefilterCacheEntry {
        ip: "198.51.100.4".into(),
        should_identify: Some(false),
        response: datacenter_ip_response("198.51.100.4"),
        created_at: Utc::now(),
    });
    let id = world.visit("t1", "198.51.100.4", TrackingState::New, 60);

    world.pipeline().prefilter().run().await.unwrap();

    assert_eq!(world.ipdata.call_count(), 0);
    assert_eq!(world.record(id).state, TrackingState::PrefilterFail);
}

#[tokio::test]
async fn provider_failure_leaves_records_new_and_is_not_repeated() {
    let world = MockWorld::new();
    // No response registered: the mock answers with a 503.
    let first = world.visit("t1", "198.51.100.4", TrackingState::New, 60);
    let second = world.visit("t1", "198.51.100.4", TrackingState::New, 30);

    let stats = world.pipeline().prefilter().run().await.unwrap();

    assert_eq!(stats.failed, 2);
    assert_eq!(stats.advanced, 0);
    assert_eq!(world.ipdata.calls_for("198.51.100.4"), 1);
    assert_eq!(world.record(first).state, TrackingState::New);
    assert_eq!(world.record(second).state, TrackingState::New);
    assert!(world.prefilter_cache.is_empty());

    // Provider recovers; the next tick picks both up.
    world.ipdata.respond("198.51.100.4", clean_ip_response("198.51.100.4"));
    world.pipeline().prefilter().run().await.unwrap();
    assert_eq!(world.record(first).state, TrackingState::PrefilterPass);
    assert_eq!(world.record(second).state, TrackingState::PrefilterPass);
}

#[tokio::test]
async fn invalid_ip_moves_to_error_without_lookup() {
    let world = MockWorld::new();
    let id = world.visit("t1", "not-an-ip", TrackingState::New, 60);

    let stats = world.pipeline().prefilter().run().await.unwrap();

    assert_eq!(stats.errored, 1);
    assert_eq!(world.record(id).state, TrackingState::Error);
    assert_eq!(world.ipdata.call_count(), 0);
}

#[tokio::test]
async fn missing_decision_leaves_record_new() {
    let world = MockWorld::new();
    world.prefilter_cache.insert(PrefilterCacheEntry {
        ip: "198.51.100.4".into(),
        should_identify: None,
        response: serde_json::json!({}),
        created_at: Utc::now(),
    });
    let id = world.visit("t1", "198.51.100.4", TrackingState::New, 60);

    let stats = world.pipeline().prefilter().run().await.unwrap();

    assert_eq!(stats.skipped, 1);
    assert_eq!(world.record(id).state, TrackingState::New);
    assert_eq!(world.ipdata.call_count(), 0);
}

#[tokio::test]
async fn only_new_records_are_considered() {
    let world = MockWorld::new();
    world.ipdata.respond("198.51.100.4", clean_ip_response("198.51.100.4"));
    let passed = world.visit("t1", "198.51.100.4", TrackingState::PrefilterPass, 60);
    let failed = world.visit("t1", "198.51.100.4", TrackingState::PrefilterFail, 60);

    let stats = world.pipeline().prefilter().run().await.unwrap();

    assert_eq!(stats.examined, 0);
    assert_eq!(world.record(passed).state, TrackingState::PrefilterPass);
    assert_eq!(world.record(failed).state, TrackingState::PrefilterFail);
}

#[tokio::test]
async fn cache_failure_aborts_tick() {
    let mut world = MockWorld::new();
    world.prefilter_cache = Arc::new(MockPrefilterCache::broken());
    world.ipdata.respond("198.51.100.4", clean_ip_response("198.51.100.4"));
    let id = world.visit("t1", "198.51.100.4", TrackingState::New, 60);

    let result = world.pipeline().prefilter().run().await;

    assert!(result.is_err());
    assert_eq!(world.record(id).state, TrackingState::New);
}

#[tokio::test]
async fn failing_records_do_not_starve_later_ones() {
    let world = MockWorld::new();
    // No responses for these two: the provider answers 503.
    let stuck = [
        world.visit("t1", "192.0.2.1", TrackingState::New, 900),
        world.visit("t1", "192.0.2.2", TrackingState::New, 800),
    ];
    world.ipdata.respond("198.51.100.4", clean_ip_response("198.51.100.4"));
    let id = world.visit("t1", "198.51.100.4", TrackingState::New, 60);

    let stats = world
        .pipeline_with_batch_limit(2)
        .prefilter()
        .run()
        .await
        .unwrap();

    assert_eq!(stats.examined, 3);
    assert_eq!(stats.failed, 2);
    assert_eq!(stats.advanced, 1);
    assert_eq!(world.record(id).state, TrackingState::PrefilterPass);
    for id in stuck {
        assert_eq!(world.record(id).state, TrackingState::New);
    }
}
