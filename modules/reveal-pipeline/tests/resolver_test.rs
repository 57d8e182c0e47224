//! Organization resolver: IDENTIFIED → ORGANIZATION_CREATED | ORGANIZATION_EXISTS,
//! fanned out across every open record sharing the (tenant, ip).

use reveal_common::{RevealError, TrackingState, REVEAL_AI_LEAD_SOURCE};
use reveal_pipeline::organization_client::OrganizationServiceError;
use reveal_pipeline::resolver::Resolution;
use reveal_pipeline::testing::{company_response, identification_entry, MockWorld};

const IP: &str = "198.51.100.4";

fn identified(world: &MockWorld, website: Option<&str>) {
    world
        .identification_cache
        .insert(identification_entry(IP, company_response("Acme", "www.Acme.com", website)));
}

#[tokio::test]
async fn many_visits_create_one_organization() {
    let world = MockWorld::new();
    identified(&world, Some("https://acme.com"));
    let representative = world.visit("t1", IP, TrackingState::Identified, 300);
    let siblings: Vec<_> = (1..=3)
        .map(|i| world.visit("t1", IP, TrackingState::Identified, 300 - i * 10))
        .collect();

    let stats = world.pipeline().resolver().run().await.unwrap();

    assert_eq!(stats.examined, 1);
    assert_eq!(stats.advanced, 1);
    assert_eq!(stats.fanned_out, 3);
    assert_eq!(world.organization_service.call_count(), 1);

    let rep = world.record(representative);
    assert_eq!(rep.state, TrackingState::OrganizationCreated);
    assert_eq!(rep.organization_id.as_deref(), Some("org-1"));
    assert_eq!(rep.organization_domain.as_deref(), Some("acme.com"));
    for id in siblings {
        let sibling = world.record(id);
        assert_eq!(sibling.state, TrackingState::OrganizationExists);
        assert_eq!(sibling.organization_id.as_deref(), Some("org-1"));
    }

    // Nothing left to resolve.
    let again = world.pipeline().resolver().run().await.unwrap();
    assert_eq!(again.examined, 0);
    assert_eq!(world.organization_service.call_count(), 1);
}

#[tokio::test]
async fn upsert_request_describes_a_prospect() {
    let world = MockWorld::new();
    identified(&world, Some("https://acme.com"));
    world.visit("t1", IP, TrackingState::Identified, 60);

    world.pipeline().resolver().run().await.unwrap();

    let requests = world.organization_service.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.tenant, "t1");
    assert_eq!(request.name, "Acme");
    assert_eq!(request.website, "https://acme.com");
    assert_eq!(request.domain, "acme.com");
    assert_eq!(request.relationship, "PROSPECT");
    assert_eq!(request.stage, "LEAD");
    assert_eq!(request.lead_source, REVEAL_AI_LEAD_SOURCE);
}

#[tokio::test]
async fn later_visit_reuses_organization_without_upsert() {
    let world = MockWorld::new();
    identified(&world, Some("https://acme.com"));
    world.visit("t1", IP, TrackingState::Identified, 600);
    world.pipeline().resolver().run().await.unwrap();

    // Same visitor comes back after the organization was created.
    let late = world.visit("t1", IP, TrackingState::Identified, 5);
    let stats = world.pipeline().resolver().run().await.unwrap();

    assert_eq!(stats.advanced, 1);
    assert_eq!(world.organization_service.call_count(), 1);
    assert_eq!(world.organizations.lookup_count(), 1);
    let late = world.record(late);
    assert_eq!(late.state, TrackingState::OrganizationExists);
    assert_eq!(late.organization_id.as_deref(), Some("org-1"));
}

#[tokio::test]
async fn open_siblings_in_earlier_states_receive_the_organization() {
    let world = MockWorld::new();
    identified(&world, Some("https://acme.com"));
    world.visit("t1", IP, TrackingState::Identified, 60);
    let fresh = world.visit("t1", IP, TrackingState::New, 10);
    let rejected = world.visit("t1", IP, TrackingState::PrefilterFail, 10);

    world.pipeline().resolver().run().await.unwrap();

    assert_eq!(world.record(fresh).state, TrackingState::OrganizationExists);
    assert_eq!(world.record(fresh).organization_id.as_deref(), Some("org-1"));
    let rejected = world.record(rejected);
    assert_eq!(rejected.state, TrackingState::PrefilterFail);
    assert!(rejected.organization_id.is_none());
}

#[tokio::test]
async fn existing_graph_organization_is_attached() {
    let world = MockWorld::new();
    identified(&world, Some("https://acme.com"));
    world.organizations.add("t1", "acme.com", "org-graph", "Acme Corp");
    let first = world.visit("t1", IP, TrackingState::Identified, 60);
    let second = world.visit("t1", IP, TrackingState::Identified, 30);

    let stats = world.pipeline().resolver().run().await.unwrap();

    assert_eq!(stats.advanced, 1);
    assert_eq!(stats.fanned_out, 1);
    assert_eq!(world.organization_service.call_count(), 0);
    for id in [first, second] {
        let record = world.record(id);
        assert_eq!(record.state, TrackingState::OrganizationExists);
        assert_eq!(record.organization_id.as_deref(), Some("org-graph"));
        assert_eq!(record.organization_name.as_deref(), Some("Acme Corp"));
    }
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let world = MockWorld::new();
    identified(&world, Some("https://acme.com"));
    world.organization_service.fail_next(OrganizationServiceError::Api {
        status: 503,
        message: "unavailable".into(),
    });
    world
        .organization_service
        .fail_next(OrganizationServiceError::Network("connection reset".into()));
    let id = world.visit("t1", IP, TrackingState::Identified, 60);

    world.pipeline().resolver().run().await.unwrap();

    assert_eq!(world.organization_service.call_count(), 3);
    assert_eq!(world.record(id).state, TrackingState::OrganizationCreated);
}

#[tokio::test]
async fn permanent_failure_leaves_record_identified() {
    let world = MockWorld::new();
    identified(&world, Some("https://acme.com"));
    world.organization_service.fail_next(OrganizationServiceError::Api {
        status: 400,
        message: "invalid domain".into(),
    });
    let id = world.visit("t1", IP, TrackingState::Identified, 60);

    let stats = world.pipeline().resolver().run().await.unwrap();

    assert_eq!(stats.failed, 1);
    assert_eq!(world.organization_service.call_count(), 1);
    let record = world.record(id);
    assert_eq!(record.state, TrackingState::Identified);
    assert!(record.organization_id.is_none());

    // Next tick tries again and succeeds.
    world.pipeline().resolver().run().await.unwrap();
    assert_eq!(world.record(id).state, TrackingState::OrganizationCreated);
}

#[tokio::test]
async fn retries_give_up_after_max_attempts() {
    let world = MockWorld::new();
    identified(&world, Some("https://acme.com"));
    for _ in 0..5 {
        world.organization_service.fail_next(OrganizationServiceError::Api {
            status: 502,
            message: "bad gateway".into(),
        });
    }
    let id = world.visit("t1", IP, TrackingState::Identified, 60);

    let stats = world.pipeline().resolver().run().await.unwrap();

    assert_eq!(stats.failed, 1);
    assert_eq!(world.organization_service.call_count(), 3);
    assert_eq!(world.record(id).state, TrackingState::Identified);
}

#[tokio::test]
async fn missing_website_skips_creation() {
    let world = MockWorld::new();
    identified(&world, None);
    let id = world.visit("t1", IP, TrackingState::Identified, 60);
    let representative = world.record(id);

    let resolution = world.pipeline().resolver().resolve(&representative).await.unwrap();

    assert_eq!(resolution, Resolution::Skipped(RevealError::MissingWebsite(IP.into())));
    assert_eq!(world.organization_service.call_count(), 0);
    assert_eq!(world.record(id).state, TrackingState::Identified);
}

#[tokio::test]
async fn missing_cache_entry_skips() {
    let world = MockWorld::new();
    let id = world.visit("t1", IP, TrackingState::Identified, 60);
    let representative = world.record(id);

    let resolution = world.pipeline().resolver().resolve(&representative).await.unwrap();

    assert!(matches!(
        resolution,
        Resolution::Skipped(RevealError::MissingCacheEntry { .. })
    ));
    assert_eq!(world.record(id).state, TrackingState::Identified);
}

#[tokio::test]
async fn graph_outage_leaves_record_for_next_tick() {
    let world = MockWorld::new();
    identified(&world, Some("https://acme.com"));
    world.organizations.set_unavailable(true);
    let id = world.visit("t1", IP, TrackingState::Identified, 60);

    let stats = world.pipeline().resolver().run().await.unwrap();

    assert_eq!(stats.failed, 1);
    assert_eq!(world.organization_service.call_count(), 0);
    assert_eq!(world.record(id).state, TrackingState::Identified);
}

#[tokio::test]
async fn stale_representative_is_ignored() {
    let world = MockWorld::new();
    identified(&world, Some("https://acme.com"));
    let id = world.visit("t1", IP, TrackingState::Identified, 60);
    let snapshot = world.record(id);
    world.tracking.update(id, |r| r.state = TrackingState::Error);

    let resolution = world.pipeline().resolver().resolve(&snapshot).await.unwrap();

    assert_eq!(resolution, Resolution::Stale);
    assert_eq!(world.organization_service.call_count(), 0);
}

#[tokio::test]
async fn tenants_are_resolved_independently() {
    let world = MockWorld::new();
    identified(&world, Some("https://acme.com"));
    let a = world.visit("t1", IP, TrackingState::Identified, 60);
    let b = world.visit("t2", IP, TrackingState::Identified, 50);

    let stats = world.pipeline().resolver().run().await.unwrap();

    assert_eq!(stats.examined, 2);
    assert_eq!(world.organization_service.call_count(), 2);
    let a = world.record(a);
    let b = world.record(b);
    assert_eq!(a.state, TrackingState::OrganizationCreated);
    assert_eq!(b.state, TrackingState::OrganizationCreated);
    assert_ne!(a.organization_id, b.organization_id);
}

#[tokio::test]
async fn unresolvable_representatives_do_not_starve_later_ones() {
    let world = MockWorld::new();
    let stuck: Vec<_> = [("192.0.2.1", 900), ("192.0.2.2", 800)]
        .into_iter()
        .map(|(ip, age)| {
            world
                .identification_cache
                .insert(identification_entry(ip, company_response("Acme", "acme.com", None)));
            world.visit("t1", ip, TrackingState::Identified, age)
        })
        .collect();
    identified(&world, Some("https://acme.com"));
    let id = world.visit("t1", IP, TrackingState::Identified, 60);

    let stats = world
        .pipeline_with_batch_limit(2)
        .resolver()
        .run()
        .await
        .unwrap();

    assert_eq!(stats.examined, 3);
    assert_eq!(stats.advanced, 1);
    assert_eq!(world.record(id).state, TrackingState::OrganizationCreated);
    for id in stuck {
        assert_eq!(world.record(id).state, TrackingState::Identified);
    }
}
