//! Test utilities for spinning up a real Neo4j instance via testcontainers.

use neo4rs::query;
use testcontainers::{
    core::{ContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};

use crate::GraphClient;

/// Spin up a Neo4j container and return the container handle + connected GraphClient.
///
/// The container is dropped (and stopped) when `ContainerAsync` goes out of scope,
/// so callers must hold it alive for the duration of the test.
pub async fn neo4j_container() -> (ContainerAsync<GenericImage>, GraphClient) {
    let image = GenericImage::new("neo4j", "5.25.1-community")
        .with_exposed_port(ContainerPort::Tcp(7687))
        .with_wait_for(WaitFor::message_on_stdout("Started."))
        .with_env_var("NEO4J_AUTH", "neo4j/testpassword");

    let container: ContainerAsync<GenericImage> = image
        .start()
        .await
        .expect("Failed to start Neo4j container");

    let host_port = container
        .get_host_port_ipv4(7687)
        .await
        .expect("Failed to get Neo4j host port");

    let uri = format!("bolt://127.0.0.1:{host_port}");
    let client = GraphClient::connect(&uri, "neo4j", "testpassword")
        .await
        .expect("Failed to connect to Neo4j");

    (container, client)
}

/// Create a tenant organization reachable through `domain`.
pub async fn seed_organization(client: &GraphClient, tenant: &str, id: &str, name: &str, domain: &str) {
    let q = query(
        "MERGE (t:Tenant {name: $tenant})
         MERGE (o:Organization {id: $id})
         SET o.name = $name
         MERGE (o)-[:ORGANIZATION_BELONGS_TO_TENANT]->(t)
         MERGE (d:Domain {domain: $domain})
         MERGE (o)-[:HAS_DOMAIN]->(d)",
    )
    .param("tenant", tenant)
    .param("id", id)
    .param("name", name)
    .param("domain", domain);

    client.graph.run(q).await.expect("Failed to seed organization");
}

/// Register a workspace (the tenant's own domain) for `tenant`.
pub async fn seed_workspace(client: &GraphClient, tenant: &str, domain: &str) {
    let q = query(
        "MERGE (t:Tenant {name: $tenant})
         MERGE (t)-[:HAS_WORKSPACE]->(w:Workspace {name: $name, provider: 'google'})",
    )
    .param("tenant", tenant)
    .param("name", domain);

    client.graph.run(q).await.expect("Failed to seed workspace");
}
