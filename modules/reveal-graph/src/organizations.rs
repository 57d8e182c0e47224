use neo4rs::query;
use tracing::warn;

use reveal_common::{normalize_domain, OrganizationNode};

use crate::GraphClient;

/// Looks up tenant organizations by one of their domains.
#[derive(Clone)]
pub struct OrganizationReader {
    client: GraphClient,
}

impl OrganizationReader {
    pub fn new(client: GraphClient) -> Self {
        Self { client }
    }

    /// First organization of `tenant` owning `domain`. Matching ignores case
    /// and a leading `www.`.
    pub async fn get_by_domain(
        &self,
        tenant: &str,
        domain: &str,
    ) -> Result<Option<OrganizationNode>, neo4rs::Error> {
        let domain = normalize_domain(domain);
        if domain.is_empty() {
            return Ok(None);
        }

        let q = query(
            "MATCH (t:Tenant {name: $tenant})<-[:ORGANIZATION_BELONGS_TO_TENANT]-(o:Organization)-[:HAS_DOMAIN]->(d:Domain)
             WHERE toLower(d.domain) IN [$domain, 'www.' + $domain]
             RETURN o.id AS id, o.name AS name
             LIMIT 1",
        )
        .param("tenant", tenant)
        .param("domain", domain.as_str());

        let Some(row) = self.client.rows(q, Some(1)).await?.into_iter().next() else {
            return Ok(None);
        };

        let id: String = row.get("id").unwrap_or_default();
        if id.is_empty() {
            warn!(tenant, domain = %domain, "Organization node without id");
            return Ok(None);
        }
        let name: Option<String> = row.get("name").unwrap_or_default();

        Ok(Some(OrganizationNode { id, name }))
    }
}
