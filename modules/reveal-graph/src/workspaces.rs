use neo4rs::query;

use reveal_common::normalize_domain;

use crate::GraphClient;

/// Workspace names double as the tenant's own web domains.
#[derive(Clone)]
pub struct WorkspaceReader {
    client: GraphClient,
}

impl WorkspaceReader {
    pub fn new(client: GraphClient) -> Self {
        Self { client }
    }

    /// Normalized workspace domains registered for `tenant`.
    pub async fn get_domains(&self, tenant: &str) -> Result<Vec<String>, neo4rs::Error> {
        let q = query(
            "MATCH (t:Tenant {name: $tenant})-[:HAS_WORKSPACE]->(w:Workspace)
             RETURN DISTINCT w.name AS name",
        )
        .param("tenant", tenant);

        let mut domains = Vec::new();
        for row in self.client.rows(q, None).await? {
            let name: String = row.get("name").unwrap_or_default();
            let domain = normalize_domain(&name);
            if !domain.is_empty() && !domains.contains(&domain) {
                domains.push(domain);
            }
        }
        Ok(domains)
    }
}
