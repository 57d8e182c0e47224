use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use reveal_common::REVEAL_AI_LEAD_SOURCE;

pub const RELATIONSHIP_PROSPECT: &str = "PROSPECT";
pub const STAGE_LEAD: &str = "LEAD";
pub const SOURCE: &str = "openline";
pub const APP_SOURCE: &str = "sync-tracking";

#[derive(Error, Debug)]
pub enum OrganizationServiceError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Organization service error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl OrganizationServiceError {
    /// Transport errors, throttling and server errors are worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::Parse(_) => false,
        }
    }
}

impl From<reqwest::Error> for OrganizationServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Parse(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertOrganizationRequest {
    pub tenant: String,
    pub name: String,
    pub website: String,
    pub domain: String,
    pub relationship: String,
    pub stage: String,
    pub lead_source: String,
    pub source: String,
    pub app_source: String,
}

impl UpsertOrganizationRequest {
    /// A prospect in the lead stage, attributed to website visits.
    pub fn prospect(tenant: &str, name: &str, website: &str, domain: &str) -> Self {
        Self {
            tenant: tenant.to_string(),
            name: name.to_string(),
            website: website.to_string(),
            domain: domain.to_string(),
            relationship: RELATIONSHIP_PROSPECT.to_string(),
            stage: STAGE_LEAD.to_string(),
            lead_source: REVEAL_AI_LEAD_SOURCE.to_string(),
            source: SOURCE.to_string(),
            app_source: APP_SOURCE.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct UpsertOrganizationResponse {
    id: String,
}

/// HTTP client for the organization service's upsert endpoint.
pub struct OrganizationServiceClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OrganizationServiceClient {
    pub fn new(base_url: &str, api_key: String) -> Result<Self, OrganizationServiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub async fn upsert(
        &self,
        request: &UpsertOrganizationRequest,
    ) -> Result<String, OrganizationServiceError> {
        let url = format!("{}/organizations/upsert", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(OrganizationServiceError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body: UpsertOrganizationResponse = resp.json().await?;
        if body.id.is_empty() {
            return Err(OrganizationServiceError::Parse(
                "upsert response has an empty id".to_string(),
            ));
        }
        tracing::debug!(tenant = %request.tenant, domain = %request.domain, id = %body.id, "Organization upserted");
        Ok(body.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_serializes_camel_case() {
        let req = UpsertOrganizationRequest::prospect("t1", "Acme", "https://acme.com", "acme.com");
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(
            value,
            json!({
                "tenant": "t1",
                "name": "Acme",
                "website": "https://acme.com",
                "domain": "acme.com",
                "relationship": "PROSPECT",
                "stage": "LEAD",
                "leadSource": "Reveal AI",
                "source": "openline",
                "appSource": "sync-tracking",
            })
        );
    }

    #[test]
    fn transient_classification() {
        assert!(OrganizationServiceError::Network("reset".into()).is_transient());
        assert!(OrganizationServiceError::Api { status: 429, message: String::new() }.is_transient());
        assert!(OrganizationServiceError::Api { status: 503, message: String::new() }.is_transient());
        assert!(!OrganizationServiceError::Api { status: 400, message: String::new() }.is_transient());
        assert!(!OrganizationServiceError::Parse("bad".into()).is_transient());
    }

    #[tokio::test]
    async fn unreachable_service_is_transient() {
        let client = OrganizationServiceClient::new("http://127.0.0.1:9", "key".into()).unwrap();
        let req = UpsertOrganizationRequest::prospect("t1", "Acme", "https://acme.com", "acme.com");
        let err = client.upsert(&req).await.unwrap_err();
        assert!(err.is_transient(), "got {err:?}");
    }
}
