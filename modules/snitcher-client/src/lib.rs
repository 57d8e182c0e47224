pub mod error;
pub mod types;

pub use error::{Result, SnitcherError};
pub use types::{Company, CompanyResponse, Profile, Profiles};

use std::time::Duration;

/// A parsed company lookup plus the verbatim response body.
#[derive(Debug, Clone)]
pub struct CompanyLookup {
    pub response: CompanyResponse,
    pub raw: serde_json::Value,
}

pub struct SnitcherClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl SnitcherClient {
    pub fn new(base_url: &str, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Resolve the company behind an IP address.
    pub async fn find_company(&self, ip: &str) -> Result<CompanyLookup> {
        let url = format!("{}/company/find", self.base_url);
        let resp = self
            .client
            .post(&url)
            .query(&[("ip", ip)])
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SnitcherError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let raw: serde_json::Value = resp.json().await?;
        let response: CompanyResponse = serde_json::from_value(raw.clone())?;
        tracing::debug!(ip, domain = ?response.domain(), "Company lookup complete");

        Ok(CompanyLookup { response, raw })
    }
}
