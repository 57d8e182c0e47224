pub mod error;
pub mod types;

pub use error::{IpDataError, Result};
pub use types::{Carrier, IpDataResponse, Threat};

use std::time::Duration;

/// A parsed lookup plus the body it came from.
#[derive(Debug, Clone)]
pub struct IpDataLookup {
    pub response: IpDataResponse,
    pub raw: serde_json::Value,
}

pub struct IpDataClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl IpDataClient {
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

    /// Look up reputation data for a single IP.
    pub async fn lookup(&self, ip: &str) -> Result<IpDataLookup> {
        let url = format!("{}/{}", self.base_url, ip);
        let resp = self
            .client
            .get(&url)
            .query(&[("api-key", self.api_key.as_str())])
            .header("Content-Type", "application/json")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(IpDataError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let raw: serde_json::Value = resp.json().await?;
        let response: IpDataResponse = serde_json::from_value(raw.clone())?;
        tracing::debug!(
            ip,
            should_identify = response.should_identify(),
            "ipdata lookup complete"
        );

        Ok(IpDataLookup { response, raw })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = IpDataClient::new("https://api.ipdata.co/", "key".to_string()).unwrap();
        assert_eq!(client.base_url, "https://api.ipdata.co");
    }

    #[tokio::test]
    async fn unreachable_host_is_a_network_error() {
        let client = IpDataClient::new("http://127.0.0.1:9", "key".to_string()).unwrap();
        let err = client.lookup("198.51.100.4").await.unwrap_err();
        assert!(matches!(err, IpDataError::Network(_)), "got {err:?}");
    }
}
