// Cache-or-fetch access to the two enrichment providers.
//
// A cache hit makes no HTTP call. A miss makes exactly one provider call and
// one insert, then re-reads the row so concurrent writers for the same IP end
// up agreeing on whichever insert won.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::debug;

use ipdata_client::IpDataLookup;
use reveal_common::{IdentificationCacheEntry, PrefilterCacheEntry};
use snitcher_client::CompanyLookup;

use crate::traits::{IdentificationCache, IdentificationProvider, PrefilterCache, PrefilterProvider};

#[derive(Error, Debug)]
pub enum GatewayError {
    /// The external service failed. The record should wait for the next tick.
    #[error("{service} request failed: {error:#}")]
    Provider {
        service: &'static str,
        error: anyhow::Error,
    },

    /// The cache table itself failed. Aborts the tick.
    #[error(transparent)]
    Store(anyhow::Error),
}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

// ---------------------------------------------------------------------------
// Prefilter (IP reputation)
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PrefilterGateway {
    cache: Arc<dyn PrefilterCache>,
    provider: Arc<dyn PrefilterProvider>,
}

impl PrefilterGateway {
    pub fn new(cache: Arc<dyn PrefilterCache>, provider: Arc<dyn PrefilterProvider>) -> Self {
        Self { cache, provider }
    }

    pub async fn lookup(&self, ip: &str) -> GatewayResult<Option<PrefilterCacheEntry>> {
        self.cache.get_by_ip(ip).await.map_err(GatewayError::Store)
    }

    pub async fn fetch(&self, ip: &str) -> GatewayResult<IpDataLookup> {
        self.provider
            .lookup(ip)
            .await
            .map_err(|error| GatewayError::Provider {
                service: "ipdata",
                error,
            })
    }

    pub async fn store(
        &self,
        ip: &str,
        should_identify: Option<bool>,
        response: serde_json::Value,
    ) -> GatewayResult<PrefilterCacheEntry> {
        let entry = PrefilterCacheEntry {
            ip: ip.to_string(),
            should_identify,
            response,
            created_at: Utc::now(),
        };
        self.cache.register(&entry).await.map_err(GatewayError::Store)?;

        // Whatever is persisted now is authoritative, ours or a racing writer's.
        Ok(self.lookup(ip).await?.unwrap_or(entry))
    }

    /// Cached decision for `ip`, fetching and caching it on a miss.
    pub async fn resolve(&self, ip: &str) -> GatewayResult<PrefilterCacheEntry> {
        if let Some(entry) = self.lookup(ip).await? {
            debug!(ip, "Prefilter cache hit");
            return Ok(entry);
        }

        let lookup = self.fetch(ip).await?;
        let decision = lookup.response.should_identify();
        self.store(ip, Some(decision), lookup.raw).await
    }
}

// ---------------------------------------------------------------------------
// Identification (company lookup)
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct IdentificationGateway {
    cache: Arc<dyn IdentificationCache>,
    provider: Arc<dyn IdentificationProvider>,
}

impl IdentificationGateway {
    pub fn new(
        cache: Arc<dyn IdentificationCache>,
        provider: Arc<dyn IdentificationProvider>,
    ) -> Self {
        Self { cache, provider }
    }

    pub async fn lookup(&self, ip: &str) -> GatewayResult<Option<IdentificationCacheEntry>> {
        self.cache.get_by_ip(ip).await.map_err(GatewayError::Store)
    }

    pub async fn fetch(&self, ip: &str) -> GatewayResult<CompanyLookup> {
        self.provider
            .find_company(ip)
            .await
            .map_err(|error| GatewayError::Provider {
                service: "snitcher",
                error,
            })
    }

    /// Cache the company fields that are present and non-empty, plus the raw body.
    pub async fn store(
        &self,
        ip: &str,
        lookup: CompanyLookup,
    ) -> GatewayResult<IdentificationCacheEntry> {
        let company = &lookup.response;
        let entry = IdentificationCacheEntry {
            ip: ip.to_string(),
            company_name: company.name().map(str::to_string),
            company_domain: company.domain().map(str::to_string),
            company_website: company.website().map(str::to_string),
            response: lookup.raw,
            created_at: Utc::now(),
        };
        self.cache.register(&entry).await.map_err(GatewayError::Store)?;

        Ok(self.lookup(ip).await?.unwrap_or(entry))
    }

    pub async fn resolve(&self, ip: &str) -> GatewayResult<IdentificationCacheEntry> {
        if let Some(entry) = self.lookup(ip).await? {
            debug!(ip, "Identification cache hit");
            return Ok(entry);
        }

        let lookup = self.fetch(ip).await?;
        self.store(ip, lookup).await
    }
}
