// IDENTIFIED → ORGANIZATION_CREATED | ORGANIZATION_EXISTS.
//
// Work is done once per (tenant, ip): the earliest IDENTIFIED record is the
// representative, and whatever organization it resolves to is fanned out to
// every open record sharing that IP. Only the representative can trigger an
// upsert, so N visits from one company cost one organization-service call.

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use reveal_common::{
    normalize_domain, IdentificationCacheEntry, OrganizationRef, PageCursor, RevealError,
    TrackingRecord, TrackingState,
};

use crate::organization_client::{OrganizationServiceError, UpsertOrganizationRequest};
use crate::retry::{with_retry, RetryPolicy};
use crate::traits::{IdentificationCache, OrganizationDirectory, OrganizationRpcClient, TrackingStore};
use crate::types::StageStats;

/// What happened to one representative.
#[derive(Debug, PartialEq)]
pub enum Resolution {
    Created { organization_id: String, fanned_out: u64 },
    Existing { organization_id: String, fanned_out: u64 },
    /// Changed since it was selected. Not an error.
    Stale,
    /// Data gap; the record stays IDENTIFIED.
    Skipped(RevealError),
    /// Graph lookup or organization service failed; retried next tick.
    Failed,
}

pub struct OrganizationResolver {
    tracking: Arc<dyn TrackingStore>,
    identification_cache: Arc<dyn IdentificationCache>,
    organizations: Arc<dyn OrganizationDirectory>,
    organization_service: Arc<dyn OrganizationRpcClient>,
    retry: RetryPolicy,
    batch_limit: i64,
}

impl OrganizationResolver {
    pub fn new(
        tracking: Arc<dyn TrackingStore>,
        identification_cache: Arc<dyn IdentificationCache>,
        organizations: Arc<dyn OrganizationDirectory>,
        organization_service: Arc<dyn OrganizationRpcClient>,
        retry: RetryPolicy,
        batch_limit: i64,
    ) -> Self {
        Self {
            tracking,
            identification_cache,
            organizations,
            organization_service,
            retry,
            batch_limit,
        }
    }

    pub async fn run(&self) -> Result<StageStats> {
        let mut stats = StageStats::default();
        let mut after = None;
        loop {
            let page = self
                .tracking
                .get_identified_representatives(after, self.batch_limit)
                .await?;
            let Some(last) = page.last() else { break };
            after = Some(PageCursor::of(last));
            let exhausted = (page.len() as i64) < self.batch_limit;

            for representative in page {
                stats.examined += 1;
                match self.resolve(&representative).await? {
                    Resolution::Created { fanned_out, .. } | Resolution::Existing { fanned_out, .. } => {
                        stats.advanced += 1;
                        stats.fanned_out += fanned_out;
                    }
                    Resolution::Stale => stats.skipped += 1,
                    Resolution::Skipped(reason) => {
                        warn!(id = %representative.id, tenant = %representative.tenant, reason = %reason, "Organization not resolved");
                        stats.skipped += 1;
                    }
                    Resolution::Failed => stats.failed += 1,
                }
            }

            if exhausted {
                break;
            }
        }

        info!(%stats, "Organization resolution complete");
        Ok(stats)
    }

    /// Resolve one representative. Store errors propagate; everything else is
    /// reported through the returned `Resolution`.
    pub async fn resolve(&self, representative: &TrackingRecord) -> Result<Resolution> {
        let Some(record) = self.tracking.get_by_id(representative.id).await? else {
            debug!(id = %representative.id, "Representative disappeared");
            return Ok(Resolution::Stale);
        };
        if record.state != TrackingState::Identified {
            debug!(id = %record.id, state = %record.state, "Representative no longer IDENTIFIED");
            return Ok(Resolution::Stale);
        }

        let Some(entry) = self.identification_cache.get_by_ip(&record.ip).await? else {
            return Ok(Resolution::Skipped(RevealError::MissingCacheEntry {
                cache: "identification",
                ip: record.ip.clone(),
            }));
        };
        let Some(domain) = entry.domain().map(normalize_domain).filter(|d| !d.is_empty()) else {
            return Ok(Resolution::Skipped(RevealError::MissingDomain(record.ip.clone())));
        };

        // A sibling may already carry an organization the graph hasn't caught up with.
        if let Some(org) = self
            .tracking
            .find_organization_for_ip(&record.tenant, &record.ip)
            .await?
        {
            return self.attach_existing(&record, org).await;
        }

        match self.organizations.get_by_domain(&record.tenant, &domain).await {
            Ok(Some(node)) => {
                let org = OrganizationRef {
                    id: node.id,
                    name: node.name.or_else(|| entry.name().map(str::to_string)),
                    domain: Some(domain),
                    website: entry.website().map(str::to_string),
                };
                self.attach_existing(&record, org).await
            }
            Ok(None) => self.create(&record, &entry, domain).await,
            Err(e) => {
                warn!(id = %record.id, tenant = %record.tenant, domain = %domain, error = %e, "Organization lookup failed");
                Ok(Resolution::Failed)
            }
        }
    }

    async fn attach_existing(&self, record: &TrackingRecord, org: OrganizationRef) -> Result<Resolution> {
        let marked = self
            .tracking
            .mark_all_with_organization(
                &record.tenant,
                &record.ip,
                TrackingState::OrganizationExists,
                &org,
            )
            .await?;

        info!(
            tenant = %record.tenant,
            ip = %record.ip,
            organization_id = %org.id,
            records = marked,
            "Attached existing organization"
        );
        Ok(Resolution::Existing {
            organization_id: org.id,
            fanned_out: marked.saturating_sub(1),
        })
    }

    async fn create(
        &self,
        record: &TrackingRecord,
        entry: &IdentificationCacheEntry,
        domain: String,
    ) -> Result<Resolution> {
        let Some(website) = entry.website() else {
            return Ok(Resolution::Skipped(RevealError::MissingWebsite(record.ip.clone())));
        };
        let name = entry.name().unwrap_or(&domain).to_string();

        let request = UpsertOrganizationRequest::prospect(&record.tenant, &name, website, &domain);
        let service = &self.organization_service;
        let organization_id = match with_retry(
            &self.retry,
            "upsert_organization",
            OrganizationServiceError::is_transient,
            || service.upsert_organization(&request),
        )
        .await
        {
            Ok(id) => id,
            Err(e) => {
                warn!(id = %record.id, tenant = %record.tenant, domain = %domain, error = %e, "Organization upsert failed");
                return Ok(Resolution::Failed);
            }
        };

        let org = OrganizationRef {
            id: organization_id.clone(),
            name: Some(name),
            domain: Some(domain),
            website: Some(website.to_string()),
        };

        let created = self.tracking.mark_organization_created(record.id, &org).await?;
        let fanned_out = if created {
            self.tracking
                .mark_all_excluding_id(
                    record.id,
                    &record.tenant,
                    &record.ip,
                    TrackingState::OrganizationExists,
                    &org,
                )
                .await?
        } else {
            // Representative moved on between re-read and write. Keep the
            // organization reachable from its siblings anyway.
            warn!(id = %record.id, organization_id = %org.id, "Representative changed before it could be marked");
            self.tracking
                .mark_all_with_organization(
                    &record.tenant,
                    &record.ip,
                    TrackingState::OrganizationExists,
                    &org,
                )
                .await?
        };

        info!(
            tenant = %record.tenant,
            ip = %record.ip,
            organization_id = %org.id,
            fanned_out,
            "Organization created"
        );
        Ok(Resolution::Created {
            organization_id,
            fanned_out,
        })
    }
}
