// Trait seams for every collaborator the pipeline talks to.
//
// Stores (Postgres), directories (Neo4j), the organization service, Slack and
// the two enrichment providers each sit behind a narrow trait so the stages
// can run against in-memory mocks (see `testing`) with no network or Docker.

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use ipdata_client::{IpDataClient, IpDataLookup};
use reveal_common::{
    IdentificationCacheEntry, OrganizationNode, OrganizationRef, PageCursor, PrefilterCacheEntry,
    SlackChannelSubscription, TenantSlackCredential, TrackingRecord, TrackingState,
};
use reveal_graph::{OrganizationReader, WorkspaceReader};
use reveal_store::{PgIdentificationCache, PgPrefilterCache, PgSlackStore, PgTrackingStore};
use snitcher_client::{CompanyLookup, SnitcherClient};

use crate::notify::slack::{SlackMessage, SlackPostOutcome, SlackWebApi};
use crate::organization_client::{
    OrganizationServiceClient, OrganizationServiceError, UpsertOrganizationRequest,
};

// ---------------------------------------------------------------------------
// TrackingStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait TrackingStore: Send + Sync {
    /// Reads below return one page in `(created_at, id)` order, strictly after `after`.
    async fn get_by_state(
        &self,
        states: &[TrackingState],
        after: Option<PageCursor>,
        limit: i64,
    ) -> Result<Vec<TrackingRecord>>;

    /// Earliest IDENTIFIED record per (tenant, ip).
    async fn get_identified_representatives(
        &self,
        after: Option<PageCursor>,
        limit: i64,
    ) -> Result<Vec<TrackingRecord>>;

    /// Records with an organization that have not been announced yet.
    async fn get_pending_notification(
        &self,
        after: Option<PageCursor>,
        limit: i64,
    ) -> Result<Vec<TrackingRecord>>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<TrackingRecord>>;

    /// Compare-and-set. `false` means the record was no longer in `from`.
    async fn set_state(&self, id: Uuid, from: TrackingState, to: TrackingState) -> Result<bool>;

    async fn mark_organization_created(&self, id: Uuid, org: &OrganizationRef) -> Result<bool>;

    async fn mark_all_with_organization(
        &self,
        tenant: &str,
        ip: &str,
        state: TrackingState,
        org: &OrganizationRef,
    ) -> Result<u64>;

    async fn mark_all_excluding_id(
        &self,
        id: Uuid,
        tenant: &str,
        ip: &str,
        state: TrackingState,
        org: &OrganizationRef,
    ) -> Result<u64>;

    async fn find_organization_for_ip(
        &self,
        tenant: &str,
        ip: &str,
    ) -> Result<Option<OrganizationRef>>;

    async fn mark_notified(&self, id: Uuid) -> Result<bool>;
}

#[async_trait]
impl TrackingStore for PgTrackingStore {
    async fn get_by_state(
        &self,
        states: &[TrackingState],
        after: Option<PageCursor>,
        limit: i64,
    ) -> Result<Vec<TrackingRecord>> {
        self.get_by_state(states, after, limit).await
    }

    async fn get_identified_representatives(
        &self,
        after: Option<PageCursor>,
        limit: i64,
    ) -> Result<Vec<TrackingRecord>> {
        self.get_identified_representatives(after, limit).await
    }

    async fn get_pending_notification(
        &self,
        after: Option<PageCursor>,
        limit: i64,
    ) -> Result<Vec<TrackingRecord>> {
        self.get_pending_notification(after, limit).await
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<TrackingRecord>> {
        self.get_by_id(id).await
    }

    async fn set_state(&self, id: Uuid, from: TrackingState, to: TrackingState) -> Result<bool> {
        self.set_state(id, from, to).await
    }

    async fn mark_organization_created(&self, id: Uuid, org: &OrganizationRef) -> Result<bool> {
        self.mark_organization_created(id, org).await
    }

    async fn mark_all_with_organization(
        &self,
        tenant: &str,
        ip: &str,
        state: TrackingState,
        org: &OrganizationRef,
    ) -> Result<u64> {
        self.mark_all_with_organization(tenant, ip, state, org).await
    }

    async fn mark_all_excluding_id(
        &self,
        id: Uuid,
        tenant: &str,
        ip: &str,
        state: TrackingState,
        org: &OrganizationRef,
    ) -> Result<u64> {
        self.mark_all_excluding_id(id, tenant, ip, state, org).await
    }

    async fn find_organization_for_ip(
        &self,
        tenant: &str,
        ip: &str,
    ) -> Result<Option<OrganizationRef>> {
        self.find_organization_for_ip(tenant, ip).await
    }

    async fn mark_notified(&self, id: Uuid) -> Result<bool> {
        self.mark_notified(id).await
    }
}

// ---------------------------------------------------------------------------
// Provider caches
// ---------------------------------------------------------------------------

#[async_trait]
pub trait PrefilterCache: Send + Sync {
    async fn get_by_ip(&self, ip: &str) -> Result<Option<PrefilterCacheEntry>>;

    /// Insert-once. A second register for the same IP is a no-op.
    async fn register(&self, entry: &PrefilterCacheEntry) -> Result<()>;
}

#[async_trait]
impl PrefilterCache for PgPrefilterCache {
    async fn get_by_ip(&self, ip: &str) -> Result<Option<PrefilterCacheEntry>> {
        self.get_by_ip(ip).await
    }

    async fn register(&self, entry: &PrefilterCacheEntry) -> Result<()> {
        self.register(entry).await
    }
}

#[async_trait]
pub trait IdentificationCache: Send + Sync {
    async fn get_by_ip(&self, ip: &str) -> Result<Option<IdentificationCacheEntry>>;

    async fn register(&self, entry: &IdentificationCacheEntry) -> Result<()>;
}

#[async_trait]
impl IdentificationCache for PgIdentificationCache {
    async fn get_by_ip(&self, ip: &str) -> Result<Option<IdentificationCacheEntry>> {
        self.get_by_ip(ip).await
    }

    async fn register(&self, entry: &IdentificationCacheEntry) -> Result<()> {
        self.register(entry).await
    }
}

// ---------------------------------------------------------------------------
// Graph directories
// ---------------------------------------------------------------------------

#[async_trait]
pub trait OrganizationDirectory: Send + Sync {
    async fn get_by_domain(&self, tenant: &str, domain: &str) -> Result<Option<OrganizationNode>>;
}

#[async_trait]
impl OrganizationDirectory for OrganizationReader {
    async fn get_by_domain(&self, tenant: &str, domain: &str) -> Result<Option<OrganizationNode>> {
        Ok(self.get_by_domain(tenant, domain).await?)
    }
}

#[async_trait]
pub trait WorkspaceDirectory: Send + Sync {
    /// Normalized domains the tenant itself owns.
    async fn get_domains(&self, tenant: &str) -> Result<Vec<String>>;
}

#[async_trait]
impl WorkspaceDirectory for WorkspaceReader {
    async fn get_domains(&self, tenant: &str) -> Result<Vec<String>> {
        Ok(self.get_domains(tenant).await?)
    }
}

// ---------------------------------------------------------------------------
// Organization service
// ---------------------------------------------------------------------------

#[async_trait]
pub trait OrganizationRpcClient: Send + Sync {
    /// Create or update an organization, returning its id.
    async fn upsert_organization(
        &self,
        request: &UpsertOrganizationRequest,
    ) -> Result<String, OrganizationServiceError>;
}

#[async_trait]
impl OrganizationRpcClient for OrganizationServiceClient {
    async fn upsert_organization(
        &self,
        request: &UpsertOrganizationRequest,
    ) -> Result<String, OrganizationServiceError> {
        self.upsert(request).await
    }
}

// ---------------------------------------------------------------------------
// Slack
// ---------------------------------------------------------------------------

#[async_trait]
pub trait SlackSubscriptionStore: Send + Sync {
    async fn get_channels(
        &self,
        tenant: &str,
        workflow_tag: &str,
    ) -> Result<Vec<SlackChannelSubscription>>;
}

#[async_trait]
impl SlackSubscriptionStore for PgSlackStore {
    async fn get_channels(
        &self,
        tenant: &str,
        workflow_tag: &str,
    ) -> Result<Vec<SlackChannelSubscription>> {
        self.get_channels(tenant, workflow_tag).await
    }
}

#[async_trait]
pub trait SlackCredentialStore: Send + Sync {
    async fn get_credential(&self, tenant: &str) -> Result<Option<TenantSlackCredential>>;
}

#[async_trait]
impl SlackCredentialStore for PgSlackStore {
    async fn get_credential(&self, tenant: &str) -> Result<Option<TenantSlackCredential>> {
        self.get_credential(tenant).await
    }
}

#[async_trait]
pub trait SlackPoster: Send + Sync {
    /// `Err` only for transport failures. Any HTTP response is an outcome.
    async fn post_message(&self, bot_token: &str, message: &SlackMessage)
        -> Result<SlackPostOutcome>;
}

#[async_trait]
impl SlackPoster for SlackWebApi {
    async fn post_message(
        &self,
        bot_token: &str,
        message: &SlackMessage,
    ) -> Result<SlackPostOutcome> {
        self.post_message(bot_token, message).await
    }
}

// ---------------------------------------------------------------------------
// Enrichment providers
// ---------------------------------------------------------------------------

#[async_trait]
pub trait PrefilterProvider: Send + Sync {
    async fn lookup(&self, ip: &str) -> Result<IpDataLookup>;
}

#[async_trait]
impl PrefilterProvider for IpDataClient {
    async fn lookup(&self, ip: &str) -> Result<IpDataLookup> {
        Ok(self.lookup(ip).await?)
    }
}

#[async_trait]
pub trait IdentificationProvider: Send + Sync {
    async fn find_company(&self, ip: &str) -> Result<CompanyLookup>;
}

#[async_trait]
impl IdentificationProvider for SnitcherClient {
    async fn find_company(&self, ip: &str) -> Result<CompanyLookup> {
        Ok(self.find_company(ip).await?)
    }
}
