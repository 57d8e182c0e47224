// Test mocks for the reveal pipeline.
//
// One in-memory mock per trait seam:
// - MockTrackingStore (TrackingStore): Vec-backed rows with the same
//   compare-and-set and write-once rules as the Postgres store
// - MockPrefilterCache / MockIdentificationCache: insert-once HashMaps
// - MockPrefilterProvider / MockIdentificationProvider: IP→JSON, call log
// - MockOrganizationDirectory / MockWorkspaceDirectory: fixed graph answers
// - MockOrganizationService (OrganizationRpcClient): scripted failures, call log
// - MockSlack (subscription + credential stores), MockSlackPoster
//
// Plus `MockWorld`, which wires all of them into `RevealDeps`.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use ipdata_client::{IpDataLookup, IpDataResponse};
use reveal_common::{
    normalize_domain, IdentificationCacheEntry, OrganizationNode, OrganizationRef, PageCursor,
    PrefilterCacheEntry, SlackChannelSubscription, TenantSlackCredential, TrackingRecord,
    TrackingState, REVEAL_AI_WORKFLOW,
};
use snitcher_client::{CompanyLookup, CompanyResponse};

use crate::notify::slack::{SlackMessage, SlackPostOutcome};
use crate::organization_client::{OrganizationServiceError, UpsertOrganizationRequest};
use crate::pipeline::{RevealDeps, RevealPipeline};
use crate::retry::RetryPolicy;
use crate::traits::{
    IdentificationCache, IdentificationProvider, OrganizationDirectory, OrganizationRpcClient,
    PrefilterCache, PrefilterProvider, SlackCredentialStore, SlackPoster, SlackSubscriptionStore,
    TrackingStore, WorkspaceDirectory,
};

pub const TEST_APP_URL: &str = "https://app.example.com";

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A record in `state`, created `age_secs` ago.
pub fn tracking_record(tenant: &str, ip: &str, state: TrackingState, age_secs: i64) -> TrackingRecord {
    let mut record = TrackingRecord::new(tenant, ip, Utc::now() - chrono::Duration::seconds(age_secs));
    record.state = state;
    record.href = Some("https://tenant.example.com/pricing".into());
    record
}

/// ipdata body for a residential visitor with no threat flags.
pub fn clean_ip_response(ip: &str) -> Value {
    json!({
        "ip": ip,
        "carrier": null,
        "threat": {
            "is_tor": false,
            "is_icloud_relay": false,
            "is_proxy": false,
            "is_datacenter": false,
            "is_anonymous": false,
            "is_known_attacker": false,
            "is_known_abuser": false,
            "is_threat": false,
            "is_bogon": false
        }
    })
}

/// ipdata body for a datacenter IP.
pub fn datacenter_ip_response(ip: &str) -> Value {
    let mut body = clean_ip_response(ip);
    body["threat"]["is_datacenter"] = json!(true);
    body
}

/// Snitcher body for an identified company.
pub fn company_response(name: &str, domain: &str, website: Option<&str>) -> Value {
    json!({
        "fetched": true,
        "company": {
            "name": name,
            "domain": domain,
            "website": website,
            "location": "Berlin, Germany",
            "profiles": { "linkedin": { "url": format!("https://linkedin.com/company/{name}") } }
        }
    })
}

pub fn identification_entry(ip: &str, body: Value) -> IdentificationCacheEntry {
    let company: CompanyResponse = serde_json::from_value(body.clone()).unwrap_or_default();
    IdentificationCacheEntry {
        ip: ip.to_string(),
        company_name: company.name().map(str::to_string),
        company_domain: company.domain().map(str::to_string),
        company_website: company.website().map(str::to_string),
        response: body,
        created_at: Utc::now(),
    }
}

// ---------------------------------------------------------------------------
// MockTrackingStore
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockTrackingStore {
    records: Mutex<Vec<TrackingRecord>>,
}

impl MockTrackingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: TrackingRecord) -> Uuid {
        let id = record.id;
        self.records.lock().unwrap().push(record);
        id
    }

    pub fn get(&self, id: Uuid) -> Option<TrackingRecord> {
        self.records.lock().unwrap().iter().find(|r| r.id == id).cloned()
    }

    pub fn all(&self) -> Vec<TrackingRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn in_state(&self, state: TrackingState) -> Vec<TrackingRecord> {
        self.all().into_iter().filter(|r| r.state == state).collect()
    }

    /// Overwrite a row directly, bypassing the store rules.
    pub fn update(&self, id: Uuid, f: impl FnOnce(&mut TrackingRecord)) {
        if let Some(record) = self.records.lock().unwrap().iter_mut().find(|r| r.id == id) {
            f(record);
        }
    }

    fn sorted(mut records: Vec<TrackingRecord>, limit: i64) -> Vec<TrackingRecord> {
        records.sort_by_key(PageCursor::of);
        records.truncate(limit.max(0) as usize);
        records
    }

    /// Same ordering and cursor semantics as the Postgres keyset reads.
    fn page(
        records: impl IntoIterator<Item = TrackingRecord>,
        after: Option<PageCursor>,
        limit: i64,
    ) -> Vec<TrackingRecord> {
        let after_cursor = records
            .into_iter()
            .filter(|r| after.is_none_or(|cursor| cursor.precedes(r)))
            .collect();
        Self::sorted(after_cursor, limit)
    }

    fn apply(record: &mut TrackingRecord, state: TrackingState, org: &OrganizationRef) {
        record.state = state;
        record.organization_id = Some(org.id.clone());
        record.organization_name = org.name.clone();
        record.organization_domain = org.domain.clone();
        record.organization_website = org.website.clone();
    }

    fn mark_matching(
        &self,
        exclude: Option<Uuid>,
        tenant: &str,
        ip: &str,
        state: TrackingState,
        org: &OrganizationRef,
    ) -> Result<u64> {
        let mut open = Vec::new();
        for from in TrackingState::open() {
            from.ensure_can_advance_to(state)?;
            open.push(from);
        }
        let mut count = 0;
        for record in self.records.lock().unwrap().iter_mut() {
            if record.tenant == tenant
                && record.ip == ip
                && Some(record.id) != exclude
                && record.organization_id.is_none()
                && open.contains(&record.state)
            {
                Self::apply(record, state, org);
                count += 1;
            }
        }
        Ok(count)
    }
}

#[async_trait]
impl TrackingStore for MockTrackingStore {
    async fn get_by_state(
        &self,
        states: &[TrackingState],
        after: Option<PageCursor>,
        limit: i64,
    ) -> Result<Vec<TrackingRecord>> {
        let matching = self.all().into_iter().filter(|r| states.contains(&r.state));
        Ok(Self::page(matching, after, limit))
    }

    async fn get_identified_representatives(
        &self,
        after: Option<PageCursor>,
        limit: i64,
    ) -> Result<Vec<TrackingRecord>> {
        let mut earliest: HashMap<(String, String), TrackingRecord> = HashMap::new();
        for record in self.in_state(TrackingState::Identified) {
            let key = (record.tenant.clone(), record.ip.clone());
            let earlier = earliest.get(&key).is_none_or(|existing| {
                (record.created_at, record.id) < (existing.created_at, existing.id)
            });
            if earlier {
                earliest.insert(key, record);
            }
        }
        Ok(Self::page(earliest.into_values(), after, limit))
    }

    async fn get_pending_notification(
        &self,
        after: Option<PageCursor>,
        limit: i64,
    ) -> Result<Vec<TrackingRecord>> {
        let pending = self
            .all()
            .into_iter()
            .filter(|r| !r.notified && r.organization_id.is_some());
        Ok(Self::page(pending, after, limit))
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<TrackingRecord>> {
        Ok(self.get(id))
    }

    async fn set_state(&self, id: Uuid, from: TrackingState, to: TrackingState) -> Result<bool> {
        from.ensure_can_advance_to(to)?;
        let mut records = self.records.lock().unwrap();
        match records.iter_mut().find(|r| r.id == id && r.state == from) {
            Some(record) => {
                record.state = to;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_organization_created(&self, id: Uuid, org: &OrganizationRef) -> Result<bool> {
        let mut records = self.records.lock().unwrap();
        match records.iter_mut().find(|r| {
            r.id == id && r.state == TrackingState::Identified && r.organization_id.is_none()
        }) {
            Some(record) => {
                Self::apply(record, TrackingState::OrganizationCreated, org);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_all_with_organization(
        &self,
        tenant: &str,
        ip: &str,
        state: TrackingState,
        org: &OrganizationRef,
    ) -> Result<u64> {
        self.mark_matching(None, tenant, ip, state, org)
    }

    async fn mark_all_excluding_id(
        &self,
        id: Uuid,
        tenant: &str,
        ip: &str,
        state: TrackingState,
        org: &OrganizationRef,
    ) -> Result<u64> {
        self.mark_matching(Some(id), tenant, ip, state, org)
    }

    async fn find_organization_for_ip(
        &self,
        tenant: &str,
        ip: &str,
    ) -> Result<Option<OrganizationRef>> {
        let matching = self
            .all()
            .into_iter()
            .filter(|r| r.tenant == tenant && r.ip == ip && r.organization_id.is_some())
            .collect();
        Ok(Self::sorted(matching, 1).into_iter().next().and_then(|r| r.organization()))
    }

    async fn mark_notified(&self, id: Uuid) -> Result<bool> {
        let mut records = self.records.lock().unwrap();
        match records.iter_mut().find(|r| r.id == id && !r.notified) {
            Some(record) => {
                record.notified = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// ---------------------------------------------------------------------------
// Caches
// ---------------------------------------------------------------------------

/// Insert-once prefilter cache. `broken()` fails every call.
#[derive(Default)]
pub struct MockPrefilterCache {
    entries: Mutex<HashMap<String, PrefilterCacheEntry>>,
    broken: bool,
}

impl MockPrefilterCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::default()
        }
    }

    pub fn insert(&self, entry: PrefilterCacheEntry) {
        self.entries.lock().unwrap().insert(entry.ip.clone(), entry);
    }

    pub fn get(&self, ip: &str) -> Option<PrefilterCacheEntry> {
        self.entries.lock().unwrap().get(ip).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PrefilterCache for MockPrefilterCache {
    async fn get_by_ip(&self, ip: &str) -> Result<Option<PrefilterCacheEntry>> {
        if self.broken {
            bail!("prefilter_cache: connection refused");
        }
        Ok(self.get(ip))
    }

    async fn register(&self, entry: &PrefilterCacheEntry) -> Result<()> {
        if self.broken {
            bail!("prefilter_cache: connection refused");
        }
        self.entries
            .lock()
            .unwrap()
            .entry(entry.ip.clone())
            .or_insert_with(|| entry.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MockIdentificationCache {
    entries: Mutex<HashMap<String, IdentificationCacheEntry>>,
}

impl MockIdentificationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, entry: IdentificationCacheEntry) {
        self.entries.lock().unwrap().insert(entry.ip.clone(), entry);
    }

    pub fn get(&self, ip: &str) -> Option<IdentificationCacheEntry> {
        self.entries.lock().unwrap().get(ip).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl IdentificationCache for MockIdentificationCache {
    async fn get_by_ip(&self, ip: &str) -> Result<Option<IdentificationCacheEntry>> {
        Ok(self.get(ip))
    }

    async fn register(&self, entry: &IdentificationCacheEntry) -> Result<()> {
        self.entries
            .lock()
            .unwrap()
            .entry(entry.ip.clone())
            .or_insert_with(|| entry.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

/// IP→response-body map. Unregistered IPs fail like a provider outage.
#[derive(Default)]
pub struct MockPrefilterProvider {
    responses: Mutex<HashMap<String, Value>>,
    calls: Mutex<Vec<String>>,
}

impl MockPrefilterProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, ip: &str, body: Value) {
        self.responses.lock().unwrap().insert(ip.to_string(), body);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_for(&self, ip: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == ip).count()
    }
}

#[async_trait]
impl PrefilterProvider for MockPrefilterProvider {
    async fn lookup(&self, ip: &str) -> Result<IpDataLookup> {
        self.calls.lock().unwrap().push(ip.to_string());
        let raw = self
            .responses
            .lock()
            .unwrap()
            .get(ip)
            .cloned()
            .ok_or_else(|| anyhow!("ipdata API error (503): unavailable"))?;
        let response: IpDataResponse = serde_json::from_value(raw.clone())?;
        Ok(IpDataLookup { response, raw })
    }
}

#[derive(Default)]
pub struct MockIdentificationProvider {
    responses: Mutex<HashMap<String, Value>>,
    calls: Mutex<Vec<String>>,
}

impl MockIdentificationProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, ip: &str, body: Value) {
        self.responses.lock().unwrap().insert(ip.to_string(), body);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_for(&self, ip: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == ip).count()
    }
}

#[async_trait]
impl IdentificationProvider for MockIdentificationProvider {
    async fn find_company(&self, ip: &str) -> Result<CompanyLookup> {
        self.calls.lock().unwrap().push(ip.to_string());
        let raw = self
            .responses
            .lock()
            .unwrap()
            .get(ip)
            .cloned()
            .ok_or_else(|| anyhow!("Snitcher API error (502): bad gateway"))?;
        let response: CompanyResponse = serde_json::from_value(raw.clone())?;
        Ok(CompanyLookup { response, raw })
    }
}

// ---------------------------------------------------------------------------
// Graph directories
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockOrganizationDirectory {
    organizations: Mutex<HashMap<(String, String), OrganizationNode>>,
    lookups: AtomicU32,
    unavailable: AtomicBool,
}

impl MockOrganizationDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, tenant: &str, domain: &str, id: &str, name: &str) {
        self.organizations.lock().unwrap().insert(
            (tenant.to_string(), normalize_domain(domain)),
            OrganizationNode {
                id: id.to_string(),
                name: Some(name.to_string()),
            },
        );
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn lookup_count(&self) -> u32 {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrganizationDirectory for MockOrganizationDirectory {
    async fn get_by_domain(&self, tenant: &str, domain: &str) -> Result<Option<OrganizationNode>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            bail!("neo4j: connection reset");
        }
        Ok(self
            .organizations
            .lock()
            .unwrap()
            .get(&(tenant.to_string(), normalize_domain(domain)))
            .cloned())
    }
}

#[derive(Default)]
pub struct MockWorkspaceDirectory {
    domains: Mutex<HashMap<String, Vec<String>>>,
}

impl MockWorkspaceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, tenant: &str, domain: &str) {
        self.domains
            .lock()
            .unwrap()
            .entry(tenant.to_string())
            .or_default()
            .push(normalize_domain(domain));
    }
}

#[async_trait]
impl WorkspaceDirectory for MockWorkspaceDirectory {
    async fn get_domains(&self, tenant: &str) -> Result<Vec<String>> {
        Ok(self
            .domains
            .lock()
            .unwrap()
            .get(tenant)
            .cloned()
            .unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// MockOrganizationService
// ---------------------------------------------------------------------------

/// Hands out `org-1`, `org-2`, … and fails with queued errors first.
#[derive(Default)]
pub struct MockOrganizationService {
    requests: Mutex<Vec<UpsertOrganizationRequest>>,
    failures: Mutex<VecDeque<OrganizationServiceError>>,
    issued: AtomicU32,
}

impl MockOrganizationService {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next call fails with `error`. Queue several for several calls.
    pub fn fail_next(&self, error: OrganizationServiceError) {
        self.failures.lock().unwrap().push_back(error);
    }

    pub fn requests(&self) -> Vec<UpsertOrganizationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl OrganizationRpcClient for MockOrganizationService {
    async fn upsert_organization(
        &self,
        request: &UpsertOrganizationRequest,
    ) -> Result<String, OrganizationServiceError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("org-{n}"))
    }
}

// ---------------------------------------------------------------------------
// Slack
// ---------------------------------------------------------------------------

/// Channel subscriptions and bot tokens in one place.
#[derive(Default)]
pub struct MockSlack {
    channels: Mutex<Vec<SlackChannelSubscription>>,
    tokens: Mutex<HashMap<String, String>>,
}

impl MockSlack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `channel_id` to visitor alerts, created at `created_at`.
    pub fn add_channel(&self, tenant: &str, channel_id: &str, created_at: DateTime<Utc>) {
        self.channels.lock().unwrap().push(SlackChannelSubscription {
            tenant: tenant.to_string(),
            channel_id: channel_id.to_string(),
            workflow_tag: REVEAL_AI_WORKFLOW.to_string(),
            created_at,
        });
    }

    pub fn add_token(&self, tenant: &str, bot_token: &str) {
        self.tokens
            .lock()
            .unwrap()
            .insert(tenant.to_string(), bot_token.to_string());
    }
}

#[async_trait]
impl SlackSubscriptionStore for MockSlack {
    async fn get_channels(
        &self,
        tenant: &str,
        workflow_tag: &str,
    ) -> Result<Vec<SlackChannelSubscription>> {
        Ok(self
            .channels
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.tenant == tenant && c.workflow_tag == workflow_tag)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SlackCredentialStore for MockSlack {
    async fn get_credential(&self, tenant: &str) -> Result<Option<TenantSlackCredential>> {
        Ok(self
            .tokens
            .lock()
            .unwrap()
            .get(tenant)
            .map(|token| TenantSlackCredential {
                tenant: tenant.to_string(),
                bot_token: token.clone(),
            }))
    }
}

/// Records every post. Can simulate a transport outage, for every channel or
/// just some, or a Slack-level rejection.
#[derive(Default)]
pub struct MockSlackPoster {
    sent: Mutex<Vec<(String, SlackMessage)>>,
    offline: AtomicBool,
    unreachable: Mutex<HashSet<String>>,
    reject: AtomicBool,
}

impl MockSlackPoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Fail posts to `channel` at the transport level until cleared.
    pub fn set_channel_offline(&self, channel: &str, offline: bool) {
        let mut unreachable = self.unreachable.lock().unwrap();
        if offline {
            unreachable.insert(channel.to_string());
        } else {
            unreachable.remove(channel);
        }
    }

    /// Answer every post with `{"ok": false, "error": "channel_not_found"}`.
    pub fn set_reject(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    /// `(bot_token, message)` pairs in send order.
    pub fn sent(&self) -> Vec<(String, SlackMessage)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, channel: &str) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, m)| m.channel == channel)
            .count()
    }
}

#[async_trait]
impl SlackPoster for MockSlackPoster {
    async fn post_message(
        &self,
        bot_token: &str,
        message: &SlackMessage,
    ) -> Result<SlackPostOutcome> {
        if self.offline.load(Ordering::SeqCst)
            || self.unreachable.lock().unwrap().contains(&message.channel)
        {
            bail!("error sending request for url (https://slack.com/api/chat.postMessage)");
        }
        self.sent
            .lock()
            .unwrap()
            .push((bot_token.to_string(), message.clone()));
        if self.reject.load(Ordering::SeqCst) {
            return Ok(SlackPostOutcome {
                status: 200,
                ok: false,
                error: Some("channel_not_found".into()),
            });
        }
        Ok(SlackPostOutcome {
            status: 200,
            ok: true,
            error: None,
        })
    }
}

// ---------------------------------------------------------------------------
// MockWorld
// ---------------------------------------------------------------------------

/// Every mock, shared with the pipeline built from it so tests can arrange
/// state before a tick and inspect it after.
pub struct MockWorld {
    pub tracking: Arc<MockTrackingStore>,
    pub prefilter_cache: Arc<MockPrefilterCache>,
    pub identification_cache: Arc<MockIdentificationCache>,
    pub ipdata: Arc<MockPrefilterProvider>,
    pub snitcher: Arc<MockIdentificationProvider>,
    pub organizations: Arc<MockOrganizationDirectory>,
    pub workspaces: Arc<MockWorkspaceDirectory>,
    pub organization_service: Arc<MockOrganizationService>,
    pub slack: Arc<MockSlack>,
    pub slack_poster: Arc<MockSlackPoster>,
}

impl Default for MockWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl MockWorld {
    pub fn new() -> Self {
        Self {
            tracking: Arc::new(MockTrackingStore::new()),
            prefilter_cache: Arc::new(MockPrefilterCache::new()),
            identification_cache: Arc::new(MockIdentificationCache::new()),
            ipdata: Arc::new(MockPrefilterProvider::new()),
            snitcher: Arc::new(MockIdentificationProvider::new()),
            organizations: Arc::new(MockOrganizationDirectory::new()),
            workspaces: Arc::new(MockWorkspaceDirectory::new()),
            organization_service: Arc::new(MockOrganizationService::new()),
            slack: Arc::new(MockSlack::new()),
            slack_poster: Arc::new(MockSlackPoster::new()),
        }
    }

    pub fn deps(&self) -> RevealDeps {
        RevealDeps::builder()
            .tracking(self.tracking.clone())
            .prefilter_cache(self.prefilter_cache.clone())
            .identification_cache(self.identification_cache.clone())
            .prefilter_provider(self.ipdata.clone())
            .identification_provider(self.snitcher.clone())
            .organizations(self.organizations.clone())
            .workspaces(self.workspaces.clone())
            .organization_service(self.organization_service.clone())
            .slack_subscriptions(self.slack.clone())
            .slack_credentials(self.slack.clone())
            .slack_poster(self.slack_poster.clone())
            .app_url(TEST_APP_URL)
            .retry(RetryPolicy::immediate(3))
            .build()
    }

    pub fn pipeline(&self) -> RevealPipeline {
        RevealPipeline::new(self.deps())
    }

    /// A pipeline whose stages read `batch_limit` rows per page.
    pub fn pipeline_with_batch_limit(&self, batch_limit: i64) -> RevealPipeline {
        let mut deps = self.deps();
        deps.batch_limit = batch_limit;
        RevealPipeline::new(deps)
    }

    /// Insert a record and return its id.
    pub fn visit(&self, tenant: &str, ip: &str, state: TrackingState, age_secs: i64) -> Uuid {
        self.tracking.insert(tracking_record(tenant, ip, state, age_secs))
    }

    pub fn record(&self, id: Uuid) -> TrackingRecord {
        self.tracking
            .get(id)
            .unwrap_or_else(|| panic!("no tracking record {id}"))
    }
}
