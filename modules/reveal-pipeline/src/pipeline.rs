use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use clap::ValueEnum;
use sqlx::PgPool;
use typed_builder::TypedBuilder;

use ipdata_client::IpDataClient;
use reveal_common::{Config, ScheduleConfig};
use reveal_graph::{GraphClient, OrganizationReader, WorkspaceReader};
use reveal_store::{PgIdentificationCache, PgPrefilterCache, PgSlackStore, PgTrackingStore};
use snitcher_client::SnitcherClient;

use crate::gateway::{IdentificationGateway, PrefilterGateway};
use crate::identification::IdentificationStage;
use crate::notify::slack::SlackWebApi;
use crate::notify::NotificationDispatcher;
use crate::organization_client::OrganizationServiceClient;
use crate::prefilter::PrefilterStage;
use crate::resolver::OrganizationResolver;
use crate::retry::RetryPolicy;
use crate::scheduler::{Job, JobScheduler};
use crate::traits::{
    IdentificationCache, IdentificationProvider, OrganizationDirectory, OrganizationRpcClient,
    PrefilterCache, PrefilterProvider, SlackCredentialStore, SlackPoster, SlackSubscriptionStore,
    TrackingStore, WorkspaceDirectory,
};

/// Long-lived collaborators shared by every stage.
#[derive(Clone, TypedBuilder)]
pub struct RevealDeps {
    pub tracking: Arc<dyn TrackingStore>,
    pub prefilter_cache: Arc<dyn PrefilterCache>,
    pub identification_cache: Arc<dyn IdentificationCache>,
    pub prefilter_provider: Arc<dyn PrefilterProvider>,
    pub identification_provider: Arc<dyn IdentificationProvider>,
    pub organizations: Arc<dyn OrganizationDirectory>,
    pub workspaces: Arc<dyn WorkspaceDirectory>,
    pub organization_service: Arc<dyn OrganizationRpcClient>,
    pub slack_subscriptions: Arc<dyn SlackSubscriptionStore>,
    pub slack_credentials: Arc<dyn SlackCredentialStore>,
    pub slack_poster: Arc<dyn SlackPoster>,
    #[builder(setter(into))]
    pub app_url: String,
    #[builder(default = reveal_common::config::DEFAULT_BATCH_LIMIT)]
    pub batch_limit: i64,
    #[builder(default)]
    pub retry: RetryPolicy,
}

impl RevealDeps {
    /// Production wiring over Postgres, Neo4j and the real HTTP clients.
    pub fn from_config(config: &Config, pool: PgPool, graph: GraphClient) -> Result<Self> {
        let slack_store = Arc::new(PgSlackStore::new(pool.clone()));

        Ok(Self::builder()
            .tracking(Arc::new(PgTrackingStore::new(pool.clone())))
            .prefilter_cache(Arc::new(PgPrefilterCache::new(pool.clone())))
            .identification_cache(Arc::new(PgIdentificationCache::new(pool)))
            .prefilter_provider(Arc::new(IpDataClient::new(
                &config.ipdata_api_url,
                config.ipdata_api_key.clone(),
            )?))
            .identification_provider(Arc::new(SnitcherClient::new(
                &config.snitcher_api_url,
                config.snitcher_api_key.clone(),
            )?))
            .organizations(Arc::new(OrganizationReader::new(graph.clone())))
            .workspaces(Arc::new(WorkspaceReader::new(graph)))
            .organization_service(Arc::new(OrganizationServiceClient::new(
                &config.organization_api_url,
                config.organization_api_key.clone(),
            )?))
            .slack_subscriptions(slack_store.clone())
            .slack_credentials(slack_store)
            .slack_poster(Arc::new(SlackWebApi::new(&config.slack_api_url)?))
            .app_url(config.app_url.clone())
            .batch_limit(config.batch_limit)
            .build())
    }
}

/// The four cron jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum JobKind {
    Prefilter,
    Identify,
    ResolveOrganizations,
    NotifySlack,
}

impl JobKind {
    pub const ALL: [JobKind; 4] = [
        JobKind::Prefilter,
        JobKind::Identify,
        JobKind::ResolveOrganizations,
        JobKind::NotifySlack,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prefilter => "prefilter",
            Self::Identify => "identify",
            Self::ResolveOrganizations => "resolve-organizations",
            Self::NotifySlack => "notify-slack",
        }
    }

    pub fn schedule<'a>(&self, schedules: &'a ScheduleConfig) -> &'a str {
        match self {
            Self::Prefilter => &schedules.prefilter,
            Self::Identify => &schedules.identify,
            Self::ResolveOrganizations => &schedules.resolve_organizations,
            Self::NotifySlack => &schedules.notify_slack,
        }
    }
}

/// All stages, built once from `RevealDeps`.
pub struct RevealPipeline {
    prefilter: PrefilterStage,
    identification: IdentificationStage,
    resolver: OrganizationResolver,
    dispatcher: NotificationDispatcher,
}

impl RevealPipeline {
    pub fn new(deps: RevealDeps) -> Self {
        let prefilter = PrefilterStage::new(
            deps.tracking.clone(),
            PrefilterGateway::new(deps.prefilter_cache.clone(), deps.prefilter_provider.clone()),
            deps.batch_limit,
        );
        let identification = IdentificationStage::new(
            deps.tracking.clone(),
            IdentificationGateway::new(
                deps.identification_cache.clone(),
                deps.identification_provider.clone(),
            ),
            deps.batch_limit,
        );
        let resolver = OrganizationResolver::new(
            deps.tracking.clone(),
            deps.identification_cache.clone(),
            deps.organizations.clone(),
            deps.organization_service.clone(),
            deps.retry,
            deps.batch_limit,
        );
        let dispatcher = NotificationDispatcher::new(
            deps.tracking,
            deps.identification_cache,
            deps.workspaces,
            deps.slack_subscriptions,
            deps.slack_credentials,
            deps.slack_poster,
            deps.app_url,
            deps.batch_limit,
        );

        Self {
            prefilter,
            identification,
            resolver,
            dispatcher,
        }
    }

    pub fn prefilter(&self) -> &PrefilterStage {
        &self.prefilter
    }

    pub fn identification(&self) -> &IdentificationStage {
        &self.identification
    }

    pub fn resolver(&self) -> &OrganizationResolver {
        &self.resolver
    }

    pub fn dispatcher(&self) -> &NotificationDispatcher {
        &self.dispatcher
    }

    /// Run one pass of a single stage. Stats are logged by the stage.
    pub async fn run_job(&self, kind: JobKind) -> Result<()> {
        match kind {
            JobKind::Prefilter => self.prefilter.run().await.map(|_| ()),
            JobKind::Identify => self.identification.run().await.map(|_| ()),
            JobKind::ResolveOrganizations => self.resolver.run().await.map(|_| ()),
            JobKind::NotifySlack => self.dispatcher.run().await.map(|_| ()),
        }
    }
}

/// Adapts one pipeline stage to the scheduler.
pub struct StageJob {
    kind: JobKind,
    pipeline: Arc<RevealPipeline>,
}

impl StageJob {
    pub fn new(kind: JobKind, pipeline: Arc<RevealPipeline>) -> Self {
        Self { kind, pipeline }
    }
}

#[async_trait]
impl Job for StageJob {
    fn name(&self) -> &str {
        self.kind.as_str()
    }

    async fn run(&self) -> Result<()> {
        self.pipeline.run_job(self.kind).await
    }
}

/// A scheduler with every stage registered on its configured cron expression.
pub fn build_scheduler(
    pipeline: Arc<RevealPipeline>,
    schedules: &ScheduleConfig,
) -> Result<JobScheduler> {
    let mut scheduler = JobScheduler::new();
    for kind in JobKind::ALL {
        scheduler.register(
            Arc::new(StageJob::new(kind, pipeline.clone())),
            kind.schedule(schedules),
        )?;
    }
    Ok(scheduler)
}
