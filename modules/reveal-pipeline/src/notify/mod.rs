pub mod message;
pub mod slack;

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use reveal_common::{
    non_empty, normalize_domain, PageCursor, RevealError, TrackingRecord, REVEAL_AI_WORKFLOW,
};
use snitcher_client::CompanyResponse;

use crate::traits::{
    IdentificationCache, SlackCredentialStore, SlackPoster, SlackSubscriptionStore, TrackingStore,
    WorkspaceDirectory,
};
use crate::types::NotifyStats;
use message::VisitorAlert;

/// What happened to one pending record.
#[derive(Debug, PartialEq)]
pub enum Delivery {
    /// Posted to this many channels and marked notified.
    Sent(u32),
    /// Marked notified without posting.
    Suppressed(Suppression),
    /// Already notified or lost its organization since selection.
    Stale,
    /// Data gap; stays pending.
    Skipped(RevealError),
    /// Tenant has channels but no bot token; stays pending.
    MissingCredential,
    /// Transport or directory failure; stays pending for the next tick.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suppression {
    /// The visitor's organization is the tenant itself.
    SelfVisit,
    /// Every subscribed channel was created after the visit.
    ChannelCutoff,
    /// No channel subscribes to visitor alerts.
    NoChannels,
}

/// Sends one Slack alert per newly resolved visitor, per subscribed channel.
pub struct NotificationDispatcher {
    tracking: Arc<dyn TrackingStore>,
    identification_cache: Arc<dyn IdentificationCache>,
    workspaces: Arc<dyn WorkspaceDirectory>,
    subscriptions: Arc<dyn SlackSubscriptionStore>,
    credentials: Arc<dyn SlackCredentialStore>,
    poster: Arc<dyn SlackPoster>,
    app_url: String,
    batch_limit: i64,
}

impl NotificationDispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tracking: Arc<dyn TrackingStore>,
        identification_cache: Arc<dyn IdentificationCache>,
        workspaces: Arc<dyn WorkspaceDirectory>,
        subscriptions: Arc<dyn SlackSubscriptionStore>,
        credentials: Arc<dyn SlackCredentialStore>,
        poster: Arc<dyn SlackPoster>,
        app_url: String,
        batch_limit: i64,
    ) -> Self {
        Self {
            tracking,
            identification_cache,
            workspaces,
            subscriptions,
            credentials,
            poster,
            app_url,
            batch_limit,
        }
    }

    pub async fn run(&self) -> Result<NotifyStats> {
        let mut stats = NotifyStats::default();
        let mut after = None;
        loop {
            let page = self
                .tracking
                .get_pending_notification(after, self.batch_limit)
                .await?;
            let Some(last) = page.last() else { break };
            after = Some(PageCursor::of(last));
            let exhausted = (page.len() as i64) < self.batch_limit;

            for record in page {
                stats.examined += 1;
                match self.dispatch(&record).await? {
                    Delivery::Sent(n) => {
                        stats.notified += 1;
                        stats.messages_sent += n;
                    }
                    Delivery::Suppressed(_) => stats.suppressed += 1,
                    Delivery::Stale | Delivery::MissingCredential => stats.skipped += 1,
                    Delivery::Skipped(reason) => {
                        warn!(id = %record.id, tenant = %record.tenant, reason = %reason, "Notification skipped");
                        stats.skipped += 1;
                    }
                    Delivery::Failed => stats.failed += 1,
                }
            }

            if exhausted {
                break;
            }
        }

        info!(%stats, "Slack notification pass complete");
        Ok(stats)
    }

    pub async fn dispatch(&self, pending: &TrackingRecord) -> Result<Delivery> {
        let Some(record) = self.tracking.get_by_id(pending.id).await? else {
            return Ok(Delivery::Stale);
        };
        let Some(organization_id) = non_empty(&record.organization_id).map(str::to_string) else {
            debug!(id = %record.id, "No organization on record, skipping");
            return Ok(Delivery::Stale);
        };
        if record.notified {
            debug!(id = %record.id, "Already notified");
            return Ok(Delivery::Stale);
        }

        let Some(entry) = self.identification_cache.get_by_ip(&record.ip).await? else {
            return Ok(Delivery::Skipped(RevealError::MissingCacheEntry {
                cache: "identification",
                ip: record.ip.clone(),
            }));
        };
        let company: CompanyResponse = match serde_json::from_value(entry.response.clone()) {
            Ok(company) => company,
            Err(e) => {
                return Ok(Delivery::Skipped(RevealError::InvalidPayload {
                    cache: "identification",
                    ip: record.ip.clone(),
                    message: e.to_string(),
                }))
            }
        };

        let visitor_domain = non_empty(&record.organization_domain)
            .or_else(|| entry.domain())
            .map(normalize_domain);
        if let Some(domain) = visitor_domain.filter(|d| !d.is_empty()) {
            let own_domains = match self.workspaces.get_domains(&record.tenant).await {
                Ok(domains) => domains,
                Err(e) => {
                    warn!(id = %record.id, tenant = %record.tenant, error = %e, "Workspace lookup failed");
                    return Ok(Delivery::Failed);
                }
            };
            if own_domains.iter().any(|own| normalize_domain(own) == domain) {
                info!(id = %record.id, tenant = %record.tenant, domain = %domain, "Tenant visiting its own site, not notifying");
                return self.suppress(&record, Suppression::SelfVisit).await;
            }
        }

        let channels = self
            .subscriptions
            .get_channels(&record.tenant, REVEAL_AI_WORKFLOW)
            .await?;
        if channels.is_empty() {
            return self.suppress(&record, Suppression::NoChannels).await;
        }

        // Channels subscribed after the visit never get a backfilled alert.
        let (eligible, cut_off): (Vec<_>, Vec<_>) = channels
            .into_iter()
            .partition(|c| c.created_at <= record.created_at);
        for channel in &cut_off {
            debug!(id = %record.id, channel = %channel.channel_id, "Channel created after visit, not notifying");
        }
        if eligible.is_empty() {
            return self.suppress(&record, Suppression::ChannelCutoff).await;
        }

        let Some(credential) = self.credentials.get_credential(&record.tenant).await? else {
            warn!(tenant = %record.tenant, "No Slack bot token for tenant, leaving notification pending");
            return Ok(Delivery::MissingCredential);
        };

        let alert = VisitorAlert::new(&record, &organization_id, &company, &self.app_url);
        let mut sent = 0;
        for channel in &eligible {
            let message = alert.message(&channel.channel_id);
            match self.poster.post_message(&credential.bot_token, &message).await {
                // Rejections are logged by the poster and still count as delivered.
                Ok(_) => sent += 1,
                Err(e) => {
                    warn!(id = %record.id, channel = %channel.channel_id, error = %e, "Slack post failed, will retry next tick");
                    return Ok(Delivery::Failed);
                }
            }
        }

        self.tracking.mark_notified(record.id).await?;
        info!(
            id = %record.id,
            tenant = %record.tenant,
            organization_id = %organization_id,
            channels = sent,
            "Visitor alert sent"
        );
        Ok(Delivery::Sent(sent))
    }

    async fn suppress(&self, record: &TrackingRecord, reason: Suppression) -> Result<Delivery> {
        self.tracking.mark_notified(record.id).await?;
        debug!(id = %record.id, ?reason, "Marked notified without sending");
        Ok(Delivery::Suppressed(reason))
    }
}
