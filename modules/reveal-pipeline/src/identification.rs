use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use reveal_common::{is_valid_ip, PageCursor, RevealError, TrackingState};

use crate::gateway::{GatewayError, IdentificationGateway};
use crate::traits::TrackingStore;
use crate::types::StageStats;

/// PREFILTER_PASS → IDENTIFIED | NOT_IDENTIFIED. A visitor counts as
/// identified when the company lookup produced a non-empty domain.
pub struct IdentificationStage {
    tracking: Arc<dyn TrackingStore>,
    gateway: IdentificationGateway,
    batch_limit: i64,
}

impl IdentificationStage {
    pub fn new(
        tracking: Arc<dyn TrackingStore>,
        gateway: IdentificationGateway,
        batch_limit: i64,
    ) -> Self {
        Self {
            tracking,
            gateway,
            batch_limit,
        }
    }

    pub async fn run(&self) -> Result<StageStats> {
        let mut stats = StageStats::default();
        let mut failed_ips: HashSet<String> = HashSet::new();

        let mut after = None;
        loop {
            let page = self
                .tracking
                .get_by_state(&[TrackingState::PrefilterPass], after, self.batch_limit)
                .await?;
            let Some(last) = page.last() else { break };
            after = Some(PageCursor::of(last));
            let exhausted = (page.len() as i64) < self.batch_limit;

            for record in page {
                stats.examined += 1;

                if !is_valid_ip(&record.ip) {
                    warn!(id = %record.id, error = %RevealError::InvalidIp(record.ip.clone()), "Moving record to ERROR");
                    if self
                        .tracking
                        .set_state(record.id, TrackingState::PrefilterPass, TrackingState::Error)
                        .await?
                    {
                        stats.errored += 1;
                    } else {
                        stats.skipped += 1;
                    }
                    continue;
                }

                if failed_ips.contains(&record.ip) {
                    stats.failed += 1;
                    continue;
                }

                let entry = match self.gateway.resolve(&record.ip).await {
                    Ok(entry) => entry,
                    Err(e @ GatewayError::Provider { .. }) => {
                        warn!(id = %record.id, ip = %record.ip, error = %e, "Company lookup failed, will retry next tick");
                        failed_ips.insert(record.ip.clone());
                        stats.failed += 1;
                        continue;
                    }
                    Err(GatewayError::Store(e)) => return Err(e),
                };

                let next = if entry.is_identified() {
                    TrackingState::Identified
                } else {
                    TrackingState::NotIdentified
                };

                if self
                    .tracking
                    .set_state(record.id, TrackingState::PrefilterPass, next)
                    .await?
                {
                    debug!(
                        id = %record.id,
                        ip = %record.ip,
                        state = %next,
                        domain = entry.domain().unwrap_or(""),
                        "Identification complete"
                    );
                    stats.advanced += 1;
                } else {
                    debug!(id = %record.id, "Record left PREFILTER_PASS concurrently, skipping");
                    stats.skipped += 1;
                }
            }

            if exhausted {
                break;
            }
        }

        info!(%stats, "Identification stage complete");
        Ok(stats)
    }
}
