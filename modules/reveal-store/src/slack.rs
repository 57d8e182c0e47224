use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use reveal_common::{SlackChannelSubscription, TenantSlackCredential};

/// Tenant Slack channel subscriptions and bot tokens.
#[derive(Clone)]
pub struct PgSlackStore {
    pool: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    tenant: String,
    channel_id: String,
    workflow_tag: String,
    created_at: DateTime<Utc>,
}

impl PgSlackStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_channels(
        &self,
        tenant: &str,
        workflow_tag: &str,
    ) -> Result<Vec<SlackChannelSubscription>> {
        let rows = sqlx::query_as::<_, SubscriptionRow>(
            r#"
            SELECT tenant, channel_id, workflow_tag, created_at
            FROM slack_channel_subscriptions
            WHERE tenant = $1 AND workflow_tag = $2
            ORDER BY created_at ASC
            "#,
        )
        .bind(tenant)
        .bind(workflow_tag)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| SlackChannelSubscription {
                tenant: r.tenant,
                channel_id: r.channel_id,
                workflow_tag: r.workflow_tag,
                created_at: r.created_at,
            })
            .collect())
    }

    pub async fn add_channel(&self, subscription: &SlackChannelSubscription) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO slack_channel_subscriptions (tenant, channel_id, workflow_tag, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (tenant, channel_id, workflow_tag) DO NOTHING
            "#,
        )
        .bind(&subscription.tenant)
        .bind(&subscription.channel_id)
        .bind(&subscription.workflow_tag)
        .bind(subscription.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_credential(&self, tenant: &str) -> Result<Option<TenantSlackCredential>> {
        let row = sqlx::query_as::<_, (String, String)>(
            "SELECT tenant, bot_token FROM tenant_slack_credentials WHERE tenant = $1",
        )
        .bind(tenant)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(tenant, bot_token)| TenantSlackCredential { tenant, bot_token }))
    }

    pub async fn upsert_credential(&self, credential: &TenantSlackCredential) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tenant_slack_credentials (tenant, bot_token)
            VALUES ($1, $2)
            ON CONFLICT (tenant) DO UPDATE SET bot_token = EXCLUDED.bot_token
            "#,
        )
        .bind(&credential.tenant)
        .bind(&credential.bot_token)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
