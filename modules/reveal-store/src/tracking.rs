use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use reveal_common::{OrganizationRef, PageCursor, TrackingRecord, TrackingState};

/// Postgres access to the `tracking` table.
#[derive(Clone)]
pub struct PgTrackingStore {
    pool: PgPool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct TrackingRow {
    id: Uuid,
    tenant: String,
    user_id: Option<String>,
    ip: String,
    href: Option<String>,
    origin: Option<String>,
    referrer: Option<String>,
    user_agent: Option<String>,
    language: Option<String>,
    cookies_enabled: Option<bool>,
    screen_resolution: Option<String>,
    timestamp: Option<i64>,
    state: String,
    organization_id: Option<String>,
    organization_name: Option<String>,
    organization_domain: Option<String>,
    organization_website: Option<String>,
    notified: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<TrackingRow> for TrackingRecord {
    type Error = anyhow::Error;

    fn try_from(row: TrackingRow) -> Result<Self> {
        let state = row
            .state
            .parse::<TrackingState>()
            .with_context(|| format!("tracking row {}", row.id))?;
        Ok(TrackingRecord {
            id: row.id,
            tenant: row.tenant,
            user_id: row.user_id,
            ip: row.ip,
            href: row.href,
            origin: row.origin,
            referrer: row.referrer,
            user_agent: row.user_agent,
            language: row.language,
            cookies_enabled: row.cookies_enabled,
            screen_resolution: row.screen_resolution,
            timestamp: row.timestamp,
            state,
            organization_id: row.organization_id,
            organization_name: row.organization_name,
            organization_domain: row.organization_domain,
            organization_website: row.organization_website,
            notified: row.notified,
            created_at: row.created_at,
        })
    }
}

fn into_records(rows: Vec<TrackingRow>) -> Result<Vec<TrackingRecord>> {
    rows.into_iter().map(TrackingRecord::try_from).collect()
}

impl PgTrackingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Write a tracking row. Used by the ingestion path and tests.
    pub async fn insert(&self, record: &TrackingRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tracking
                (id, tenant, user_id, ip, href, origin, referrer, user_agent,
                 language, cookies_enabled, screen_resolution, timestamp, state,
                 organization_id, organization_name, organization_domain,
                 organization_website, notified, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                    $14, $15, $16, $17, $18, $19)
            "#,
        )
        .bind(record.id)
        .bind(&record.tenant)
        .bind(&record.user_id)
        .bind(&record.ip)
        .bind(&record.href)
        .bind(&record.origin)
        .bind(&record.referrer)
        .bind(&record.user_agent)
        .bind(&record.language)
        .bind(record.cookies_enabled)
        .bind(&record.screen_resolution)
        .bind(record.timestamp)
        .bind(record.state.as_str())
        .bind(&record.organization_id)
        .bind(&record.organization_name)
        .bind(&record.organization_domain)
        .bind(&record.organization_website)
        .bind(record.notified)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// One page of rows in any of `states`, in `(created_at, id)` order,
    /// starting after `after`.
    pub async fn get_by_state(
        &self,
        states: &[TrackingState],
        after: Option<PageCursor>,
        limit: i64,
    ) -> Result<Vec<TrackingRecord>> {
        let states: Vec<String> = states.iter().map(|s| s.as_str().to_string()).collect();
        let rows = sqlx::query_as::<_, TrackingRow>(
            r#"
            SELECT * FROM tracking
            WHERE state = ANY($1)
              AND ($2::timestamptz IS NULL OR (created_at, id) > ($2::timestamptz, $3::uuid))
            ORDER BY created_at ASC, id ASC
            LIMIT $4
            "#,
        )
        .bind(&states)
        .bind(after.map(|c| c.created_at))
        .bind(after.map(|c| c.id))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        into_records(rows)
    }

    /// One page of representatives: the earliest IDENTIFIED row per (tenant, ip).
    pub async fn get_identified_representatives(
        &self,
        after: Option<PageCursor>,
        limit: i64,
    ) -> Result<Vec<TrackingRecord>> {
        let rows = sqlx::query_as::<_, TrackingRow>(
            r#"
            SELECT * FROM (
                SELECT DISTINCT ON (tenant, ip) *
                FROM tracking
                WHERE state = 'IDENTIFIED'
                ORDER BY tenant, ip, created_at ASC, id ASC
            ) reps
            WHERE $1::timestamptz IS NULL OR (created_at, id) > ($1::timestamptz, $2::uuid)
            ORDER BY created_at ASC, id ASC
            LIMIT $3
            "#,
        )
        .bind(after.map(|c| c.created_at))
        .bind(after.map(|c| c.id))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        into_records(rows)
    }

    pub async fn get_pending_notification(
        &self,
        after: Option<PageCursor>,
        limit: i64,
    ) -> Result<Vec<TrackingRecord>> {
        let rows = sqlx::query_as::<_, TrackingRow>(
            r#"
            SELECT * FROM tracking
            WHERE notified = FALSE
              AND organization_id IS NOT NULL
              AND ($1::timestamptz IS NULL OR (created_at, id) > ($1::timestamptz, $2::uuid))
            ORDER BY created_at ASC, id ASC
            LIMIT $3
            "#,
        )
        .bind(after.map(|c| c.created_at))
        .bind(after.map(|c| c.id))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        into_records(rows)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<TrackingRecord>> {
        let row = sqlx::query_as::<_, TrackingRow>("SELECT * FROM tracking WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(TrackingRecord::try_from).transpose()
    }

    /// Compare-and-set on `state`. Returns false when the row was not in `from`.
    /// A backward move is rejected before touching the row.
    pub async fn set_state(&self, id: Uuid, from: TrackingState, to: TrackingState) -> Result<bool> {
        from.ensure_can_advance_to(to)?;
        let result = sqlx::query("UPDATE tracking SET state = $3 WHERE id = $1 AND state = $2")
            .bind(id)
            .bind(from.as_str())
            .bind(to.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_organization_created(&self, id: Uuid, org: &OrganizationRef) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE tracking
            SET state = 'ORGANIZATION_CREATED',
                organization_id = $2,
                organization_name = $3,
                organization_domain = $4,
                organization_website = $5
            WHERE id = $1
              AND state = 'IDENTIFIED'
              AND organization_id IS NULL
            "#,
        )
        .bind(id)
        .bind(&org.id)
        .bind(&org.name)
        .bind(&org.domain)
        .bind(&org.website)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Attach `org` to every open row for (tenant, ip). Returns rows touched.
    pub async fn mark_all_with_organization(
        &self,
        tenant: &str,
        ip: &str,
        state: TrackingState,
        org: &OrganizationRef,
    ) -> Result<u64> {
        self.mark_matching(None, tenant, ip, state, org).await
    }

    /// Same as `mark_all_with_organization` but leaves row `id` alone.
    pub async fn mark_all_excluding_id(
        &self,
        id: Uuid,
        tenant: &str,
        ip: &str,
        state: TrackingState,
        org: &OrganizationRef,
    ) -> Result<u64> {
        self.mark_matching(Some(id), tenant, ip, state, org).await
    }

    async fn mark_matching(
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
            open.push(from.as_str().to_string());
        }
        let result = sqlx::query(
            r#"
            UPDATE tracking
            SET state = $4,
                organization_id = $5,
                organization_name = $6,
                organization_domain = $7,
                organization_website = $8
            WHERE tenant = $1
              AND ip = $2
              AND ($3::uuid IS NULL OR id <> $3)
              AND organization_id IS NULL
              AND state = ANY($9)
            "#,
        )
        .bind(tenant)
        .bind(ip)
        .bind(exclude)
        .bind(state.as_str())
        .bind(&org.id)
        .bind(&org.name)
        .bind(&org.domain)
        .bind(&org.website)
        .bind(&open)
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            tenant,
            ip,
            state = %state,
            organization_id = %org.id,
            rows = result.rows_affected(),
            "Bulk organization mark"
        );
        Ok(result.rows_affected())
    }

    /// Organization already attached to some row of the same tenant and IP.
    pub async fn find_organization_for_ip(
        &self,
        tenant: &str,
        ip: &str,
    ) -> Result<Option<OrganizationRef>> {
        let row = sqlx::query_as::<_, (String, Option<String>, Option<String>, Option<String>)>(
            r#"
            SELECT organization_id, organization_name, organization_domain, organization_website
            FROM tracking
            WHERE tenant = $1 AND ip = $2 AND organization_id IS NOT NULL
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .bind(tenant)
        .bind(ip)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, name, domain, website)| OrganizationRef {
            id,
            name,
            domain,
            website,
        }))
    }

    /// Flip `notified` to true. Returns false if it already was.
    pub async fn mark_notified(&self, id: Uuid) -> Result<bool> {
        let result =
            sqlx::query("UPDATE tracking SET notified = TRUE WHERE id = $1 AND notified = FALSE")
                .bind(id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}
