// Per-IP response caches. Rows are insert-once; concurrent writers for the
// same IP converge on whichever row wins the primary key.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use reveal_common::{IdentificationCacheEntry, PrefilterCacheEntry};

#[derive(Clone)]
pub struct PgPrefilterCache {
    pool: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct PrefilterRow {
    ip: String,
    should_identify: Option<bool>,
    response: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl From<PrefilterRow> for PrefilterCacheEntry {
    fn from(row: PrefilterRow) -> Self {
        Self {
            ip: row.ip,
            should_identify: row.should_identify,
            response: row.response,
            created_at: row.created_at,
        }
    }
}

impl PgPrefilterCache {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_ip(&self, ip: &str) -> Result<Option<PrefilterCacheEntry>> {
        let row = sqlx::query_as::<_, PrefilterRow>(
            "SELECT ip, should_identify, response, created_at FROM prefilter_cache WHERE ip = $1",
        )
        .bind(ip)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    /// Insert unless a row for the IP already exists.
    pub async fn register(&self, entry: &PrefilterCacheEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO prefilter_cache (ip, should_identify, response, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (ip) DO NOTHING
            "#,
        )
        .bind(&entry.ip)
        .bind(entry.should_identify)
        .bind(&entry.response)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct PgIdentificationCache {
    pool: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct IdentificationRow {
    ip: String,
    company_name: Option<String>,
    company_domain: Option<String>,
    company_website: Option<String>,
    response: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl From<IdentificationRow> for IdentificationCacheEntry {
    fn from(row: IdentificationRow) -> Self {
        Self {
            ip: row.ip,
            company_name: row.company_name,
            company_domain: row.company_domain,
            company_website: row.company_website,
            response: row.response,
            created_at: row.created_at,
        }
    }
}

impl PgIdentificationCache {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_ip(&self, ip: &str) -> Result<Option<IdentificationCacheEntry>> {
        let row = sqlx::query_as::<_, IdentificationRow>(
            r#"
            SELECT ip, company_name, company_domain, company_website, response, created_at
            FROM identification_cache
            WHERE ip = $1
            "#,
        )
        .bind(ip)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    pub async fn register(&self, entry: &IdentificationCacheEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO identification_cache
                (ip, company_name, company_domain, company_website, response, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (ip) DO NOTHING
            "#,
        )
        .bind(&entry.ip)
        .bind(&entry.company_name)
        .bind(&entry.company_domain)
        .bind(&entry.company_website)
        .bind(&entry.response)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
