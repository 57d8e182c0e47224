use anyhow::{Context, Result};

/// Cron schedules (seconds resolution) for the four pipeline jobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub prefilter: String,
    pub identify: String,
    pub resolve_organizations: String,
    pub notify_slack: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            prefilter: "*/30 * * * * *".to_string(),
            identify: "*/30 * * * * *".to_string(),
            resolve_organizations: "0 * * * * *".to_string(),
            notify_slack: "0 * * * * *".to_string(),
        }
    }
}

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Stores
    pub database_url: String,
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,

    // Enrichment providers
    pub ipdata_api_url: String,
    pub ipdata_api_key: String,
    pub snitcher_api_url: String,
    pub snitcher_api_key: String,

    // Organization service
    pub organization_api_url: String,
    pub organization_api_key: String,

    // Slack
    pub slack_api_url: String,
    pub app_url: String,

    pub schedules: ScheduleConfig,
    pub batch_limit: i64,
}

pub const DEFAULT_SLACK_API_URL: &str = "https://slack.com/api";
pub const DEFAULT_BATCH_LIMIT: i64 = 100;

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. `from_env` is this over the process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .filter(|v| !v.is_empty())
                .with_context(|| format!("{key} environment variable is required"))
        };
        let optional = |key: &str, default: &str| -> String {
            lookup(key)
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let defaults = ScheduleConfig::default();
        let schedules = ScheduleConfig {
            prefilter: optional("CRON_SCHEDULE_PREFILTER", &defaults.prefilter),
            identify: optional("CRON_SCHEDULE_IDENTIFY", &defaults.identify),
            resolve_organizations: optional(
                "CRON_SCHEDULE_RESOLVE_ORGANIZATIONS",
                &defaults.resolve_organizations,
            ),
            notify_slack: optional("CRON_SCHEDULE_NOTIFY_SLACK", &defaults.notify_slack),
        };

        let batch_limit = match lookup("BATCH_LIMIT").filter(|v| !v.is_empty()) {
            Some(raw) => raw
                .parse::<i64>()
                .ok()
                .filter(|n| *n > 0)
                .with_context(|| format!("BATCH_LIMIT must be a positive integer, got {raw:?}"))?,
            None => DEFAULT_BATCH_LIMIT,
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            neo4j_uri: required("NEO4J_URI")?,
            neo4j_user: required("NEO4J_USER")?,
            neo4j_password: required("NEO4J_PASSWORD")?,
            ipdata_api_url: required("IPDATA_API_URL")?,
            ipdata_api_key: required("IPDATA_API_KEY")?,
            snitcher_api_url: required("SNITCHER_API_URL")?,
            snitcher_api_key: required("SNITCHER_API_KEY")?,
            organization_api_url: required("ORGANIZATION_API_URL")?,
            organization_api_key: required("ORGANIZATION_API_KEY")?,
            slack_api_url: optional("SLACK_API_URL", DEFAULT_SLACK_API_URL),
            app_url: required("APP_URL")?,
            schedules,
            batch_limit,
        })
    }

    /// Log the loaded config with secrets cut down to a short prefix.
    pub fn log_redacted(&self) {
        fn preview(val: &str) -> String {
            let head: String = val.chars().take(5).collect();
            format!("{}...({} chars)", head, val.len())
        }

        tracing::info!("Config loaded:");
        tracing::info!("  NEO4J_URI: {}", self.neo4j_uri);
        tracing::info!("  NEO4J_PASSWORD: {}", preview(&self.neo4j_password));
        tracing::info!("  IPDATA_API_URL: {}", self.ipdata_api_url);
        tracing::info!("  IPDATA_API_KEY: {}", preview(&self.ipdata_api_key));
        tracing::info!("  SNITCHER_API_URL: {}", self.snitcher_api_url);
        tracing::info!("  SNITCHER_API_KEY: {}", preview(&self.snitcher_api_key));
        tracing::info!("  ORGANIZATION_API_URL: {}", self.organization_api_url);
        tracing::info!("  ORGANIZATION_API_KEY: {}", preview(&self.organization_api_key));
        tracing::info!("  SLACK_API_URL: {}", self.slack_api_url);
        tracing::info!("  APP_URL: {}", self.app_url);
        tracing::info!("  BATCH_LIMIT: {}", self.batch_limit);
        tracing::info!("  Schedules: {:?}", self.schedules);
    }
}
