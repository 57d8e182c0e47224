use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RevealError;

/// Workflow tag that scopes Slack channel subscriptions to visitor alerts.
pub const REVEAL_AI_WORKFLOW: &str = "REVEAL-AI";

/// Lead source recorded on organizations created from website visits.
pub const REVEAL_AI_LEAD_SOURCE: &str = "Reveal AI";

// --- Tracking state machine ---

/// Position of a tracking record in the enrichment pipeline.
///
/// ```text
/// NEW ─┬─> PREFILTER_PASS ─┬─> IDENTIFIED ─┬─> ORGANIZATION_CREATED
///      └─> PREFILTER_FAIL  └─> NOT_IDENTIFIED └─> ORGANIZATION_EXISTS
/// ```
/// Any state may move to `ERROR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackingState {
    New,
    PrefilterPass,
    PrefilterFail,
    Identified,
    NotIdentified,
    OrganizationCreated,
    OrganizationExists,
    Error,
}

impl TrackingState {
    pub const ALL: [TrackingState; 8] = [
        Self::New,
        Self::PrefilterPass,
        Self::PrefilterFail,
        Self::Identified,
        Self::NotIdentified,
        Self::OrganizationCreated,
        Self::OrganizationExists,
        Self::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::PrefilterPass => "PREFILTER_PASS",
            Self::PrefilterFail => "PREFILTER_FAIL",
            Self::Identified => "IDENTIFIED",
            Self::NotIdentified => "NOT_IDENTIFIED",
            Self::OrganizationCreated => "ORGANIZATION_CREATED",
            Self::OrganizationExists => "ORGANIZATION_EXISTS",
            Self::Error => "ERROR",
        }
    }

    /// No stage picks the record up again once it is here.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::PrefilterFail
                | Self::NotIdentified
                | Self::OrganizationCreated
                | Self::OrganizationExists
                | Self::Error
        )
    }

    /// Whether `next` is a legal move from `self`. Skipping ahead along the
    /// happy path is allowed (bulk organization marks do that), going back is not.
    pub fn can_advance_to(&self, next: TrackingState) -> bool {
        if next == Self::Error {
            return *self != Self::Error;
        }
        match self {
            Self::New => next != Self::New,
            Self::PrefilterPass => matches!(
                next,
                Self::Identified
                    | Self::NotIdentified
                    | Self::OrganizationCreated
                    | Self::OrganizationExists
            ),
            Self::Identified => matches!(
                next,
                Self::OrganizationCreated | Self::OrganizationExists
            ),
            _ => false,
        }
    }

    /// `can_advance_to` as a `Result`, for stores guarding their writes.
    pub fn ensure_can_advance_to(&self, next: TrackingState) -> Result<(), RevealError> {
        if self.can_advance_to(next) {
            Ok(())
        } else {
            Err(RevealError::IllegalTransition {
                from: *self,
                to: next,
            })
        }
    }

    /// States a stage may still move a record out of.
    pub fn open() -> impl Iterator<Item = TrackingState> {
        Self::ALL.into_iter().filter(|s| !s.is_terminal())
    }
}

impl fmt::Display for TrackingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackingState {
    type Err = RevealError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(Self::New),
            "PREFILTER_PASS" => Ok(Self::PrefilterPass),
            "PREFILTER_FAIL" => Ok(Self::PrefilterFail),
            "IDENTIFIED" => Ok(Self::Identified),
            "NOT_IDENTIFIED" => Ok(Self::NotIdentified),
            "ORGANIZATION_CREATED" => Ok(Self::OrganizationCreated),
            "ORGANIZATION_EXISTS" => Ok(Self::OrganizationExists),
            "ERROR" => Ok(Self::Error),
            other => Err(RevealError::InvalidState(other.to_string())),
        }
    }
}

// --- Records ---

/// One captured visitor event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingRecord {
    pub id: Uuid,
    pub tenant: String,
    pub user_id: Option<String>,
    pub ip: String,
    pub href: Option<String>,
    pub origin: Option<String>,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
    pub language: Option<String>,
    pub cookies_enabled: Option<bool>,
    pub screen_resolution: Option<String>,
    /// Client-side event time in epoch milliseconds.
    pub timestamp: Option<i64>,
    pub state: TrackingState,
    pub organization_id: Option<String>,
    pub organization_name: Option<String>,
    pub organization_domain: Option<String>,
    pub organization_website: Option<String>,
    pub notified: bool,
    pub created_at: DateTime<Utc>,
}

impl TrackingRecord {
    /// A fresh record as the ingestion path would write it.
    pub fn new(tenant: &str, ip: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant: tenant.to_string(),
            user_id: None,
            ip: ip.to_string(),
            href: None,
            origin: None,
            referrer: None,
            user_agent: None,
            language: None,
            cookies_enabled: None,
            screen_resolution: None,
            timestamp: None,
            state: TrackingState::New,
            organization_id: None,
            organization_name: None,
            organization_domain: None,
            organization_website: None,
            notified: false,
            created_at,
        }
    }

    pub fn organization(&self) -> Option<OrganizationRef> {
        let id = non_empty(&self.organization_id)?;
        Some(OrganizationRef {
            id: id.to_string(),
            name: self.organization_name.clone(),
            domain: self.organization_domain.clone(),
            website: self.organization_website.clone(),
        })
    }
}

/// Keyset position in `(created_at, id)` order. A page read with a cursor
/// starts strictly after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PageCursor {
    pub created_at: DateTime<Utc>,
    pub id: Uuid,
}

impl PageCursor {
    pub fn of(record: &TrackingRecord) -> Self {
        Self {
            created_at: record.created_at,
            id: record.id,
        }
    }

    /// Whether `record` sorts after this cursor.
    pub fn precedes(&self, record: &TrackingRecord) -> bool {
        *self < Self::of(record)
    }
}

/// Reference to a graph-store Organization as written onto tracking rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationRef {
    pub id: String,
    pub name: Option<String>,
    pub domain: Option<String>,
    pub website: Option<String>,
}

/// An Organization node found in the graph store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizationNode {
    pub id: String,
    pub name: Option<String>,
}

/// Cached IP-reputation decision. `should_identify` is `None` while a
/// decision has not been made for the IP yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefilterCacheEntry {
    pub ip: String,
    pub should_identify: Option<bool>,
    pub response: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Cached company identification for an IP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentificationCacheEntry {
    pub ip: String,
    pub company_name: Option<String>,
    pub company_domain: Option<String>,
    pub company_website: Option<String>,
    pub response: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl IdentificationCacheEntry {
    pub fn domain(&self) -> Option<&str> {
        non_empty(&self.company_domain)
    }

    pub fn website(&self) -> Option<&str> {
        non_empty(&self.company_website)
    }

    pub fn name(&self) -> Option<&str> {
        non_empty(&self.company_name)
    }

    pub fn is_identified(&self) -> bool {
        self.domain().is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlackChannelSubscription {
    pub tenant: String,
    pub channel_id: String,
    pub workflow_tag: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantSlackCredential {
    pub tenant: String,
    pub bot_token: String,
}

// --- Helpers ---

/// `Some` only when the value is present and not the empty string.
pub fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// Whether `ip` is a syntactically valid IPv4 or IPv6 address.
pub fn is_valid_ip(ip: &str) -> bool {
    ip.parse::<std::net::IpAddr>().is_ok()
}

/// Lowercase, trim, drop scheme, path and a leading `www.`.
pub fn normalize_domain(domain: &str) -> String {
    let d = domain.trim().to_lowercase();
    let d = d
        .strip_prefix("https://")
        .or_else(|| d.strip_prefix("http://"))
        .unwrap_or(&d);
    let d = d.split('/').next().unwrap_or_default();
    d.strip_prefix("www.").unwrap_or(d).to_string()
}
