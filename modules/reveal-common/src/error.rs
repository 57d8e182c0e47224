use thiserror::Error;

use crate::types::TrackingState;

/// Per-record data problems. None of these are retried by a later tick except
/// the cache gaps, which a later provider response may fill.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RevealError {
    #[error("Invalid tracking state: {0}")]
    InvalidState(String),

    #[error("Illegal state transition {from} -> {to}")]
    IllegalTransition {
        from: TrackingState,
        to: TrackingState,
    },

    #[error("Invalid IP address {0:?}")]
    InvalidIp(String),

    #[error("No {cache} cache entry for ip {ip}")]
    MissingCacheEntry { cache: &'static str, ip: String },

    #[error("Cached {cache} payload for ip {ip} is unreadable: {message}")]
    InvalidPayload {
        cache: &'static str,
        ip: String,
        message: String,
    },

    #[error("No company domain identified for ip {0}")]
    MissingDomain(String),

    #[error("No company website to create an organization for ip {0}")]
    MissingWebsite(String),
}
