use thiserror::Error;

pub type Result<T> = std::result::Result<T, IpDataError>;

#[derive(Debug, Error)]
pub enum IpDataError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for IpDataError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            IpDataError::Parse(err.to_string())
        } else {
            IpDataError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for IpDataError {
    fn from(err: serde_json::Error) -> Self {
        IpDataError::Parse(err.to_string())
    }
}
