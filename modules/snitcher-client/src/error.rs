use thiserror::Error;

pub type Result<T> = std::result::Result<T, SnitcherError>;

#[derive(Debug, Error)]
pub enum SnitcherError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for SnitcherError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SnitcherError::Parse(err.to_string())
        } else {
            SnitcherError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SnitcherError {
    fn from(err: serde_json::Error) -> Self {
        SnitcherError::Parse(err.to_string())
    }
}
