use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Body of `chat.postMessage`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlackMessage {
    pub channel: String,
    /// Notification fallback for clients that don't render blocks.
    pub text: String,
    pub unfurl_links: bool,
    pub unfurl_media: bool,
    pub blocks: serde_json::Value,
}

/// What Slack said about a delivered request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlackPostOutcome {
    pub status: u16,
    pub ok: bool,
    pub error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PostMessageResponse {
    #[serde(default)]
    ok: bool,
    error: Option<String>,
}

/// Slack Web API client authenticated per call with a tenant bot token.
pub struct SlackWebApi {
    base_url: String,
    http: reqwest::Client,
}

impl SlackWebApi {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Post `message`. Only a transport failure is an `Err`; Slack-level
    /// rejections come back as an outcome with `ok == false`.
    pub async fn post_message(
        &self,
        bot_token: &str,
        message: &SlackMessage,
    ) -> anyhow::Result<SlackPostOutcome> {
        let url = format!("{}/chat.postMessage", self.base_url);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(bot_token)
            .json(message)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        let parsed: PostMessageResponse = serde_json::from_str(&body).unwrap_or_default();

        let outcome = SlackPostOutcome {
            status: status.as_u16(),
            ok: status.is_success() && parsed.ok,
            error: parsed.error,
        };
        if !outcome.ok {
            warn!(
                status = %status,
                channel = %message.channel,
                error = outcome.error.as_deref().unwrap_or(""),
                "Slack chat.postMessage returned non-success"
            );
        }
        Ok(outcome)
    }
}
