use serde_json::{json, Value};

use reveal_common::{non_empty, TrackingRecord};
use snitcher_client::CompanyResponse;

use super::slack::SlackMessage;

const UNKNOWN: &str = "Unknown";
const DIRECT: &str = "Direct";
/// Slack rejects header blocks over 150 characters.
const MAX_NAME_CHARS: usize = 100;

/// Everything shown in a "visitor on your website" alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitorAlert {
    pub organization_name: String,
    pub location: String,
    pub website: String,
    pub linkedin: String,
    pub source: String,
    pub organization_url: String,
}

impl VisitorAlert {
    pub fn new(
        record: &TrackingRecord,
        organization_id: &str,
        company: &CompanyResponse,
        app_url: &str,
    ) -> Self {
        let name = non_empty(&record.organization_name)
            .or_else(|| company.name())
            .unwrap_or(UNKNOWN);
        let website = non_empty(&record.organization_website).or_else(|| company.website());

        Self {
            organization_name: name.chars().take(MAX_NAME_CHARS).collect(),
            location: company.location().map(escape).unwrap_or_else(|| UNKNOWN.to_string()),
            website: website.map(slack_link).unwrap_or_else(|| UNKNOWN.to_string()),
            linkedin: company
                .linkedin_url()
                .map(slack_link)
                .unwrap_or_else(|| UNKNOWN.to_string()),
            source: non_empty(&record.referrer)
                .map(escape)
                .unwrap_or_else(|| DIRECT.to_string()),
            organization_url: format!(
                "{}/organization/{}?tab=about",
                app_url.trim_end_matches('/'),
                organization_id
            ),
        }
    }

    pub fn headline(&self) -> String {
        format!("A visitor from {} is on your website", self.organization_name)
    }

    pub fn blocks(&self) -> Value {
        json!([
            {
                "type": "header",
                "text": { "type": "plain_text", "text": self.headline(), "emoji": true }
            },
            { "type": "divider" },
            {
                "type": "section",
                "text": {
                    "type": "mrkdwn",
                    "text": format!(
                        "*Location:* {}\n*Website:* {}\n*LinkedIn:* {}\n*Source:* {}",
                        self.location, self.website, self.linkedin, self.source
                    )
                }
            },
            { "type": "divider" },
            {
                "type": "actions",
                "elements": [
                    {
                        "type": "button",
                        "text": { "type": "plain_text", "text": "Open organization", "emoji": true },
                        "url": self.organization_url
                    }
                ]
            }
        ])
    }

    pub fn message(&self, channel: &str) -> SlackMessage {
        SlackMessage {
            channel: channel.to_string(),
            text: self.headline(),
            unfurl_links: false,
            unfurl_media: false,
            blocks: self.blocks(),
        }
    }
}

/// `<https://www.acme.com|www.acme.com>`
fn slack_link(url: &str) -> String {
    let label = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url)
        .trim_end_matches('/');
    format!("<{}|{}>", escape(url), escape(label))
}

/// Slack mrkdwn control characters.
fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
