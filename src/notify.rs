//! Delivery of finished reports to a Slack channel.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::state_machine::Report;

pub const API_URL: &str = "https://slack.com/api";

#[derive(Debug, Error)]
pub enum NotifyError {
    /// Slack answered `ok: false` (e.g. `channel_not_found`, `not_in_channel`).
    #[error("Slack API error: {0}")]
    Api(String),

    #[error("Slack returned HTTP {0}")]
    Status(u16),

    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

/// Posted to the source channel when a sender fails [`CommandGuard::authorize`].
pub const REJECTION_NOTICE: &str =
    "🚫 You are not allowed to broadcast reports, or this is not the broadcast channel.";

/// Shown only to the requester once the report is out.
pub const BROADCAST_CONFIRMATION: &str = "✅ The report was broadcast successfully.";

#[derive(Debug, Serialize)]
struct PostMessage<'a> {
    channel: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<&'a str>,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct SlackResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    ts: Option<String>,
}

/// Text of the announcement posted for a report.
pub fn format_announcement(report: &Report) -> String {
    format!(
        "📢 [Operations notice]\n\nSummary: {}\n\nUrgency: {}\n\nStrategy:\n{}",
        report.summary, report.urgency, report.strategy
    )
}

/// Posts messages with a bot token through `chat.postMessage`.
pub struct SlackNotifier {
    bot_token: String,
    client: Client,
    base_url: String,
}

impl SlackNotifier {
    /// `base_url` is the Web API root, normally [`API_URL`].
    pub fn with_base_url(bot_token: String, base_url: String) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            bot_token,
            client,
            base_url,
        })
    }

    /// Posts `text` to `channel` and returns the message timestamp.
    pub async fn post_message(&self, channel: &str, text: &str) -> Result<String, NotifyError> {
        let body = PostMessage {
            channel,
            user: None,
            text,
        };
        let response = self.call("chat.postMessage", &body).await?;
        Ok(response.ts.unwrap_or_default())
    }

    /// Posts `text` to `channel`, visible only to `user`.
    pub async fn post_ephemeral(
        &self,
        channel: &str,
        user: &str,
        text: &str,
    ) -> Result<(), NotifyError> {
        let body = PostMessage {
            channel,
            user: Some(user),
            text,
        };
        self.call("chat.postEphemeral", &body).await?;
        Ok(())
    }

    async fn call(&self, method: &str, body: &PostMessage<'_>) -> Result<SlackResponse, NotifyError> {
        let url = format!("{}/{method}", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.bot_token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }

        let body = response.json::<SlackResponse>().await?;
        if !body.ok {
            return Err(NotifyError::Api(
                body.error.unwrap_or_else(|| "unknown_error".to_string()),
            ));
        }
        Ok(body)
    }

    pub async fn post_report(&self, channel: &str, report: &Report) -> Result<String, NotifyError> {
        let ts = self.post_message(channel, &format_announcement(report)).await?;
        info!(channel, ts = %ts, urgency = %report.urgency, "report posted");
        Ok(ts)
    }
}

/// Gate for the notification command: only the configured user, speaking in
/// the configured source channel, may trigger a broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandGuard {
    pub boss_user_id: String,
    pub source_channel_id: String,
}

impl CommandGuard {
    pub fn authorize(&self, user_id: &str, channel_id: &str) -> bool {
        !self.boss_user_id.is_empty()
            && user_id == self.boss_user_id
            && channel_id == self.source_channel_id
    }
}
