//! Chat notifications.
//!
//! The poller only needs to post a plain-text message to a channel under a
//! display name. [`SlackMessenger`] does that through `chat.postMessage`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sickbeetz_providers::BoxFuture;
use thiserror::Error;
use tracing::debug;

/// Default Slack Web API base URL.
pub const SLACK_API_BASE: &str = "https://slack.com/api";

/// Result type for notification operations.
pub type NotifyResult<T> = Result<T, NotifyError>;

/// Errors that can occur while posting a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The request could not be sent or the response not read.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success HTTP status.
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// The API answered `ok: false`.
    #[error("API error: {0}")]
    Api(String),

    /// The response body was not the expected JSON.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl NotifyError {
    /// Creates an API error.
    pub fn api(message: impl Into<String>) -> Self {
        Self::Api(message.into())
    }
}

/// Something that can post a text message to a channel.
pub trait Messenger: Send + Sync {
    /// Posts `text` to `channel`, shown as coming from `display_name`.
    fn post_message<'a>(
        &'a self,
        channel: &'a str,
        text: &'a str,
        display_name: &'a str,
    ) -> BoxFuture<'a, NotifyResult<()>>;
}

impl<T: Messenger + ?Sized> Messenger for Box<T> {
    fn post_message<'a>(
        &'a self,
        channel: &'a str,
        text: &'a str,
        display_name: &'a str,
    ) -> BoxFuture<'a, NotifyResult<()>> {
        (**self).post_message(channel, text, display_name)
    }
}

/// Slack bot client.
#[derive(Debug)]
pub struct SlackMessenger {
    http_client: reqwest::Client,
    token: String,
    api_base: String,
}

impl SlackMessenger {
    /// Default request timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Creates a messenger authenticating with the bot `token`.
    pub fn new(token: impl Into<String>, timeout: Duration) -> NotifyResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(format!("sickbeetz/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http_client,
            token: token.into(),
            api_base: SLACK_API_BASE.to_string(),
        })
    }

    /// Overrides the Web API base URL.
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    async fn send(&self, message: &PostMessage<'_>) -> NotifyResult<()> {
        let response = self
            .http_client
            .post(format!("{}/chat.postMessage", self.api_base))
            .bearer_auth(&self.token)
            .json(message)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        check_response(status, &body)?;

        debug!(channel = message.channel, "message posted");
        Ok(())
    }
}

impl Messenger for SlackMessenger {
    fn post_message<'a>(
        &'a self,
        channel: &'a str,
        text: &'a str,
        display_name: &'a str,
    ) -> BoxFuture<'a, NotifyResult<()>> {
        Box::pin(async move {
            let message = PostMessage {
                channel,
                text,
                username: display_name,
            };
            self.send(&message).await
        })
    }
}

/// Body of a `chat.postMessage` request.
#[derive(Debug, Serialize)]
struct PostMessage<'a> {
    channel: &'a str,
    text: &'a str,
    username: &'a str,
}

/// Envelope of every Slack Web API response.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

fn check_response(status: u16, body: &str) -> NotifyResult<()> {
    if !(200..300).contains(&status) {
        return Err(NotifyError::Status {
            status,
            body: body.to_string(),
        });
    }

    let parsed: ApiResponse =
        serde_json::from_str(body).map_err(|e| NotifyError::InvalidResponse(e.to_string()))?;
    if !parsed.ok {
        return Err(NotifyError::api(
            parsed.error.unwrap_or_else(|| "unknown error".to_string()),
        ));
    }
    Ok(())
}
