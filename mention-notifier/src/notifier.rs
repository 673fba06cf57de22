//! Slack delivery for new-item messages.
//!
//! Two transports are supported: a bot token posting through
//! `chat.postMessage`, and an incoming webhook. Neither retries.

use crate::config::{RunConfig, SlackCredentials};
use crate::fetcher::upstream_status;
use crate::traits::Notifier;
use crate::types::{Delivery, MessageField, MessageSpec, NotifierError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const SLACK_API_BASE: &str = "https://slack.com/api";
const ATTACHMENT_COLOR: &str = "#36a64f";

#[derive(Debug, Serialize)]
struct SlackAttachment<'a> {
    color: &'static str,
    fallback: &'a str,
    author_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    author_link: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    author_icon: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    title_link: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    mrkdwn_in: Vec<&'static str>,
    footer: &'a str,
    footer_icon: &'a str,
    ts: i64,
    #[serde(skip_serializing_if = "no_fields")]
    fields: &'a [MessageField],
}

fn no_fields(fields: &&[MessageField]) -> bool {
    fields.is_empty()
}

#[derive(Debug, Serialize)]
struct SlackMessage<'a> {
    channel: &'a str,
    text: &'a str,
    username: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon_emoji: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    as_user: Option<bool>,
    unfurl_links: bool,
    unfurl_media: bool,
    attachments: Vec<SlackAttachment<'a>>,
}

#[derive(Debug, Deserialize)]
struct SlackApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

fn build_message<'a>(message: &'a MessageSpec, channel: &'a str, username: &'a str, as_user: Option<bool>) -> SlackMessage<'a> {
    let attachment = SlackAttachment {
        color: ATTACHMENT_COLOR,
        fallback: &message.fallback,
        author_name: &message.author_name,
        author_link: message.author_link.as_deref(),
        author_icon: message.author_icon.as_deref(),
        title: message.title.as_deref(),
        title_link: &message.title_link,
        text: message.body.as_deref(),
        mrkdwn_in: if message.body.is_some() { vec!["text"] } else { Vec::new() },
        footer: &message.footer,
        footer_icon: &message.footer_icon,
        ts: message.ts,
        fields: &message.fields,
    };

    SlackMessage {
        channel,
        text: &message.text,
        username,
        icon_emoji: Some(&message.icon_emoji),
        icon_url: None,
        as_user,
        unfurl_links: false,
        unfurl_media: false,
        attachments: vec![attachment],
    }
}

/// Incoming webhooks show the site icon image instead of the emoji.
fn webhook_message<'a>(message: &'a MessageSpec, channel: &'a str, username: &'a str) -> SlackMessage<'a> {
    SlackMessage {
        icon_emoji: None,
        icon_url: Some(&message.footer_icon),
        ..build_message(message, channel, username, None)
    }
}

/// Posts messages to Slack, or does nothing at all when notifications are
/// disabled for the run.
pub struct SlackNotifier {
    enabled: bool,
    credentials: Option<SlackCredentials>,
    client: Client,
    api_base: String,
}

impl SlackNotifier {
    pub fn new(enabled: bool, credentials: Option<SlackCredentials>, client: Client) -> Result<Self> {
        if enabled && credentials.is_none() {
            return Err(NotifierError::Config(
                "Slack notifications are enabled but no Slack transport is configured".to_string(),
            ));
        }

        Ok(Self {
            enabled,
            credentials,
            client,
            api_base: SLACK_API_BASE.to_string(),
        })
    }

    pub fn from_config(config: &RunConfig, client: Client) -> Result<Self> {
        Self::new(config.notify_slack, config.slack_credentials()?, client)
    }

    /// Points `chat.postMessage` somewhere other than slack.com.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    async fn post_message(&self, token: &str, channel_id: &str, message: &MessageSpec) -> Result<()> {
        let payload = build_message(message, channel_id, &message.username, Some(false));
        let url = format!("{}/chat.postMessage", self.api_base.trim_end_matches('/'));

        let response = self.client.post(&url).bearer_auth(token).json(&payload).send().await?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(rate_limited(&response));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(upstream_status(url, status, &body));
        }

        let body: SlackApiResponse = response.json().await?;
        if !body.ok {
            return Err(NotifierError::Slack {
                error: body.error.unwrap_or_else(|| "unknown_error".to_string()),
            });
        }
        Ok(())
    }

    async fn post_webhook(&self, url: &url::Url, channel: &str, username: &str, message: &MessageSpec) -> Result<()> {
        let payload = webhook_message(message, channel, username);

        let response = self.client.post(url.clone()).json(&payload).send().await?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(rate_limited(&response));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(upstream_status(url.to_string(), status, &body));
        }
        Ok(())
    }
}

fn rate_limited(response: &reqwest::Response) -> NotifierError {
    let retry_after_secs = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(30);
    NotifierError::RateLimited { retry_after_secs }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn notify(&self, message: &MessageSpec) -> Result<Delivery> {
        if !self.enabled {
            debug!(title_link = %message.title_link, "Slack notifications disabled, skipping");
            return Ok(Delivery::Skipped);
        }

        match &self.credentials {
            Some(SlackCredentials::Api { token, channel_id }) => {
                info!(channel_id = %channel_id, title_link = %message.title_link, "Notifying slack");
                self.post_message(token, channel_id, message).await?;
            }
            Some(SlackCredentials::Webhook { url, channel, username }) => {
                info!(channel = %channel, title_link = %message.title_link, "Notifying slack");
                self.post_webhook(url, channel, username, message).await?;
            }
            None => {
                return Err(NotifierError::Config("No Slack transport configured".to_string()));
            }
        }

        Ok(Delivery::Sent)
    }

    fn channel_name(&self) -> &str {
        "slack"
    }
}
