use crate::sources::SOURCE_NAMES;
use crate::types::{FetchConfig, NotifierError, Result};
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser, ValueEnum};
use tracing::info;
use url::Url;

pub const DEFAULT_DATABASE_FILE: &str = "mention-notifier.db";

const DEFAULT_TWITTER_ALLOW_WORDS: &str = "caprover,coolify,heroku";
const DEFAULT_TWITTER_IGNORE_WORDS: &str = "caliphate,chennai,chatta,chettha,comte,conde,disney,dokkan,hera,imarat,\
isis,luke,kadyrov,movie,shiseru,sushi,tamil,theatre,theater,umarov";
const DEFAULT_TWITTER_IGNORE_LANGUAGES: &str = "es,et,ja,in,it";
const DEFAULT_TWITTER_IGNORE_AUTHORS: &str = "dokku";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Run configuration. Every flag can also be supplied through the
/// environment variable named next to it.
#[derive(Parser, Debug, Clone)]
#[command(name = "mention-notifier", version, about = "Posts new mentions of a tag to Slack")]
pub struct RunConfig {
    /// Search term every source looks for.
    #[arg(long, env = "TAG", default_value = "")]
    pub tag: String,

    /// Stack Exchange site to query.
    #[arg(long, env = "SITE", default_value = "stackoverflow")]
    pub site: String,

    /// Subreddit watched by the reddit-subreddit source (defaults to the tag).
    #[arg(long, env = "SUBREDDIT")]
    pub subreddit: Option<String>,

    #[arg(long, env = "MASTODON_INSTANCE", default_value = "mastodon.social")]
    pub mastodon_instance: String,

    /// Deliver messages to Slack. When false items are still recorded as seen.
    /// The variable accepts 1/0, true/false, yes/no and on/off.
    #[arg(long, env = "NOTIFY_SLACK", action = ArgAction::SetTrue, value_parser = BoolishValueParser::new())]
    pub notify_slack: bool,

    #[arg(long, env = "SLACK_TOKEN", hide_env_values = true)]
    pub slack_token: Option<String>,

    #[arg(long, env = "SLACK_CHANNEL_ID")]
    pub slack_channel_id: Option<String>,

    #[arg(long, env = "SLACK_WEBHOOK_URL", hide_env_values = true)]
    pub slack_webhook_url: Option<String>,

    #[arg(long, env = "SLACK_CHANNEL")]
    pub slack_channel: Option<String>,

    #[arg(long, env = "SLACK_USERNAME")]
    pub slack_username: Option<String>,

    /// SQLite file holding the seen-item tables.
    #[arg(long, env = "DATABASE_FILE", default_value = DEFAULT_DATABASE_FILE)]
    pub database_file: String,

    /// Only run these sources (comma separated).
    #[arg(long, env = "SOURCES", value_delimiter = ',')]
    pub sources: Vec<String>,

    /// Never run these sources (comma separated).
    #[arg(long, env = "SKIP_SOURCES", value_delimiter = ',')]
    pub skip_sources: Vec<String>,

    /// Keep running the remaining sources after one fails.
    #[arg(long, env = "ISOLATE_SOURCES", action = ArgAction::SetTrue, value_parser = BoolishValueParser::new())]
    pub isolate_sources: bool,

    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    #[arg(long, env = "TWITTER_BEARER_TOKEN", hide_env_values = true)]
    pub twitter_bearer_token: Option<String>,

    /// Tweets containing any of these words are always admitted.
    #[arg(long, env = "TWITTER_ALLOW_WORDS", value_delimiter = ',', default_value = DEFAULT_TWITTER_ALLOW_WORDS)]
    pub twitter_allow_words: Vec<String>,

    /// Tweets containing any of these words are dropped. Set to an empty
    /// string to disable.
    #[arg(long, env = "TWITTER_IGNORE_WORDS", value_delimiter = ',', default_value = DEFAULT_TWITTER_IGNORE_WORDS)]
    pub twitter_ignore_words: Vec<String>,

    /// Tweet languages that are dropped (mostly Count Dooku and K-pop).
    #[arg(long, env = "TWITTER_IGNORE_LANGUAGES", value_delimiter = ',', default_value = DEFAULT_TWITTER_IGNORE_LANGUAGES)]
    pub twitter_ignore_languages: Vec<String>,

    #[arg(long, env = "TWITTER_IGNORE_AUTHORS", value_delimiter = ',', default_value = DEFAULT_TWITTER_IGNORE_AUTHORS)]
    pub twitter_ignore_authors: Vec<String>,

    #[arg(long, env = "HTTP_TIMEOUT_SECONDS", default_value_t = 30)]
    pub http_timeout_seconds: u64,

    #[arg(long, env = "HTTP_USER_AGENT")]
    pub http_user_agent: Option<String>,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Where Slack messages go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlackCredentials {
    /// Bot token posting through `chat.postMessage`.
    Api { token: String, channel_id: String },
    /// Incoming webhook.
    Webhook {
        url: Url,
        channel: String,
        username: String,
    },
}

impl RunConfig {
    /// Normalises list values and checks everything a run needs before any
    /// source is touched.
    pub fn validate(mut self) -> Result<Self> {
        self.tag = self.tag.trim().to_string();
        if self.tag.is_empty() {
            return Err(NotifierError::Config(
                "No TAG environment variable specified".to_string(),
            ));
        }

        self.sources = normalize_list(&self.sources);
        self.skip_sources = normalize_list(&self.skip_sources);
        self.twitter_allow_words = normalize_list(&self.twitter_allow_words);
        self.twitter_ignore_words = normalize_list(&self.twitter_ignore_words);
        self.twitter_ignore_languages = normalize_list(&self.twitter_ignore_languages);
        self.twitter_ignore_authors = normalize_list(&self.twitter_ignore_authors);

        for name in self.sources.iter().chain(self.skip_sources.iter()) {
            if !SOURCE_NAMES.contains(&name.as_str()) {
                return Err(NotifierError::Config(format!(
                    "Unknown source '{}', expected one of: {}",
                    name,
                    SOURCE_NAMES.join(", ")
                )));
            }
        }

        if self.notify_slack && self.slack_credentials()?.is_none() {
            return Err(NotifierError::Config(
                "NOTIFY_SLACK is set but neither SLACK_TOKEN + SLACK_CHANNEL_ID nor SLACK_WEBHOOK_URL + SLACK_CHANNEL + SLACK_USERNAME are configured".to_string(),
            ));
        }

        Ok(self)
    }

    /// Resolves the configured Slack transport. The bot token wins when both
    /// transports are complete.
    pub fn slack_credentials(&self) -> Result<Option<SlackCredentials>> {
        if let (Some(token), Some(channel_id)) = (non_empty(&self.slack_token), non_empty(&self.slack_channel_id)) {
            return Ok(Some(SlackCredentials::Api {
                token: token.to_string(),
                channel_id: channel_id.to_string(),
            }));
        }

        if let (Some(raw_url), Some(channel), Some(username)) = (
            non_empty(&self.slack_webhook_url),
            non_empty(&self.slack_channel),
            non_empty(&self.slack_username),
        ) {
            let url = Url::parse(raw_url)?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(NotifierError::Config(format!(
                    "SLACK_WEBHOOK_URL must be an http(s) URL, got scheme '{}'",
                    url.scheme()
                )));
            }
            return Ok(Some(SlackCredentials::Webhook {
                url,
                channel: channel.to_string(),
                username: username.to_string(),
            }));
        }

        Ok(None)
    }

    pub fn subreddit(&self) -> &str {
        non_empty(&self.subreddit).unwrap_or(&self.tag)
    }

    pub fn fetch_config(&self) -> FetchConfig {
        let mut fetch_config = FetchConfig {
            timeout_seconds: self.http_timeout_seconds,
            ..FetchConfig::default()
        };
        if let Some(user_agent) = non_empty(&self.http_user_agent) {
            fetch_config.user_agent = user_agent.to_string();
        }
        fetch_config
    }

    /// Whether `name` survives the allow-list and deny-list.
    pub fn source_enabled(&self, name: &str) -> bool {
        let allowed = self.sources.is_empty() || self.sources.iter().any(|s| s == name);
        allowed && !self.skip_sources.iter().any(|s| s == name)
    }

    pub fn log_summary(&self) {
        info!(
            tag = %self.tag,
            site = %self.site,
            notify_slack = self.notify_slack,
            database_file = %self.database_file,
            sources = ?self.sources,
            skip_sources = ?self.skip_sources,
            isolate_sources = self.isolate_sources,
            "Loaded configuration"
        );
    }
}

fn normalize_list(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .collect()
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
