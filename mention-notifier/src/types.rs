use std::time::Duration;

// Use the interfaces crate for the shared item/message shapes
pub use interfaces::defs::{Item, KeyKind, MessageField, MessageSpec, NaturalKey, RunSummary, SeenTable};

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("mention-notifier/{}", env!("CARGO_PKG_VERSION")),
            timeout_seconds: 30,
        }
    }
}

/// Outcome of handing a message to a notifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// Notifications are disabled for this run; nothing went out.
    Skipped,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifierError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream returned HTTP {status} for {url}: {body}")]
    UpstreamStatus { url: String, status: u16, body: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Feed parse error: {0}")]
    Feed(String),

    #[error("Slack API error: {error}")]
    Slack { error: String },

    #[error("Rate limited for {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    #[error("Source {source_name} failed: {error}")]
    SourceFailed {
        source_name: String,
        error: Box<NotifierError>,
    },
}

pub type Result<T> = std::result::Result<T, NotifierError>;
