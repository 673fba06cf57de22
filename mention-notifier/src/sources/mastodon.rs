use super::{boxed, html_to_text, Branding};
use crate::fetcher::Fetcher;
use crate::traits::Source;
use crate::types::{Item, KeyKind, MessageSpec, NaturalKey, Result, SeenTable};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use serde::Deserialize;
use tracing::info;

pub const NAME: &str = "mastodon";

const TIMELINE_LIMIT: u32 = 40;

const TABLE: SeenTable = SeenTable {
    name: "mastodon_toots",
    key_column: "toot_id",
    key_kind: KeyKind::Text,
};

const BRANDING: Branding = Branding {
    noun: "toot",
    site: "Mastodon",
    footer: "Mastodon Toot Notification",
    username: "Mastodon Toot Notifications",
    icon_emoji: ":mastodon:",
    icon_url: "https://emoji.slack-edge.com/T085AJH3L/mastodon/18ff0c46d671d904.png",
};

#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    pub acct: String,
    #[serde(default)]
    pub display_name: String,
    pub url: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Toot {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub url: Option<String>,
    pub uri: String,
    #[serde(default)]
    pub content: String,
    pub account: Account,
}

impl Toot {
    /// Web page of the status. Remote statuses may lack `url`.
    pub fn link(&self) -> &str {
        self.url.as_deref().filter(|u| !u.is_empty()).unwrap_or(&self.uri)
    }
}

impl Item for Toot {
    fn natural_key(&self) -> NaturalKey {
        NaturalKey::Text(self.id.clone())
    }

    fn title(&self) -> String {
        format!("Toot by {}", self.account.acct)
    }

    fn to_message(&self) -> MessageSpec {
        let mut message = BRANDING.message(self.link(), self.account.acct.clone(), self.created_at.timestamp());
        message.author_link = self.account.url.clone();
        message.author_icon = self.account.avatar.clone();
        message.title = Some("New toot on Mastodon!".to_string());
        let body = html_to_text(&self.content);
        if !body.is_empty() {
            message.body = Some(body);
        }
        message
    }
}

/// Public hashtag timeline of one instance.
pub struct MastodonSource {
    fetcher: Fetcher,
    tag: String,
    instance: String,
}

impl MastodonSource {
    pub fn new(fetcher: Fetcher, tag: String, instance: String) -> Self {
        Self { fetcher, tag, instance }
    }

    fn timeline_url(&self) -> String {
        let host = self
            .instance
            .trim()
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/');
        let tag = self.tag.trim_start_matches('#');
        format!("https://{}/api/v1/timelines/tag/{}", host, tag)
    }
}

#[async_trait]
impl Source for MastodonSource {
    fn name(&self) -> &'static str {
        NAME
    }

    fn table(&self) -> SeenTable {
        TABLE
    }

    async fn fetch(&self) -> Result<Vec<Box<dyn Item>>> {
        let query = [("limit", TIMELINE_LIMIT.to_string())];
        let toots: Vec<Toot> = self.fetcher.get_json(&self.timeline_url(), &query, HeaderMap::new()).await?;
        info!(instance = %self.instance, toot_count = toots.len(), "Fetched toots");
        Ok(boxed(toots))
    }
}
