use super::{boxed, Branding};
use crate::fetcher::{fetch_all_pages, Fetcher};
use crate::traits::Source;
use crate::types::{Item, KeyKind, MessageField, MessageSpec, NaturalKey, Result, SeenTable};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use serde::Deserialize;
use tracing::info;

pub const NAME: &str = "devto";

const API_URL: &str = "https://dev.to/api/articles";
const PAGE_SIZE: u32 = 100;

const TABLE: SeenTable = SeenTable {
    name: "devto_articles",
    key_column: "article_id",
    key_kind: KeyKind::Integer,
};

const BRANDING: Branding = Branding {
    noun: "article",
    site: "Dev.to",
    footer: "Dev.to Article Notification",
    username: "Dev.to Article Notifications",
    icon_emoji: ":devto-rainbow:",
    icon_url: "https://emoji.slack-edge.com/T085AJH3L/devto-rainbow/387781e03f7a17fe.png",
};

#[derive(Debug, Clone, Deserialize)]
pub struct DevtoUser {
    pub username: String,
    pub profile_image_90: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DevtoArticle {
    pub id: i64,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub comments_count: u64,
    #[serde(default)]
    pub public_reactions_count: u64,
    #[serde(default)]
    pub reading_time_minutes: u64,
    pub created_at: DateTime<Utc>,
    pub user: DevtoUser,
}

impl Item for DevtoArticle {
    fn natural_key(&self) -> NaturalKey {
        NaturalKey::Int(self.id)
    }

    fn title(&self) -> String {
        self.title.clone()
    }

    fn to_message(&self) -> MessageSpec {
        let mut message = BRANDING.message(&self.url, self.user.username.clone(), self.created_at.timestamp());
        message.author_link = Some(format!("https://dev.to/{}", self.user.username));
        message.author_icon = self.user.profile_image_90.clone();
        message.title = Some(self.title.clone());
        message.fields = vec![
            MessageField::short("Reactions", self.public_reactions_count.to_string()),
            MessageField::short("Comments", self.comments_count.to_string()),
            MessageField::short("Reading Time", format!("{} min", self.reading_time_minutes)),
        ];
        message
    }
}

pub struct DevtoSource {
    fetcher: Fetcher,
    tag: String,
}

impl DevtoSource {
    pub fn new(fetcher: Fetcher, tag: String) -> Self {
        Self { fetcher, tag }
    }

    async fn fetch_page(&self, page: u32) -> Result<Vec<DevtoArticle>> {
        let query = [
            ("tag", self.tag.clone()),
            ("per_page", PAGE_SIZE.to_string()),
            ("page", page.to_string()),
        ];
        self.fetcher.get_json(API_URL, &query, HeaderMap::new()).await
    }
}

#[async_trait]
impl Source for DevtoSource {
    fn name(&self) -> &'static str {
        NAME
    }

    fn table(&self) -> SeenTable {
        TABLE
    }

    async fn fetch(&self) -> Result<Vec<Box<dyn Item>>> {
        let articles = fetch_all_pages(1, |page| self.fetch_page(page)).await?;
        info!(article_count = articles.len(), "Fetched articles");
        Ok(boxed(articles))
    }
}
