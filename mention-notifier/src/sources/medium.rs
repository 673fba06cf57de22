use super::{boxed, Branding};
use crate::fetcher::Fetcher;
use crate::traits::Source;
use crate::types::{Item, KeyKind, MessageField, MessageSpec, NaturalKey, NotifierError, Result, SeenTable};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feed_rs::parser;
use reqwest::header::HeaderMap;
use tracing::{debug, info};

pub const NAME: &str = "medium";

const TABLE: SeenTable = SeenTable {
    name: "medium_articles",
    key_column: "article_id",
    key_kind: KeyKind::Text,
};

const BRANDING: Branding = Branding {
    noun: "article",
    site: "Medium",
    footer: "Medium Article Notification",
    username: "Medium Article Notifications",
    icon_emoji: ":medium:",
    icon_url: "https://emoji.slack-edge.com/T085AJH3L/medium/ea7124868c6b2c68.png",
};

#[derive(Debug, Clone)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub link: String,
    pub author: Option<String>,
    pub tags: Vec<String>,
    pub published: Option<DateTime<Utc>>,
}

impl Item for Article {
    fn natural_key(&self) -> NaturalKey {
        NaturalKey::Text(self.id.clone())
    }

    fn title(&self) -> String {
        self.title.clone()
    }

    fn to_message(&self) -> MessageSpec {
        let author = self.author.clone().unwrap_or_default();
        let ts = self.published.map(|t| t.timestamp()).unwrap_or_default();

        let mut message = BRANDING.message(&self.link, author, ts);
        message.title = Some(self.title.clone());
        if let Some(author) = &self.author {
            message.author_link = Some(format!("https://medium.com/search/users?q={}", author.replace(' ', "+")));
        }
        if !self.tags.is_empty() {
            message.fields.push(MessageField::short("Tags", self.tags.join(", ")));
        }
        message
    }
}

/// Medium guids look like `https://medium.com/p/<id>`; the last path
/// segment is the article id.
fn article_id(guid: &str) -> Option<&str> {
    let path = guid.split(['?', '#']).next().unwrap_or(guid);
    path.trim_end_matches('/').rsplit('/').next().filter(|id| !id.is_empty())
}

fn strip_tracking(link: &str) -> &str {
    link.split_once('?').map(|(base, _)| base).unwrap_or(link)
}

/// Parses a tag feed. Entries without a link or usable id are dropped.
pub fn parse_articles(content: &str) -> Result<Vec<Article>> {
    let feed = parser::parse(content.as_bytes())
        .map_err(|e| NotifierError::Feed(format!("Failed to parse feed: {}", e)))?;

    let mut articles = Vec::new();
    for entry in feed.entries {
        let Some(link) = entry.links.first().map(|l| strip_tracking(&l.href).to_string()) else {
            debug!(guid = %entry.id, "Skipping entry without link");
            continue;
        };
        let Some(id) = article_id(&entry.id).or_else(|| article_id(&link)).map(str::to_string) else {
            debug!(link = %link, "Skipping entry without id");
            continue;
        };

        articles.push(Article {
            id,
            title: entry.title.map(|t| t.content).unwrap_or_else(|| "Untitled".to_string()),
            link,
            author: entry.authors.first().map(|a| a.name.clone()).filter(|n| !n.is_empty()),
            tags: entry.categories.into_iter().map(|c| c.term).collect(),
            published: entry.published.or(entry.updated),
        });
    }
    Ok(articles)
}

/// Latest stories under a Medium tag, read from the tag's RSS feed.
pub struct MediumSource {
    fetcher: Fetcher,
    tag: String,
}

impl MediumSource {
    pub fn new(fetcher: Fetcher, tag: String) -> Self {
        Self { fetcher, tag }
    }
}

#[async_trait]
impl Source for MediumSource {
    fn name(&self) -> &'static str {
        NAME
    }

    fn table(&self) -> SeenTable {
        TABLE
    }

    async fn fetch(&self) -> Result<Vec<Box<dyn Item>>> {
        let url = format!("https://medium.com/feed/tag/{}", self.tag);
        let content = self.fetcher.get_text(&url, &[], HeaderMap::new()).await?;
        let articles = parse_articles(&content)?;
        info!(article_count = articles.len(), "Fetched articles");
        Ok(boxed(articles))
    }
}
