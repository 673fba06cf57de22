//! Hacker News stories and comments, through the Algolia search API.
//!
//! Algolia matches fuzzily, so a hit is only kept when every highlighted
//! field it flagged as matched really contains the search term.

use super::{boxed, contains_ignore_case, html_to_text, Branding};
use crate::fetcher::{fetch_all_pages, Fetcher};
use crate::traits::Source;
use crate::types::{Item, KeyKind, MessageField, MessageSpec, NaturalKey, Result, SeenTable};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use tracing::{debug, info};

pub const STORY_NAME: &str = "hackernews-story";
pub const COMMENT_NAME: &str = "hackernews-comment";

const API_URL: &str = "https://hn.algolia.com/api/v1/search_by_date";
const ICON_URL: &str = "https://emoji.slack-edge.com/T085AJH3L/hacker-news/0daae30bfa8eefc6.png";

const STORY_TABLE: SeenTable = SeenTable {
    name: "hacker_news_stories",
    key_column: "object_id",
    key_kind: KeyKind::Text,
};

const COMMENT_TABLE: SeenTable = SeenTable {
    name: "hacker_news_comments",
    key_column: "object_id",
    key_kind: KeyKind::Text,
};

const STORY_BRANDING: Branding = Branding {
    noun: "story",
    site: "Hacker News",
    footer: "Hacker News Story Notification",
    username: "Hacker News Story Notifications",
    icon_emoji: ":hacker-news:",
    icon_url: ICON_URL,
};

const COMMENT_BRANDING: Branding = Branding {
    noun: "comment",
    site: "Hacker News",
    footer: "Hacker News Comment Notification",
    username: "Hacker News Comment Notifications",
    icon_emoji: ":hacker-news:",
    icon_url: ICON_URL,
};

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Highlight {
    #[serde(default)]
    pub value: String,
    #[serde(rename = "matchedWords", default)]
    pub matched_words: Vec<String>,
}

impl Highlight {
    /// A field with no matched words was not what Algolia matched on, so it
    /// cannot disqualify the hit.
    pub fn is_exact_match(&self, term: &str) -> bool {
        self.matched_words.is_empty() || contains_ignore_case(&self.value, term)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HighlightResult {
    pub title: Option<Highlight>,
    pub author: Option<Highlight>,
    pub url: Option<Highlight>,
    pub story_text: Option<Highlight>,
    pub comment_text: Option<Highlight>,
    pub story_title: Option<Highlight>,
    pub story_url: Option<Highlight>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Hit {
    #[serde(rename = "objectID")]
    pub object_id: String,
    pub title: Option<String>,
    pub url: Option<String>,
    #[serde(default)]
    pub author: String,
    pub points: Option<i64>,
    pub num_comments: Option<i64>,
    pub comment_text: Option<String>,
    pub story_title: Option<String>,
    pub story_url: Option<String>,
    pub created_at_i: i64,
    #[serde(rename = "_highlightResult", default)]
    pub highlight: HighlightResult,
}

impl Hit {
    fn link(&self) -> String {
        format!("https://news.ycombinator.com/item?id={}", self.object_id)
    }

    fn author_link(&self) -> String {
        format!("https://news.ycombinator.com/user?id={}", self.author)
    }

    fn passes(&self, term: &str, fields: &[&Option<Highlight>]) -> bool {
        fields
            .iter()
            .copied()
            .flatten()
            .all(|highlight| highlight.is_exact_match(term))
    }

    pub fn is_relevant_story(&self, term: &str) -> bool {
        self.passes(
            term,
            &[
                &self.highlight.title,
                &self.highlight.url,
                &self.highlight.author,
                &self.highlight.story_text,
            ],
        )
    }

    pub fn is_relevant_comment(&self, term: &str) -> bool {
        self.passes(
            term,
            &[
                &self.highlight.author,
                &self.highlight.comment_text,
                &self.highlight.story_title,
                &self.highlight.story_url,
            ],
        )
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

pub struct Story(pub Hit);

impl Item for Story {
    fn natural_key(&self) -> NaturalKey {
        NaturalKey::Text(self.0.object_id.clone())
    }

    fn title(&self) -> String {
        self.0.title.clone().unwrap_or_default()
    }

    fn to_message(&self) -> MessageSpec {
        let hit = &self.0;
        let mut message = STORY_BRANDING.message(&hit.link(), hit.author.clone(), hit.created_at_i);
        message.author_link = Some(hit.author_link());
        message.title = hit.title.clone();
        message.fields = vec![
            MessageField::short("# Points", hit.points.unwrap_or(0).to_string()),
            MessageField::short("# Comments", hit.num_comments.unwrap_or(0).to_string()),
            MessageField::short("Type", "📚"),
        ];
        if let Some(url) = non_empty(&hit.url) {
            message.fields.push(MessageField::short("Original Link", url));
        }
        message
    }
}

pub struct Comment(pub Hit);

impl Item for Comment {
    fn natural_key(&self) -> NaturalKey {
        NaturalKey::Text(self.0.object_id.clone())
    }

    fn title(&self) -> String {
        self.0.story_title.clone().unwrap_or_default()
    }

    fn to_message(&self) -> MessageSpec {
        let hit = &self.0;
        let mut message = COMMENT_BRANDING.message(&hit.link(), hit.author.clone(), hit.created_at_i);
        message.author_link = Some(hit.author_link());
        message.title = non_empty(&hit.story_title).map(|t| format!("Re: {}", t));
        message.body = non_empty(&hit.comment_text).map(html_to_text);
        message.fields = vec![MessageField::short("Type", "✍️")];
        if let Some(url) = non_empty(&hit.story_url) {
            message.fields.push(MessageField::short("Original Link", url));
        }
        message
    }
}

async fn search(fetcher: &Fetcher, term: &str, tags: &'static str) -> Result<Vec<Hit>> {
    fetch_all_pages(0, |page| async move {
        let query = [
            ("query", term.to_string()),
            ("tags", tags.to_string()),
            ("page", page.to_string()),
        ];
        let response: SearchPage = fetcher.get_json(API_URL, &query, HeaderMap::new()).await?;
        Ok(response.hits)
    })
    .await
}

pub struct HackerNewsStorySource {
    fetcher: Fetcher,
    tag: String,
}

impl HackerNewsStorySource {
    pub fn new(fetcher: Fetcher, tag: String) -> Self {
        Self { fetcher, tag }
    }
}

#[async_trait]
impl Source for HackerNewsStorySource {
    fn name(&self) -> &'static str {
        STORY_NAME
    }

    fn table(&self) -> SeenTable {
        STORY_TABLE
    }

    async fn fetch(&self) -> Result<Vec<Box<dyn Item>>> {
        let hits = search(&self.fetcher, &self.tag, "story").await?;
        let total = hits.len();
        let stories: Vec<Story> = hits
            .into_iter()
            .filter(|hit| {
                let keep = hit.is_relevant_story(&self.tag);
                if !keep {
                    debug!(object_id = %hit.object_id, "Dropping fuzzy story match");
                }
                keep
            })
            .map(Story)
            .collect();
        info!(hit_count = total, story_count = stories.len(), "Fetched stories");
        Ok(boxed(stories))
    }
}

pub struct HackerNewsCommentSource {
    fetcher: Fetcher,
    tag: String,
}

impl HackerNewsCommentSource {
    pub fn new(fetcher: Fetcher, tag: String) -> Self {
        Self { fetcher, tag }
    }
}

#[async_trait]
impl Source for HackerNewsCommentSource {
    fn name(&self) -> &'static str {
        COMMENT_NAME
    }

    fn table(&self) -> SeenTable {
        COMMENT_TABLE
    }

    async fn fetch(&self) -> Result<Vec<Box<dyn Item>>> {
        let hits = search(&self.fetcher, &self.tag, "comment").await?;
        let total = hits.len();
        let comments: Vec<Comment> = hits
            .into_iter()
            .filter(|hit| {
                let keep = hit.is_relevant_comment(&self.tag);
                if !keep {
                    debug!(object_id = %hit.object_id, "Dropping fuzzy comment match");
                }
                keep
            })
            .map(Comment)
            .collect();
        info!(hit_count = total, comment_count = comments.len(), "Fetched comments");
        Ok(boxed(comments))
    }
}
