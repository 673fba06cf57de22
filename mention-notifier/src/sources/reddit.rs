use super::{boxed, Branding};
use crate::fetcher::Fetcher;
use crate::traits::Source;
use crate::types::{Item, KeyKind, MessageField, MessageSpec, NaturalKey, Result, SeenTable};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use tracing::info;

pub const SEARCH_NAME: &str = "reddit";
pub const SUBREDDIT_NAME: &str = "reddit-subreddit";

const SEARCH_URL: &str = "https://www.reddit.com/search.json";
const LISTING_LIMIT: u32 = 100;

// Both sources see the same post ids, so they share one table and a post
// found by either is announced once.
const TABLE: SeenTable = SeenTable {
    name: "reddit_posts",
    key_column: "post_id",
    key_kind: KeyKind::Text,
};

const BRANDING: Branding = Branding {
    noun: "post",
    site: "Reddit",
    footer: "Reddit Post Notification",
    username: "Reddit Post Notifications",
    icon_emoji: ":reddit:",
    icon_url: "https://emoji.slack-edge.com/T085AJH3L/reddit/42103923a0791a10.png",
};

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<ListingChild>,
}

#[derive(Debug, Deserialize)]
struct ListingChild {
    data: PostData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostData {
    pub id: String,
    /// Fullname, e.g. `t3_abc123`.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub subreddit: String,
    #[serde(default)]
    pub selftext: String,
    #[serde(default)]
    pub created_utc: f64,
}

impl PostData {
    /// Bare post id, preferring the fullname's suffix when present.
    pub fn post_id(&self) -> &str {
        match self.name.split_once('_') {
            Some((_, id)) if !id.is_empty() => id,
            _ => &self.id,
        }
    }

    pub fn link(&self) -> String {
        format!("https://www.reddit.com/r/{}/comments/{}/", self.subreddit, self.post_id())
    }
}

pub struct RedditPost {
    pub data: PostData,
    with_selftext: bool,
}

impl Item for RedditPost {
    fn natural_key(&self) -> NaturalKey {
        NaturalKey::Text(self.data.post_id().to_string())
    }

    fn title(&self) -> String {
        self.data.title.clone()
    }

    fn to_message(&self) -> MessageSpec {
        let post = &self.data;
        let mut message = BRANDING.message(&post.link(), post.author.clone(), post.created_utc as i64);
        message.author_link = Some(format!("https://www.reddit.com/user/{}/", post.author));
        message.title = Some(post.title.clone());
        if self.with_selftext && !post.selftext.trim().is_empty() {
            message.body = Some(post.selftext.clone());
        }
        message.fields = vec![MessageField::short("Subreddit", format!("/r/{}", post.subreddit))];
        message
    }
}

fn posts(listing: Listing, with_selftext: bool) -> Vec<RedditPost> {
    listing
        .data
        .children
        .into_iter()
        .map(|child| RedditPost {
            data: child.data,
            with_selftext,
        })
        .collect()
}

/// Site-wide search for link posts mentioning the term, newest first. One
/// listing page per run.
pub struct RedditSearchSource {
    fetcher: Fetcher,
    tag: String,
}

impl RedditSearchSource {
    pub fn new(fetcher: Fetcher, tag: String) -> Self {
        Self { fetcher, tag }
    }
}

#[async_trait]
impl Source for RedditSearchSource {
    fn name(&self) -> &'static str {
        SEARCH_NAME
    }

    fn table(&self) -> SeenTable {
        TABLE
    }

    async fn fetch(&self) -> Result<Vec<Box<dyn Item>>> {
        let query = [
            ("q", self.tag.clone()),
            ("type", "link".to_string()),
            ("sort", "new".to_string()),
            ("limit", LISTING_LIMIT.to_string()),
        ];
        let listing: Listing = self.fetcher.get_json(SEARCH_URL, &query, HeaderMap::new()).await?;
        let posts = posts(listing, false);
        info!(post_count = posts.len(), "Fetched posts");
        Ok(boxed(posts))
    }
}

/// Newest posts of one subreddit.
pub struct RedditSubredditSource {
    fetcher: Fetcher,
    subreddit: String,
}

impl RedditSubredditSource {
    pub fn new(fetcher: Fetcher, subreddit: String) -> Self {
        Self { fetcher, subreddit }
    }
}

#[async_trait]
impl Source for RedditSubredditSource {
    fn name(&self) -> &'static str {
        SUBREDDIT_NAME
    }

    fn table(&self) -> SeenTable {
        TABLE
    }

    async fn fetch(&self) -> Result<Vec<Box<dyn Item>>> {
        let url = format!("https://www.reddit.com/r/{}/new.json", self.subreddit);
        let query = [("limit", LISTING_LIMIT.to_string())];
        let listing: Listing = self.fetcher.get_json(&url, &query, HeaderMap::new()).await?;
        let posts = posts(listing, true);
        info!(subreddit = %self.subreddit, post_count = posts.len(), "Fetched posts");
        Ok(boxed(posts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::decode_json;

    const LISTING: &str = r#"{
        "kind": "Listing",
        "data": {
            "after": null,
            "dist": 2,
            "children": [
                {
                    "kind": "t3",
                    "data": {
                        "id": "17abcde",
                        "name": "t3_17abcde",
                        "author": "selfhoster",
                        "created_utc": 1700000000.0,
                        "permalink": "/r/selfhosted/comments/17abcde/dokku_vs_coolify/",
                        "selftext": "Which one should I pick?",
                        "subreddit": "selfhosted",
                        "title": "Dokku vs Coolify",
                        "url": "https://www.reddit.com/r/selfhosted/comments/17abcde/dokku_vs_coolify/"
                    }
                },
                {
                    "kind": "t3",
                    "data": {
                        "id": "17fghij",
                        "author": "linker",
                        "created_utc": 1700000500.5,
                        "selftext": "",
                        "subreddit": "programming",
                        "title": "A link post",
                        "url": "https://example.com/article"
                    }
                }
            ],
            "before": null
        }
    }"#;

    #[test]
    fn link_comes_from_the_post_itself() {
        let listing: Listing = decode_json(LISTING).unwrap();
        let posts = posts(listing, false);

        assert_eq!(posts[0].natural_key(), NaturalKey::Text("17abcde".to_string()));
        assert_eq!(posts[0].data.link(), "https://www.reddit.com/r/selfhosted/comments/17abcde/");
        // No fullname, so the plain id is used.
        assert_eq!(posts[1].data.link(), "https://www.reddit.com/r/programming/comments/17fghij/");
    }

    #[test]
    fn search_posts_have_no_body() {
        let listing: Listing = decode_json(LISTING).unwrap();
        let message = posts(listing, false)[0].to_message();

        assert!(message.body.is_none());
        assert_eq!(message.fields, vec![MessageField::short("Subreddit", "/r/selfhosted")]);
        assert_eq!(message.ts, 1_700_000_000);
    }

    #[test]
    fn subreddit_posts_carry_self_text() {
        let listing: Listing = decode_json(LISTING).unwrap();
        let posts = posts(listing, true);

        assert_eq!(posts[0].to_message().body.as_deref(), Some("Which one should I pick?"));
        assert!(posts[1].to_message().body.is_none());
    }
}
