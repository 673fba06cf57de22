pub mod devto;
pub mod github;
pub mod hackernews;
pub mod mastodon;
pub mod medium;
pub mod reddit;
pub mod stackoverflow;
pub mod twitter;

pub use devto::DevtoSource;
pub use github::GithubSource;
pub use hackernews::{HackerNewsCommentSource, HackerNewsStorySource};
pub use mastodon::MastodonSource;
pub use medium::MediumSource;
pub use reddit::{RedditSearchSource, RedditSubredditSource};
pub use stackoverflow::StackOverflowSource;
pub use twitter::{TweetPolicy, TwitterSource};

use crate::config::RunConfig;
use crate::fetcher::Fetcher;
use crate::traits::Source;
use crate::types::{Item, MessageSpec};

/// Every registered source, in the order a run visits them.
pub const SOURCE_NAMES: &[&str] = &[
    stackoverflow::NAME,
    github::NAME,
    hackernews::STORY_NAME,
    hackernews::COMMENT_NAME,
    reddit::SEARCH_NAME,
    reddit::SUBREDDIT_NAME,
    twitter::NAME,
    mastodon::NAME,
    medium::NAME,
    devto::NAME,
];

/// Builds the full registry. Filtering by SOURCES / SKIP_SOURCES happens in
/// the orchestrator so skipped sources still show up in the logs.
pub fn build_registry(config: &RunConfig, fetcher: Fetcher) -> Vec<Box<dyn Source>> {
    let tag = config.tag.clone();
    vec![
        Box::new(StackOverflowSource::new(fetcher.clone(), tag.clone(), config.site.clone())),
        Box::new(GithubSource::new(fetcher.clone(), tag.clone(), config.github_token.clone())),
        Box::new(HackerNewsStorySource::new(fetcher.clone(), tag.clone())),
        Box::new(HackerNewsCommentSource::new(fetcher.clone(), tag.clone())),
        Box::new(RedditSearchSource::new(fetcher.clone(), tag.clone())),
        Box::new(RedditSubredditSource::new(fetcher.clone(), config.subreddit().to_string())),
        Box::new(TwitterSource::new(
            fetcher.clone(),
            tag.clone(),
            config.twitter_bearer_token.clone(),
            TweetPolicy::from_config(config),
        )),
        Box::new(MastodonSource::new(fetcher.clone(), tag.clone(), config.mastodon_instance.clone())),
        Box::new(MediumSource::new(fetcher.clone(), tag.clone())),
        Box::new(DevtoSource::new(fetcher, tag)),
    ]
}

/// Per-source message wording shared by every item of that source.
pub(crate) struct Branding {
    /// What one item is called, e.g. "question".
    pub noun: &'static str,
    pub site: &'static str,
    pub footer: &'static str,
    pub username: &'static str,
    pub icon_emoji: &'static str,
    pub icon_url: &'static str,
}

impl Branding {
    /// Message skeleton with the link lines, footer and bot identity filled
    /// in. Callers add title, author details, body and fields.
    pub fn message(&self, link: &str, author_name: impl Into<String>, ts: i64) -> MessageSpec {
        MessageSpec {
            text: format!("New {} on <{}|{}>", self.noun, link, self.site),
            fallback: format!("New {} on {}!", self.noun, self.site),
            username: self.username.to_string(),
            icon_emoji: self.icon_emoji.to_string(),
            author_name: author_name.into(),
            author_link: None,
            author_icon: None,
            title: None,
            title_link: link.to_string(),
            body: None,
            footer: self.footer.to_string(),
            footer_icon: self.icon_url.to_string(),
            ts,
            fields: Vec::new(),
        }
    }
}

pub(crate) fn boxed<T: Item + 'static>(items: Vec<T>) -> Vec<Box<dyn Item>> {
    items.into_iter().map(|item| Box::new(item) as Box<dyn Item>).collect()
}

/// Renders an HTML fragment as plain text for a message body.
pub(crate) fn html_to_text(html: &str) -> String {
    html2text::from_read(html.as_bytes(), 80)
        .unwrap_or_default()
        .trim()
        .to_string()
}

pub(crate) fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BRANDING: Branding = Branding {
        noun: "article",
        site: "Dev.to",
        footer: "Dev.to Article Notification",
        username: "Dev.to Article Notifications",
        icon_emoji: ":devto-rainbow:",
        icon_url: "https://example.com/devto.png",
    };

    #[test]
    fn branding_fills_link_lines() {
        let message = BRANDING.message("https://dev.to/a/b", "alice", 42);
        assert_eq!(message.text, "New article on <https://dev.to/a/b|Dev.to>");
        assert_eq!(message.fallback, "New article on Dev.to!");
        assert_eq!(message.title_link, "https://dev.to/a/b");
        assert_eq!(message.ts, 42);
        assert!(message.fields.is_empty());
    }

    #[test]
    fn html_fragments_become_text() {
        let text = html_to_text("<p>Deploying with <a href=\"https://dokku.com\">dokku</a></p>");
        assert!(text.contains("Deploying with"));
        assert!(text.contains("dokku"));
        assert!(!text.contains("<p>"));
    }

    #[test]
    fn registry_names_are_unique() {
        let mut names = SOURCE_NAMES.to_vec();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), SOURCE_NAMES.len());
    }
}
