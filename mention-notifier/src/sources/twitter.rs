use super::{boxed, Branding};
use crate::config::RunConfig;
use crate::fetcher::Fetcher;
use crate::traits::Source;
use crate::types::{Item, KeyKind, MessageSpec, NaturalKey, NotifierError, Result, SeenTable};
use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

pub const NAME: &str = "twitter";

const API_URL: &str = "https://api.twitter.com/2/tweets/search/recent";
const MAX_RESULTS: u32 = 100;

const TABLE: SeenTable = SeenTable {
    name: "twitter_tweets",
    key_column: "tweet_id",
    key_kind: KeyKind::Text,
};

const BRANDING: Branding = Branding {
    noun: "tweet",
    site: "Twitter",
    footer: "Twitter Tweet Notification",
    username: "Twitter Tweet Notifications",
    icon_emoji: ":twitter:",
    icon_url: "https://emoji.slack-edge.com/T085AJH3L/twitter/290f7fdbde70c82d.png",
};

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<RawTweet>,
    #[serde(default)]
    includes: Includes,
}

#[derive(Debug, Default, Deserialize)]
struct Includes {
    #[serde(default)]
    users: Vec<User>,
}

#[derive(Debug, Deserialize)]
struct RawTweet {
    id: String,
    text: String,
    author_id: Option<String>,
    created_at: Option<DateTime<Utc>>,
    lang: Option<String>,
    #[serde(default)]
    referenced_tweets: Vec<ReferencedTweet>,
    #[serde(default)]
    entities: Entities,
}

#[derive(Debug, Deserialize)]
struct ReferencedTweet {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Default, Deserialize)]
struct Entities {
    #[serde(default)]
    mentions: Vec<MentionEntity>,
}

#[derive(Debug, Deserialize)]
struct MentionEntity {
    username: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub username: String,
}

/// A tweet with its author and mentioned users resolved from the response's
/// `includes`.
#[derive(Debug, Clone)]
pub struct Tweet {
    pub id: String,
    pub text: String,
    pub created_at: Option<DateTime<Utc>>,
    pub lang: Option<String>,
    pub author: User,
    pub mentions: Vec<User>,
    pub is_retweet: bool,
}

impl Tweet {
    pub fn link(&self) -> String {
        format!("https://twitter.com/{}/status/{}", self.author.username, self.id)
    }
}

fn resolve(response: SearchResponse) -> Vec<Tweet> {
    let users_by_id: HashMap<&str, &User> = response.includes.users.iter().map(|u| (u.id.as_str(), u)).collect();
    let users_by_name: HashMap<String, &User> = response
        .includes
        .users
        .iter()
        .map(|u| (u.username.to_lowercase(), u))
        .collect();

    response
        .data
        .iter()
        .map(|raw| {
            let author = raw
                .author_id
                .as_deref()
                .and_then(|id| users_by_id.get(id))
                .map(|u| (*u).clone())
                .unwrap_or_default();
            let mentions = raw
                .entities
                .mentions
                .iter()
                .map(|m| {
                    users_by_name
                        .get(&m.username.to_lowercase())
                        .map(|u| (*u).clone())
                        .unwrap_or_else(|| User {
                            username: m.username.clone(),
                            ..User::default()
                        })
                })
                .collect();

            Tweet {
                id: raw.id.clone(),
                text: raw.text.clone(),
                created_at: raw.created_at,
                lang: raw.lang.clone(),
                author,
                mentions,
                is_retweet: raw.referenced_tweets.iter().any(|r| r.kind == "retweeted"),
            }
        })
        .collect()
}

impl Item for Tweet {
    fn natural_key(&self) -> NaturalKey {
        NaturalKey::Text(self.id.clone())
    }

    fn title(&self) -> String {
        self.text.clone()
    }

    fn to_message(&self) -> MessageSpec {
        let ts = self.created_at.map(|t| t.timestamp()).unwrap_or_default();
        let mut message = BRANDING.message(&self.link(), self.author.username.clone(), ts);
        message.author_link = Some(format!("https://twitter.com/{}", self.author.username));
        message.title = Some(self.text.clone());
        message
    }
}

/// Noise rules for recent-search results. All word lists are lowercase.
#[derive(Debug, Clone, Default)]
pub struct TweetPolicy {
    pub term: String,
    pub allow_words: Vec<String>,
    pub ignore_words: Vec<String>,
    pub ignore_languages: Vec<String>,
    pub ignore_authors: Vec<String>,
}

impl TweetPolicy {
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            term: config.tag.to_lowercase(),
            allow_words: config.twitter_allow_words.clone(),
            ignore_words: config.twitter_ignore_words.clone(),
            ignore_languages: config.twitter_ignore_languages.clone(),
            ignore_authors: config.twitter_ignore_authors.clone(),
        }
    }

    /// An allow word admits the tweet outright. Otherwise the first ignore
    /// rule that matches rejects it.
    pub fn admits(&self, tweet: &Tweet) -> bool {
        let text = tweet.text.to_lowercase();
        if self.allow_words.iter().any(|w| text.contains(w.as_str())) {
            return true;
        }

        if let Some(lang) = &tweet.lang {
            if self.ignore_languages.iter().any(|l| l.eq_ignore_ascii_case(lang)) {
                return false;
            }
        }

        if self.ignore_words.iter().any(|w| text.contains(w.as_str())) {
            return false;
        }

        let author = tweet.author.username.to_lowercase();
        if self.ignore_authors.iter().any(|a| *a == author) {
            return false;
        }

        if self.names_term(&tweet.author) {
            return false;
        }

        if tweet.mentions.iter().any(|m| self.names_term(m)) {
            return false;
        }

        !tweet.is_retweet
    }

    fn names_term(&self, user: &User) -> bool {
        !self.term.is_empty()
            && (user.username.to_lowercase().contains(&self.term) || user.name.to_lowercase().contains(&self.term))
    }
}

/// Tweets from the last 24 hours matching the term. Without a bearer token
/// the source yields nothing.
pub struct TwitterSource {
    fetcher: Fetcher,
    tag: String,
    bearer_token: Option<String>,
    policy: TweetPolicy,
}

impl TwitterSource {
    pub fn new(fetcher: Fetcher, tag: String, bearer_token: Option<String>, policy: TweetPolicy) -> Self {
        Self {
            fetcher,
            tag,
            bearer_token,
            policy,
        }
    }
}

#[async_trait]
impl Source for TwitterSource {
    fn name(&self) -> &'static str {
        NAME
    }

    fn table(&self) -> SeenTable {
        TABLE
    }

    async fn fetch(&self) -> Result<Vec<Box<dyn Item>>> {
        let Some(token) = self.bearer_token.as_deref().filter(|t| !t.is_empty()) else {
            warn!("No TWITTER_BEARER_TOKEN specified, skipping twitter");
            return Ok(Vec::new());
        };

        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| NotifierError::Config("TWITTER_BEARER_TOKEN is not a valid header value".to_string()))?;
        headers.insert(AUTHORIZATION, auth);

        let start_time = (Utc::now() - Duration::days(1)).to_rfc3339_opts(SecondsFormat::Secs, true);
        let query = [
            ("query", self.tag.clone()),
            ("max_results", MAX_RESULTS.to_string()),
            ("start_time", start_time),
            ("expansions", "author_id,entities.mentions.username,referenced_tweets.id".to_string()),
            ("tweet.fields", "created_at,conversation_id,attachments,lang".to_string()),
            ("user.fields", "name,username".to_string()),
        ];
        let response: SearchResponse = self.fetcher.get_json(API_URL, &query, headers).await?;

        let tweets = resolve(response);
        let total = tweets.len();
        let admitted: Vec<Tweet> = tweets
            .into_iter()
            .filter(|tweet| {
                let admitted = self.policy.admits(tweet);
                if !admitted {
                    debug!(tweet_id = %tweet.id, "Ignoring tweet");
                }
                admitted
            })
            .collect();
        info!(tweet_count = total, admitted_count = admitted.len(), "Fetched tweets");
        Ok(boxed(admitted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::decode_json;

    const RESPONSE: &str = r#"{
        "data": [
            {
                "id": "1724000000000000001",
                "text": "Finally moved my side project to dokku",
                "author_id": "11",
                "created_at": "2023-11-14T22:13:20.000Z",
                "lang": "en",
                "entities": {"mentions": [{"start": 0, "end": 6, "username": "DokkuFans", "id": "33"}]}
            },
            {
                "id": "1724000000000000002",
                "text": "RT @someone: dokku is great",
                "author_id": "22",
                "created_at": "2023-11-14T22:20:00.000Z",
                "lang": "en",
                "referenced_tweets": [{"type": "retweeted", "id": "1723"}]
            }
        ],
        "includes": {
            "users": [
                {"id": "11", "name": "Ana", "username": "ana_dev"},
                {"id": "22", "name": "Bo", "username": "bo"},
                {"id": "33", "name": "Dokku Fans", "username": "DokkuFans"}
            ]
        },
        "meta": {"result_count": 2}
    }"#;

    fn tweet(text: &str, lang: &str, author: &str) -> Tweet {
        Tweet {
            id: "1".to_string(),
            text: text.to_string(),
            created_at: None,
            lang: Some(lang.to_string()),
            author: User {
                id: "1".to_string(),
                name: author.to_string(),
                username: author.to_string(),
            },
            mentions: Vec::new(),
            is_retweet: false,
        }
    }

    fn policy() -> TweetPolicy {
        TweetPolicy {
            term: "dokku".to_string(),
            allow_words: vec!["heroku".to_string()],
            ignore_words: vec!["dooku".to_string(), "movie".to_string()],
            ignore_languages: vec!["ja".to_string()],
            ignore_authors: vec!["spammer".to_string()],
        }
    }

    #[test]
    fn resolves_authors_and_mentions() {
        let response: SearchResponse = decode_json(RESPONSE).unwrap();
        let tweets = resolve(response);

        assert_eq!(tweets[0].author.username, "ana_dev");
        assert_eq!(tweets[0].mentions[0].name, "Dokku Fans");
        assert!(!tweets[0].is_retweet);
        assert!(tweets[1].is_retweet);
        assert_eq!(tweets[0].link(), "https://twitter.com/ana_dev/status/1724000000000000001");
    }

    #[test]
    fn mentions_of_the_project_account_are_noise() {
        let response: SearchResponse = decode_json(RESPONSE).unwrap();
        let tweets = resolve(response);
        let policy = policy();

        assert!(!policy.admits(&tweets[0]));
        assert!(!policy.admits(&tweets[1]));
    }

    #[test]
    fn ignore_rules_reject() {
        let policy = policy();
        assert!(policy.admits(&tweet("deploying with dokku today", "en", "ana")));
        assert!(!policy.admits(&tweet("deploying with dokku today", "ja", "ana")));
        assert!(!policy.admits(&tweet("dokku the MOVIE", "en", "ana")));
        assert!(!policy.admits(&tweet("dokku", "en", "Spammer")));
        assert!(!policy.admits(&tweet("hello", "en", "dokku_official")));
    }

    #[test]
    fn allow_words_win_over_ignore_rules() {
        let policy = policy();
        let mut retweet = tweet("dokku or Heroku? movie night debate", "ja", "dokku_official");
        retweet.is_retweet = true;
        assert!(policy.admits(&retweet));
    }

    #[test]
    fn empty_response_decodes() {
        let response: SearchResponse = decode_json(r#"{"meta": {"result_count": 0}}"#).unwrap();
        assert!(resolve(response).is_empty());
    }

    #[tokio::test]
    async fn missing_token_skips_the_fetch() {
        let fetcher = Fetcher::new(&Default::default()).unwrap();
        let source = TwitterSource::new(fetcher, "dokku".to_string(), None, policy());
        assert!(source.fetch().await.unwrap().is_empty());
    }

    #[test]
    fn message_uses_tweet_text_as_title() {
        let response: SearchResponse = decode_json(RESPONSE).unwrap();
        let message = resolve(response)[0].to_message();
        assert_eq!(message.title.as_deref(), Some("Finally moved my side project to dokku"));
        assert_eq!(message.ts, 1_700_000_000);
        assert!(message.fields.is_empty());
    }
}
