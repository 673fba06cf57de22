use super::{boxed, Branding};
use crate::fetcher::{decode_json, ensure_success, fetch_all_pages, Fetcher};
use crate::traits::Source;
use crate::types::{Item, KeyKind, MessageField, MessageSpec, NaturalKey, NotifierError, Result, SeenTable};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{info, warn};

pub const NAME: &str = "github";

const API_URL: &str = "https://api.github.com/search/repositories";
const PAGE_SIZE: u32 = 100;

const TABLE: SeenTable = SeenTable {
    name: "github_repositories",
    key_column: "repository_id",
    key_kind: KeyKind::Integer,
};

const BRANDING: Branding = Branding {
    noun: "repository",
    site: "Github",
    footer: "Github Repository Notification",
    username: "Github Repository Notifications",
    icon_emoji: ":github:",
    icon_url: "https://emoji.slack-edge.com/T085AJH3L/github/eeab46c8e8ba02f7.png",
};

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    items: Vec<Repository>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryOwner {
    pub login: String,
    pub avatar_url: Option<String>,
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub id: i64,
    pub full_name: String,
    pub html_url: String,
    pub owner: RepositoryOwner,
    pub language: Option<String>,
    #[serde(default)]
    pub stargazers_count: u64,
    pub created_at: DateTime<Utc>,
}

impl Item for Repository {
    fn natural_key(&self) -> NaturalKey {
        NaturalKey::Int(self.id)
    }

    fn title(&self) -> String {
        self.full_name.clone()
    }

    fn to_message(&self) -> MessageSpec {
        let language = self.language.as_deref().filter(|l| !l.is_empty()).unwrap_or("unknown");

        let mut message = BRANDING.message(&self.html_url, self.owner.login.clone(), self.created_at.timestamp());
        message.author_link = self.owner.html_url.clone();
        message.author_icon = self.owner.avatar_url.clone();
        message.title = Some(self.full_name.clone());
        message.fields = vec![
            MessageField::short("Language", language),
            MessageField::short("Stars", self.stargazers_count.to_string()),
        ];
        message
    }
}

/// Repositories matching the search term, most recently updated first.
pub struct GithubSource {
    fetcher: Fetcher,
    tag: String,
    token: Option<String>,
}

impl GithubSource {
    pub fn new(fetcher: Fetcher, tag: String, token: Option<String>) -> Self {
        Self { fetcher, tag, token }
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        if let Some(token) = self.token.as_deref().filter(|t| !t.is_empty()) {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| NotifierError::Config("GITHUB_TOKEN is not a valid header value".to_string()))?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }

    async fn fetch_page(&self, page: u32) -> Result<Vec<Repository>> {
        let query = [
            ("q", self.tag.clone()),
            ("sort", "updated".to_string()),
            ("per_page", PAGE_SIZE.to_string()),
            ("page", page.to_string()),
        ];
        let response = self.fetcher.send(API_URL, &query, self.headers()?).await?;

        // Search stops serving results after the first 1000 matches and
        // answers further pages with 422.
        if response.status() == StatusCode::UNPROCESSABLE_ENTITY {
            warn!(page, "Search result window exhausted");
            return Ok(Vec::new());
        }

        let body = ensure_success(response).await?.text().await?;
        let page: SearchPage = decode_json(&body)?;
        Ok(page.items)
    }
}

#[async_trait]
impl Source for GithubSource {
    fn name(&self) -> &'static str {
        NAME
    }

    fn table(&self) -> SeenTable {
        TABLE
    }

    async fn fetch(&self) -> Result<Vec<Box<dyn Item>>> {
        let repositories = fetch_all_pages(1, |page| self.fetch_page(page)).await?;
        info!(repository_count = repositories.len(), "Fetched repositories");
        Ok(boxed(repositories))
    }
}
