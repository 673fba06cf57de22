use crate::types::{FetchConfig, NotifierError, Result};
use reqwest::header::HeaderMap;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::future::Future;
use tracing::{debug, info};
use url::Url;

/// Thin wrapper around one shared `reqwest::Client`. Every source issues its
/// requests through here so the user agent and timeout are applied uniformly.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout())
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()?;

        Ok(Self { client })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// GET `url` with `query` appended and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)], headers: HeaderMap) -> Result<T> {
        let response = self.send(url, query, headers).await?;
        let response = ensure_success(response).await?;
        let body = response.text().await?;
        decode_json(&body)
    }

    /// GET `url` and return the raw body text.
    pub async fn get_text(&self, url: &str, query: &[(&str, String)], headers: HeaderMap) -> Result<String> {
        let response = self.send(url, query, headers).await?;
        let response = ensure_success(response).await?;
        let content = response.text().await?;
        info!("Fetched {} ({} bytes)", url, content.len());
        Ok(content)
    }

    /// GET without the status check, for callers that give some non-2xx
    /// statuses a meaning of their own.
    pub async fn send(&self, url: &str, query: &[(&str, String)], headers: HeaderMap) -> Result<Response> {
        let url = Url::parse_with_params(url, query.iter().map(|(k, v)| (*k, v.as_str())))?;
        debug!(url = %url, "GET");
        let response = self.client.get(url).headers(headers).send().await?;
        Ok(response)
    }
}

/// Turns a non-2xx response into `UpstreamStatus`, keeping a prefix of the
/// body for the log line.
pub async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    Err(upstream_status(url, status, &body))
}

pub fn upstream_status(url: String, status: StatusCode, body: &str) -> NotifierError {
    NotifierError::UpstreamStatus {
        url,
        status: status.as_u16(),
        body: body.chars().take(200).collect(),
    }
}

pub fn decode_json<T: DeserializeOwned>(body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| NotifierError::Decode(e.to_string()))
}

/// Requests numbered pages starting at `first_page` until one comes back
/// empty. There is no upper bound: the upstream is trusted to run dry.
pub async fn fetch_all_pages<T, F, Fut>(first_page: u32, mut fetch_page: F) -> Result<Vec<T>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
{
    let mut results = Vec::new();
    let mut page = first_page;
    loop {
        info!(page, "Fetching page");
        let items = fetch_page(page).await?;
        if items.is_empty() {
            break;
        }
        results.extend(items);
        page += 1;
    }
    Ok(results)
}
