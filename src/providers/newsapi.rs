// src/providers/newsapi.rs
// NewsAPI.org client. Credential-gated: only instantiated when a key is
// configured. Supports keyword search (/v2/everything) and country
// headlines (/v2/top-headlines).

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use crate::error::UpstreamError;
use crate::normalize::RawArticle;
use crate::providers::{parse_timespan, Capabilities, CountryOptions, NewsProvider, SearchOptions};
use crate::ratelimit::RateLimiter;

const PROVIDER: &str = "newsapi";
const BASE_URL: &str = "https://newsapi.org/v2";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const REQUESTS_PER_MINUTE: usize = 20;

pub struct NewsApiClient {
    client: reqwest::Client,
    limiter: RateLimiter,
    base_url: String,
    api_key: String,
    max_articles: usize,
}

impl NewsApiClient {
    pub fn new(api_key: String, max_articles: usize) -> Self {
        Self::with_base_url(BASE_URL.to_string(), api_key, max_articles)
    }

    pub fn with_base_url(base_url: String, api_key: String, max_articles: usize) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent("newsmap-core")
            .build()
            .expect("failed to build http client");
        Self {
            client,
            limiter: RateLimiter::new(REQUESTS_PER_MINUTE),
            base_url,
            api_key,
            max_articles,
        }
    }

    async fn fetch(
        &self,
        path: &str,
        params: Vec<(String, String)>,
    ) -> Result<Vec<RawArticle>, UpstreamError> {
        let client = self.client.clone();
        let url = format!("{}/{path}", self.base_url);
        let key = self.api_key.clone();

        self.limiter
            .submit(async move {
                let resp = client
                    .get(&url)
                    .header("X-Api-Key", key)
                    .query(&params)
                    .send()
                    .await
                    .map_err(|e| UpstreamError::http(PROVIDER, &e))?;

                let status = resp.status();
                let body = resp
                    .text()
                    .await
                    .map_err(|e| UpstreamError::http(PROVIDER, &e))?;
                if !status.is_success() {
                    return Err(UpstreamError::Http {
                        provider: PROVIDER,
                        message: upstream_message(&body)
                            .unwrap_or_else(|| format!("HTTP {status}")),
                    });
                }
                parse_articles(&body)
            })
            .await
    }
}

#[async_trait]
impl NewsProvider for NewsApiClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            search: true,
            by_country: true,
        }
    }

    async fn search(
        &self,
        query: &str,
        opts: &SearchOptions,
    ) -> Result<Vec<RawArticle>, UpstreamError> {
        let mut params = vec![
            ("q".to_string(), query.to_string()),
            ("language".to_string(), opts.language.clone()),
            ("pageSize".to_string(), self.max_articles.to_string()),
            ("sortBy".to_string(), "publishedAt".to_string()),
        ];
        // NewsAPI wants an absolute lower bound instead of a timespan.
        if let Some(span) = parse_timespan(&opts.timespan) {
            let from = (Utc::now() - span).format("%Y-%m-%dT%H:%M:%S").to_string();
            params.push(("from".to_string(), from));
        }
        self.fetch("everything", params).await
    }

    async fn by_country(
        &self,
        country: &str,
        _opts: &CountryOptions,
    ) -> Result<Vec<RawArticle>, UpstreamError> {
        // top-headlines has no date filter; recency is implicit.
        let params = vec![
            ("country".to_string(), country.to_ascii_lowercase()),
            ("pageSize".to_string(), self.max_articles.to_string()),
        ];
        self.fetch("top-headlines", params).await
    }
}

#[derive(Debug, Deserialize)]
struct NewsApiResponse {
    status: String,
    message: Option<String>,
    #[serde(default)]
    articles: Vec<NewsApiArticle>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewsApiArticle {
    source: Option<NewsApiSource>,
    author: Option<String>,
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    url_to_image: Option<String>,
    published_at: Option<String>,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NewsApiSource {
    name: Option<String>,
}

fn parse_articles(body: &str) -> Result<Vec<RawArticle>, UpstreamError> {
    let parsed: NewsApiResponse =
        serde_json::from_str(body).map_err(|e| UpstreamError::BadPayload {
            provider: PROVIDER,
            message: e.to_string(),
        })?;

    // NewsAPI reports application errors in-band with status "error".
    if parsed.status != "ok" {
        return Err(UpstreamError::Http {
            provider: PROVIDER,
            message: parsed
                .message
                .unwrap_or_else(|| format!("status {}", parsed.status)),
        });
    }

    Ok(parsed
        .articles
        .into_iter()
        .map(|a| RawArticle {
            title: a.title,
            description: a.description,
            content: a.content,
            url: a.url,
            published_at: a.published_at,
            source_name: a.source.and_then(|s| s.name),
            author: a.author,
            image_url: a.url_to_image,
        })
        .collect())
}

/// Pull the upstream's own message out of an error body, if present.
fn upstream_message(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrBody {
        message: Option<String>,
    }
    serde_json::from_str::<ErrBody>(body).ok()?.message
}
