// src/providers/gdelt.rs
// GDELT DOC 2.0 client. Keyless, so it is always configured — and flaky
// enough that it is the one provider wrapped in a circuit breaker on top
// of the shared admission control.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::breaker::{BreakerConfig, CircuitBreaker};
use crate::error::UpstreamError;
use crate::normalize::RawArticle;
use crate::providers::{Capabilities, CountryOptions, NewsProvider, SearchOptions};
use crate::ratelimit::RateLimiter;

const PROVIDER: &str = "gdelt";
const BASE_URL: &str = "https://api.gdeltproject.org/api/v2/doc/doc";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const REQUESTS_PER_MINUTE: usize = 30;

pub struct GdeltClient {
    client: reqwest::Client,
    limiter: RateLimiter,
    breaker: CircuitBreaker,
    base_url: String,
    max_articles: usize,
}

impl GdeltClient {
    pub fn new(max_articles: usize) -> Self {
        Self::with_base_url(BASE_URL.to_string(), max_articles)
    }

    pub fn with_base_url(base_url: String, max_articles: usize) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent("newsmap-core")
            .build()
            .expect("failed to build http client");
        Self {
            client,
            limiter: RateLimiter::new(REQUESTS_PER_MINUTE),
            breaker: CircuitBreaker::new(PROVIDER, BreakerConfig::default()),
            base_url,
            max_articles,
        }
    }

    async fn fetch(&self, query: String, timespan: String) -> Result<Vec<RawArticle>, UpstreamError> {
        let client = self.client.clone();
        let url = self.base_url.clone();
        let max = self.max_articles.to_string();

        // Breaker outside the limiter: an open circuit fails fast without
        // consuming a rate-window slot.
        self.breaker
            .call(self.limiter.submit(async move {
                let resp = client
                    .get(&url)
                    .query(&[
                        ("query", query.as_str()),
                        ("mode", "artlist"),
                        ("format", "json"),
                        ("maxrecords", &max),
                        ("timespan", &timespan),
                        ("sort", "datedesc"),
                    ])
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
                        message: format!("HTTP {status}: {}", snippet(&body)),
                    });
                }
                parse_articles(&body)
            }))
            .await
    }
}

#[async_trait]
impl NewsProvider for GdeltClient {
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
        let mut q = query.to_string();
        if let Some(lang) = source_lang(&opts.language) {
            q.push_str(&format!(" sourcelang:{lang}"));
        }
        self.fetch(q, opts.timespan.clone()).await
    }

    async fn by_country(
        &self,
        country: &str,
        opts: &CountryOptions,
    ) -> Result<Vec<RawArticle>, UpstreamError> {
        self.fetch(format!("sourcecountry:{country}"), opts.timespan.clone())
            .await
    }
}

#[derive(Debug, Deserialize)]
struct GdeltResponse {
    #[serde(default)]
    articles: Vec<GdeltArticle>,
}

#[derive(Debug, Deserialize)]
struct GdeltArticle {
    url: Option<String>,
    title: Option<String>,
    seendate: Option<String>,
    socialimage: Option<String>,
    domain: Option<String>,
}

/// GDELT answers some malformed queries with 200 + a plain-text message,
/// so a JSON parse failure is a payload error, not a transport one.
fn parse_articles(body: &str) -> Result<Vec<RawArticle>, UpstreamError> {
    let parsed: GdeltResponse =
        serde_json::from_str(body).map_err(|_| UpstreamError::BadPayload {
            provider: PROVIDER,
            message: snippet(body),
        })?;

    Ok(parsed
        .articles
        .into_iter()
        .map(|a| RawArticle {
            title: a.title,
            url: a.url,
            published_at: a.seendate,
            image_url: a.socialimage,
            source_name: a.domain,
            ..Default::default()
        })
        .collect())
}

/// ISO-639-1 codes GDELT knows by full name.
fn source_lang(code: &str) -> Option<&'static str> {
    match code.to_ascii_lowercase().as_str() {
        "en" => Some("english"),
        "fr" => Some("french"),
        "de" => Some("german"),
        "es" => Some("spanish"),
        "ar" => Some("arabic"),
        "ru" => Some("russian"),
        "zh" => Some("chinese"),
        "pt" => Some("portuguese"),
        _ => None,
    }
}

fn snippet(body: &str) -> String {
    body.chars().take(200).collect::<String>().trim().to_string()
}
