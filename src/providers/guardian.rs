// src/providers/guardian.rs
// Guardian content API client. Credential-gated, keyword search only —
// there is no per-country endpoint, which the aggregator tolerates as a
// declared capability gap.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use crate::error::UpstreamError;
use crate::normalize::RawArticle;
use crate::providers::{parse_timespan, Capabilities, NewsProvider, SearchOptions};
use crate::ratelimit::RateLimiter;

const PROVIDER: &str = "guardian";
const BASE_URL: &str = "https://content.guardianapis.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const REQUESTS_PER_MINUTE: usize = 60;

pub struct GuardianClient {
    client: reqwest::Client,
    limiter: RateLimiter,
    base_url: String,
    api_key: String,
    max_articles: usize,
}

impl GuardianClient {
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
}

#[async_trait]
impl NewsProvider for GuardianClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            search: true,
            by_country: false,
        }
    }

    async fn search(
        &self,
        query: &str,
        opts: &SearchOptions,
    ) -> Result<Vec<RawArticle>, UpstreamError> {
        let client = self.client.clone();
        let url = format!("{}/search", self.base_url);

        let mut params = vec![
            ("q".to_string(), query.to_string()),
            ("api-key".to_string(), self.api_key.clone()),
            ("page-size".to_string(), self.max_articles.to_string()),
            ("order-by".to_string(), "newest".to_string()),
            (
                "show-fields".to_string(),
                "trailText,bodyText,thumbnail,byline".to_string(),
            ),
        ];
        if let Some(span) = parse_timespan(&opts.timespan) {
            let from = (Utc::now() - span).format("%Y-%m-%d").to_string();
            params.push(("from-date".to_string(), from));
        }

        self.limiter
            .submit(async move {
                let resp = client
                    .get(&url)
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

#[derive(Debug, Deserialize)]
struct GuardianEnvelope {
    response: GuardianResponse,
}

#[derive(Debug, Deserialize)]
struct GuardianResponse {
    status: String,
    #[serde(default)]
    results: Vec<GuardianItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GuardianItem {
    web_title: Option<String>,
    web_url: Option<String>,
    web_publication_date: Option<String>,
    fields: Option<GuardianFields>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GuardianFields {
    trail_text: Option<String>,
    body_text: Option<String>,
    thumbnail: Option<String>,
    byline: Option<String>,
}

fn parse_articles(body: &str) -> Result<Vec<RawArticle>, UpstreamError> {
    let parsed: GuardianEnvelope =
        serde_json::from_str(body).map_err(|e| UpstreamError::BadPayload {
            provider: PROVIDER,
            message: e.to_string(),
        })?;

    if parsed.response.status != "ok" {
        return Err(UpstreamError::Http {
            provider: PROVIDER,
            message: format!("status {}", parsed.response.status),
        });
    }

    Ok(parsed
        .response
        .results
        .into_iter()
        .map(|item| {
            let fields = item.fields.unwrap_or(GuardianFields {
                trail_text: None,
                body_text: None,
                thumbnail: None,
                byline: None,
            });
            RawArticle {
                title: item.web_title,
                description: fields.trail_text,
                content: fields.body_text,
                url: item.web_url,
                published_at: item.web_publication_date,
                source_name: Some("The Guardian".to_string()),
                author: fields.byline,
                image_url: fields.thumbnail,
            }
        })
        .collect())
}

fn upstream_message(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrEnvelope {
        response: Option<ErrResponse>,
        message: Option<String>,
    }
    #[derive(Deserialize)]
    struct ErrResponse {
        message: Option<String>,
    }
    let parsed: ErrEnvelope = serde_json::from_str(body).ok()?;
    parsed.response.and_then(|r| r.message).or(parsed.message)
}
