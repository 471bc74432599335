// src/aggregator.rs
// Fans one logical query out to every configured provider, settles all
// outcomes without letting one failure abort the rest, then merges,
// dedupes, sorts and caches the unified result.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinSet;

use crate::cache::{cache_key, TtlCache};
use crate::config::Config;
use crate::error::UpstreamError;
use crate::normalize::{normalize, CanonicalArticle, RawArticle};
use crate::providers::{
    gdelt::GdeltClient, guardian::GuardianClient, newsapi::NewsApiClient, CountryOptions,
    NewsProvider, SearchOptions,
};

/// Final bound on the merged list, independent of per-provider caps.
const MAX_MERGED_ARTICLES: usize = 200;
const SEARCH_TTL: Duration = Duration::from_secs(5 * 60);
const COUNTRY_TTL: Duration = Duration::from_secs(10 * 60);

/// Every provider this build knows how to talk to, configured or not.
pub const AVAILABLE_SOURCES: &[&str] = &["gdelt", "guardian", "newsapi"];

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SourceError {
    pub source: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub total_sources: usize,
    pub successful_sources: usize,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of one aggregation. Partial upstream failure is not an error:
/// it shows up in `errors` while `articles` carries whatever succeeded.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateResult {
    pub articles: Vec<CanonicalArticle>,
    pub sources: Vec<String>,
    pub errors: Vec<SourceError>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceHealth {
    pub service: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceListing {
    pub available: Vec<String>,
    pub configured: Vec<String>,
}

type Outcome = (&'static str, Result<Vec<RawArticle>, UpstreamError>);

pub struct NewsAggregator {
    providers: Vec<Arc<dyn NewsProvider>>,
    cache: TtlCache<AggregateResult>,
}

impl NewsAggregator {
    pub fn new(providers: Vec<Arc<dyn NewsProvider>>) -> Self {
        Self {
            providers,
            cache: TtlCache::new(),
        }
    }

    /// Instantiate every provider the configuration allows. GDELT needs
    /// no credential and is always present; the others are silently
    /// skipped when their key is absent.
    pub fn from_config(config: &Config) -> Self {
        let cap = config.max_articles_per_source;
        let mut providers: Vec<Arc<dyn NewsProvider>> = vec![Arc::new(GdeltClient::new(cap))];

        if let Some(key) = &config.newsapi_key {
            providers.push(Arc::new(NewsApiClient::new(key.clone(), cap)));
        }
        if let Some(key) = &config.guardian_key {
            providers.push(Arc::new(GuardianClient::new(key.clone(), cap)));
        }

        let names: Vec<_> = providers.iter().map(|p| p.name()).collect();
        tracing::info!(providers = ?names, "news providers configured");
        Self::new(providers)
    }

    pub async fn aggregate_by_query(&self, query: &str, opts: &SearchOptions) -> AggregateResult {
        let key = cache_key(
            "search",
            &[
                ("q", query),
                ("language", &opts.language),
                ("timespan", &opts.timespan),
            ],
        );
        if let Some(hit) = self.cache.get(&key) {
            tracing::debug!(key, "aggregate cache hit");
            return hit;
        }

        let mut set = JoinSet::new();
        let mut dispatched = 0;
        for provider in &self.providers {
            if !provider.capabilities().search {
                continue;
            }
            dispatched += 1;
            let provider = Arc::clone(provider);
            let query = query.to_string();
            let opts = opts.clone();
            set.spawn(async move {
                let outcome = provider.search(&query, &opts).await;
                (provider.name(), outcome)
            });
        }

        let result = Self::settle_and_merge(set, dispatched).await;
        self.cache.set(key, result.clone(), SEARCH_TTL);
        result
    }

    pub async fn aggregate_by_country(
        &self,
        country: &str,
        opts: &CountryOptions,
    ) -> AggregateResult {
        let key = cache_key("country", &[("country", country), ("timespan", &opts.timespan)]);
        if let Some(hit) = self.cache.get(&key) {
            tracing::debug!(key, "aggregate cache hit");
            return hit;
        }

        let mut set = JoinSet::new();
        let mut dispatched = 0;
        for provider in &self.providers {
            if !provider.capabilities().by_country {
                continue;
            }
            dispatched += 1;
            let provider = Arc::clone(provider);
            let country = country.to_string();
            let opts = opts.clone();
            set.spawn(async move {
                let outcome = provider.by_country(&country, &opts).await;
                (provider.name(), outcome)
            });
        }

        let result = Self::settle_and_merge(set, dispatched).await;
        self.cache.set(key, result.clone(), COUNTRY_TTL);
        result
    }

    /// Wait for every dispatched call to settle, tag each outcome with
    /// its source, normalize successful batches best-effort and merge.
    async fn settle_and_merge(mut set: JoinSet<Outcome>, dispatched: usize) -> AggregateResult {
        let mut articles = Vec::new();
        let mut sources = Vec::new();
        let mut errors = Vec::new();

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((name, Ok(batch))) => {
                    for raw in batch {
                        match normalize(raw, name) {
                            Ok(article) => articles.push(article),
                            // A malformed single article never aborts the batch.
                            Err(e) => {
                                tracing::debug!(provider = name, error = %e, "skipping article")
                            }
                        }
                    }
                    sources.push(name.to_string());
                }
                Ok((name, Err(e))) => {
                    tracing::warn!(provider = name, error = %e, "provider error");
                    errors.push(SourceError {
                        source: name.to_string(),
                        message: e.to_string(),
                    });
                }
                Err(e) => {
                    tracing::error!(error = ?e, "provider task failed to join");
                }
            }
        }

        // Completion order is nondeterministic; keep the output stable.
        sources.sort();
        errors.sort_by(|a, b| a.source.cmp(&b.source));

        let successful = sources.len();
        AggregateResult {
            articles: merge_articles(articles),
            sources,
            errors,
            metadata: Metadata {
                total_sources: dispatched,
                successful_sources: successful,
                timestamp: Utc::now(),
            },
        }
    }

    /// Probe every configured provider concurrently.
    pub async fn check_health(&self) -> Vec<ServiceHealth> {
        let mut set = JoinSet::new();
        for provider in &self.providers {
            let provider = Arc::clone(provider);
            set.spawn(async move { (provider.name(), provider.health_check().await) });
        }

        let mut services = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((name, Ok(()))) => services.push(ServiceHealth {
                    service: name.to_string(),
                    status: "up",
                    error: None,
                }),
                Ok((name, Err(e))) => services.push(ServiceHealth {
                    service: name.to_string(),
                    status: "down",
                    error: Some(e.to_string()),
                }),
                Err(e) => tracing::error!(error = ?e, "health probe task failed to join"),
            }
        }
        services.sort_by(|a, b| a.service.cmp(&b.service));
        services
    }

    pub fn sources(&self) -> SourceListing {
        SourceListing {
            available: AVAILABLE_SOURCES.iter().map(|s| s.to_string()).collect(),
            configured: self.providers.iter().map(|p| p.name().to_string()).collect(),
        }
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn clear_cache(&self) -> usize {
        self.cache.clear()
    }
}

/// Drop url-less entries, dedupe by exact url (first occurrence wins),
/// sort descending by publish date, truncate to the global cap.
fn merge_articles(articles: Vec<CanonicalArticle>) -> Vec<CanonicalArticle> {
    let mut seen = std::collections::HashSet::new();
    let mut merged: Vec<CanonicalArticle> = articles
        .into_iter()
        .filter(|a| match &a.url {
            Some(url) => seen.insert(url.clone()),
            None => false,
        })
        .collect();

    merged.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    merged.truncate(MAX_MERGED_ARTICLES);
    merged
}
