// tests/aggregate_fanout.rs
//
// Fan-out behavior of the aggregator against stub providers:
// - partial failure isolation (one provider down, result still 200)
// - merge/dedup across providers sharing an article URL
// - cache hits skipping upstream dispatch
// - capability gaps tolerated on country aggregation
// - per-upstream health probe surfacing DEGRADED

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use tower::ServiceExt as _;

use newsmap_core::error::UpstreamError;
use newsmap_core::normalize::RawArticle;
use newsmap_core::providers::{Capabilities, CountryOptions, NewsProvider, SearchOptions};
use newsmap_core::{api::AppState, router, NewsAggregator};

enum Behavior {
    Articles(Vec<RawArticle>),
    Fail(&'static str),
}

struct MockProvider {
    name: &'static str,
    caps: Capabilities,
    behavior: Behavior,
    calls: Arc<AtomicUsize>,
}

impl MockProvider {
    fn searching(name: &'static str, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            name,
            caps: Capabilities {
                search: true,
                by_country: true,
            },
            behavior,
            calls: Arc::new(AtomicUsize::new(0)),
        })
    }

    fn respond(&self) -> Result<Vec<RawArticle>, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Articles(items) => Ok(items.clone()),
            Behavior::Fail(message) => Err(UpstreamError::Http {
                provider: self.name,
                message: (*message).to_string(),
            }),
        }
    }
}

#[async_trait]
impl NewsProvider for MockProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn capabilities(&self) -> Capabilities {
        self.caps
    }

    async fn search(
        &self,
        _query: &str,
        _opts: &SearchOptions,
    ) -> Result<Vec<RawArticle>, UpstreamError> {
        self.respond()
    }

    async fn by_country(
        &self,
        _country: &str,
        _opts: &CountryOptions,
    ) -> Result<Vec<RawArticle>, UpstreamError> {
        self.respond()
    }
}

fn raw(title: &str, url: &str, published_at: &str) -> RawArticle {
    RawArticle {
        title: Some(title.to_string()),
        url: Some(url.to_string()),
        published_at: Some(published_at.to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn syria_scenario_merges_dedupes_and_isolates_failure() {
    // alpha: 3 articles, one sharing beta's URL. beta: 2 articles.
    // gamma: times out on every call.
    let alpha = MockProvider::searching(
        "alpha",
        Behavior::Articles(vec![
            raw("Syria talks resume", "https://alpha.example/a", "2024-08-17T10:00:00Z"),
            raw("Aid reaches Damascus", "https://alpha.example/b", "2024-08-17T09:00:00Z"),
            raw("Shared wire story", "https://shared.example/x", "2024-08-17T08:00:00Z"),
        ]),
    );
    let beta = MockProvider::searching(
        "beta",
        Behavior::Articles(vec![
            raw("Shared wire story", "https://shared.example/x", "2024-08-17T08:30:00Z"),
            raw("Border crossings reopen", "https://beta.example/y", "2024-08-17T07:00:00Z"),
        ]),
    );
    let gamma = MockProvider::searching("gamma", Behavior::Fail("request timed out"));

    let aggregator = NewsAggregator::new(vec![alpha, beta, gamma]);
    let result = aggregator
        .aggregate_by_query("syria", &SearchOptions::default())
        .await;

    assert_eq!(result.articles.len(), 4);
    assert_eq!(result.sources, vec!["alpha".to_string(), "beta".to_string()]);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].source, "gamma");
    assert!(result.errors[0].message.contains("request timed out"));
    assert_eq!(result.metadata.total_sources, 3);
    assert_eq!(result.metadata.successful_sources, 2);

    // Exactly one copy of the shared URL survives the merge.
    let shared: Vec<_> = result
        .articles
        .iter()
        .filter(|a| a.url.as_deref() == Some("https://shared.example/x"))
        .collect();
    assert_eq!(shared.len(), 1);

    // Descending publish order.
    let times: Vec<_> = result.articles.iter().map(|a| a.published_at).collect();
    assert!(times.windows(2).all(|w| w[0] >= w[1]));
}

#[tokio::test]
async fn all_providers_failing_still_yields_a_result() {
    let a = MockProvider::searching("a", Behavior::Fail("boom"));
    let b = MockProvider::searching("b", Behavior::Fail("also boom"));
    let aggregator = NewsAggregator::new(vec![a, b]);

    let result = aggregator
        .aggregate_by_query("anything", &SearchOptions::default())
        .await;
    assert!(result.articles.is_empty());
    assert!(result.sources.is_empty());
    assert_eq!(result.errors.len(), 2);
    assert_eq!(result.metadata.successful_sources, 0);
}

#[tokio::test]
async fn second_identical_query_is_served_from_cache() {
    let provider = MockProvider::searching(
        "solo",
        Behavior::Articles(vec![raw(
            "One story",
            "https://solo.example/a",
            "2024-08-17T10:00:00Z",
        )]),
    );
    let calls = Arc::clone(&provider.calls);
    let aggregator = NewsAggregator::new(vec![provider]);
    let opts = SearchOptions::default();

    let first = aggregator.aggregate_by_query("syria", &opts).await;
    let second = aggregator.aggregate_by_query("syria", &opts).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1, "cache hit must not dispatch");
    assert_eq!(first.articles.len(), second.articles.len());
    assert_eq!(first.metadata.timestamp, second.metadata.timestamp);
}

#[tokio::test]
async fn country_aggregation_skips_search_only_providers() {
    let full = MockProvider::searching(
        "full",
        Behavior::Articles(vec![raw(
            "Local headline",
            "https://full.example/a",
            "2024-08-17T10:00:00Z",
        )]),
    );
    let search_only = Arc::new(MockProvider {
        name: "searchonly",
        caps: Capabilities {
            search: true,
            by_country: false,
        },
        behavior: Behavior::Articles(vec![]),
        calls: Arc::new(AtomicUsize::new(0)),
    });
    let gap_calls = Arc::clone(&search_only.calls);

    let aggregator = NewsAggregator::new(vec![full, search_only]);
    let result = aggregator
        .aggregate_by_country("FR", &CountryOptions::default())
        .await;

    assert_eq!(result.metadata.total_sources, 1);
    assert_eq!(result.sources, vec!["full".to_string()]);
    assert_eq!(gap_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn partial_failure_is_200_at_the_http_layer() {
    let ok = MockProvider::searching(
        "ok",
        Behavior::Articles(vec![raw(
            "Works fine",
            "https://ok.example/a",
            "2024-08-17T10:00:00Z",
        )]),
    );
    let broken = MockProvider::searching("broken", Behavior::Fail("connection refused"));
    let state = AppState::new(NewsAggregator::new(vec![ok, broken]));
    let app = router(state);

    let req = Request::builder()
        .method("GET")
        .uri("/api/news/search?q=syria")
        .body(Body::empty())
        .expect("build request");
    let resp = app.oneshot(req).await.expect("oneshot");
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    let v: serde_json::Value = serde_json::from_slice(&bytes).expect("parse json");
    assert_eq!(v["articles"].as_array().unwrap().len(), 1);
    assert_eq!(v["errors"].as_array().unwrap().len(), 1);
    assert_eq!(v["errors"][0]["source"], "broken");
}

#[tokio::test]
async fn failing_provider_degrades_news_health() {
    let ok = MockProvider::searching("ok", Behavior::Articles(vec![]));
    let broken = MockProvider::searching("broken", Behavior::Fail("unreachable"));
    let state = AppState::new(NewsAggregator::new(vec![ok, broken]));
    let app = router(state);

    let req = Request::builder()
        .method("GET")
        .uri("/api/health/news")
        .body(Body::empty())
        .expect("build request");
    let resp = app.oneshot(req).await.expect("oneshot");
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

    let bytes = body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    let v: serde_json::Value = serde_json::from_slice(&bytes).expect("parse json");
    assert_eq!(v["status"], "DEGRADED");
    let services = v["services"].as_array().unwrap();
    assert_eq!(services.len(), 2);
    let down = services.iter().find(|s| s["service"] == "broken").unwrap();
    assert_eq!(down["status"], "down");
    assert!(down["error"].as_str().unwrap().contains("unreachable"));
}
