// src/providers/mod.rs
// Uniform contract over heterogeneous upstream news APIs. Each client
// returns shape-normalized `RawArticle`s; capability gaps (no country
// endpoint, say) are declared, not faked.

pub mod gdelt;
pub mod guardian;
pub mod newsapi;

use async_trait::async_trait;
use chrono::Duration;

use crate::error::UpstreamError;
use crate::normalize::RawArticle;

pub const DEFAULT_SEARCH_TIMESPAN: &str = "3d";
pub const DEFAULT_COUNTRY_TIMESPAN: &str = "1d";

#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    pub search: bool,
    pub by_country: bool,
}

/// Options for keyword search. A typed allow-list: callers cannot smuggle
/// unknown fields, and construction normalizes out-of-range values.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub language: String,
    pub timespan: String,
}

impl SearchOptions {
    pub fn new(language: Option<String>, timespan: Option<String>) -> Self {
        Self {
            language: language
                .filter(|l| !l.trim().is_empty())
                .unwrap_or_else(|| "en".to_string()),
            timespan: valid_timespan(timespan, DEFAULT_SEARCH_TIMESPAN),
        }
    }
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone)]
pub struct CountryOptions {
    pub timespan: String,
}

impl CountryOptions {
    pub fn new(timespan: Option<String>) -> Self {
        Self {
            timespan: valid_timespan(timespan, DEFAULT_COUNTRY_TIMESPAN),
        }
    }
}

impl Default for CountryOptions {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Malformed timespans are replaced by the default rather than erroring.
fn valid_timespan(raw: Option<String>, default: &str) -> String {
    raw.filter(|s| parse_timespan(s).is_some())
        .unwrap_or_else(|| default.to_string())
}

/// Parse shorthand like "3d", "12h", "30m" into a duration. Providers
/// that need an absolute lower bound (NewsAPI, Guardian) derive a
/// `from` date from this.
pub fn parse_timespan(s: &str) -> Option<Duration> {
    // Split on chars, not bytes: the unit may be any user-supplied
    // character, including a multibyte one.
    let mut chars = s.trim().chars();
    let unit = chars.next_back()?;
    let n: i64 = chars.as_str().parse().ok().filter(|n| *n > 0)?;
    match unit {
        'd' => Some(Duration::days(n)),
        'h' => Some(Duration::hours(n)),
        'm' => Some(Duration::minutes(n)),
        _ => None,
    }
}

/// One upstream news provider behind its admission control.
///
/// Default method bodies encode capability gaps: a provider only
/// overrides the operations it actually supports, and the aggregator
/// consults `capabilities()` before dispatching.
#[async_trait]
pub trait NewsProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> Capabilities;

    async fn search(
        &self,
        query: &str,
        opts: &SearchOptions,
    ) -> Result<Vec<RawArticle>, UpstreamError> {
        let _ = (query, opts);
        Err(UpstreamError::Unsupported {
            provider: self.name(),
            capability: "search",
        })
    }

    async fn by_country(
        &self,
        country: &str,
        opts: &CountryOptions,
    ) -> Result<Vec<RawArticle>, UpstreamError> {
        let _ = (country, opts);
        Err(UpstreamError::Unsupported {
            provider: self.name(),
            capability: "by_country",
        })
    }

    /// Minimal liveness probe, routed through the same admission path as
    /// real traffic.
    async fn health_check(&self) -> Result<(), UpstreamError> {
        self.search("news", &SearchOptions::default())
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timespan_shorthand_parses() {
        assert_eq!(parse_timespan("3d"), Some(Duration::days(3)));
        assert_eq!(parse_timespan("12h"), Some(Duration::hours(12)));
        assert_eq!(parse_timespan("30m"), Some(Duration::minutes(30)));
        assert_eq!(parse_timespan("abc"), None);
        assert_eq!(parse_timespan("0d"), None);
        assert_eq!(parse_timespan(""), None);
    }

    #[test]
    fn multibyte_timespan_is_rejected_not_panicking() {
        // "3日" ends on a multibyte char; must come back None, not panic.
        assert_eq!(parse_timespan("3\u{65e5}"), None);
        assert_eq!(parse_timespan("\u{65e5}"), None);
        assert_eq!(parse_timespan("3\u{65e5}d"), None);

        let opts = SearchOptions::new(None, Some("3\u{65e5}".into()));
        assert_eq!(opts.timespan, DEFAULT_SEARCH_TIMESPAN);
    }

    #[test]
    fn malformed_timespan_falls_back_to_default() {
        let opts = SearchOptions::new(None, Some("next tuesday".into()));
        assert_eq!(opts.timespan, DEFAULT_SEARCH_TIMESPAN);
        let opts = CountryOptions::new(Some("2x".into()));
        assert_eq!(opts.timespan, DEFAULT_COUNTRY_TIMESPAN);
    }

    #[test]
    fn defaults_match_documented_values() {
        let s = SearchOptions::default();
        assert_eq!(s.language, "en");
        assert_eq!(s.timespan, "3d");
        let c = CountryOptions::default();
        assert_eq!(c.timespan, "1d");
    }
}
