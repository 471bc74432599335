// src/config.rs
// Environment-driven configuration. Missing optional credentials disable
// the corresponding provider instead of erroring.

use std::env;

const DEFAULT_MAX_ARTICLES: usize = 50;
const MAX_ARTICLES_CEILING: usize = 100;

#[derive(Debug, Clone)]
pub struct Config {
    /// NewsAPI credential; `None` disables the provider.
    pub newsapi_key: Option<String>,
    /// Guardian content API credential; `None` disables the provider.
    pub guardian_key: Option<String>,
    /// Upper bound on articles requested from each provider per call.
    pub max_articles_per_source: usize,
    /// HTTP server port.
    pub server_port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// - `NEWSAPI_API_KEY` — optional NewsAPI credential
    /// - `GUARDIAN_API_KEY` — optional Guardian credential
    /// - `MAX_ARTICLES_PER_SOURCE` — per-provider result cap (default 50, clamped 1..=100)
    /// - `SERVER_PORT` — listen port (default 3000)
    pub fn from_env() -> Self {
        Self {
            newsapi_key: non_empty_var("NEWSAPI_API_KEY"),
            guardian_key: non_empty_var("GUARDIAN_API_KEY"),
            max_articles_per_source: env::var("MAX_ARTICLES_PER_SOURCE")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(clamp_max_articles)
                .unwrap_or(DEFAULT_MAX_ARTICLES),
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            newsapi_key: None,
            guardian_key: None,
            max_articles_per_source: DEFAULT_MAX_ARTICLES,
            server_port: 3000,
        }
    }
}

/// Out-of-range caps are clamped to a safe range rather than rejected.
pub fn clamp_max_articles(n: usize) -> usize {
    n.clamp(1, MAX_ARTICLES_CEILING)
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}
