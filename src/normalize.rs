// src/normalize.rs
// Converts provider-shaped article records into one canonical, sanitized
// form. Location tagging is a fixed keyword match against a hard-coded
// gazetteer, not geocoding.

use chrono::{DateTime, NaiveDateTime, Utc};
use once_cell::sync::OnceCell;
use serde::Serialize;
use thiserror::Error;

/// Shape-normalized intermediate produced by every upstream client, so
/// the aggregator never branches on provider identity to find fields.
#[derive(Debug, Clone, Default)]
pub struct RawArticle {
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub url: Option<String>,
    pub published_at: Option<String>,
    pub source_name: Option<String>,
    pub author: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArticleSource {
    pub name: String,
    pub origin_provider: String,
}

/// Unified article record. Immutable once produced; the aggregator only
/// filters and sorts these.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalArticle {
    pub title: String,
    pub description: String,
    pub content: String,
    pub url: Option<String>,
    pub published_at: DateTime<Utc>,
    pub source: ArticleSource,
    pub author: Option<String>,
    pub image_url: Option<String>,
    pub locations: Vec<String>,
}

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("article has neither title nor link")]
    Empty,
}

/// Place names matched against title+description. Keyword membership
/// only; "Georgia" the state will happily tag as the country.
const GAZETTEER: &[&str] = &[
    "afghanistan",
    "argentina",
    "australia",
    "brazil",
    "canada",
    "china",
    "colombia",
    "egypt",
    "ethiopia",
    "france",
    "germany",
    "greece",
    "haiti",
    "india",
    "indonesia",
    "iran",
    "iraq",
    "israel",
    "italy",
    "japan",
    "kenya",
    "lebanon",
    "libya",
    "mexico",
    "myanmar",
    "nigeria",
    "north korea",
    "pakistan",
    "palestine",
    "philippines",
    "poland",
    "russia",
    "saudi arabia",
    "somalia",
    "south africa",
    "south korea",
    "spain",
    "sudan",
    "syria",
    "taiwan",
    "turkey",
    "ukraine",
    "united kingdom",
    "united states",
    "venezuela",
    "yemen",
    "beijing",
    "berlin",
    "cairo",
    "damascus",
    "gaza",
    "hong kong",
    "istanbul",
    "jerusalem",
    "kyiv",
    "london",
    "moscow",
    "new york",
    "paris",
    "tehran",
    "tokyo",
    "washington",
];

/// Build one canonical article from a provider record.
///
/// Free-text fields are tag-stripped, URLs validated (invalid -> None)
/// and unparsable publish dates fall back to "now".
pub fn normalize(raw: RawArticle, provider: &str) -> Result<CanonicalArticle, NormalizeError> {
    let title = sanitize_text(raw.title.as_deref().unwrap_or_default());
    let url = validate_url(raw.url.as_deref());

    // Nothing to show and nothing to link: skip the record entirely.
    if title.is_empty() && url.is_none() {
        return Err(NormalizeError::Empty);
    }

    let description = sanitize_text(raw.description.as_deref().unwrap_or_default());
    let content = sanitize_text(raw.content.as_deref().unwrap_or_default());
    let published_at = parse_published(raw.published_at.as_deref());
    let locations = tag_locations(&title, &description);

    Ok(CanonicalArticle {
        source: ArticleSource {
            name: raw
                .source_name
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| provider.to_string()),
            origin_provider: provider.to_string(),
        },
        title,
        description,
        content,
        url,
        published_at,
        author: raw.author.filter(|s| !s.trim().is_empty()),
        image_url: validate_url(raw.image_url.as_deref()),
        locations,
    })
}

/// Decode HTML entities, strip tags, collapse whitespace.
pub fn sanitize_text(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    let stripped = re_tags.replace_all(&decoded, "");

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    re_ws.replace_all(&stripped, " ").trim().to_string()
}

/// Well-formed http(s) URLs pass through; anything else becomes None.
pub fn validate_url(s: Option<&str>) -> Option<String> {
    let s = s?.trim();
    let parsed = url::Url::parse(s).ok()?;
    match parsed.scheme() {
        "http" | "https" => Some(s.to_string()),
        _ => None,
    }
}

/// Accepts RFC 3339, RFC 2822 and GDELT's compact `YYYYMMDDTHHMMSSZ`.
/// Unparsable or missing dates fall back to the current time.
fn parse_published(raw: Option<&str>) -> DateTime<Utc> {
    let Some(s) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Utc::now();
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%SZ") {
        return dt.and_utc();
    }

    tracing::debug!(raw = s, "unparsable publish date, defaulting to now");
    Utc::now()
}

/// Every gazetteer entry contained in title+description gets appended.
fn tag_locations(title: &str, description: &str) -> Vec<String> {
    let haystack = format!("{} {}", title, description).to_lowercase();
    GAZETTEER
        .iter()
        .filter(|place| haystack.contains(*place))
        .map(|place| (*place).to_string())
        .collect()
}
