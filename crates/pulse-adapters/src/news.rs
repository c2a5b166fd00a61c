//! Syndication-feed adapter for security news.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pulse_core::text::{strip_markup, truncate_chars};
use pulse_core::{DESCRIPTION_MAX_CHARS, TITLE_MAX_CHARS};
use pulse_store::HttpClient;
use serde::Deserialize;
use tracing::debug;

use crate::{AdapterError, FetchResult, NewsItem, SourceAdapter, SyncRecord};

pub const SOURCE_ID: &str = "news";
const DEFAULT_SOURCE_LABEL: &str = "rss";

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    title: Option<String>,
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

/// Bare named entities are common in feed payloads but invalid XML;
/// replace the usual suspects before handing the document to the
/// parser.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

fn parse_rfc2822(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(ts.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Fetches the configured feed and normalizes its items. A malformed
/// individual item is skipped; only transport failure or an
/// unparseable feed document fails the adapter call.
#[derive(Debug, Clone)]
pub struct NewsFeedAdapter {
    feed_url: String,
}

impl NewsFeedAdapter {
    pub fn new(feed_url: String) -> Self {
        Self { feed_url }
    }

    pub fn parse_feed(xml: &str) -> Result<Vec<NewsItem>, AdapterError> {
        let clean = scrub_html_entities_for_xml(xml);
        let rss: Rss = quick_xml::de::from_str(&clean)
            .map_err(|err| AdapterError::Parse(format!("feed xml: {err}")))?;

        let source = rss
            .channel
            .title
            .as_deref()
            .map(strip_markup)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_SOURCE_LABEL.to_string());

        let mut items = Vec::with_capacity(rss.channel.items.len());
        for item in rss.channel.items {
            let Some(url) = item.link.map(|l| l.trim().to_string()).filter(|l| !l.is_empty()) else {
                debug!("skipping feed item without link");
                continue;
            };

            let title = truncate_chars(
                &strip_markup(item.title.as_deref().unwrap_or_default()),
                TITLE_MAX_CHARS,
            );
            let description = truncate_chars(
                &strip_markup(item.description.as_deref().unwrap_or_default()),
                DESCRIPTION_MAX_CHARS,
            );
            let published_at = item
                .pub_date
                .as_deref()
                .and_then(parse_rfc2822)
                .unwrap_or_else(Utc::now);

            items.push(NewsItem {
                title,
                description,
                url,
                source: source.clone(),
                published_at,
            });
        }
        Ok(items)
    }
}

#[async_trait]
impl SourceAdapter for NewsFeedAdapter {
    fn source_id(&self) -> &'static str {
        SOURCE_ID
    }

    async fn fetch(&self, http: &HttpClient) -> Result<FetchResult, AdapterError> {
        let response = http.get_text(SOURCE_ID, &self.feed_url).await?;
        let items = Self::parse_feed(&response.body)?;
        Ok(FetchResult::Records(
            items.into_iter().map(SyncRecord::News).collect(),
        ))
    }
}
