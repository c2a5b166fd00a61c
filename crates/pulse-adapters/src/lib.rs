//! Source adapter contracts + the four upstream adapters.
//!
//! Each adapter knows how to fetch and parse exactly one external
//! source into the pipeline's common record shape. Missing per-source
//! configuration is a skip, never an error; only transport/parse
//! failure of the source itself fails an adapter call.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pulse_core::PlatformStat;
use pulse_store::{FetchError, HttpClient};
use thiserror::Error;

pub mod ctftime;
pub mod htb;
pub mod news;
pub mod probe;
pub mod tryhackme;

pub use ctftime::CtftimeAdapter;
pub use htb::{HtbAdapter, HtbCredentials};
pub use news::NewsFeedAdapter;
pub use tryhackme::TryHackMeAdapter;

pub const CRATE_NAME: &str = "pulse-adapters";

#[derive(Debug, Error)]
pub enum AdapterError {
    /// Transport or HTTP failure reaching the upstream.
    #[error("source unavailable: {0}")]
    Unavailable(#[from] FetchError),
    /// The upstream answered, but no candidate payload shape matched.
    #[error("unexpected upstream payload: {0}")]
    Parse(String),
}

/// Draft article from the news feed, before categorization and
/// identity hashing (both applied by the orchestrator).
#[derive(Debug, Clone, PartialEq)]
pub struct NewsItem {
    pub title: String,
    pub description: String,
    pub url: String,
    pub source: String,
    pub published_at: DateTime<Utc>,
}

/// A normalized record produced by an adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncRecord {
    News(NewsItem),
    Stat(PlatformStat),
}

/// Outcome of one adapter invocation. `Skipped` (missing per-source
/// configuration) must stay distinguishable from an error all the way
/// into the run summary.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchResult {
    Records(Vec<SyncRecord>),
    Skipped(&'static str),
}

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source_id(&self) -> &'static str;

    async fn fetch(&self, http: &HttpClient) -> Result<FetchResult, AdapterError>;
}
