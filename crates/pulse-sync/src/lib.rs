//! Sync orchestration: configuration, source scheduling, and the
//! document-store write loop shared by every adapter.

use std::time::Duration;

use chrono::{DateTime, Utc};
use pulse_adapters::{
    CtftimeAdapter, FetchResult, HtbAdapter, HtbCredentials, NewsFeedAdapter, SourceAdapter,
    SyncRecord, TryHackMeAdapter,
};
use pulse_core::{classify::classify, identity, NewsRecord};
use pulse_store::{DocStoreConfig, DocumentStore, HttpClient, HttpClientConfig, UpsertOutcome};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

pub const DEFAULT_FEED_URL: &str = "https://feeds.feedburner.com/TheHackersNews";
pub const DEFAULT_NEWS_COLLECTION: &str = "news";
pub const DEFAULT_STATS_COLLECTION: &str = "platform-stats";
pub const DEFAULT_RANK_POPULATION: u64 = 3_000_000;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    MissingRequired(Vec<String>),
    #[error("invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

/// Runtime configuration, sourced from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub docstore_endpoint: String,
    pub docstore_project_id: String,
    pub docstore_api_key: String,
    pub docstore_database_id: String,
    pub news_collection_id: String,
    pub stats_collection_id: String,
    pub news_feed_url: String,
    pub htb_user_id: Option<String>,
    pub htb_app_token: Option<String>,
    pub thm_username: Option<String>,
    pub ctftime_team_id: Option<String>,
    pub rank_population: u64,
    pub http_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup so tests never have to
    /// mutate process-wide environment state.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut missing = Vec::new();
        let mut require = |key: &str| match get(key) {
            Some(value) => value,
            None => {
                missing.push(key.to_string());
                String::new()
            }
        };

        let docstore_endpoint = require("DOCSTORE_ENDPOINT");
        let docstore_project_id = require("DOCSTORE_PROJECT_ID");
        let docstore_api_key = require("DOCSTORE_API_KEY");
        let docstore_database_id = require("DOCSTORE_DATABASE_ID");
        if !missing.is_empty() {
            return Err(ConfigError::MissingRequired(missing));
        }

        let rank_population = match get("RANK_POPULATION") {
            Some(raw) => raw.parse::<u64>().map_err(|e| ConfigError::Invalid {
                key: "RANK_POPULATION".to_string(),
                message: e.to_string(),
            })?,
            None => DEFAULT_RANK_POPULATION,
        };
        let timeout_secs = match get("SYNC_HTTP_TIMEOUT_SECS") {
            Some(raw) => raw.parse::<u64>().map_err(|e| ConfigError::Invalid {
                key: "SYNC_HTTP_TIMEOUT_SECS".to_string(),
                message: e.to_string(),
            })?,
            None => DEFAULT_HTTP_TIMEOUT_SECS,
        };

        Ok(Self {
            docstore_endpoint,
            docstore_project_id,
            docstore_api_key,
            docstore_database_id,
            news_collection_id: get("NEWS_COLLECTION_ID")
                .unwrap_or_else(|| DEFAULT_NEWS_COLLECTION.to_string()),
            stats_collection_id: get("STATS_COLLECTION_ID")
                .unwrap_or_else(|| DEFAULT_STATS_COLLECTION.to_string()),
            news_feed_url: get("NEWS_FEED_URL").unwrap_or_else(|| DEFAULT_FEED_URL.to_string()),
            htb_user_id: get("HTB_USER_ID"),
            htb_app_token: get("HTB_APP_TOKEN"),
            thm_username: get("THM_USERNAME"),
            ctftime_team_id: get("CTFTIME_TEAM_ID"),
            rank_population,
            http_timeout: Duration::from_secs(timeout_secs),
        })
    }

    fn docstore(&self) -> DocStoreConfig {
        DocStoreConfig {
            endpoint: self.docstore_endpoint.clone(),
            project_id: self.docstore_project_id.clone(),
            api_key: self.docstore_api_key.clone(),
            database_id: self.docstore_database_id.clone(),
            timeout: self.http_timeout,
        }
    }

    fn http(&self) -> HttpClientConfig {
        HttpClientConfig {
            timeout: self.http_timeout,
            ..HttpClientConfig::default()
        }
    }
}

/// Per-source result of one pipeline run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SourceOutcome {
    Success {
        created: usize,
        updated: usize,
        errors: usize,
    },
    Skipped {
        reason: String,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub source: String,
    #[serde(flatten)]
    pub outcome: SourceOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncRunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub reports: Vec<SourceReport>,
}

impl SyncRunSummary {
    /// True only when every source failed outright. Skips count as a
    /// deliberate no-op, not a failure.
    pub fn all_failed(&self) -> bool {
        !self.reports.is_empty()
            && self
                .reports
                .iter()
                .all(|r| matches!(r.outcome, SourceOutcome::Failed { .. }))
    }

    /// Human-readable one-line-per-source report.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let width = self
            .reports
            .iter()
            .map(|r| r.source.len())
            .max()
            .unwrap_or(0);
        for report in &self.reports {
            let line = match &report.outcome {
                SourceOutcome::Success {
                    created,
                    updated,
                    errors,
                } => format!(
                    "✓ {:width$}  {} created, {} updated, {} errors",
                    report.source,
                    created,
                    updated,
                    errors,
                    width = width
                ),
                SourceOutcome::Skipped { reason } => {
                    format!("○ {:width$}  skipped: {}", report.source, reason, width = width)
                }
                SourceOutcome::Failed { error } => {
                    format!("✗ {:width$}  failed: {}", report.source, error, width = width)
                }
            };
            out.push_str(&line);
            out.push('\n');
        }
        out
    }
}

/// Runs every configured source against one document store.
pub struct SyncPipeline {
    http: HttpClient,
    store: DocumentStore,
    news_collection: String,
    stats_collection: String,
}

impl SyncPipeline {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            http: HttpClient::new(config.http())?,
            store: DocumentStore::new(config.docstore())?,
            news_collection: config.news_collection_id.clone(),
            stats_collection: config.stats_collection_id.clone(),
        })
    }

    /// Runs each adapter in order. One source failing never stops the rest.
    pub async fn run(&self, adapters: &[Box<dyn SourceAdapter>]) -> SyncRunSummary {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, sources = adapters.len(), "starting sync run");

        let mut reports = Vec::with_capacity(adapters.len());
        for adapter in adapters {
            let source = adapter.source_id();
            let outcome = self
                .sync_source(adapter.as_ref())
                .instrument(info_span!("sync_source", source))
                .await;
            match &outcome {
                SourceOutcome::Success {
                    created,
                    updated,
                    errors,
                } => info!(source, created, updated, errors, "source synced"),
                SourceOutcome::Skipped { reason } => info!(source, reason, "source skipped"),
                SourceOutcome::Failed { error } => warn!(source, error, "source failed"),
            }
            reports.push(SourceReport {
                source: source.to_string(),
                outcome,
            });
        }

        SyncRunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            reports,
        }
    }

    async fn sync_source(&self, adapter: &dyn SourceAdapter) -> SourceOutcome {
        let records = match adapter.fetch(&self.http).await {
            Ok(FetchResult::Records(records)) => records,
            Ok(FetchResult::Skipped(reason)) => {
                return SourceOutcome::Skipped {
                    reason: reason.to_string(),
                }
            }
            Err(e) => {
                return SourceOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        let mut created = 0;
        let mut updated = 0;
        let mut errors = 0;
        for record in records {
            let (collection, id, data) = match self.prepare(record) {
                Ok(parts) => parts,
                Err(message) => {
                    warn!(source = adapter.source_id(), %message, "record serialization failed");
                    errors += 1;
                    continue;
                }
            };
            match self.store.upsert(&collection, &id, &data).await {
                Ok(UpsertOutcome::Created) => created += 1,
                Ok(UpsertOutcome::Updated) => updated += 1,
                Err(e) => {
                    warn!(source = adapter.source_id(), document = %id, error = %e, "write failed");
                    errors += 1;
                }
            }
        }
        SourceOutcome::Success {
            created,
            updated,
            errors,
        }
    }

    fn prepare(&self, record: SyncRecord) -> Result<(String, String, serde_json::Value), String> {
        match record {
            SyncRecord::News(item) => {
                let (category, severity) = classify(&item.title, &item.description);
                let id = identity::hash(&item.url);
                let record = NewsRecord {
                    id: id.clone(),
                    title: item.title,
                    description: item.description,
                    url: item.url,
                    source: item.source,
                    published_at: item.published_at,
                    category,
                    severity,
                };
                let data = serde_json::to_value(&record).map_err(|e| e.to_string())?;
                Ok((self.news_collection.clone(), id, data))
            }
            SyncRecord::Stat(stat) => {
                let id = stat.platform.key().to_string();
                let data = serde_json::to_value(&stat).map_err(|e| e.to_string())?;
                Ok((self.stats_collection.clone(), id, data))
            }
        }
    }
}

/// The standard adapter lineup, in run order.
pub fn builtin_adapters(config: &Config) -> Vec<Box<dyn SourceAdapter>> {
    let credentials = match (&config.htb_user_id, &config.htb_app_token) {
        (Some(user_id), Some(app_token)) => Some(HtbCredentials {
            user_id: user_id.clone(),
            app_token: app_token.clone(),
        }),
        _ => None,
    };
    vec![
        Box::new(NewsFeedAdapter::new(config.news_feed_url.clone())),
        Box::new(HtbAdapter::new(credentials, config.rank_population)),
        Box::new(TryHackMeAdapter::new(
            config.thm_username.clone(),
            config.rank_population,
        )),
        Box::new(CtftimeAdapter::new(config.ctftime_team_id.clone())),
    ]
}

/// Builds the pipeline from config and runs the builtin adapters once.
pub async fn run_sync_once(config: &Config) -> anyhow::Result<SyncRunSummary> {
    let pipeline = SyncPipeline::new(config)?;
    let adapters = builtin_adapters(config);
    Ok(pipeline.run(&adapters).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("DOCSTORE_ENDPOINT", "https://store.example.com/v1"),
            ("DOCSTORE_PROJECT_ID", "proj"),
            ("DOCSTORE_API_KEY", "secret"),
            ("DOCSTORE_DATABASE_ID", "db"),
        ])
    }

    fn lookup<'a>(env: &'a HashMap<&'a str, &'a str>) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| env.get(key).map(|v| v.to_string())
    }

    #[test]
    fn config_lists_every_missing_required_key() {
        let env = HashMap::from([("DOCSTORE_ENDPOINT", "https://store.example.com/v1")]);
        let err = Config::from_lookup(lookup(&env)).unwrap_err();
        match err {
            ConfigError::MissingRequired(keys) => {
                assert_eq!(
                    keys,
                    vec![
                        "DOCSTORE_PROJECT_ID".to_string(),
                        "DOCSTORE_API_KEY".to_string(),
                        "DOCSTORE_DATABASE_ID".to_string(),
                    ]
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn config_applies_defaults() {
        let env = base_env();
        let config = Config::from_lookup(lookup(&env)).unwrap();
        assert_eq!(config.news_collection_id, "news");
        assert_eq!(config.stats_collection_id, "platform-stats");
        assert_eq!(config.news_feed_url, DEFAULT_FEED_URL);
        assert_eq!(config.rank_population, 3_000_000);
        assert_eq!(config.http_timeout, Duration::from_secs(15));
        assert!(config.htb_user_id.is_none());
    }

    #[test]
    fn config_rejects_unparseable_population() {
        let mut env = base_env();
        env.insert("RANK_POPULATION", "lots");
        let err = Config::from_lookup(lookup(&env)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "RANK_POPULATION"));
    }

    #[test]
    fn config_treats_blank_values_as_unset() {
        let mut env = base_env();
        env.insert("THM_USERNAME", "   ");
        let config = Config::from_lookup(lookup(&env)).unwrap();
        assert!(config.thm_username.is_none());
    }

    fn summary_with(reports: Vec<SourceReport>) -> SyncRunSummary {
        SyncRunSummary {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            reports,
        }
    }

    #[test]
    fn all_failed_only_when_every_source_fails() {
        let failed = SourceReport {
            source: "news".to_string(),
            outcome: SourceOutcome::Failed {
                error: "boom".to_string(),
            },
        };
        let skipped = SourceReport {
            source: "tryhackme".to_string(),
            outcome: SourceOutcome::Skipped {
                reason: "THM_USERNAME not set".to_string(),
            },
        };
        assert!(summary_with(vec![failed.clone()]).all_failed());
        assert!(!summary_with(vec![failed, skipped]).all_failed());
        assert!(!summary_with(vec![]).all_failed());
    }

    #[test]
    fn render_shows_one_line_per_source() {
        let summary = summary_with(vec![
            SourceReport {
                source: "news".to_string(),
                outcome: SourceOutcome::Success {
                    created: 3,
                    updated: 12,
                    errors: 0,
                },
            },
            SourceReport {
                source: "hackthebox".to_string(),
                outcome: SourceOutcome::Skipped {
                    reason: "HTB_USER_ID / HTB_APP_TOKEN not set".to_string(),
                },
            },
        ]);
        let rendered = summary.render();
        assert!(rendered.contains("✓ news"));
        assert!(rendered.contains("3 created, 12 updated, 0 errors"));
        assert!(rendered.contains("○ hackthebox"));
        assert_eq!(rendered.lines().count(), 2);
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let outcome = SourceOutcome::Success {
            created: 1,
            updated: 2,
            errors: 0,
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["created"], 1);

        let skipped = SourceOutcome::Skipped {
            reason: "no creds".to_string(),
        };
        let value = serde_json::to_value(&skipped).unwrap();
        assert_eq!(value["status"], "skipped");
        assert_eq!(value["reason"], "no creds");
    }
}
