//! TryHackMe profile adapter.
//!
//! Three public endpoints contribute to one snapshot: rank (load
//! bearing), earned badges, and completed-room count. Only the rank
//! call can fail the adapter; badge and room failures degrade to an
//! empty list / zero with a warning.

use async_trait::async_trait;
use chrono::Utc;
use pulse_core::{tier, Platform, PlatformStat};
use pulse_store::HttpClient;
use serde_json::Value as JsonValue;
use tracing::warn;

use crate::{probe, AdapterError, FetchResult, SourceAdapter, SyncRecord};

pub const SOURCE_ID: &str = "tryhackme";

/// Candidate endpoint templates per call, in priority order.
#[derive(Debug, Clone)]
pub struct ThmEndpoints {
    pub rank: Vec<String>,
    pub badges: Vec<String>,
    pub rooms: Vec<String>,
}

impl Default for ThmEndpoints {
    fn default() -> Self {
        Self {
            rank: vec![
                "https://tryhackme.com/api/user/rank/{user}".into(),
                "https://tryhackme.com/api/usersRank/{user}".into(),
            ],
            badges: vec!["https://tryhackme.com/api/badges/get/{user}".into()],
            rooms: vec!["https://tryhackme.com/api/no-completed-rooms-public/{user}".into()],
        }
    }
}

/// Candidate keys per logical field, in coalescing priority order.
#[derive(Debug, Clone)]
pub struct ThmFieldMap {
    pub rank: &'static [&'static str],
    pub points: &'static [&'static str],
    pub level: &'static [&'static str],
    pub rooms: &'static [&'static str],
    pub badge_lists: &'static [&'static str],
    pub badge_names: &'static [&'static str],
}

impl Default for ThmFieldMap {
    fn default() -> Self {
        Self {
            rank: &["userRank", "rank", "position"],
            points: &["points", "score"],
            level: &["level", "title"],
            rooms: &["completedRooms", "count", "rooms"],
            badge_lists: &["badges", "data"],
            badge_names: &["name", "title"],
        }
    }
}

#[derive(Debug, Clone)]
pub struct TryHackMeAdapter {
    username: Option<String>,
    population: u64,
    fields: ThmFieldMap,
    endpoints: ThmEndpoints,
}

fn resolve(templates: &[String], username: &str) -> Vec<String> {
    templates
        .iter()
        .map(|template| template.replace("{user}", username))
        .collect()
}

impl TryHackMeAdapter {
    pub fn new(username: Option<String>, population: u64) -> Self {
        Self {
            username,
            population,
            fields: ThmFieldMap::default(),
            endpoints: ThmEndpoints::default(),
        }
    }

    pub fn with_field_map(mut self, fields: ThmFieldMap) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_endpoints(mut self, endpoints: ThmEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// The rank payload is a bare number on one endpoint generation
    /// and a keyed object on the other.
    fn rank_from_payload(&self, value: &JsonValue) -> Option<u64> {
        if !value.is_object() {
            return probe::as_u64_like(value);
        }
        probe::first_u64(probe::unwrap_payload(value), self.fields.rank)
    }

    async fn fetch_badges(&self, http: &HttpClient, username: &str) -> Vec<String> {
        for url in resolve(&self.endpoints.badges, username) {
            match http.get_json(SOURCE_ID, &url, None).await {
                Ok(value) => {
                    if let Some(array) = value.as_array() {
                        return array
                            .iter()
                            .filter_map(|entry| {
                                entry
                                    .as_str()
                                    .map(str::to_string)
                                    .or_else(|| {
                                        probe::first_str(entry, self.fields.badge_names)
                                            .map(str::to_string)
                                    })
                            })
                            .collect();
                    }
                    if let Some(names) =
                        probe::first_str_array(&value, self.fields.badge_lists, self.fields.badge_names)
                    {
                        return names;
                    }
                    warn!(url, "badge payload had no recognizable list");
                }
                Err(err) => warn!(url, error = %err, "badge endpoint failed"),
            }
        }
        Vec::new()
    }

    async fn fetch_completed_rooms(&self, http: &HttpClient, username: &str) -> u64 {
        for url in resolve(&self.endpoints.rooms, username) {
            match http.get_json(SOURCE_ID, &url, None).await {
                Ok(value) => {
                    let count = if value.is_object() {
                        probe::first_u64(probe::unwrap_payload(&value), self.fields.rooms)
                    } else {
                        probe::as_u64_like(&value)
                    };
                    if let Some(count) = count {
                        return count;
                    }
                    warn!(url, "completed-rooms payload had no recognizable count");
                }
                Err(err) => warn!(url, error = %err, "completed-rooms endpoint failed"),
            }
        }
        0
    }
}

#[async_trait]
impl SourceAdapter for TryHackMeAdapter {
    fn source_id(&self) -> &'static str {
        SOURCE_ID
    }

    async fn fetch(&self, http: &HttpClient) -> Result<FetchResult, AdapterError> {
        let Some(username) = &self.username else {
            return Ok(FetchResult::Skipped("THM_USERNAME not set"));
        };

        let mut rank_payload: Option<JsonValue> = None;
        let mut last_error: Option<AdapterError> = None;
        for url in resolve(&self.endpoints.rank, username) {
            match http.get_json(SOURCE_ID, &url, None).await {
                Ok(value) => {
                    if self.rank_from_payload(&value).is_some() {
                        rank_payload = Some(value);
                        break;
                    }
                    warn!(url, "rank payload had no recognizable rank");
                    last_error = Some(AdapterError::Parse(format!(
                        "no recognizable rank in payload from {url}"
                    )));
                }
                Err(err) => {
                    warn!(url, error = %err, "rank endpoint failed, trying next candidate");
                    last_error = Some(err.into());
                }
            }
        }

        let Some(rank_payload) = rank_payload else {
            return Err(last_error
                .unwrap_or_else(|| AdapterError::Parse("no candidate endpoints configured".into())));
        };

        let rank = self.rank_from_payload(&rank_payload).unwrap_or(0);
        let payload = probe::unwrap_payload(&rank_payload);
        let points = probe::first_u64(payload, self.fields.points).unwrap_or(0);
        let level = probe::first_str(payload, self.fields.level).map(str::to_string);

        let badges = self.fetch_badges(http, username).await;
        let pwned = self.fetch_completed_rooms(http, username).await;

        let percentile = tier::percentile(rank as i64, self.population);
        let stat = PlatformStat {
            platform: Platform::Tryhackme,
            username: username.clone(),
            rank,
            pwned,
            tier: level.unwrap_or_else(|| percentile.clone()),
            percentile,
            points,
            badge_count: badges.len(),
            badges,
            profile_url: format!("https://tryhackme.com/p/{username}"),
            updated_at: Utc::now(),
        };

        Ok(FetchResult::Records(vec![SyncRecord::Stat(stat)]))
    }
}
