//! CTFtime team adapter.
//!
//! CTFtime ranks teams per rating year; the snapshot takes the most
//! recent year present in the payload. Population for the percentile
//! label comes from the payload's own team count when the API provides
//! one; the global rank population constant does not apply to a
//! CTF-team leaderboard of a few thousand entries.

use async_trait::async_trait;
use chrono::Utc;
use pulse_core::{tier, Platform, PlatformStat};
use pulse_store::HttpClient;
use serde_json::Value as JsonValue;
use tracing::warn;

use crate::{probe, AdapterError, FetchResult, SourceAdapter, SyncRecord};

pub const SOURCE_ID: &str = "ctftime";

const ENDPOINT_TEMPLATES: &[&str] = &[
    "https://ctftime.org/api/v1/teams/{id}/",
    "https://ctftime.org/api/v1/teams/{id}",
];

/// Candidate keys per logical field, in coalescing priority order.
#[derive(Debug, Clone)]
pub struct CtftimeFieldMap {
    pub rank: &'static [&'static str],
    pub points: &'static [&'static str],
    pub name: &'static [&'static str],
    pub team_count: &'static [&'static str],
}

impl Default for CtftimeFieldMap {
    fn default() -> Self {
        Self {
            rank: &["rating_place", "place", "rank"],
            points: &["rating_points", "points"],
            name: &["name", "team_name"],
            team_count: &["total_teams", "teams_count"],
        }
    }
}

#[derive(Debug, Clone)]
pub struct CtftimeAdapter {
    team_id: Option<String>,
    fields: CtftimeFieldMap,
    endpoint_templates: Vec<String>,
}

impl CtftimeAdapter {
    pub fn new(team_id: Option<String>) -> Self {
        Self {
            team_id,
            fields: CtftimeFieldMap::default(),
            endpoint_templates: ENDPOINT_TEMPLATES.iter().map(|t| t.to_string()).collect(),
        }
    }

    pub fn with_field_map(mut self, fields: CtftimeFieldMap) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_endpoints(mut self, templates: Vec<String>) -> Self {
        self.endpoint_templates = templates;
        self
    }

    fn endpoints(&self, team_id: &str) -> Vec<String> {
        self.endpoint_templates
            .iter()
            .map(|template| template.replace("{id}", team_id))
            .collect()
    }

    /// The `rating` member maps year → standing; take the most recent
    /// year. Some payload generations use a list instead, in which
    /// case the last entry is the current one.
    fn latest_rating(value: &JsonValue) -> Option<&JsonValue> {
        let rating = value.get("rating")?;
        if let Some(list) = rating.as_array() {
            return list.last();
        }
        let years = rating.as_object()?;
        years
            .iter()
            .filter_map(|(year, standing)| year.parse::<i32>().ok().map(|y| (y, standing)))
            .max_by_key(|(year, _)| *year)
            .map(|(_, standing)| standing)
    }

    fn stat_from_payload(&self, value: &JsonValue, team_id: &str) -> Option<PlatformStat> {
        let payload = probe::unwrap_payload(value);
        let name = probe::first_str(payload, self.fields.name);
        let standing = Self::latest_rating(payload);

        let rank = standing
            .and_then(|s| probe::first_u64(s, self.fields.rank))
            .unwrap_or(0);
        let points = standing
            .and_then(|s| probe::first_u64(s, self.fields.points))
            .unwrap_or(0);

        if name.is_none() && standing.is_none() {
            return None;
        }

        let percentile = match probe::first_u64(payload, self.fields.team_count) {
            Some(total) if rank > 0 => tier::percentile(rank as i64, total),
            _ => "N/A".to_string(),
        };
        let tier = if rank > 0 {
            format!("#{rank} worldwide")
        } else {
            "Unranked".to_string()
        };

        Some(PlatformStat {
            platform: Platform::Ctftime,
            username: name.unwrap_or(team_id).to_string(),
            rank,
            pwned: 0,
            percentile,
            tier,
            points,
            badges: Vec::new(),
            badge_count: 0,
            profile_url: format!("https://ctftime.org/team/{team_id}"),
            updated_at: Utc::now(),
        })
    }
}

#[async_trait]
impl SourceAdapter for CtftimeAdapter {
    fn source_id(&self) -> &'static str {
        SOURCE_ID
    }

    async fn fetch(&self, http: &HttpClient) -> Result<FetchResult, AdapterError> {
        let Some(team_id) = &self.team_id else {
            return Ok(FetchResult::Skipped("CTFTIME_TEAM_ID not set"));
        };

        let mut last_error: Option<AdapterError> = None;
        for url in self.endpoints(team_id) {
            match http.get_json(SOURCE_ID, &url, None).await {
                Ok(value) => {
                    if let Some(stat) = self.stat_from_payload(&value, team_id) {
                        return Ok(FetchResult::Records(vec![SyncRecord::Stat(stat)]));
                    }
                    warn!(url, "team payload had none of the expected fields");
                    last_error = Some(AdapterError::Parse(format!(
                        "no expected team fields in payload from {url}"
                    )));
                }
                Err(err) => {
                    warn!(url, error = %err, "team endpoint failed, trying next candidate");
                    last_error = Some(err.into());
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| AdapterError::Parse("no candidate endpoints configured".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn adapter() -> CtftimeAdapter {
        CtftimeAdapter::new(Some("4242".into()))
    }

    #[test]
    fn takes_the_most_recent_rating_year() {
        let payload = json!({
            "name": "hex&flex",
            "rating": {
                "2024": { "rating_place": 900, "rating_points": 80.1 },
                "2026": { "rating_place": 150, "rating_points": 312.5 },
                "2025": { "rating_place": 400, "rating_points": 120.0 }
            }
        });
        let stat = adapter().stat_from_payload(&payload, "4242").unwrap();
        assert_eq!(stat.rank, 150);
        assert_eq!(stat.points, 313);
        assert_eq!(stat.username, "hex&flex");
        assert_eq!(stat.tier, "#150 worldwide");
        assert_eq!(stat.profile_url, "https://ctftime.org/team/4242");
    }

    #[test]
    fn rating_list_payloads_use_the_last_entry() {
        let payload = json!({
            "name": "hex&flex",
            "rating": [
                { "rating_place": 700 },
                { "rating_place": 220 }
            ]
        });
        let stat = adapter().stat_from_payload(&payload, "4242").unwrap();
        assert_eq!(stat.rank, 220);
    }

    #[test]
    fn percentile_requires_a_team_count_in_the_payload() {
        let without_count = json!({
            "name": "hex&flex",
            "rating": { "2026": { "rating_place": 150 } }
        });
        let stat = adapter().stat_from_payload(&without_count, "4242").unwrap();
        assert_eq!(stat.percentile, "N/A");

        let with_count = json!({
            "name": "hex&flex",
            "total_teams": 15000,
            "rating": { "2026": { "rating_place": 150 } }
        });
        let stat = adapter().stat_from_payload(&with_count, "4242").unwrap();
        assert_eq!(stat.percentile, "TOP 1%");
    }

    #[test]
    fn unranked_team_still_produces_a_snapshot() {
        let payload = json!({ "name": "fresh-team", "rating": {} });
        let stat = adapter().stat_from_payload(&payload, "4242").unwrap();
        assert_eq!(stat.rank, 0);
        assert_eq!(stat.tier, "Unranked");
        assert_eq!(stat.percentile, "N/A");
    }

    #[test]
    fn unexpected_payload_is_rejected() {
        let payload = json!({ "detail": "not found" });
        assert!(adapter().stat_from_payload(&payload, "4242").is_none());
    }
}
