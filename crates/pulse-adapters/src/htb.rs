//! Hack The Box profile adapter.
//!
//! The v4 profile API sits behind a bearer app token and is served
//! from more than one host; the payload wrapper and field names have
//! drifted between versions, so extraction goes through [`probe`]
//! candidate lists.

use async_trait::async_trait;
use chrono::Utc;
use pulse_core::{tier, Platform, PlatformStat};
use pulse_store::HttpClient;
use serde_json::Value as JsonValue;
use tracing::warn;

use crate::{probe, AdapterError, FetchResult, SourceAdapter, SyncRecord};

pub const SOURCE_ID: &str = "hackthebox";

const ENDPOINT_TEMPLATES: &[&str] = &[
    "https://labs.hackthebox.com/api/v4/user/profile/basic/{id}",
    "https://www.hackthebox.com/api/v4/user/profile/basic/{id}",
];

#[derive(Debug, Clone)]
pub struct HtbCredentials {
    pub user_id: String,
    pub app_token: String,
}

/// Candidate keys per logical field, in coalescing priority order.
/// The defaults are inferred from observed payloads, not a published
/// schema; override them instead of editing when upstream drifts.
#[derive(Debug, Clone)]
pub struct HtbFieldMap {
    pub username: &'static [&'static str],
    pub rank: &'static [&'static str],
    pub rank_name: &'static [&'static str],
    pub points: &'static [&'static str],
    pub user_owns: &'static [&'static str],
    pub system_owns: &'static [&'static str],
}

impl Default for HtbFieldMap {
    fn default() -> Self {
        Self {
            username: &["name", "username"],
            rank: &["ranking", "rank", "global_ranking"],
            // "rank" is the numeric position on some mirrors and the
            // rank *title* on others; the numeric probe above skips
            // non-numeric values, this one requires a string.
            rank_name: &["rank_name", "rank_text", "rank"],
            points: &["points", "current_points"],
            user_owns: &["user_owns", "owns_user", "user_owns_count"],
            system_owns: &["system_owns", "owns_system", "system_owns_count"],
        }
    }
}

#[derive(Debug, Clone)]
pub struct HtbAdapter {
    credentials: Option<HtbCredentials>,
    population: u64,
    fields: HtbFieldMap,
    endpoint_templates: Vec<String>,
}

impl HtbAdapter {
    pub fn new(credentials: Option<HtbCredentials>, population: u64) -> Self {
        Self {
            credentials,
            population,
            fields: HtbFieldMap::default(),
            endpoint_templates: ENDPOINT_TEMPLATES.iter().map(|t| t.to_string()).collect(),
        }
    }

    pub fn with_field_map(mut self, fields: HtbFieldMap) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_endpoints(mut self, templates: Vec<String>) -> Self {
        self.endpoint_templates = templates;
        self
    }

    fn endpoints(&self, user_id: &str) -> Vec<String> {
        self.endpoint_templates
            .iter()
            .map(|template| template.replace("{id}", user_id))
            .collect()
    }

    /// Build a stat from one endpoint's payload. `None` means the
    /// payload carried none of the expected fields and the next
    /// candidate endpoint should be tried.
    fn stat_from_payload(&self, value: &JsonValue, credentials: &HtbCredentials) -> Option<PlatformStat> {
        let payload = probe::unwrap_payload(value);

        let rank = probe::first_u64(payload, self.fields.rank);
        let points = probe::first_u64(payload, self.fields.points);
        let user_owns = probe::first_u64(payload, self.fields.user_owns);
        let system_owns = probe::first_u64(payload, self.fields.system_owns);
        let username = probe::first_str(payload, self.fields.username);

        if rank.is_none()
            && points.is_none()
            && user_owns.is_none()
            && system_owns.is_none()
            && username.is_none()
        {
            return None;
        }

        let rank = rank.unwrap_or(0);
        Some(PlatformStat {
            platform: Platform::Hackthebox,
            username: username.unwrap_or(&credentials.user_id).to_string(),
            rank,
            pwned: user_owns.unwrap_or(0) + system_owns.unwrap_or(0),
            percentile: tier::percentile(rank as i64, self.population),
            tier: probe::first_str(payload, self.fields.rank_name)
                .unwrap_or("Unranked")
                .to_string(),
            points: points.unwrap_or(0),
            badges: Vec::new(),
            badge_count: 0,
            profile_url: format!("https://app.hackthebox.com/profile/{}", credentials.user_id),
            updated_at: Utc::now(),
        })
    }
}

#[async_trait]
impl SourceAdapter for HtbAdapter {
    fn source_id(&self) -> &'static str {
        SOURCE_ID
    }

    async fn fetch(&self, http: &HttpClient) -> Result<FetchResult, AdapterError> {
        let Some(credentials) = &self.credentials else {
            return Ok(FetchResult::Skipped("HTB_USER_ID / HTB_APP_TOKEN not set"));
        };

        let mut last_error: Option<AdapterError> = None;
        for url in self.endpoints(&credentials.user_id) {
            match http
                .get_json(SOURCE_ID, &url, Some(&credentials.app_token))
                .await
            {
                Ok(value) => {
                    if let Some(stat) = self.stat_from_payload(&value, credentials) {
                        return Ok(FetchResult::Records(vec![SyncRecord::Stat(stat)]));
                    }
                    warn!(url, "profile payload had none of the expected fields");
                    last_error = Some(AdapterError::Parse(format!(
                        "no expected profile fields in payload from {url}"
                    )));
                }
                Err(err) => {
                    warn!(url, error = %err, "profile endpoint failed, trying next candidate");
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
    use pulse_store::{BackoffPolicy, HttpClientConfig};
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials() -> HtbCredentials {
        HtbCredentials {
            user_id: "123456".into(),
            app_token: "app-token".into(),
        }
    }

    fn http() -> HttpClient {
        HttpClient::new(HttpClientConfig {
            timeout: Duration::from_secs(2),
            backoff: BackoffPolicy {
                max_retries: 0,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(1),
            },
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn missing_credentials_is_a_skip_not_an_error() {
        let adapter = HtbAdapter::new(None, 3_000_000);
        let result = adapter.fetch(&http()).await.unwrap();
        assert!(matches!(result, FetchResult::Skipped(_)));
    }

    #[test]
    fn extracts_from_wrapped_payload_with_alternate_keys() {
        let adapter = HtbAdapter::new(Some(credentials()), 3_000_000);
        let payload = json!({
            "profile": {
                "username": "wraith",
                "global_ranking": 25_000,
                "rank": "Pro Hacker",
                "current_points": "420",
                "owns_user": 61,
                "owns_system": 58
            }
        });
        let stat = adapter.stat_from_payload(&payload, &credentials()).unwrap();
        assert_eq!(stat.username, "wraith");
        assert_eq!(stat.rank, 25_000);
        assert_eq!(stat.pwned, 119);
        assert_eq!(stat.points, 420);
        assert_eq!(stat.tier, "Pro Hacker");
        assert_eq!(stat.percentile, "TOP 1%");
        assert_eq!(stat.platform.key(), "hackthebox");
    }

    #[test]
    fn payload_without_expected_fields_is_rejected() {
        let adapter = HtbAdapter::new(Some(credentials()), 3_000_000);
        let payload = json!({ "message": "maintenance window" });
        assert!(adapter.stat_from_payload(&payload, &credentials()).is_none());
    }

    #[tokio::test]
    async fn falls_through_to_the_next_candidate_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v4/profile/123456"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/legacy/profile/123456"))
            .and(header("Authorization", "Bearer app-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "info": { "name": "wraith", "ranking": 90_000, "points": 100 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = HtbAdapter::new(Some(credentials()), 3_000_000).with_endpoints(vec![
            format!("{}/v4/profile/{{id}}", server.uri()),
            format!("{}/legacy/profile/{{id}}", server.uri()),
        ]);

        let result = adapter.fetch(&http()).await.unwrap();
        let FetchResult::Records(records) = result else {
            panic!("expected records");
        };
        let SyncRecord::Stat(stat) = &records[0] else {
            panic!("expected a stat record");
        };
        assert_eq!(stat.rank, 90_000);
        assert_eq!(stat.percentile, "TOP 5%");
    }

    #[tokio::test]
    async fn all_endpoints_failing_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let adapter = HtbAdapter::new(Some(credentials()), 3_000_000)
            .with_endpoints(vec![format!("{}/v4/profile/{{id}}", server.uri())]);
        let err = adapter.fetch(&http()).await.unwrap_err();
        assert!(matches!(err, AdapterError::Unavailable(_)));
    }
}
