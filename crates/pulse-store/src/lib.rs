//! HTTP fetch utilities + the document-store write path for pulse.

use std::time::Duration;

use anyhow::Context;
use reqwest::StatusCode;
use serde_json::{json, Value as JsonValue};
use thiserror::Error;
use tracing::{debug, info_span};

pub const CRATE_NAME: &str = "pulse-store";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    Retryable,
    NonRetryable,
}

pub fn classify_status(status: StatusCode) -> RetryDisposition {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        RetryDisposition::Retryable
    } else {
        RetryDisposition::NonRetryable
    }
}

pub fn classify_reqwest_error(err: &reqwest::Error) -> RetryDisposition {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        RetryDisposition::Retryable
    } else {
        RetryDisposition::NonRetryable
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub max_retries: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl BackoffPolicy {
    pub fn delay_for_attempt(&self, attempt_index: usize) -> Duration {
        let factor = 1u32.checked_shl(attempt_index as u32).unwrap_or(u32::MAX);
        let delay = self.base_delay.saturating_mul(factor);
        delay.min(self.max_delay)
    }
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub user_agent: String,
    pub backoff: BackoffPolicy,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            user_agent: format!("pulse-sync/{}", env!("CARGO_PKG_VERSION")),
            backoff: BackoffPolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchedResponse {
    pub status: StatusCode,
    pub final_url: String,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed after retries: {0}")]
    Request(#[from] reqwest::Error),
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
    #[error("unparseable body from {url}: {message}")]
    Body { url: String, message: String },
}

/// Read-side HTTP client shared by the source adapters. Every request
/// carries the configured timeout and user agent; retryable failures
/// (5xx, 429, timeouts, connection errors) are retried with capped
/// exponential backoff.
#[derive(Debug)]
pub struct HttpClient {
    client: reqwest::Client,
    backoff: BackoffPolicy,
}

impl HttpClient {
    pub fn new(config: HttpClientConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .context("building reqwest client")?;
        Ok(Self {
            client,
            backoff: config.backoff,
        })
    }

    /// GET a URL and return the body as text.
    pub async fn get_text(&self, source_id: &str, url: &str) -> Result<FetchedResponse, FetchError> {
        self.get_with_retry(source_id, url, None).await
    }

    /// GET a URL, optionally with a bearer credential, and parse the
    /// body as JSON.
    pub async fn get_json(
        &self,
        source_id: &str,
        url: &str,
        bearer: Option<&str>,
    ) -> Result<JsonValue, FetchError> {
        let response = self.get_with_retry(source_id, url, bearer).await?;
        let value = serde_json::from_str(&response.body).map_err(|err| FetchError::Body {
            url: response.final_url.clone(),
            message: err.to_string(),
        })?;
        Ok(value)
    }

    async fn get_with_retry(
        &self,
        source_id: &str,
        url: &str,
        bearer: Option<&str>,
    ) -> Result<FetchedResponse, FetchError> {
        let span = info_span!("http_fetch", source_id, url);
        let _guard = span.enter();

        let mut last_request_error: Option<reqwest::Error> = None;

        for attempt in 0..=self.backoff.max_retries {
            let mut request = self.client.get(url).header("Accept", "application/json, text/xml, */*");
            if let Some(token) = bearer {
                request = request.bearer_auth(token);
            }

            match request.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    let final_url = resp.url().to_string();

                    if status.is_success() {
                        let body = resp.text().await?;
                        return Ok(FetchedResponse {
                            status,
                            final_url,
                            body,
                        });
                    }

                    if classify_status(status) == RetryDisposition::Retryable
                        && attempt < self.backoff.max_retries
                    {
                        tokio::time::sleep(self.backoff.delay_for_attempt(attempt)).await;
                        continue;
                    }

                    return Err(FetchError::HttpStatus {
                        status: status.as_u16(),
                        url: final_url,
                    });
                }
                Err(err) => {
                    if classify_reqwest_error(&err) == RetryDisposition::Retryable
                        && attempt < self.backoff.max_retries
                    {
                        last_request_error = Some(err);
                        tokio::time::sleep(self.backoff.delay_for_attempt(attempt)).await;
                        continue;
                    }
                    return Err(FetchError::Request(err));
                }
            }
        }

        Err(FetchError::Request(
            last_request_error.expect("retry loop should capture a request error"),
        ))
    }
}

/// Connection parameters for the remote document store.
#[derive(Debug, Clone)]
pub struct DocStoreConfig {
    pub endpoint: String,
    pub project_id: String,
    pub api_key: String,
    pub database_id: String,
    pub timeout: Duration,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document {collection}/{id} not found")]
    NotFound { collection: String, id: String },
    #[error("document {collection}/{id} already exists")]
    Conflict { collection: String, id: String },
    #[error("store rejected credentials (http {status})")]
    Unauthorized { status: u16 },
    #[error("store rejected write (http {status}): {message}")]
    Rejected { status: u16, message: String },
    #[error(transparent)]
    Request(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Write-side client for the document store's REST surface. Documents
/// are addressed by database + collection + document id; the store
/// offers only create/update/404 primitives, so idempotent writes go
/// through [`DocumentStore::upsert`].
#[derive(Debug)]
pub struct DocumentStore {
    client: reqwest::Client,
    endpoint: String,
    database_id: String,
}

impl DocumentStore {
    pub fn new(config: DocStoreConfig) -> anyhow::Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "X-Appwrite-Project",
            config
                .project_id
                .parse()
                .context("project id is not a valid header value")?,
        );
        headers.insert(
            "X-Appwrite-Key",
            config
                .api_key
                .parse()
                .context("api key is not a valid header value")?,
        );

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .context("building document store client")?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            database_id: config.database_id,
        })
    }

    fn collection_url(&self, collection: &str) -> String {
        format!(
            "{}/databases/{}/collections/{}/documents",
            self.endpoint, self.database_id, collection
        )
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{id}", self.collection_url(collection))
    }

    pub async fn update_document(
        &self,
        collection: &str,
        id: &str,
        data: &JsonValue,
    ) -> Result<(), StoreError> {
        let response = self
            .client
            .patch(self.document_url(collection, id))
            .json(&json!({ "data": data }))
            .send()
            .await?;
        Self::check_write(collection, id, response).await
    }

    pub async fn create_document(
        &self,
        collection: &str,
        id: &str,
        data: &JsonValue,
    ) -> Result<(), StoreError> {
        let response = self
            .client
            .post(self.collection_url(collection))
            .json(&json!({ "documentId": id, "data": data }))
            .send()
            .await?;
        Self::check_write(collection, id, response).await
    }

    /// The single write path: update first (the common case once a
    /// document exists), create on not-found, and absorb a create that
    /// races into an already-exists conflict. Concurrent runs converge
    /// on last-writer-wins instead of surfacing the race as a failure.
    pub async fn upsert(
        &self,
        collection: &str,
        id: &str,
        data: &JsonValue,
    ) -> Result<UpsertOutcome, StoreError> {
        match self.update_document(collection, id, data).await {
            Ok(()) => Ok(UpsertOutcome::Updated),
            Err(StoreError::NotFound { .. }) => {
                match self.create_document(collection, id, data).await {
                    Ok(()) => Ok(UpsertOutcome::Created),
                    Err(StoreError::Conflict { .. }) => {
                        debug!(collection, id, "create lost a benign race; document exists");
                        Ok(UpsertOutcome::Updated)
                    }
                    Err(other) => Err(other),
                }
            }
            Err(other) => Err(other),
        }
    }

    async fn check_write(
        collection: &str,
        id: &str,
        response: reqwest::Response,
    ) -> Result<(), StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        match status {
            StatusCode::NOT_FOUND => Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            }),
            StatusCode::CONFLICT => Err(StoreError::Conflict {
                collection: collection.to_string(),
                id: id.to_string(),
            }),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(StoreError::Unauthorized {
                status: status.as_u16(),
            }),
            _ => {
                let message = response.text().await.unwrap_or_default();
                let message = message.chars().take(200).collect();
                Err(StoreError::Rejected {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}
