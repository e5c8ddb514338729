//! HTTP client for the Loki API.
//!
//! Every operation is one request and one response. The underlying
//! `reqwest::Client` keeps the connection pool; clones of `LokiClient` share it.

use crate::config::{BasicAuth, LokiClientConfig};
use crate::core::time::nanos_from_instant;
use crate::domain::model::{result_type_from_json, Labels, LogEntry, QueryResult, ResultType, Stream};
use crate::utils::error::{LokiError, Result};
use crate::utils::validation::Validate;
use chrono::{DateTime, Utc};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use std::time::Duration;
use url::Url;

pub const QUERY_RANGE_PATH: &str = "/loki/api/v1/query_range";
pub const QUERY_PATH: &str = "/loki/api/v1/query";
pub const PUSH_PATH: &str = "/loki/api/v1/push";
pub const FLUSH_PATH: &str = "/flush";
pub const READY_PATH: &str = "/ready";

pub const TENANT_HEADER: &str = "X-Scope-OrgID";

/// Parameters of `/loki/api/v1/query_range`. Results are always returned in
/// forward (oldest first) order.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeQuery {
    pub query: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub limit: Option<u32>,
    pub step: Option<Duration>,
}

impl RangeQuery {
    pub fn new(query: impl Into<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            query: query.into(),
            start,
            end,
            limit: None,
            step: None,
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_step(mut self, step: Duration) -> Self {
        self.step = Some(step);
        self
    }

    fn append_to(&self, url: &mut Url) -> Result<()> {
        let start = to_nanos(&self.start)?;
        let end = to_nanos(&self.end)?;

        let mut pairs = url.query_pairs_mut();
        pairs
            .append_pair("query", &self.query)
            .append_pair("start", &start.to_string())
            .append_pair("end", &end.to_string())
            .append_pair("direction", "forward");
        if let Some(limit) = self.limit {
            pairs.append_pair("limit", &limit.to_string());
        }
        if let Some(step) = self.step {
            pairs.append_pair("step", &step.as_secs_f64().to_string());
        }
        Ok(())
    }
}

/// Body of `/loki/api/v1/push`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PushRequest {
    pub streams: Vec<Stream>,
}

impl PushRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry to the stream with exactly these labels, creating it if needed.
    pub fn add_entry(&mut self, labels: &Labels, entry: LogEntry) -> &mut Self {
        match self.streams.iter_mut().find(|s| &s.labels == labels) {
            Some(stream) => stream.values.push(entry),
            None => self.streams.push(Stream {
                labels: labels.clone(),
                values: vec![entry],
            }),
        }
        self
    }

    pub fn add_line(
        &mut self,
        labels: &Labels,
        timestamp: &DateTime<Utc>,
        line: impl Into<String>,
    ) -> Result<&mut Self> {
        let entry = LogEntry::new(to_nanos(timestamp)?, line);
        Ok(self.add_entry(labels, entry))
    }

    pub fn entry_count(&self) -> usize {
        self.streams.iter().map(|s| s.values.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entry_count() == 0
    }
}

#[derive(Debug, Clone)]
pub struct LokiClient {
    http: Client,
    base_url: Url,
    basic_auth: Option<BasicAuth>,
    tenant_id: Option<String>,
}

impl LokiClient {
    /// Validates the configuration and builds the HTTP transport.
    pub fn new(config: LokiClientConfig) -> Result<Self> {
        config.validate()?;
        let base_url = config.base_url()?;

        let http = Client::builder().timeout(config.read_timeout).build()?;

        tracing::debug!(
            "Loki client for {} (timeout {:?}, basic auth: {}, tenant: {:?})",
            base_url,
            config.read_timeout,
            config.basic_auth.is_some(),
            config.tenant_id
        );

        Ok(Self {
            http,
            base_url,
            basic_auth: config.basic_auth,
            tenant_id: config.tenant_id,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Run a log or metric query over `[start, end]`.
    pub async fn range_query(
        &self,
        query: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<QueryResult> {
        self.range_query_with(&RangeQuery::new(query, start, end))
            .await
    }

    pub async fn range_query_with(&self, request: &RangeQuery) -> Result<QueryResult> {
        let mut url = self.endpoint(QUERY_RANGE_PATH)?;
        request.append_to(&mut url)?;

        tracing::debug!("Range query {:?} from {} to {}", request.query, request.start, request.end);
        let response = self.send(self.http.get(url)).await?;
        let body = response.bytes().await?;

        let result = QueryResult::from_json(&body)?;
        tracing::debug!(
            "Range query returned {} {} ({} bytes)",
            result.data.len(),
            result.result_type(),
            body.len()
        );
        Ok(result)
    }

    /// Evaluate `query` at the current time.
    pub async fn instant_query(&self, query: &str) -> Result<QueryResult> {
        let body = self.instant_query_body(query).await?;
        QueryResult::from_json(&body)
    }

    /// Classify a query as log (`Streams`) or metric (`Matrix`) producing.
    /// Only `data.resultType` of the instant query response is decoded.
    pub async fn get_expected_result_type(&self, query: &str) -> Result<ResultType> {
        let body = self.instant_query_body(query).await?;
        let result_type = result_type_from_json(&body)?;
        tracing::debug!("Query {:?} produces {}", query, result_type);
        Ok(result_type)
    }

    async fn instant_query_body(&self, query: &str) -> Result<Vec<u8>> {
        let mut url = self.endpoint(QUERY_PATH)?;
        url.query_pairs_mut().append_pair("query", query);

        tracing::debug!("Instant query {:?}", query);
        let response = self.send(self.http.get(url)).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Push a single line stamped with `timestamp` under `labels`.
    pub async fn push_log_line(
        &self,
        line: &str,
        timestamp: DateTime<Utc>,
        labels: &Labels,
    ) -> Result<()> {
        let mut request = PushRequest::new();
        request.add_line(labels, &timestamp, line)?;
        self.push(&request).await
    }

    pub async fn push(&self, request: &PushRequest) -> Result<()> {
        let url = self.endpoint(PUSH_PATH)?;
        let body = serde_json::to_vec(request)?;

        tracing::debug!(
            "Pushing {} entries in {} streams ({} bytes)",
            request.entry_count(),
            request.streams.len(),
            body.len()
        );
        self.send(
            self.http
                .post(url)
                .header(CONTENT_TYPE, "application/json")
                .body(body),
        )
        .await?;
        Ok(())
    }

    /// Ask the ingesters to flush their in-memory chunks.
    pub async fn flush(&self) -> Result<()> {
        let url = self.endpoint(FLUSH_PATH)?;
        tracing::debug!("Flushing {}", url);
        self.send(
            self.http
                .post(url)
                .header(CONTENT_TYPE, "application/json")
                .body(""),
        )
        .await?;
        Ok(())
    }

    pub async fn ready(&self) -> Result<()> {
        let url = self.endpoint(READY_PATH)?;
        self.send(self.http.get(url)).await?;
        Ok(())
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// Applied to every outgoing request.
    fn decorate(&self, request: RequestBuilder) -> RequestBuilder {
        let request = match &self.basic_auth {
            Some(auth) => request.basic_auth(auth.username(), Some(auth.password())),
            None => request,
        };
        match &self.tenant_id {
            Some(tenant_id) => request.header(TENANT_HEADER, tenant_id),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = self.decorate(request).send().await?;
        error_for_status(response).await
    }
}

async fn error_for_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().clone();
    let body = response.text().await.unwrap_or_default();
    tracing::warn!("{} answered {}: {}", url.path(), status, body.trim());

    Err(LokiError::Status {
        status: status.as_u16(),
        reason: status.canonical_reason().unwrap_or_default().to_string(),
        body: body.trim().to_string(),
    })
}

fn to_nanos(instant: &DateTime<Utc>) -> Result<i64> {
    nanos_from_instant(instant).ok_or_else(|| LokiError::TimestampOutOfRange(instant.to_rfc3339()))
}
