//! Minimal PostgREST client.
//!
//! Table calls carry `Content-Profile` / `Accept-Profile` so they resolve in
//! the configured schema instead of `public`.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, RETRY_AFTER};
use reqwest::{RequestBuilder, StatusCode};
use scout_types::error::ConnectorError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Config;

const CONTENT_PROFILE: &str = "Content-Profile";
const ACCEPT_PROFILE: &str = "Accept-Profile";
const PREFER: &str = "Prefer";
const MERGE_DUPLICATES: &str = "resolution=merge-duplicates,return=minimal";
const RETURN_MINIMAL: &str = "return=minimal";

/// Longest error body excerpt carried into an error message.
const MAX_BODY_EXCERPT: usize = 512;

/// PostgREST error body.
#[derive(Debug, Default, Deserialize)]
struct PostgrestErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    hint: Option<String>,
}

pub struct PostgrestClient {
    http: reqwest::Client,
    base: String,
    schema: String,
    rpc_schema: String,
}

impl PostgrestClient {
    /// Build a client with the service key installed on every request.
    ///
    /// # Errors
    ///
    /// Returns a `config` error when the config is invalid or the key is not
    /// a valid header value.
    pub fn new(config: &Config) -> Result<Self, ConnectorError> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(auth_headers(&config.service_key)?)
            .build()
            .map_err(|e| ConnectorError::config("HTTP_CLIENT", e.to_string()))?;
        Ok(Self {
            http,
            base: config.rest_base(),
            schema: config.schema.clone(),
            rpc_schema: config.rpc_schema.clone(),
        })
    }

    #[must_use]
    pub fn table_url(&self, table: &str) -> String {
        format!("{}/{table}", self.base)
    }

    #[must_use]
    pub fn rpc_url(&self, function: &str) -> String {
        format!("{}/rpc/{function}", self.base)
    }

    /// Insert-or-update rows, resolving conflicts on `on_conflict`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConnectorError`] mapped from the HTTP outcome.
    pub async fn upsert<T: Serialize>(
        &self,
        table: &str,
        on_conflict: &str,
        rows: &[T],
    ) -> Result<(), ConnectorError> {
        let request = self
            .http
            .post(self.table_url(table))
            .query(&[("on_conflict", on_conflict)])
            .header(CONTENT_PROFILE, &self.schema)
            .header(PREFER, MERGE_DUPLICATES)
            .json(rows);
        send(request, table).await.map(drop)
    }

    /// Plain insert.
    ///
    /// # Errors
    ///
    /// Returns a [`ConnectorError`] mapped from the HTTP outcome.
    pub async fn insert<T: Serialize>(
        &self,
        table: &str,
        rows: &[T],
    ) -> Result<(), ConnectorError> {
        let request = self
            .http
            .post(self.table_url(table))
            .header(CONTENT_PROFILE, &self.schema)
            .header(PREFER, RETURN_MINIMAL)
            .json(rows);
        send(request, table).await.map(drop)
    }

    /// Select rows matching PostgREST filters such as `("id", "eq.x")`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConnectorError`] mapped from the HTTP outcome, or a
    /// `data` error when the rows do not decode.
    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&str, String)],
        limit: Option<usize>,
    ) -> Result<Vec<T>, ConnectorError> {
        let mut query: Vec<(&str, String)> = vec![("select", "*".to_string())];
        query.extend(filters.iter().cloned());
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }
        let request = self
            .http
            .get(self.table_url(table))
            .query(&query)
            .header(ACCEPT_PROFILE, &self.schema);
        let body = send(request, table).await?;
        serde_json::from_str(&body)
            .map_err(|e| ConnectorError::data("DECODE_FAILED", format!("{table}: {e}")))
    }

    /// Call a database function with named arguments.
    ///
    /// # Errors
    ///
    /// Returns a [`ConnectorError`] mapped from the HTTP outcome.
    pub async fn rpc(&self, function: &str, args: &Value) -> Result<(), ConnectorError> {
        let request = self
            .http
            .post(self.rpc_url(function))
            .header(CONTENT_PROFILE, &self.rpc_schema)
            .json(args);
        send(request, function).await.map(drop)
    }
}

fn auth_headers(service_key: &str) -> Result<HeaderMap, ConnectorError> {
    let invalid =
        |_| ConnectorError::config("INVALID_KEY", "service key is not a valid header value");
    let mut apikey = HeaderValue::from_str(service_key).map_err(invalid)?;
    apikey.set_sensitive(true);
    let mut bearer = HeaderValue::from_str(&format!("Bearer {service_key}")).map_err(invalid)?;
    bearer.set_sensitive(true);
    let mut headers = HeaderMap::new();
    headers.insert("apikey", apikey);
    headers.insert(AUTHORIZATION, bearer);
    Ok(headers)
}

/// Send a request and return the body of a successful response.
async fn send(request: RequestBuilder, target: &str) -> Result<String, ConnectorError> {
    let response = request.send().await.map_err(map_transport_error)?;
    let status = response.status();
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let body = response.text().await.map_err(map_transport_error)?;
    match map_status(status, retry_after.as_deref(), target, &body) {
        Some(err) => Err(err),
        None => Ok(body),
    }
}

/// Map a non-success response to a categorized error.
pub(crate) fn map_status(
    status: StatusCode,
    retry_after: Option<&str>,
    target: &str,
    body: &str,
) -> Option<ConnectorError> {
    if status.is_success() {
        return None;
    }
    let parsed: PostgrestErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = describe(status, target, &parsed, body);
    let err = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ConnectorError::auth("HTTP_UNAUTHORIZED", message)
        }
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after_ms = retry_after
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(|secs| secs.saturating_mul(1000));
            ConnectorError::rate_limit("RATE_LIMITED", message, retry_after_ms)
        }
        StatusCode::REQUEST_TIMEOUT => ConnectorError::transient_network("TIMEOUT", message),
        s if s.is_server_error() => ConnectorError::transient_network("SERVER_ERROR", message),
        _ => ConnectorError::data("REJECTED", message),
    };
    Some(match parsed.code {
        Some(code) => {
            err.with_details(serde_json::json!({ "pg_code": code, "status": status.as_u16() }))
        }
        None => err,
    })
}

fn describe(status: StatusCode, target: &str, parsed: &PostgrestErrorBody, raw: &str) -> String {
    let mut message = format!("{target}: HTTP {status}");
    match &parsed.message {
        Some(text) => {
            message.push_str(": ");
            message.push_str(text);
        }
        None if !raw.trim().is_empty() => {
            message.push_str(": ");
            message.push_str(excerpt(raw.trim()));
        }
        None => {}
    }
    if let Some(details) = &parsed.details {
        message.push_str(" (");
        message.push_str(details);
        message.push(')');
    }
    if let Some(hint) = &parsed.hint {
        message.push_str(" hint: ");
        message.push_str(hint);
    }
    message
}

fn excerpt(raw: &str) -> &str {
    if raw.len() <= MAX_BODY_EXCERPT {
        return raw;
    }
    let mut end = MAX_BODY_EXCERPT;
    while !raw.is_char_boundary(end) {
        end -= 1;
    }
    &raw[..end]
}

fn map_transport_error(e: reqwest::Error) -> ConnectorError {
    if e.is_timeout() {
        ConnectorError::transient_network("TIMEOUT", e.to_string())
    } else if e.is_connect() {
        ConnectorError::transient_network("CONNECTION_FAILED", e.to_string())
    } else {
        ConnectorError::transient_network("TRANSPORT_ERROR", e.to_string())
    }
}
