//! JSON-RPC transport.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::StatusCode;
use scout_types::error::ConnectorError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::OnceCell;

use crate::config::Config;
use crate::query::SearchRead;

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'static str,
    params: RpcParams<'a>,
    id: u64,
}

#[derive(Debug, Serialize)]
struct RpcParams<'a> {
    service: &'a str,
    method: &'a str,
    args: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

/// Error object of a failed JSON-RPC call.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<RpcErrorData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcErrorData {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub message: String,
}

/// Odoo session-expired error code.
const SESSION_EXPIRED_CODE: i64 = 100;

/// Odoo JSON-RPC client. The user id is cached after the first successful
/// authentication.
pub struct OdooClient {
    http: reqwest::Client,
    endpoint: String,
    database: String,
    username: String,
    password: String,
    uid: OnceCell<i64>,
    next_id: AtomicU64,
}

impl OdooClient {
    /// Build a client from validated config.
    ///
    /// # Errors
    ///
    /// Returns a `config` error when the config is invalid or the HTTP
    /// client cannot be constructed.
    pub fn new(config: &Config) -> Result<Self, ConnectorError> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ConnectorError::config("HTTP_CLIENT", e.to_string()))?;
        Ok(Self {
            http,
            endpoint: config.endpoint(),
            database: config.database.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            uid: OnceCell::new(),
            next_id: AtomicU64::new(1),
        })
    }

    /// Authenticate once and return the cached user id on later calls.
    ///
    /// # Errors
    ///
    /// Returns an `auth` error when Odoo rejects the credentials.
    pub async fn uid(&self) -> Result<i64, ConnectorError> {
        self.uid
            .get_or_try_init(|| async {
                let result = self
                    .call(
                        "common",
                        "authenticate",
                        vec![
                            json!(self.database),
                            json!(self.username),
                            json!(self.password),
                            json!({}),
                        ],
                    )
                    .await?;
                let uid = parse_uid(&result)?;
                tracing::info!(uid, database = %self.database, "Authenticated with Odoo");
                Ok::<i64, ConnectorError>(uid)
            })
            .await
            .copied()
    }

    /// Run a `search_read` and return the raw rows.
    ///
    /// # Errors
    ///
    /// Returns a [`ConnectorError`] on transport, protocol, or RPC failure.
    pub async fn search_read(&self, request: &SearchRead) -> Result<Vec<Value>, ConnectorError> {
        let uid = self.uid().await?;
        let mut args = vec![json!(self.database), json!(uid), json!(self.password)];
        args.extend(request.to_execute_args());
        let result = self.call("object", "execute_kw", args).await?;
        match result {
            Value::Array(rows) => {
                tracing::debug!(model = request.model, rows = rows.len(), "search_read");
                Ok(rows)
            }
            other => Err(ConnectorError::internal(
                "UNEXPECTED_RESULT",
                format!("search_read on {} returned {}", request.model, kind(&other)),
            )),
        }
    }

    async fn call(
        &self,
        service: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, ConnectorError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            method: "call",
            params: RpcParams {
                service,
                method,
                args,
            },
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };
        let response = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(map_transport_error)?;

        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        if let Some(err) = map_status(response.status(), retry_after.as_deref()) {
            return Err(err);
        }

        let body: RpcResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                map_transport_error(e)
            } else {
                ConnectorError::internal("INVALID_RESPONSE", format!("{service}.{method}: {e}"))
            }
        })?;
        if let Some(error) = body.error {
            return Err(map_rpc_error(&error));
        }
        body.result.ok_or_else(|| {
            ConnectorError::internal(
                "INVALID_RESPONSE",
                format!("{service}.{method}: response has neither result nor error"),
            )
        })
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// `authenticate` returns the user id, or `false` for rejected credentials.
pub(crate) fn parse_uid(result: &Value) -> Result<i64, ConnectorError> {
    match result.as_i64() {
        Some(uid) if uid > 0 => Ok(uid),
        _ => Err(ConnectorError::auth(
            "AUTH_REJECTED",
            "Odoo rejected the configured credentials",
        )),
    }
}

pub(crate) fn map_status(status: StatusCode, retry_after: Option<&str>) -> Option<ConnectorError> {
    if status.is_success() {
        return None;
    }
    let message = format!("Odoo returned HTTP {status}");
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
        s if s.is_server_error() => ConnectorError::transient_network("SERVER_ERROR", message),
        StatusCode::REQUEST_TIMEOUT => ConnectorError::transient_network("TIMEOUT", message),
        _ => ConnectorError::internal("HTTP_ERROR", message),
    };
    Some(err)
}

pub(crate) fn map_rpc_error(error: &RpcError) -> ConnectorError {
    let (name, detail) = match &error.data {
        Some(data) => (data.name.as_str(), data.message.as_str()),
        None => ("", ""),
    };
    let message = if detail.is_empty() {
        error.message.clone()
    } else {
        format!("{}: {detail}", error.message)
    };
    if error.code == SESSION_EXPIRED_CODE || name.ends_with("AccessDenied") {
        ConnectorError::auth("ACCESS_DENIED", message)
    } else if name.ends_with("AccessError") {
        ConnectorError::auth("ACCESS_ERROR", message)
    } else if name.contains("OperationalError") || name.contains("SerializationFailure") {
        ConnectorError::transient_network("SERVER_BUSY", message)
    } else {
        ConnectorError::internal("RPC_ERROR", message).with_details(json!({
            "code": error.code,
            "name": name,
        }))
    }
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
