// src/filter/remote.rs
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{FilterKind, PreferenceFilter, FILTER_TOKEN_HEADER};
use crate::error::RemoteFilterError;
use crate::ingest::types::{FeedItem, RawSnapshot};

#[derive(Serialize)]
struct Req<'a> {
    preferences: &'a [String],
}

/// `{statusCode, body}` envelope. `body` is the item array, either inline or JSON-encoded
/// in a string (the function-invocation convention).
#[derive(Deserialize)]
struct Resp {
    #[serde(rename = "statusCode")]
    status_code: u16,
    #[serde(default)]
    body: Value,
}

/// Filter delegated to a remote service that reads the latest raw snapshot from the
/// shared object store. Only the preferences travel over the wire.
pub struct RemoteFilter {
    http: reqwest::Client,
    url: String,
    timeout: Duration,
    token: Option<String>,
}

impl RemoteFilter {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RemoteFilterError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("news-galore/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(timeout.min(Duration::from_secs(4)))
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteFilterError::Unreachable(format!("building http client: {e}")))?;
        Ok(Self {
            http,
            url: url.into(),
            timeout,
            token: None,
        })
    }

    /// Secret sent in `X-Filter-Token` on every call.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

fn decode_body(body: Value) -> Result<Vec<FeedItem>, RemoteFilterError> {
    let parsed = match body {
        Value::String(s) => serde_json::from_str::<Vec<FeedItem>>(&s),
        other @ Value::Array(_) => serde_json::from_value::<Vec<FeedItem>>(other),
        other => {
            return Err(RemoteFilterError::Malformed(format!(
                "expected item array, got {}",
                json_kind(&other)
            )))
        }
    };
    parsed.map_err(|e| RemoteFilterError::Malformed(e.to_string()))
}

/// Pull `{"error": "..."}` out of a failure body when there is one.
fn error_detail(body: &Value) -> String {
    let decoded;
    let obj = match body {
        Value::String(s) => {
            decoded = serde_json::from_str::<Value>(s).unwrap_or(Value::String(s.clone()));
            &decoded
        }
        other => other,
    };
    obj.get("error")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| obj.to_string())
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[async_trait]
impl PreferenceFilter for RemoteFilter {
    async fn apply(
        &self,
        _snapshot: &RawSnapshot,
        preferences: &[String],
    ) -> Result<Vec<FeedItem>, RemoteFilterError> {
        let mut req = self.http.post(&self.url).json(&Req { preferences });
        if let Some(token) = &self.token {
            req = req.header(FILTER_TOKEN_HEADER, token);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RemoteFilterError::Timeout(self.timeout)
                } else {
                    RemoteFilterError::Unreachable(e.to_string())
                }
            })?;

        let http_status = resp.status();
        if !http_status.is_success() {
            return Err(RemoteFilterError::Status {
                code: http_status.as_u16(),
                detail: "invocation failed".to_string(),
            });
        }

        let env: Resp = resp.json().await.map_err(|e| {
            if e.is_timeout() {
                RemoteFilterError::Timeout(self.timeout)
            } else {
                RemoteFilterError::Malformed(e.to_string())
            }
        })?;

        tracing::info!(target: "filter", status = env.status_code, "remote filter answered");
        if env.status_code != 200 {
            return Err(RemoteFilterError::Status {
                code: env.status_code,
                detail: error_detail(&env.body),
            });
        }
        decode_body(env.body)
    }

    fn kind(&self) -> FilterKind {
        FilterKind::Remote
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn body_accepts_inline_and_encoded_arrays() {
        let inline = decode_body(json!([{"id": 1}])).unwrap();
        let encoded = decode_body(json!("[{\"id\": 1}]")).unwrap();
        assert_eq!(inline, encoded);
        assert!(decode_body(json!({"id": 1})).is_err());
        assert!(decode_body(json!("not json")).is_err());
    }

    #[test]
    fn error_detail_reads_encoded_error_objects() {
        assert_eq!(
            error_detail(&json!("{\"error\": \"No raw news files found\"}")),
            "No raw news files found"
        );
        assert_eq!(error_detail(&json!({"error": "x"})), "x");
        assert_eq!(error_detail(&json!("plain")), "\"plain\"");
    }
}
