//! Shared request plumbing.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{RemoteError, RemoteResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("hearth/", env!("CARGO_PKG_VERSION"));

pub(crate) fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

pub(crate) fn join(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Fail on a non-2xx status, lifting `message` out of a JSON error body.
pub(crate) async fn check(response: reqwest::Response) -> RemoteResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.bytes().await?;
    Err(status_error(status, &body))
}

pub(crate) fn status_error(status: reqwest::StatusCode, body: &[u8]) -> RemoteError {
    let message = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| String::from_utf8_lossy(body).trim().to_string());
    RemoteError::Status {
        status: status.as_u16(),
        message,
    }
}

pub(crate) async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> RemoteResult<T> {
    let response = check(response).await?;
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| RemoteError::Malformed(e.to_string()))
}
