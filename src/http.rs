//! Shared HTTP transport for the upstream providers
//!
//! Turns `reqwest` results into classified [`PlaylistError`]s so every client
//! reports failures the same way: send errors and body read errors are
//! transient, statuses are classified by [`ErrorKind::from_status`], and
//! undecodable bodies are malformed.

use std::time::{Duration, Instant};

use anyhow::{Context, Result as AnyResult};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::Result;
use crate::error::{ErrorKind, PlaylistError, Stage};

const USER_AGENT: &str = concat!("weather-playlist/", env!("CARGO_PKG_VERSION"));

/// Calls slower than this are logged
const SLOW_CALL: Duration = Duration::from_secs(2);

/// Longest upstream body excerpt kept in error messages
const BODY_EXCERPT: usize = 200;

/// Create a client with a mandatory per-call timeout
pub fn build_client(timeout: Duration) -> AnyResult<Client> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .with_context(|| "Failed to create HTTP client")
}

/// Send a request, classifying transport failures as transient
pub async fn send(stage: Stage, request: RequestBuilder) -> Result<Response> {
    let start_time = Instant::now();
    let response = request.send().await.map_err(|e| {
        let reason = if e.is_timeout() {
            "request timed out"
        } else if e.is_connect() {
            "connection failed"
        } else {
            "request failed"
        };
        PlaylistError::transient(stage, format!("{reason}: {e}"))
    })?;

    let elapsed = start_time.elapsed();
    if elapsed > SLOW_CALL {
        warn!(%stage, "Slow upstream response: {:.3}s", elapsed.as_secs_f64());
    }
    debug!(%stage, status = response.status().as_u16(), "Upstream responded");
    Ok(response)
}

/// Read a JSON body, classifying non-success statuses first
pub async fn read_json<T: DeserializeOwned>(stage: Stage, response: Response) -> Result<T> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| PlaylistError::transient(stage, format!("failed to read body: {e}")))?;

    if let Some(kind) = ErrorKind::from_status(status.as_u16()) {
        return Err(PlaylistError::new(
            stage,
            kind,
            format!("HTTP {}: {}", status.as_u16(), excerpt(&body)),
        ));
    }

    decode(stage, &body)
}

/// Decode a JSON document, any shape mismatch is malformed
pub fn decode<T: DeserializeOwned>(stage: Stage, body: &str) -> Result<T> {
    serde_json::from_str(body)
        .map_err(|e| PlaylistError::malformed(stage, format!("unexpected response shape: {e}")))
}

fn excerpt(body: &str) -> &str {
    match body.char_indices().nth(BODY_EXCERPT) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
