//! Shared HTTP layer used by every registry client, per spec §4.2 and §5:
//! one connection pool per registry host (default 16 connections/host), a
//! 30s metadata timeout, a 300s blob timeout, and a fixed `User-Agent`.
//!
//! The teacher constructed one ad-hoc `reqwest::Client` per service
//! (`NpmClient`, `PypiClient`). With eight registry clients that pattern
//! would mean eight independent pools fighting the host's connection
//! budget, so this module generalizes it into one engine-owned
//! `SharedClients` value passed to every registry client by reference —
//! the §9 redesign flag ("construct once at engine creation, hold as
//! fields of an engine value, pass explicitly").

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use thiserror::Error;

use crate::util::backoff::jittered_delay;

const METADATA_TIMEOUT: Duration = Duration::from_secs(30);
const BLOB_TIMEOUT: Duration = Duration::from_secs(300);
const USER_AGENT: &str = concat!("polypm/", env!("CARGO_PKG_VERSION"));
const MAX_RETRIES: u32 = 3;

/// Ecosystem-agnostic HTTP outcome. Registry clients attach ecosystem/name
/// context when converting this into an [`EngineError`](crate::models::error::EngineError).
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unexpected status {status} for {url}")]
    UnexpectedStatus { status: StatusCode, url: String },
    #[error("network failure after {attempts} attempts: {detail}")]
    NetworkFailure { attempts: u32, detail: String },
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct SharedClients {
    client: Client,
}

impl SharedClients {
    pub fn new() -> Self {
        let client = Client::builder()
            .pool_max_idle_per_host(16)
            .user_agent(USER_AGENT)
            .build()
            .expect("reqwest client configuration is always valid");
        Self { client }
    }

    pub fn raw(&self) -> &Client {
        &self.client
    }

    /// GETs a metadata document (30s timeout), retrying transient failures
    /// with exponential backoff per spec §4.6/§8.
    pub async fn get_metadata(&self, url: &str) -> Result<Response, HttpError> {
        self.get_with_timeout(url, METADATA_TIMEOUT).await
    }

    /// GETs a blob (300s timeout), same retry policy.
    pub async fn get_blob(&self, url: &str) -> Result<Response, HttpError> {
        self.get_with_timeout(url, BLOB_TIMEOUT).await
    }

    async fn get_with_timeout(&self, url: &str, timeout: Duration) -> Result<Response, HttpError> {
        let mut attempt = 0;
        loop {
            let result = self.client.get(url).timeout(timeout).send().await;
            match classify(result, url) {
                Ok(response) => return Ok(response),
                Err(Retryable::Yes(detail)) if attempt < MAX_RETRIES => {
                    attempt += 1;
                    let jitter_seed = (attempt as f64 * 0.37) % 1.0;
                    let delay = jittered_delay(attempt - 1, jitter_seed);
                    tracing::warn!(url, attempt, detail, ?delay, "retrying transient HTTP failure");
                    tokio::time::sleep(delay).await;
                }
                Err(Retryable::Yes(detail)) => {
                    return Err(HttpError::NetworkFailure {
                        attempts: MAX_RETRIES + 1,
                        detail,
                    });
                }
                Err(Retryable::No(err)) => return Err(err),
            }
        }
    }
}

impl Default for SharedClients {
    fn default() -> Self {
        Self::new()
    }
}

enum Retryable {
    Yes(String),
    No(HttpError),
}

fn classify(result: reqwest::Result<Response>, url: &str) -> Result<Response, Retryable> {
    match result {
        Ok(response) => {
            let status = response.status();
            if status.is_success() {
                Ok(response)
            } else if status == StatusCode::NOT_FOUND {
                Err(Retryable::No(HttpError::NotFound(url.to_string())))
            } else if status.is_server_error() {
                Err(Retryable::Yes(format!("server returned {status}")))
            } else {
                Err(Retryable::No(HttpError::UnexpectedStatus {
                    status,
                    url: url.to_string(),
                }))
            }
        }
        Err(err) if err.is_timeout() || err.is_connect() => Err(Retryable::Yes(err.to_string())),
        Err(err) => Err(Retryable::No(HttpError::Transport(err))),
    }
}
