//! Dataset fetching over HTTP.
//!
//! [`try_fetch_dataset`] performs one GET against an Open Data endpoint and
//! returns a typed [`FetchError`] on failure. [`fetch_dataset`] wraps it with
//! the fail-soft policy used interactively: the error is logged once and
//! turned into `None`.

mod basic;
mod client;
mod request;
pub mod auth;
pub mod blocking;

pub use basic::BasicClient;
pub use client::HttpClient;
pub use request::{DEFAULT_LIMIT, DatasetRequest, LIMIT_PARAM};

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, error};

use crate::parser::{ParseError, parse_table};
use crate::table::Table;

/// Longest slice of an error response body kept in [`FetchError::Status`].
const ERROR_BODY_PREVIEW: usize = 200;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("malformed response body: {0}")]
    MalformedBody(#[from] ParseError),
}

impl FetchError {
    /// Short machine-readable label, used in fetch logs.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::InvalidRequest(_) => "invalid_request",
            FetchError::Network(_) => "network_error",
            FetchError::Status { .. } => "http_status",
            FetchError::MalformedBody(_) => "malformed_body",
        }
    }
}

#[async_trait]
impl<C: HttpClient + ?Sized> HttpClient for Box<C> {
    async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        (**self).execute(req).await
    }
}

/// Builds the client used against a portal, sending `app_token` as
/// `X-App-Token` when one is configured.
pub fn client_with_token(app_token: Option<&str>) -> anyhow::Result<Box<dyn HttpClient>> {
    Ok(match app_token {
        Some(token) => Box::new(auth::ApiKey::app_token(BasicClient::new(), token)?),
        None => Box::new(BasicClient::new()),
    })
}

/// Issues a GET for `url` and returns the body of a 2xx response.
pub async fn fetch_bytes<C: HttpClient + ?Sized>(
    client: &C,
    url: reqwest::Url,
) -> Result<Vec<u8>, FetchError> {
    let req = reqwest::Request::new(reqwest::Method::GET, url);

    let resp = client.execute(req).await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(status_error(status, resp.text().await.unwrap_or_default()));
    }

    Ok(resp.bytes().await?.to_vec())
}

/// Error for a non-2xx response, keeping only the start of the body.
pub(crate) fn status_error(status: StatusCode, body: String) -> FetchError {
    FetchError::Status {
        status,
        body: body.chars().take(ERROR_BODY_PREVIEW).collect(),
    }
}

/// Parses a successful response body, shared by the async and blocking paths.
pub(crate) fn parse_body(bytes: &[u8]) -> Result<Table, FetchError> {
    debug!(bytes = bytes.len(), "Response received, parsing");

    let table = parse_table(bytes)?;
    debug!(rows = table.len(), columns = table.columns().len(), "Dataset parsed");
    Ok(table)
}

/// Fetches and parses one dataset, surfacing the underlying error.
#[tracing::instrument(skip(client, req), fields(endpoint = %req.endpoint(), limit = req.limit().get()))]
pub async fn try_fetch_dataset<C: HttpClient + ?Sized>(
    client: &C,
    req: &DatasetRequest,
) -> Result<Table, FetchError> {
    let bytes = fetch_bytes(client, req.url()).await?;
    parse_body(&bytes)
}

/// Fetches one dataset, logging a diagnostic and returning `None` on any
/// failure.
///
/// A dataset that exists but has no rows is `Some` of an empty table.
pub async fn fetch_dataset<C: HttpClient + ?Sized>(
    client: &C,
    req: &DatasetRequest,
) -> Option<Table> {
    match try_fetch_dataset(client, req).await {
        Ok(table) => Some(table),
        Err(e) => {
            log_failure(req, &e);
            None
        }
    }
}

/// Emits the single diagnostic line for a failed fetch.
pub fn log_failure(req: &DatasetRequest, e: &FetchError) {
    error!(
        endpoint = %req.endpoint(),
        limit = req.limit().get(),
        kind = e.kind(),
        error = %e,
        "Dataset fetch failed"
    );
}
