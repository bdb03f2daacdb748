//! Synchronous variant of the dataset fetcher.
//!
//! Blocks the calling thread until the response completes. Must not be
//! called from inside an async runtime.

use super::{DatasetRequest, FetchError, log_failure, parse_body, status_error};
use crate::table::Table;

/// Blocking counterpart of [`super::try_fetch_dataset`].
#[tracing::instrument(skip(req), fields(endpoint = %req.endpoint(), limit = req.limit().get()))]
pub fn try_fetch_dataset(req: &DatasetRequest) -> Result<Table, FetchError> {
    let resp = reqwest::blocking::Client::new().get(req.url()).send()?;

    let status = resp.status();
    if !status.is_success() {
        return Err(status_error(status, resp.text().unwrap_or_default()));
    }

    parse_body(&resp.bytes()?)
}

/// Blocking counterpart of [`super::fetch_dataset`].
pub fn fetch_dataset(req: &DatasetRequest) -> Option<Table> {
    try_fetch_dataset(req)
        .inspect_err(|e| log_failure(req, e))
        .ok()
}
