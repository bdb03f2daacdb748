use reqwest::Url;
use std::num::NonZeroUsize;

use super::FetchError;

/// Rows requested when the caller does not say otherwise.
pub const DEFAULT_LIMIT: NonZeroUsize = NonZeroUsize::new(1000).unwrap();

/// Query parameter the portal reads the row cap from.
pub const LIMIT_PARAM: &str = "$limit";

/// Where to fetch a dataset from and how many rows to ask for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetRequest {
    endpoint: Url,
    limit: NonZeroUsize,
}

impl DatasetRequest {
    /// Builds a request for `endpoint` with the default limit of 1000 rows.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidRequest`] if `endpoint` is not an
    /// absolute `http` or `https` URL.
    pub fn new(endpoint: &str) -> Result<Self, FetchError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| FetchError::InvalidRequest(format!("{endpoint}: {e}")))?;

        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(FetchError::InvalidRequest(format!(
                "unsupported scheme '{}'",
                endpoint.scheme()
            )));
        }

        Ok(Self {
            endpoint,
            limit: DEFAULT_LIMIT,
        })
    }

    /// Whether `source` is an absolute `http` or `https` URL, as opposed to
    /// a local path such as `http_dump.json`.
    pub fn is_http_url(source: &str) -> bool {
        Url::parse(source).is_ok_and(|u| matches!(u.scheme(), "http" | "https"))
    }

    pub fn with_limit(mut self, limit: NonZeroUsize) -> Self {
        self.limit = limit;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn limit(&self) -> NonZeroUsize {
        self.limit
    }

    /// The URL actually requested: the endpoint with the row limit appended.
    pub fn url(&self) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair(LIMIT_PARAM, &self.limit.to_string());
        url
    }
}
