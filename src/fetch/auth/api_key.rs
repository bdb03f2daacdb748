use crate::fetch::client::HttpClient;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue};

/// Header Socrata portals read an application token from.
pub const APP_TOKEN_HEADER: &str = "X-App-Token";

/// An [`HttpClient`] wrapper that sends an API key as an HTTP header.
///
/// The header name and value are validated once at construction so that
/// `execute` cannot fail on them.
pub struct ApiKey<C> {
    inner: C,
    header_name: HeaderName,
    key: HeaderValue,
}

impl<C> ApiKey<C> {
    /// # Errors
    ///
    /// Returns an error if `header_name` is not a valid header name or `key`
    /// contains characters not allowed in a header value.
    pub fn new(inner: C, header_name: &str, key: &str) -> Result<Self> {
        let header_name = HeaderName::from_bytes(header_name.as_bytes())?;
        let mut key = HeaderValue::from_str(key)?;
        key.set_sensitive(true);
        Ok(Self {
            inner,
            header_name,
            key,
        })
    }

    /// Sends `token` as an Open Data application token (`X-App-Token`), which
    /// raises the portal's anonymous rate limits.
    pub fn app_token(inner: C, token: &str) -> Result<Self> {
        Self::new(inner, APP_TOKEN_HEADER, token)
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for ApiKey<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        req.headers_mut()
            .insert(self.header_name.clone(), self.key.clone());
        self.inner.execute(req).await
    }
}
