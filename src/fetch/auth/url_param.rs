use crate::fetch::client::HttpClient;
use async_trait::async_trait;

/// Query parameter Socrata portals accept an application token under.
pub const APP_TOKEN_PARAM: &str = "$$app_token";

/// An [`HttpClient`] wrapper that appends an API key as a URL query parameter.
///
/// Useful where headers cannot be set, e.g. when the request URL is shared
/// with another tool.
pub struct UrlParam<C> {
    pub inner: C,
    pub param_name: String,
    pub key: String,
}

impl<C> UrlParam<C> {
    pub fn app_token(inner: C, token: String) -> Self {
        Self {
            inner,
            param_name: APP_TOKEN_PARAM.to_string(),
            key: token,
        }
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for UrlParam<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        req.url_mut()
            .query_pairs_mut()
            .append_pair(&self.param_name, &self.key);
        self.inner.execute(req).await
    }
}
