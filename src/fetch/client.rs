use async_trait::async_trait;
use reqwest::{Request, Response};

/// Transport seam for every outgoing request, so auth wrappers and test
/// doubles can sit between the fetcher and the network.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
