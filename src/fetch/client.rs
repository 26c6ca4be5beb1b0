use async_trait::async_trait;
use reqwest::{Request, Response};

/// Executes a prepared request. Lets callers wrap the transport, e.g. to
/// attach credentials, without touching the download logic.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
