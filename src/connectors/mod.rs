use futures_util::stream::BoxStream;
use thiserror::Error;

pub mod openai;

use crate::core::entities::{UpstreamChunk, UpstreamRequest};

pub type ChunkStream = BoxStream<'static, Result<UpstreamChunk, ConnectorError>>;

/// An OpenAI-compatible upstream. Implementations are shared read-only across requests.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    fn name(&self) -> &'static str;

    /// Starts one streaming completion. Resolves once the provider has accepted
    /// the call; the returned stream yields deltas until the provider ends it.
    async fn stream_chat(&self, req: UpstreamRequest) -> Result<ChunkStream, ConnectorError>;

    /// Raw body of the provider's model listing.
    async fn list_models(&self) -> Result<serde_json::Value, ConnectorError>;
}

#[derive(Error, Debug)]
pub enum ConnectorError {
    #[error("upstream credentials not configured")]
    MissingCredentials,
    #[error("upstream returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("upstream unreachable: {0}")]
    Connect(String),
    #[error("upstream_timeout")]
    Timeout,
    #[error("upstream stream error: {0}")]
    Stream(String),
    #[error("upstream decode error: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ConnectorError {
    fn from(e: reqwest::Error) -> Self {
        // Strip the URL so query strings never reach logs or clients.
        let e = e.without_url();
        if e.is_timeout() {
            ConnectorError::Timeout
        } else if e.is_connect() {
            ConnectorError::Connect(e.to_string())
        } else if e.is_decode() {
            ConnectorError::Decode(e.to_string())
        } else {
            ConnectorError::Stream(e.to_string())
        }
    }
}
