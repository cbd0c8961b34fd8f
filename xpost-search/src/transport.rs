use async_trait::async_trait;
use eventsource_stream::EventStreamError;
use futures::stream::BoxStream;
use thiserror::Error as ThisError;
use xpost_msg::{SearchRequest, SearchResult, StreamFrame};

#[derive(Debug, ThisError)]
pub enum TransportError {
    #[error("Failed to reach search endpoint, cause: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Failed to read search stream, cause: {0}")]
    Stream(#[from] EventStreamError<reqwest::Error>),
    #[error("Search endpoint responded with {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Failed to decode search response, cause: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type FrameStream = BoxStream<'static, Result<StreamFrame, TransportError>>;

/// Where search results come from. `stream` and `batch` take the same
/// request and must return the same results.
#[async_trait]
pub trait SearchTransport: Send + Sync {
    async fn stream(&self, request: &SearchRequest) -> Result<FrameStream, TransportError>;

    async fn batch(&self, request: &SearchRequest) -> Result<Vec<SearchResult>, TransportError>;
}
