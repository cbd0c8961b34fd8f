use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use log::{trace, warn};
use reqwest::{header::ACCEPT, Client, Response};
use xpost_msg::{BatchResponse, SearchRequest, SearchResult, StreamFrame};

use crate::{
    config::SearchConfig,
    transport::{FrameStream, SearchTransport, TransportError},
};

/// Search over HTTP: a `text/event-stream` endpoint and a JSON batch
/// endpoint taking the same request body.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client,
    config: SearchConfig,
}

impl HttpTransport {
    pub fn new(config: SearchConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(client: Client, config: SearchConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }
}

#[async_trait]
impl SearchTransport for HttpTransport {
    async fn stream(&self, request: &SearchRequest) -> Result<FrameStream, TransportError> {
        trace!("opening search stream for {:?}", request.query);

        let response = self
            .client
            .post(self.config.stream_url())
            .header(ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .await?;
        let response = check_status(response).await?;

        Ok(decode_frames(response.bytes_stream()))
    }

    async fn batch(&self, request: &SearchRequest) -> Result<Vec<SearchResult>, TransportError> {
        trace!("batch search for {:?}", request.query);

        let response = self
            .client
            .post(self.config.batch_url())
            .json(request)
            .send()
            .await?;
        let response = check_status(response).await?;
        let body = response.text().await?;
        let batch: BatchResponse = serde_json::from_str(&body)?;

        Ok(batch.results)
    }
}

async fn check_status(response: Response) -> Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(TransportError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Decodes a `text/event-stream` body into frames. Events without data,
/// `[DONE]` markers and malformed JSON are skipped.
pub fn decode_frames<S, B>(bytes: S) -> FrameStream
where
    S: Stream<Item = Result<B, reqwest::Error>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    bytes
        .eventsource()
        .filter_map(|event| async move {
            match event {
                Ok(event) => parse_frame(&event.data).map(Ok),
                Err(error) => Some(Err(TransportError::from(error))),
            }
        })
        .boxed()
}

fn parse_frame(data: &str) -> Option<StreamFrame> {
    let data = data.trim();
    if data.is_empty() || data == "[DONE]" {
        return None;
    }

    match serde_json::from_str(data) {
        Ok(frame) => Some(frame),
        Err(error) => {
            warn!("Skipping malformed search frame, cause: {}", error);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{stream, TryStreamExt};
    use wiremock::{
        matchers::{body_partial_json, method, path},
        Mock, MockServer, ResponseTemplate,
    };
    use xpost_msg::{FrameType, Network};

    const PARTIAL: &str = r#"{"type":"partial","source":"networkA","results":[{"network":"networkA","id":"1","username":"alice"}],"completedSources":[]}"#;
    const COMPLETE: &str = r#"{"type":"complete","completedSources":["networkA"]}"#;

    fn config(server: &MockServer) -> SearchConfig {
        SearchConfig {
            base_url: server.uri(),
            ..SearchConfig::default()
        }
    }

    fn request() -> SearchRequest {
        SearchConfig::default().request("ali", &[Network::NetworkA])
    }

    async fn decode(chunks: Vec<&str>) -> Vec<StreamFrame> {
        let chunks: Vec<Result<Vec<u8>, reqwest::Error>> = chunks
            .into_iter()
            .map(|chunk| Ok(chunk.as_bytes().to_vec()))
            .collect();
        decode_frames(stream::iter(chunks)).try_collect().await.unwrap()
    }

    #[tokio::test]
    async fn test_decode_handles_split_chunks() {
        let body = format!("data: {}\n\ndata: {}\n\n", PARTIAL, COMPLETE);
        let frames = decode(vec![
            &body[..10],
            &body[10..PARTIAL.len() + 20],
            &body[PARTIAL.len() + 20..],
        ])
        .await;

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].frame_type, FrameType::Partial);
        assert_eq!(frames[1].frame_type, FrameType::Complete);
    }

    #[tokio::test]
    async fn test_decode_accepts_crlf_events() {
        let body = r#"data: {"type":"partial","source":"networkB","results":[{"network":"networkB","pubkey":"ab","displayName":"Zoë"}]}"#
            .to_string()
            + "\r\n\r\n";
        let frames = decode(vec![body.as_str()]).await;

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].results[0].display_name(), "Zoë");
    }

    #[tokio::test]
    async fn test_decode_skips_comments_and_garbage() {
        let frames = decode(vec![
            ": keep-alive\n\ndata: not json\n\nevent: done\ndata: [DONE]\n\n",
        ])
        .await;
        assert!(frames.is_empty());
    }

    #[tokio::test]
    async fn test_stream_reads_frames() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/search/stream"))
            .and(body_partial_json(serde_json::json!({ "query": "ali" })))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                format!("data: {}\n\ndata: {}\n\n", PARTIAL, COMPLETE),
                "text/event-stream",
            ))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(config(&server));
        let frames: Vec<StreamFrame> = transport
            .stream(&request())
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].results[0].identifier(), "alice");
    }

    #[tokio::test]
    async fn test_stream_reports_http_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/search/stream"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(config(&server));
        match transport.stream(&request()).await {
            Err(TransportError::Status { status, body }) => {
                assert_eq!(status, 502);
                assert_eq!(body, "bad gateway");
            }
            _ => panic!("expected a status error"),
        }
    }

    #[tokio::test]
    async fn test_batch_reads_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    { "network": "networkA", "id": "1", "username": "alice" },
                    { "network": "networkB", "pubkey": "ab", "displayName": "Alice W." }
                ]
            })))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(config(&server));
        let results = transport.batch(&request()).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].display_name(), "Alice W.");
    }
}
