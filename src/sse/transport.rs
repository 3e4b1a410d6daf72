//! Drives a single streaming HTTP response through the SSE parser, one chunk at a
//! time, calling back into the caller synchronously for each event.

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::HeaderMap;
use tokio_util::sync::CancellationToken;

use crate::error::LlmError;
use crate::http::classify_http_error;
use crate::sse::parser::{SseEvent, SseParser};

/// How a stream ended. Exactly one of these fires per call to [`StreamSse::run`].
pub enum SseOutcome {
    /// The server closed the connection cleanly after the response body was fully read.
    Completed,
    /// An error occurred opening the connection, reading the response, or decoding a chunk.
    Error(LlmError),
    /// `cancel` was observed before the stream completed.
    Cancelled,
}

/// Stateless driver for one SSE request. Construct per call; there is no
/// persistent state to own beyond the parser, which lives for the duration of
/// [`run`](StreamSse::run).
pub struct StreamSse;

impl StreamSse {
    /// Opens `POST url` with `headers` and a JSON `body`, then feeds the response
    /// body through [`SseParser`], invoking `on_event` synchronously for each
    /// parsed event before requesting the next chunk. `on_event` is never called
    /// again after this function returns.
    ///
    /// Cancellation is observed at two points: before the connection opens, and at
    /// each chunk boundary while reading the body — matching the "cooperative,
    /// chunk-boundary" cancellation granularity rather than pre-empting mid-chunk.
    ///
    /// `inactivity_timeout` bounds the gap between consecutive chunks (including the
    /// first); the timer resets every time a chunk arrives. Exceeding it fails the
    /// stream with `SseOutcome::Error(LlmError::Timeout(_))`.
    pub async fn run(
        client: &reqwest::Client,
        url: &str,
        headers: HeaderMap,
        body: &serde_json::Value,
        cancel: CancellationToken,
        inactivity_timeout: Duration,
        mut on_event: impl FnMut(SseEvent),
    ) -> SseOutcome {
        let response = tokio::select! {
            _ = cancel.cancelled() => return SseOutcome::Cancelled,
            result = client.post(url).headers(headers).json(body).send() => result,
        };

        let response = match response {
            Ok(response) => response,
            Err(e) => return SseOutcome::Error(classify_transport_failure(&e)),
        };

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return SseOutcome::Error(classify_http_error(status.as_u16(), &text, &headers));
        }

        let mut parser = SseParser::new();
        let mut byte_stream = response.bytes_stream();

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return SseOutcome::Cancelled,
                outcome = tokio::time::timeout(inactivity_timeout, byte_stream.next()) => outcome,
            };

            match next {
                Ok(Some(Ok(chunk))) => {
                    for event in parser.feed(&chunk) {
                        on_event(event);
                    }
                }
                Ok(Some(Err(e))) => return SseOutcome::Error(classify_transport_failure(&e)),
                Ok(None) => return SseOutcome::Completed,
                Err(_) => return SseOutcome::Error(LlmError::Timeout(inactivity_timeout)),
            }
        }
    }
}

fn classify_transport_failure(e: &reqwest::Error) -> LlmError {
    if e.is_timeout() {
        LlmError::Timeout(std::time::Duration::from_secs(0))
    } else {
        LlmError::Network(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn completes_after_a_clean_close_and_delivers_every_event() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/stream"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("data: one\n\ndata: two\n\n", "text/event-stream"),
            )
            .mount(&server)
            .await;

        let mut received = Vec::new();
        let outcome = StreamSse::run(
            &reqwest::Client::new(),
            &format!("{}/stream", server.uri()),
            HeaderMap::new(),
            &serde_json::json!({}),
            CancellationToken::new(),
            Duration::from_secs(5),
            |event| received.push(event.data),
        )
        .await;

        assert!(matches!(outcome, SseOutcome::Completed));
        assert_eq!(received, vec!["one".to_string(), "two".to_string()]);
    }

    #[tokio::test]
    async fn non_success_initial_status_becomes_an_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/stream"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let outcome = StreamSse::run(
            &reqwest::Client::new(),
            &format!("{}/stream", server.uri()),
            HeaderMap::new(),
            &serde_json::json!({}),
            CancellationToken::new(),
            Duration::from_secs(5),
            |_| {},
        )
        .await;

        assert!(matches!(outcome, SseOutcome::Error(LlmError::Api { status: 429, .. })));
    }

    #[tokio::test]
    async fn cancelling_before_connect_yields_cancelled_without_a_request() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = StreamSse::run(
            &reqwest::Client::new(),
            "http://127.0.0.1:9/unreachable",
            HeaderMap::new(),
            &serde_json::json!({}),
            cancel,
            Duration::from_secs(5),
            |_| {},
        )
        .await;

        assert!(matches!(outcome, SseOutcome::Cancelled));
    }

    #[tokio::test]
    async fn a_gap_between_chunks_past_the_inactivity_timeout_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/stream"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("data: one\n\n", "text/event-stream"),
            )
            .mount(&server)
            .await;

        let outcome = StreamSse::run(
            &reqwest::Client::new(),
            &format!("{}/stream", server.uri()),
            HeaderMap::new(),
            &serde_json::json!({}),
            CancellationToken::new(),
            Duration::from_nanos(1),
            |_| {},
        )
        .await;

        assert!(matches!(outcome, SseOutcome::Error(LlmError::Timeout(_))));
    }
}
