//! Unary JSON transport: one request, one decoded response, retried per policy.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;

use crate::error::LlmError;
use crate::http::classify::classify_http_error;
use crate::http::retry::{retry_with, RetryPolicy};
use crate::telemetry::{TelemetryEvent, TelemetrySink};

/// A fully-addressed unary request: method, absolute URL, headers, optional JSON body.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: reqwest::Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn new(method: reqwest::Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_json_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A decoded unary response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

/// Injectable unary transport, so the request coordinator can be driven by a mock in
/// tests without a live network dependency.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, LlmError>;
}

/// Production transport: `reqwest` plus retry-with-backoff and telemetry spans.
pub struct ReqwestTransport {
    client: reqwest::Client,
    retry_policy: RetryPolicy,
    telemetry: std::sync::Arc<dyn TelemetrySink>,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client, telemetry: std::sync::Arc<dyn TelemetrySink>) -> Self {
        Self {
            client,
            retry_policy: RetryPolicy::default(),
            telemetry,
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    async fn execute_once(&self, request: &HttpRequest) -> Result<HttpResponse, LlmError> {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .headers(request.headers.clone())
            .timeout(request.timeout);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| classify_transport_failure(&e))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::Network(format!("failed to read response body: {e}")))?;

        if !(200..300).contains(&status) {
            return Err(classify_http_error(status, &text, &headers));
        }

        let body = if text.trim().is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_str(&text)
                .map_err(|e| LlmError::Parse(format!("invalid JSON response: {e}")))?
        };
        Ok(HttpResponse { status, body })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, LlmError> {
        let idempotent = is_idempotent(&request.method);
        retry_with(&self.retry_policy, idempotent, || async {
            let attempt_start = std::time::Instant::now();
            self.telemetry.emit(TelemetryEvent::RequestStart {
                url: request.url.clone(),
                method: request.method.to_string(),
            });

            let result = self.execute_once(&request).await;

            match &result {
                Ok(response) => self.telemetry.emit(TelemetryEvent::RequestStop {
                    duration: attempt_start.elapsed(),
                    status: response.status,
                }),
                Err(error) => self.telemetry.emit(TelemetryEvent::RequestException {
                    duration: attempt_start.elapsed(),
                    category: error.category(),
                }),
            }

            result
        })
        .await
    }
}

fn is_idempotent(method: &reqwest::Method) -> bool {
    matches!(
        *method,
        reqwest::Method::GET
            | reqwest::Method::HEAD
            | reqwest::Method::PUT
            | reqwest::Method::DELETE
            | reqwest::Method::OPTIONS
            | reqwest::Method::TRACE
    )
}

fn classify_transport_failure(error: &reqwest::Error) -> LlmError {
    if error.is_timeout() {
        LlmError::Timeout(Duration::from_secs(0))
    } else {
        LlmError::Network(error.to_string())
    }
}
