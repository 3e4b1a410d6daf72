//! The request coordinator: the crate's top-level entry point, composing auth,
//! unary transport, and the streaming manager behind four operations.

use std::sync::Arc;

use crate::auth::{AuthCoordinator, Backend};
use crate::config::GeminiConfig;
use crate::error::LlmError;
use crate::http::{HttpRequest, HttpTransport, ReqwestTransport, RetryPolicy};
use crate::streaming::{StreamId, StreamingManager};
use crate::telemetry::{NoopSink, TelemetryEvent, TelemetrySink};
use crate::wire::{build_request_body, CountTokensResponse, GenerateInput, ListModelsResponse, RequestOptions};

/// Entry point for Gemini generation requests. Owns the auth coordinator, the
/// unary transport, and the streaming manager; cheap to clone (everything inside
/// is reference-counted or a plain config snapshot).
#[derive(Clone)]
pub struct RequestCoordinator {
    config: GeminiConfig,
    auth: Arc<AuthCoordinator>,
    transport: Arc<dyn HttpTransport>,
    streaming: StreamingManager,
    telemetry: Arc<dyn TelemetrySink>,
}

impl RequestCoordinator {
    pub fn new(config: GeminiConfig) -> Self {
        Self::with_telemetry(config, Arc::new(NoopSink))
    }

    /// `telemetry` is only wired up when `config.telemetry_enabled` is set; otherwise
    /// events are discarded regardless of what the caller passed.
    pub fn with_telemetry(config: GeminiConfig, telemetry: Arc<dyn TelemetrySink>) -> Self {
        let telemetry: Arc<dyn TelemetrySink> = if config.telemetry_enabled {
            telemetry
        } else {
            Arc::new(NoopSink)
        };
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        let auth = Arc::new(AuthCoordinator::new(config.clone(), http.clone()));
        let retry_policy = RetryPolicy {
            max_attempts: config.max_retries,
            ..RetryPolicy::default()
        };
        let transport = Arc::new(
            ReqwestTransport::new(http.clone(), telemetry.clone()).with_retry_policy(retry_policy),
        );
        let streaming = StreamingManager::new(auth.clone(), http, config.clone(), telemetry.clone());
        Self {
            config,
            auth,
            transport,
            streaming,
            telemetry,
        }
    }

    fn resolve_backend(&self, opts: &RequestOptions) -> Result<Backend, LlmError> {
        match opts.backend {
            Some(backend) => Ok(backend),
            None => self.auth.default_backend(),
        }
    }

    /// `generateContent`: a single request/response round trip.
    pub async fn generate(
        &self,
        input: impl Into<GenerateInput>,
        model: Option<&str>,
        opts: RequestOptions,
    ) -> Result<serde_json::Value, LlmError> {
        let model = model.unwrap_or(&self.config.default_model);
        let backend = self.resolve_backend(&opts)?;
        let body = build_request_body(input.into(), &opts);
        self.call_unary(backend, model, "generateContent", Some(body)).await
    }

    /// `streamGenerateContent`: opens a stream on the streaming manager and returns
    /// its id. Subscribe via [`crate::streaming::StreamingManager::subscribe`] to
    /// receive events.
    pub async fn stream_generate(
        &self,
        input: impl Into<GenerateInput>,
        model: Option<&str>,
        opts: RequestOptions,
    ) -> Result<StreamId, LlmError> {
        let model = model.unwrap_or(&self.config.default_model).to_string();
        let backend = self.resolve_backend(&opts)?;
        let body = build_request_body(input.into(), &opts);
        self.streaming.open(backend, &model, body).await
    }

    /// `countTokens`.
    pub async fn count_tokens(
        &self,
        input: impl Into<GenerateInput>,
        model: Option<&str>,
        opts: RequestOptions,
    ) -> Result<CountTokensResponse, LlmError> {
        let model = model.unwrap_or(&self.config.default_model);
        let backend = self.resolve_backend(&opts)?;
        let body = build_request_body(input.into(), &opts);
        let start = std::time::Instant::now();
        let value = self.call_unary(backend, model, "countTokens", Some(body)).await?;
        let response: CountTokensResponse = serde_json::from_value(value)
            .map_err(|e| LlmError::Parse(format!("failed to parse countTokens response: {e}")))?;
        self.telemetry.emit(TelemetryEvent::TokensOperation {
            backend,
            duration: start.elapsed(),
            total_tokens: Some(response.total_tokens),
        });
        Ok(response)
    }

    /// `list_models`: always served by the backend's `models` collection endpoint,
    /// not scoped to a single model.
    pub async fn list_models(&self, opts: RequestOptions) -> Result<ListModelsResponse, LlmError> {
        let backend = self.resolve_backend(&opts)?;
        let start = std::time::Instant::now();
        let authenticated = self.auth.authenticate_list_models().await?;
        let value = self.send(reqwest::Method::GET, authenticated, None).await?;
        let response: ListModelsResponse = serde_json::from_value(value)
            .map_err(|e| LlmError::Parse(format!("failed to parse list_models response: {e}")))?;
        self.telemetry.emit(TelemetryEvent::ModelsOperation {
            backend,
            duration: start.elapsed(),
            model_count: Some(response.models.len()),
        });
        Ok(response)
    }

    async fn call_unary(
        &self,
        backend: Backend,
        model: &str,
        endpoint: &str,
        body: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, LlmError> {
        let authenticated = self.auth.authenticate(backend, model, endpoint).await?;
        self.send(reqwest::Method::POST, authenticated, body).await
    }

    async fn send(
        &self,
        method: reqwest::Method,
        authenticated: crate::auth::AuthenticatedRequest,
        body: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, LlmError> {
        let mut request = HttpRequest::new(method, authenticated.url)
            .with_headers(authenticated.headers)
            .with_timeout(self.config.timeout);
        if let Some(body) = body {
            request = request.with_json_body(body);
        }

        let response = self.transport.execute(request).await?;
        Ok(response.body)
    }
}
