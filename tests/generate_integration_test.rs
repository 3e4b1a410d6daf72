use gemini_rs::{GeminiConfig, RequestCoordinator};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn generate_and_count_tokens_against_a_mock_direct_backend() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-1.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": "hello back"}]}, "finishReason": "STOP"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-1.5-flash:countTokens"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"totalTokens": 3})))
        .mount(&server)
        .await;

    let config = GeminiConfig::default()
        .with_api_key("test-key")
        .with_direct_base_url(server.uri());
    let coordinator = RequestCoordinator::new(config);

    let response = coordinator
        .generate("hello", None, Default::default())
        .await
        .expect("generate should succeed");
    assert_eq!(response["candidates"][0]["content"]["parts"][0]["text"], "hello back");

    let tokens = coordinator
        .count_tokens("hello", None, Default::default())
        .await
        .expect("count_tokens should succeed");
    assert_eq!(tokens.total_tokens, 3);
}

#[tokio::test]
async fn generate_surfaces_rate_limit_as_a_retriable_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-1.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(429).set_body_string(r#"{"error":{"status":"TOO_MANY_REQUESTS"}}"#))
        .mount(&server)
        .await;

    let config = GeminiConfig::default()
        .with_api_key("test-key")
        .with_direct_base_url(server.uri())
        .with_max_retries(1);
    let coordinator = RequestCoordinator::new(config);

    let result = coordinator.generate("hello", None, Default::default()).await;
    let err = result.expect_err("429 should surface as an error");
    assert!(err.is_retryable());
}

#[tokio::test]
async fn generate_surfaces_quota_exhaustion_as_a_non_retriable_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-1.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(429).set_body_string(r#"{"error":{"status":"RESOURCE_EXHAUSTED"}}"#))
        .mount(&server)
        .await;

    let config = GeminiConfig::default()
        .with_api_key("test-key")
        .with_direct_base_url(server.uri())
        .with_max_retries(3);
    let coordinator = RequestCoordinator::new(config);

    let result = coordinator.generate("hello", None, Default::default()).await;
    let err = result.expect_err("429 quota exhaustion should surface as an error");
    assert!(!err.is_retryable());
}
