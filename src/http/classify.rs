//! Maps an HTTP failure response into a specific [`LlmError`] with retry hints.

use std::time::Duration;

use reqwest::header::HeaderMap;

use crate::error::{ApiErrorKind, LlmError};

/// Inspects status, body, and headers to pick the right [`LlmError`] variant.
///
/// Distinguishes `rate_limit` from `quota` within the 400/403 range by scanning the
/// body for Google's own error reason strings, since both surface as generic client
/// errors on the wire.
pub fn classify_http_error(status: u16, body_text: &str, headers: &HeaderMap) -> LlmError {
    let lower = body_text.to_lowercase();
    let retry_after = retry_after_duration(headers);
    let body_sample: String = body_text.chars().take(400).collect();

    match status {
        429 if is_quota_exceeded(&lower) => {
            LlmError::api(status, body_sample, ApiErrorKind::Quota)
        }
        429 => {
            let delay = retry_after.unwrap_or(Duration::from_secs(1));
            LlmError::api_with_retry_after(status, body_sample, ApiErrorKind::RateLimit, delay)
        }
        401 => LlmError::Authentication(format!("unauthorized: {body_sample}")),
        404 => LlmError::api(status, body_sample, ApiErrorKind::NotFound),
        403 | 400 if is_quota_exceeded(&lower) => {
            LlmError::api(status, body_sample, ApiErrorKind::Quota)
        }
        403 | 400 if is_rate_limited(&lower) => {
            let delay = retry_after.unwrap_or(Duration::from_secs(1));
            LlmError::api_with_retry_after(status, body_sample, ApiErrorKind::RateLimit, delay)
        }
        403 if is_safety_blocked(&lower) => {
            LlmError::api(status, body_sample, ApiErrorKind::Safety)
        }
        403 => LlmError::Authentication(format!("forbidden: {body_sample}")),
        400 => LlmError::Validation(body_sample),
        408 => LlmError::Timeout(retry_after.unwrap_or(Duration::from_secs(30))),
        500..=599 => {
            let delay = retry_after.unwrap_or(Duration::from_millis(500));
            LlmError::api_with_retry_after(status, body_sample, ApiErrorKind::Server, delay)
        }
        _ => LlmError::api(status, body_sample, ApiErrorKind::Other),
    }
}

fn retry_after_duration(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn is_quota_exceeded(lower_body: &str) -> bool {
    lower_body.contains("quota") || lower_body.contains("resource_exhausted")
}

fn is_rate_limited(lower_body: &str) -> bool {
    lower_body.contains("rate limit")
        || lower_body.contains("ratelimit")
        || lower_body.contains("rate_limit_exceeded")
}

fn is_safety_blocked(lower_body: &str) -> bool {
    lower_body.contains("safety") || lower_body.contains("blocked")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with_retry_after(seconds: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", seconds.parse().unwrap());
        headers
    }

    #[test]
    fn rate_limit_status_carries_retry_after_hint() {
        let headers = headers_with_retry_after("7");
        let err = classify_http_error(429, "too many requests", &headers);
        assert!(matches!(
            err,
            LlmError::Api {
                kind: ApiErrorKind::RateLimit,
                retry_after: Some(d),
                ..
            } if d == Duration::from_secs(7)
        ));
    }

    #[test]
    fn quota_body_on_429_maps_to_quota_not_rate_limit() {
        let headers = HeaderMap::new();
        let err = classify_http_error(429, r#"{"error":{"status":"RESOURCE_EXHAUSTED"}}"#, &headers);
        assert!(matches!(
            err,
            LlmError::Api {
                kind: ApiErrorKind::Quota,
                ..
            }
        ));
        assert!(!err.is_retryable());
    }

    #[test]
    fn quota_body_on_400_maps_to_quota_not_validation() {
        let headers = HeaderMap::new();
        let err = classify_http_error(400, r#"{"reason":"RESOURCE_EXHAUSTED quota"}"#, &headers);
        assert!(matches!(
            err,
            LlmError::Api {
                kind: ApiErrorKind::Quota,
                ..
            }
        ));
    }

    #[test]
    fn plain_400_is_validation() {
        let headers = HeaderMap::new();
        let err = classify_http_error(400, "missing field 'contents'", &headers);
        assert!(matches!(err, LlmError::Validation(_)));
    }

    #[test]
    fn server_errors_are_retryable_api_errors() {
        let headers = HeaderMap::new();
        let err = classify_http_error(503, "upstream unavailable", &headers);
        assert!(err.is_retryable());
    }

    #[test]
    fn not_found_is_not_retryable() {
        let headers = HeaderMap::new();
        let err = classify_http_error(404, "model not found", &headers);
        assert!(!err.is_retryable());
    }
}
