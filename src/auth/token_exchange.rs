//! OAuth2 jwt-bearer grant token exchange (RFC 7523 section 2.1).

use serde::Deserialize;

use crate::error::LlmError;

#[derive(Debug, Clone, Deserialize)]
pub struct TokenExchangeResponse {
    pub access_token: String,
    pub expires_in: i64,
}

/// Exchanges a signed JWT assertion for a bearer token at an OAuth2 token endpoint.
pub struct TokenExchanger {
    http: reqwest::Client,
}

impl TokenExchanger {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    pub async fn exchange(
        &self,
        token_uri: &str,
        assertion: &str,
        scope: &str,
    ) -> Result<TokenExchangeResponse, LlmError> {
        let form = [
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", assertion),
            ("scope", scope),
        ];

        let response = self
            .http
            .post(token_uri)
            .form(&form)
            .send()
            .await
            .map_err(|e| LlmError::Network(format!("token endpoint request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::Network(format!("failed to read token response: {e}")))?;

        if !status.is_success() {
            return Err(LlmError::Authentication(format!(
                "token endpoint returned {status}: {text}"
            )));
        }

        serde_json::from_str(&text)
            .map_err(|e| LlmError::Parse(format!("failed to parse token response: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn successful_exchange_parses_access_token_and_expiry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer"))
            .and(body_string_contains("scope=https%3A%2F%2Fwww.googleapis.com%2Fauth%2Fcloud-platform"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.abc",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .mount(&server)
            .await;

        let exchanger = TokenExchanger::new(reqwest::Client::new());
        let response = exchanger
            .exchange(
                &format!("{}/token", server.uri()),
                "signed.jwt.assertion",
                "https://www.googleapis.com/auth/cloud-platform",
            )
            .await
            .unwrap();

        assert_eq!(response.access_token, "ya29.abc");
        assert_eq!(response.expires_in, 3600);
    }

    #[tokio::test]
    async fn non_success_status_becomes_authentication_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_grant"}"#))
            .mount(&server)
            .await;

        let exchanger = TokenExchanger::new(reqwest::Client::new());
        let result = exchanger
            .exchange(
                &format!("{}/token", server.uri()),
                "bad.jwt.assertion",
                "https://www.googleapis.com/auth/cloud-platform",
            )
            .await;

        assert!(matches!(result, Err(LlmError::Authentication(_))));
    }
}
