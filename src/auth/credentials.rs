//! Per-backend credential resolution and bearer-token caching with single-flight
//! refresh.

use std::sync::Arc;

use chrono::Utc;
use secrecy::ExposeSecret;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::auth::jwt::{JwtSigner, OAuthClaims};
use crate::auth::token_exchange::TokenExchanger;
use crate::config::CredentialSource;
use crate::error::LlmError;

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const EXPIRY_SAFETY_WINDOW: chrono::Duration = chrono::Duration::seconds(300);

#[derive(Debug, Clone, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default)]
    token_uri: Option<String>,
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    expires_at: chrono::DateTime<Utc>,
}

/// Resolves and caches bearer tokens for the platform backend. A [`CredentialStore`]
/// is cheap to clone (it wraps an `Arc` internally) and safe to share across
/// concurrently-running requests; refresh is single-flight across all holders.
#[derive(Clone)]
pub struct CredentialStore {
    inner: Arc<Inner>,
}

struct Inner {
    source: CredentialSource,
    exchanger: TokenExchanger,
    cached: Mutex<Option<CachedToken>>,
}

impl CredentialStore {
    pub fn new(source: CredentialSource, http: reqwest::Client) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                exchanger: TokenExchanger::new(http),
                cached: Mutex::new(None),
            }),
        }
    }

    /// Returns a bearer token valid for at least [`EXPIRY_SAFETY_WINDOW`], refreshing
    /// it first if necessary.
    ///
    /// Holding the cache mutex across the network round-trip is what makes this
    /// single-flight: concurrent callers block on the same lock rather than each
    /// issuing their own token request, and once the holder releases it they observe
    /// the now-fresh cache and return without refreshing again.
    pub async fn token(&self) -> Result<String, LlmError> {
        if let CredentialSource::StaticToken(token) = &self.inner.source {
            return Ok(token.expose_secret().to_string());
        }

        let mut cached = self.inner.cached.lock().await;
        let now = Utc::now();
        if let Some(existing) = cached.as_ref() {
            if existing.expires_at - EXPIRY_SAFETY_WINDOW > now {
                return Ok(existing.token.clone());
            }
        }

        let key = self.load_service_account_key()?;
        let token_uri = key.token_uri.clone().unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string());
        let claims = OAuthClaims::new(&key.client_email, &token_uri, DEFAULT_SCOPE, now.timestamp());
        let signer = JwtSigner::new(key.private_key.into_bytes());
        let assertion = signer.sign(&claims)?;
        let response = self
            .inner
            .exchanger
            .exchange(&token_uri, &assertion, DEFAULT_SCOPE)
            .await?;

        let expires_at = now + chrono::Duration::seconds(response.expires_in);
        *cached = Some(CachedToken {
            token: response.access_token.clone(),
            expires_at,
        });
        Ok(response.access_token)
    }

    fn load_service_account_key(&self) -> Result<ServiceAccountKey, LlmError> {
        match &self.inner.source {
            CredentialSource::StaticToken(_) => unreachable!("handled before acquiring cache lock"),
            CredentialSource::ServiceAccountKey(json) => {
                serde_json::from_str(json.expose_secret())
                    .map_err(|e| LlmError::Configuration(format!("invalid service account key: {e}")))
            }
            CredentialSource::ServiceAccountFile(path) => {
                let contents = std::fs::read_to_string(path).map_err(|e| {
                    LlmError::Configuration(format!(
                        "failed to read service account file {}: {e}",
                        path.display()
                    ))
                })?;
                serde_json::from_str(&contents)
                    .map_err(|e| LlmError::Configuration(format!("invalid service account file: {e}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use std::sync::atomic::{AtomicU32, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service_account_json(token_uri: &str) -> String {
        let key_pem = std::fs::read_to_string("tests/support/test_rsa_key.pem").unwrap();
        serde_json::json!({
            "client_email": "svc@project.iam.gserviceaccount.com",
            "private_key": key_pem,
            "token_uri": token_uri,
        })
        .to_string()
    }

    #[tokio::test]
    async fn concurrent_callers_trigger_exactly_one_token_request() {
        let server = MockServer::start().await;
        let hits = Arc::new(AtomicU32::new(0));
        let hits_for_responder = hits.clone();
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(move |_: &wiremock::Request| {
                hits_for_responder.fetch_add(1, Ordering::SeqCst);
                ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "access_token": "token-1",
                    "expires_in": 3600
                }))
            })
            .mount(&server)
            .await;

        let key_json = service_account_json(&format!("{}/token", server.uri()));
        let store = CredentialStore::new(
            CredentialSource::ServiceAccountKey(SecretString::from(key_json)),
            reqwest::Client::new(),
        );

        let mut handles = Vec::new();
        for _ in 0..10 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.token().await }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "token-1");
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn static_token_never_hits_the_network() {
        let store = CredentialStore::new(
            CredentialSource::StaticToken(SecretString::from("preset-token")),
            reqwest::Client::new(),
        );
        assert_eq!(store.token().await.unwrap(), "preset-token");
    }
}
