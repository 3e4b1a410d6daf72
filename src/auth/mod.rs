//! Backend selection, credential materialization, and the header/URL pairs each
//! request needs.

pub mod credentials;
pub mod jwt;
pub mod token_exchange;
pub mod vertex;

use reqwest::header::{HeaderMap, HeaderValue};

use crate::config::{CredentialSource, GeminiConfig};
use crate::error::LlmError;
pub use credentials::CredentialStore;

/// Which remote service a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// `generativelanguage.googleapis.com`, authenticated with an API key.
    Direct,
    /// Vertex AI, authenticated with an OAuth2 bearer token.
    Platform,
}

/// The resolved address and headers for one outbound request.
pub struct AuthenticatedRequest {
    pub url: String,
    pub headers: HeaderMap,
}

/// Selects a backend, materializes its credentials, and produces the
/// (url, headers) pair every request needs. One coordinator is shared across all
/// requests for the lifetime of a client.
pub struct AuthCoordinator {
    config: GeminiConfig,
    credential_store: Option<CredentialStore>,
}

impl AuthCoordinator {
    pub fn new(config: GeminiConfig, http: reqwest::Client) -> Self {
        let credential_store = config
            .credential_source
            .clone()
            .map(|source| CredentialStore::new(source, http));
        Self {
            config,
            credential_store,
        }
    }

    /// Picks a backend when the caller didn't request one explicitly: platform wins
    /// when configured, since it is the stronger, project-scoped credential.
    pub fn default_backend(&self) -> Result<Backend, LlmError> {
        if self.config.project_id.is_some() {
            Ok(Backend::Platform)
        } else if self.config.api_key.is_some() {
            Ok(Backend::Direct)
        } else {
            Err(LlmError::Configuration(
                "no backend is configured: set an api_key or a project_id".to_string(),
            ))
        }
    }

    pub async fn authenticate(
        &self,
        backend: Backend,
        model: &str,
        endpoint: &str,
    ) -> Result<AuthenticatedRequest, LlmError> {
        match backend {
            Backend::Direct => self.authenticate_direct(model, endpoint),
            Backend::Platform => self.authenticate_platform(model, endpoint).await,
        }
    }

    /// Same credential resolution as [`Self::authenticate`], but targeting the
    /// collection-level `models.list` endpoint rather than a single model.
    pub async fn authenticate_list_models(&self) -> Result<AuthenticatedRequest, LlmError> {
        match self.default_backend()? {
            Backend::Direct => {
                self.authenticate_direct_url(vertex::direct_list_models_url(self.direct_base_url()))
            }
            Backend::Platform => {
                let project_id = self.config.project_id.as_ref().ok_or_else(|| {
                    LlmError::Configuration("platform backend requires a project_id".to_string())
                })?;
                let url = vertex::platform_list_models_url(project_id, &self.config.location);
                self.authenticate_platform_url(url).await
            }
        }
    }

    fn direct_base_url(&self) -> &str {
        self.config.direct_base_url.as_deref().unwrap_or(vertex::DIRECT_BASE_URL)
    }

    fn authenticate_direct(&self, model: &str, endpoint: &str) -> Result<AuthenticatedRequest, LlmError> {
        self.authenticate_direct_url(vertex::direct_request_url(self.direct_base_url(), model, endpoint))
    }

    fn authenticate_direct_url(&self, url: String) -> Result<AuthenticatedRequest, LlmError> {
        use secrecy::ExposeSecret;
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| LlmError::Configuration("direct backend requires an api_key".to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        let mut key_value = HeaderValue::from_str(api_key.expose_secret())
            .map_err(|e| LlmError::Configuration(format!("invalid api key: {e}")))?;
        key_value.set_sensitive(true);
        headers.insert("x-goog-api-key", key_value);

        Ok(AuthenticatedRequest { url, headers })
    }

    async fn authenticate_platform(
        &self,
        model: &str,
        endpoint: &str,
    ) -> Result<AuthenticatedRequest, LlmError> {
        let project_id = self
            .config
            .project_id
            .as_ref()
            .ok_or_else(|| LlmError::Configuration("platform backend requires a project_id".to_string()))?;
        let url = vertex::platform_request_url(project_id, &self.config.location, model, endpoint);
        self.authenticate_platform_url(url).await
    }

    async fn authenticate_platform_url(&self, url: String) -> Result<AuthenticatedRequest, LlmError> {
        let store = self.credential_store.as_ref().ok_or_else(|| {
            LlmError::Configuration(
                "platform backend requires a credential_source (static token or service account)"
                    .to_string(),
            )
        })?;

        let token = store.token().await?;
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        let mut auth_value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| LlmError::Configuration(format!("invalid bearer token: {e}")))?;
        auth_value.set_sensitive(true);
        headers.insert("authorization", auth_value);

        Ok(AuthenticatedRequest { url, headers })
    }
}

/// A minimal token provider for callers who already hold a valid token and don't
/// want the credential store's file/JSON resolution.
pub fn static_credential_source(token: impl Into<String>) -> CredentialSource {
    CredentialSource::StaticToken(secrecy::SecretString::from(token.into()))
}
