//! Process-wide configuration snapshot, resolved once from environment variables and
//! builder overrides, then treated as immutable for the rest of the process lifetime.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::LlmError;

/// Which Google credential source backs the platform (Vertex) backend.
#[derive(Clone)]
pub enum CredentialSource {
    /// A caller-supplied token that never refreshes.
    StaticToken(SecretString),
    /// A service-account key loaded from a file path, signed into JWTs on demand.
    ServiceAccountFile(std::path::PathBuf),
    /// A service-account key already held in memory (e.g. from a secret manager).
    ServiceAccountKey(SecretString),
}

/// Immutable configuration resolved at startup.
#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: Option<SecretString>,
    pub project_id: Option<String>,
    pub location: String,
    pub credential_source: Option<CredentialSource>,
    pub default_model: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub telemetry_enabled: bool,
    pub max_streams: usize,
    pub stream_cleanup_delay: Duration,
    /// Maximum gap between consecutive SSE chunks before a stream is failed with
    /// `LlmError::Timeout`. Resets on every chunk received, unlike `timeout`, which
    /// bounds only the initial connect/unary round trip.
    pub stream_inactivity_timeout: Duration,
    /// Overrides the direct backend's base URL (`https://generativelanguage.googleapis.com/v1beta`
    /// by default). Exists for tests driving a mock server; production callers leave it unset.
    pub direct_base_url: Option<String>,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            project_id: None,
            location: "us-central1".to_string(),
            credential_source: None,
            default_model: "gemini-1.5-flash".to_string(),
            timeout: Duration::from_secs(60),
            max_retries: 3,
            telemetry_enabled: false,
            max_streams: 100,
            stream_cleanup_delay: Duration::from_secs(5),
            stream_inactivity_timeout: Duration::from_secs(30),
            direct_base_url: None,
        }
    }
}

impl GeminiConfig {
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(api_key.into()));
        self
    }

    pub fn with_project(mut self, project_id: impl Into<String>, location: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self.location = location.into();
        self
    }

    pub fn with_service_account_file(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.credential_source = Some(CredentialSource::ServiceAccountFile(path.into()));
        self
    }

    pub fn with_service_account_key(mut self, key_json: impl Into<String>) -> Self {
        self.credential_source = Some(CredentialSource::ServiceAccountKey(SecretString::from(
            key_json.into(),
        )));
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_telemetry_enabled(mut self, enabled: bool) -> Self {
        self.telemetry_enabled = enabled;
        self
    }

    pub fn with_direct_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.direct_base_url = Some(base_url.into());
        self
    }

    pub fn with_stream_inactivity_timeout(mut self, timeout: Duration) -> Self {
        self.stream_inactivity_timeout = timeout;
        self
    }

    /// Resolve from environment variables: `GEMINI_API_KEY` for the direct backend,
    /// or `GOOGLE_CLOUD_PROJECT` / `GOOGLE_CLOUD_LOCATION` / `GOOGLE_APPLICATION_CREDENTIALS`
    /// for the platform backend. Platform variables take precedence when both are set,
    /// matching the resolution order a deployed service typically wants (the stronger,
    /// project-scoped credential wins over a loose API key left in the environment).
    pub fn from_env() -> Result<Self, LlmError> {
        let mut config = Self::default();

        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            config.api_key = Some(SecretString::from(key));
        }

        if let Ok(project_id) = std::env::var("GOOGLE_CLOUD_PROJECT") {
            let location =
                std::env::var("GOOGLE_CLOUD_LOCATION").unwrap_or_else(|_| "us-central1".to_string());
            config.project_id = Some(project_id);
            config.location = location;
            if let Ok(path) = std::env::var("GOOGLE_APPLICATION_CREDENTIALS") {
                config.credential_source =
                    Some(CredentialSource::ServiceAccountFile(std::path::PathBuf::from(path)));
            }
        }

        if config.api_key.is_none() && config.project_id.is_none() {
            return Err(LlmError::Configuration(
                "neither GEMINI_API_KEY nor GOOGLE_CLOUD_PROJECT is set".to_string(),
            ));
        }

        Ok(config)
    }
}
