//! RS256 JWT signing for the OAuth2 jwt-bearer grant (RFC 7523).

use serde::Serialize;

use crate::error::LlmError;

/// Claims for the OAuth2 jwt-bearer assertion exchanged at a token endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct OAuthClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    pub scope: String,
}

impl OAuthClaims {
    /// `iat = now`, `exp = now + 3600` (Google's token endpoint rejects longer-lived
    /// assertions), `iss == sub == client_email`.
    pub fn new(client_email: &str, token_uri: &str, scope: &str, now: i64) -> Self {
        Self {
            iss: client_email.to_string(),
            sub: client_email.to_string(),
            aud: token_uri.to_string(),
            iat: now,
            exp: now + 3600,
            scope: scope.to_string(),
        }
    }
}

/// Claims for a service-signed endpoint JWT, where `sub` and `aud` must match so the
/// receiving service can validate the token was minted for it specifically.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

impl EndpointClaims {
    pub fn new(client_email: &str, audience: &str, now: i64, lifetime_secs: i64) -> Self {
        Self {
            iss: client_email.to_string(),
            sub: audience.to_string(),
            aud: audience.to_string(),
            iat: now,
            exp: now + lifetime_secs,
        }
    }

    /// `sub == aud`, `exp > iat`, `iat` not more than 60s in the future, `exp` not in
    /// the past.
    pub fn validate(&self, now: i64) -> Result<(), LlmError> {
        if self.sub != self.aud {
            return Err(LlmError::Validation("endpoint JWT sub must equal aud".into()));
        }
        if self.exp <= self.iat {
            return Err(LlmError::Validation("endpoint JWT exp must be after iat".into()));
        }
        if self.iat > now + 60 {
            return Err(LlmError::Validation("endpoint JWT iat is too far in the future".into()));
        }
        if self.exp <= now {
            return Err(LlmError::Validation("endpoint JWT has already expired".into()));
        }
        Ok(())
    }
}

/// Signs claims into a compact RS256 JWS using a PEM-encoded RSA private key.
pub struct JwtSigner {
    private_key_pem: Vec<u8>,
}

impl JwtSigner {
    pub fn new(private_key_pem: impl Into<Vec<u8>>) -> Self {
        Self {
            private_key_pem: private_key_pem.into(),
        }
    }

    pub fn sign<C: Serialize>(&self, claims: &C) -> Result<String, LlmError> {
        use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};

        let mut header = Header::new(Algorithm::RS256);
        header.typ = Some("JWT".to_string());
        let key = EncodingKey::from_rsa_pem(&self.private_key_pem)
            .map_err(|e| LlmError::Configuration(format!("invalid RSA private key (PEM): {e}")))?;
        encode(&header, claims, &key).map_err(|e| LlmError::Configuration(format!("failed to sign JWT: {e}")))
    }
}
