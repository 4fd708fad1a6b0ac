//! Access token issuer
//!
//! Mints and verifies short-lived HS256 claims tokens. The issuer is a pure
//! function of principal + clock + configuration: it never touches storage,
//! and a minted token cannot be revoked before its expiry. The embedded
//! security stamp lets callers reject tokens minted before a credential
//! change without any shared revocation state.

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::core::config::{AuthConfig, ConfigError};
use crate::core::identity::Principal;

/// Token errors
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Token encoding failed: {0}")]
    EncodingError(String),

    #[error("Token decoding failed: {0}")]
    DecodingError(String),

    #[error("Token expired")]
    Expired,

    #[error("Invalid token")]
    InvalidToken,
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            ErrorKind::InvalidToken
            | ErrorKind::InvalidSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidIssuer
            | ErrorKind::InvalidAudience => JwtError::InvalidToken,
            _ => JwtError::DecodingError(err.to_string()),
        }
    }
}

/// Claims carried by every access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Account email
    pub email: String,
    /// Display name
    pub name: String,
    /// Primary role at time of issue
    pub role: String,
    /// Account status at time of issue
    pub status: String,
    /// Principal's security stamp at time of issue
    pub security_stamp: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issuer
    pub iss: String,
    /// Audience
    pub aud: String,
}

/// A freshly signed access token plus its lifetime in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedAccessToken {
    pub token: String,
    pub expires_in: i64,
}

/// Stateless issuer for signed access tokens.
#[derive(Clone)]
pub struct AccessTokenIssuer {
    issuer: String,
    audience: String,
    access_token_minutes: i64,
    leeway_seconds: u64,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl AccessTokenIssuer {
    /// Build an issuer from validated configuration. Fails fast on missing
    /// or malformed key material.
    pub fn new(config: &AuthConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            access_token_minutes: config.access_token_minutes,
            leeway_seconds: config.leeway_seconds,
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
        })
    }

    /// Sign an access token for the principal with its primary role.
    pub fn issue(&self, principal: &Principal, role: &str) -> Result<IssuedAccessToken, JwtError> {
        let now = Utc::now();
        let exp = now + Duration::minutes(self.access_token_minutes);

        let claims = AccessClaims {
            sub: principal.id.to_string(),
            email: principal.email.clone(),
            name: principal.username.clone(),
            role: role.to_string(),
            status: principal.status.to_string(),
            security_stamp: principal.security_stamp.clone(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| JwtError::EncodingError(e.to_string()))?;

        Ok(IssuedAccessToken {
            token,
            expires_in: self.access_token_minutes * 60,
        })
    }

    /// Verify signature, issuer, audience and expiry, then return the claims.
    pub fn decode(&self, token: &str) -> Result<AccessClaims, JwtError> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.leeway = self.leeway_seconds;

        let token_data = decode::<AccessClaims>(token, &self.decoding_key, &validation)?;

        Ok(token_data.claims)
    }
}
