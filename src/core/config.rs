//! Token signing and lifetime configuration
//!
//! Constructed once at process start and passed by reference into the issuer
//! and orchestrator; there is no ambient global lookup. Missing or malformed
//! key material fails here, at startup, never per call.

/// Default access token expiration (15 minutes)
const DEFAULT_ACCESS_TOKEN_MINUTES: i64 = 15;

/// Default refresh token expiration (30 days)
const DEFAULT_REFRESH_TOKEN_DAYS: i64 = 30;

/// Default clock-skew tolerance for signature validation (seconds)
const DEFAULT_LEEWAY_SECONDS: u64 = 0;

/// Minimum signing secret length in bytes (HS256 wants a full-width key)
pub const MIN_SECRET_BYTES: usize = 32;

/// Configuration errors (startup-fatal)
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("JWT_SECRET environment variable not set")]
    MissingSecret,

    #[error("signing secret must be at least {MIN_SECRET_BYTES} bytes")]
    SecretTooShort,

    #[error("JWT_ISSUER environment variable not set")]
    MissingIssuer,

    #[error("JWT_AUDIENCE environment variable not set")]
    MissingAudience,

    #[error("invalid value for {name}: {value}")]
    InvalidDuration { name: &'static str, value: String },
}

/// Signing key material and token lifetimes, fixed per deployment.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Symmetric signing key for HS256
    pub secret: String,
    /// `iss` claim stamped into and required of every access token
    pub issuer: String,
    /// `aud` claim stamped into and required of every access token
    pub audience: String,
    /// Access token lifetime in minutes (short-lived by design)
    pub access_token_minutes: i64,
    /// Refresh token lifetime in days
    pub refresh_token_days: i64,
    /// Clock-skew tolerance applied when validating signatures
    pub leeway_seconds: u64,
}

impl AuthConfig {
    /// Create a configuration with default lifetimes.
    pub fn new(
        secret: impl Into<String>,
        issuer: impl Into<String>,
        audience: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            secret: secret.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            access_token_minutes: DEFAULT_ACCESS_TOKEN_MINUTES,
            refresh_token_days: DEFAULT_REFRESH_TOKEN_DAYS,
            leeway_seconds: DEFAULT_LEEWAY_SECONDS,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `JWT_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let secret = std::env::var("JWT_SECRET").map_err(|_| ConfigError::MissingSecret)?;
        let issuer = std::env::var("JWT_ISSUER").map_err(|_| ConfigError::MissingIssuer)?;
        let audience = std::env::var("JWT_AUDIENCE").map_err(|_| ConfigError::MissingAudience)?;

        let access_token_minutes =
            parse_env_duration("JWT_ACCESS_TOKEN_MINUTES", DEFAULT_ACCESS_TOKEN_MINUTES)?;
        let refresh_token_days =
            parse_env_duration("JWT_REFRESH_TOKEN_DAYS", DEFAULT_REFRESH_TOKEN_DAYS)?;
        let leeway_seconds = match std::env::var("JWT_LEEWAY_SECONDS") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidDuration {
                name: "JWT_LEEWAY_SECONDS",
                value: raw,
            })?,
            Err(_) => DEFAULT_LEEWAY_SECONDS,
        };

        let config = Self {
            secret,
            issuer,
            audience,
            access_token_minutes,
            refresh_token_days,
            leeway_seconds,
        };
        config.validate()?;
        Ok(config)
    }

    /// Set access token lifetime
    pub fn access_token_minutes(mut self, minutes: i64) -> Self {
        self.access_token_minutes = minutes;
        self
    }

    /// Set refresh token lifetime
    pub fn refresh_token_days(mut self, days: i64) -> Self {
        self.refresh_token_days = days;
        self
    }

    /// Set clock-skew tolerance
    pub fn leeway_seconds(mut self, seconds: u64) -> Self {
        self.leeway_seconds = seconds;
        self
    }

    /// Check key material. Lifetimes are deliberately unchecked so tests can
    /// mint already-expired tokens with negative values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret.is_empty() {
            return Err(ConfigError::MissingSecret);
        }
        if self.secret.len() < MIN_SECRET_BYTES {
            return Err(ConfigError::SecretTooShort);
        }
        if self.issuer.is_empty() {
            return Err(ConfigError::MissingIssuer);
        }
        if self.audience.is_empty() {
            return Err(ConfigError::MissingAudience);
        }
        Ok(())
    }
}

fn parse_env_duration(name: &'static str, default: i64) -> Result<i64, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidDuration { name, value: raw }),
        Err(_) => Ok(default),
    }
}
