//! Session orchestrator
//!
//! The only entry points the surrounding application sees: login, refresh,
//! logout, and the bulk revoke hook used when credentials change. Composes
//! the credential verifier, the identity directory, the refresh token store
//! and the access token issuer; enforces account-status and device-binding
//! policy before delegating to any of them.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::auth::jwt::{AccessTokenIssuer, JwtError};
use crate::core::db::models::DeviceMetadata;
use crate::core::db::repositories::{RefreshTokenStore, StoreError};
use crate::core::identity::{
    CredentialVerifier, IdentityDirectory, IdentityError, Principal, UserStatus,
};

/// Role assumed when the directory lists none for an account.
const DEFAULT_ROLE: &str = "Student";

/// Session errors
///
/// The first four are policy outcomes; [`SessionError::is_unauthorized`]
/// collapses them into the single caller-visible result so HTTP glue cannot
/// leak which sub-condition failed. Storage and identity variants are
/// transient server-side failures and must surface as such, never as an
/// unauthorized response.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is not active")]
    AccountNotActive,

    #[error("Email is not confirmed")]
    EmailNotConfirmed,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("Token issue failed: {0}")]
    Token(#[from] JwtError),
}

impl SessionError {
    /// Whether this outcome renders as the single "unauthorized" response.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            SessionError::InvalidCredentials
                | SessionError::AccountNotActive
                | SessionError::EmailNotConfirmed
                | SessionError::InvalidRefreshToken
        )
    }
}

/// Public account summary returned with a token pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub role: String,
}

/// Login/refresh response: both tokens plus the minimal user view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    /// Always "Bearer"
    pub token_type: String,
    pub user: UserSummary,
}

/// Session orchestrator over the verifier, directory, store and issuer.
#[derive(Clone)]
pub struct SessionService {
    verifier: Arc<dyn CredentialVerifier>,
    directory: Arc<dyn IdentityDirectory>,
    store: Arc<dyn RefreshTokenStore>,
    issuer: AccessTokenIssuer,
}

impl SessionService {
    pub fn new(
        verifier: Arc<dyn CredentialVerifier>,
        directory: Arc<dyn IdentityDirectory>,
        store: Arc<dyn RefreshTokenStore>,
        issuer: AccessTokenIssuer,
    ) -> Self {
        Self {
            verifier,
            directory,
            store,
            issuer,
        }
    }

    /// Authenticate credentials and open (or replace) this device's session.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        device_id: &str,
        metadata: &DeviceMetadata,
    ) -> Result<SessionTokens, SessionError> {
        let verified = self
            .verifier
            .verify(email, password)
            .await?
            .ok_or(SessionError::InvalidCredentials)?;

        if !verified.password_matched {
            tracing::warn!(device_id, "login rejected: password mismatch");
            return Err(SessionError::InvalidCredentials);
        }

        let principal = verified.principal;
        check_account_policy(&principal)?;

        let role = self.primary_role(principal.id).await?;
        let rotated = self
            .store
            .create_or_replace(principal.id, device_id, metadata)
            .await?;
        let access = self.issuer.issue(&principal, &role)?;

        self.directory.touch_last_login(principal.id).await?;

        tracing::info!(user_id = %principal.id, device_id, "login succeeded");

        Ok(build_tokens(access.token, access.expires_in, rotated.secret, principal, role))
    }

    /// Exchange a refresh secret for a new token pair, rotating the secret.
    ///
    /// Every `None` from the store (unknown secret, wrong device, revoked,
    /// expired) maps to the same [`SessionError::InvalidRefreshToken`];
    /// callers cannot probe which case applied. Account status is re-read
    /// live so a suspension lands within one access-token lifetime.
    pub async fn refresh(
        &self,
        presented_secret: &str,
        device_id: &str,
    ) -> Result<SessionTokens, SessionError> {
        let record = match self.store.validate(presented_secret, device_id).await? {
            Some(record) => record,
            None => {
                // Either never issued or already rotated away; a legitimate
                // client racing a thief lands here too, which is the signal
                // anomaly detection watches for.
                tracing::warn!(device_id, "refresh rejected: no live matching token");
                return Err(SessionError::InvalidRefreshToken);
            }
        };

        let principal = self
            .directory
            .find(record.user_id)
            .await?
            .ok_or(SessionError::InvalidRefreshToken)?;

        if principal.status != UserStatus::Active {
            tracing::warn!(user_id = %principal.id, device_id, "refresh rejected: account not active");
            return Err(SessionError::AccountNotActive);
        }

        let role = self.primary_role(principal.id).await?;

        // Rotation commits before the response exists; the presented secret
        // is dead from here on, and the new one travels back in the same
        // result or not at all.
        let metadata = DeviceMetadata {
            user_agent: record.user_agent,
            ip_address: record.ip_address,
        };
        let rotated = self
            .store
            .create_or_replace(principal.id, device_id, &metadata)
            .await?;
        let access = self.issuer.issue(&principal, &role)?;

        tracing::info!(user_id = %principal.id, device_id, "refresh token rotated");

        Ok(build_tokens(access.token, access.expires_in, rotated.secret, principal, role))
    }

    /// Close this device's session. Always acknowledges, whether or not a
    /// matching token existed, so logout cannot probe token validity.
    pub async fn logout(
        &self,
        presented_secret: &str,
        device_id: &str,
    ) -> Result<(), SessionError> {
        self.store.revoke(presented_secret, device_id).await?;
        tracing::info!(device_id, "logout acknowledged");
        Ok(())
    }

    /// Revoke every device's refresh token for the user. Called by the
    /// surrounding app on password change or suspension.
    pub async fn revoke_all_sessions(&self, user_id: Uuid) -> Result<u64, SessionError> {
        let revoked = self.store.revoke_all(user_id).await?;
        tracing::info!(%user_id, revoked, "revoked all device sessions");
        Ok(revoked)
    }

    async fn primary_role(&self, user_id: Uuid) -> Result<String, SessionError> {
        let roles = self.directory.get_roles(user_id).await?;
        Ok(roles.into_iter().next().unwrap_or_else(|| DEFAULT_ROLE.to_string()))
    }
}

fn check_account_policy(principal: &Principal) -> Result<(), SessionError> {
    if principal.status != UserStatus::Active {
        tracing::warn!(user_id = %principal.id, status = %principal.status, "login rejected: account not active");
        return Err(SessionError::AccountNotActive);
    }
    if !principal.email_confirmed {
        tracing::warn!(user_id = %principal.id, "login rejected: email not confirmed");
        return Err(SessionError::EmailNotConfirmed);
    }
    Ok(())
}

fn build_tokens(
    access_token: String,
    expires_in: i64,
    refresh_token: String,
    principal: Principal,
    role: String,
) -> SessionTokens {
    SessionTokens {
        access_token,
        refresh_token,
        expires_in,
        token_type: "Bearer".to_string(),
        user: UserSummary {
            id: principal.id,
            email: principal.email,
            username: principal.username,
            role,
        },
    }
}
