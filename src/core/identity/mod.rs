//! Identity collaborator seams
//!
//! The session core never stores or hashes credentials itself. It consumes
//! the results of an external identity provider through the two traits
//! defined here, and only ever reads the [`Principal`] it hands back.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account status as tracked by the identity store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserStatus {
    Active,
    Pending,
    Suspended,
}

impl std::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserStatus::Active => write!(f, "Active"),
            UserStatus::Pending => write!(f, "Pending"),
            UserStatus::Suspended => write!(f, "Suspended"),
        }
    }
}

/// Read-only view of an account, owned by the external identity store.
///
/// The `security_stamp` is an opaque version marker that the identity store
/// replaces whenever credentials change; it is embedded in access tokens so
/// callers can detect tokens minted before the change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub status: UserStatus,
    pub email_confirmed: bool,
    pub security_stamp: String,
}

/// Result of a credential check against the identity provider.
#[derive(Debug, Clone)]
pub struct VerifiedCredentials {
    pub principal: Principal,
    pub password_matched: bool,
}

/// Identity collaborator errors
///
/// The provider is external; everything it reports is treated as a transient
/// server-side failure, never as a policy outcome.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Checks a submitted password against the identity store.
///
/// Returns `None` when no account matches the email. Password hashing and
/// lockout counters are the provider's concern.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<VerifiedCredentials>, IdentityError>;
}

/// Read/bookkeeping access to the identity store.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// Live lookup of an account. `None` when it no longer exists.
    async fn find(&self, user_id: Uuid) -> Result<Option<Principal>, IdentityError>;

    /// Role names for the account, in priority order.
    async fn get_roles(&self, user_id: Uuid) -> Result<Vec<String>, IdentityError>;

    /// Records a successful login timestamp against the account.
    async fn touch_last_login(&self, user_id: Uuid) -> Result<(), IdentityError>;
}
