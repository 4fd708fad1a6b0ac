//! Database models for the session core
//!
//! This module defines the entity structs that map to the refresh token
//! table, plus the diagnostic metadata attached to each device row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One refresh token row per (user, device) pair.
///
/// Rotation replaces this row in place, so storage stays bounded by device
/// count rather than request count. Only a SHA-256 digest of the secret is
/// kept; the raw secret is handed to the client once and never stored.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RefreshTokenRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Client-generated stable per-installation identifier
    pub device_id: String,
    #[serde(skip_serializing)]
    pub secret_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    /// Non-null marks the row permanently dead until replaced
    pub revoked_at: Option<DateTime<Utc>>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

impl RefreshTokenRecord {
    /// Whether this row would satisfy a validation lookup right now.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at > now
    }
}

/// Diagnostic metadata captured at login/rotation. Never consulted for
/// authorization decisions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceMetadata {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}
