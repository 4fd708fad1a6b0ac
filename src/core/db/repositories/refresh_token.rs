//! Refresh token store
//!
//! Owns the one-row-per-(user, device) invariant, expiry and revocation
//! state. Secrets are generated here from a CSPRNG and stored only as
//! SHA-256 digests; the raw value goes to the client once and is compared
//! for equality only, never logged.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use crate::core::db::models::{DeviceMetadata, RefreshTokenRecord};

/// Raw entropy per secret: 64 bytes = 512 bits.
pub const SECRET_BYTES: usize = 64;

/// Storage errors
///
/// Everything here is transient infrastructure failure. Policy outcomes
/// (unknown secret, revoked, expired) are expressed as `Ok(None)` from
/// [`RefreshTokenStore::validate`], never as an error.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),
}

/// A freshly generated secret and the expiry written alongside it.
#[derive(Debug, Clone)]
pub struct RotatedSecret {
    pub secret: String,
    pub expires_at: DateTime<Utc>,
}

/// Generate a new refresh secret: 64 random bytes, hex-encoded.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Digest a secret for storage and lookup.
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Durable table of per-device refresh tokens.
///
/// All operations on one (user, device) row serialize against each other;
/// operations on different rows are independent.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Generate a fresh secret and atomically upsert the single row for
    /// this device: secret digest, expiry and metadata overwritten,
    /// `revoked_at` cleared. Two concurrent calls for the same device
    /// leave exactly one live row, last write winning.
    async fn create_or_replace(
        &self,
        user_id: Uuid,
        device_id: &str,
        metadata: &DeviceMetadata,
    ) -> Result<RotatedSecret, StoreError>;

    /// Look the row up by presented secret and device. Returns `None` for an
    /// unknown secret, a device mismatch, a revoked row or an expired row,
    /// without distinguishing which. On a match, touches `last_used_at` as
    /// its only mutation; rotation is the orchestrator's call to make.
    async fn validate(
        &self,
        secret: &str,
        device_id: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError>;

    /// Set `revoked_at` on a live matching row. No-op when nothing matches;
    /// revocation is idempotent.
    async fn revoke(&self, secret: &str, device_id: &str) -> Result<(), StoreError>;

    /// Mark every currently-live row for the user revoked, in one statement,
    /// and return how many were hit. A device that logs in concurrently may
    /// land before or after the sweep; its own next refresh settles it.
    async fn revoke_all(&self, user_id: Uuid) -> Result<u64, StoreError>;
}

/// PostgreSQL-backed store. The authoritative implementation.
#[derive(Clone)]
pub struct PgRefreshTokenStore {
    pool: PgPool,
    refresh_token_days: i64,
}

impl PgRefreshTokenStore {
    pub fn new(pool: PgPool, refresh_token_days: i64) -> Self {
        Self {
            pool,
            refresh_token_days,
        }
    }

    /// Delete rows expired beyond use. Housekeeping, safe to run any time.
    pub async fn purge_expired(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < NOW()")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// All rows for a user, newest first. Diagnostic listing for the
    /// surrounding app's device overview.
    pub async fn find_by_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<RefreshTokenRecord>, StoreError> {
        let records = sqlx::query_as::<_, RefreshTokenRecord>(
            r#"
            SELECT id, user_id, device_id, secret_hash, created_at, expires_at,
                   last_used_at, revoked_at, user_agent, ip_address
            FROM refresh_tokens
            WHERE user_id = $1
            ORDER BY last_used_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}

#[async_trait]
impl RefreshTokenStore for PgRefreshTokenStore {
    async fn create_or_replace(
        &self,
        user_id: Uuid,
        device_id: &str,
        metadata: &DeviceMetadata,
    ) -> Result<RotatedSecret, StoreError> {
        let secret = generate_secret();
        let expires_at = Utc::now() + Duration::days(self.refresh_token_days);

        // Single upsert so concurrent rotations serialize on the
        // (user_id, device_id) unique index. created_at survives a replace.
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens
                (id, user_id, device_id, secret_hash, expires_at, last_used_at,
                 revoked_at, user_agent, ip_address)
            VALUES ($1, $2, $3, $4, $5, NOW(), NULL, $6, $7)
            ON CONFLICT (user_id, device_id) DO UPDATE
            SET secret_hash = EXCLUDED.secret_hash,
                expires_at = EXCLUDED.expires_at,
                last_used_at = EXCLUDED.last_used_at,
                revoked_at = NULL,
                user_agent = EXCLUDED.user_agent,
                ip_address = EXCLUDED.ip_address
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(device_id)
        .bind(hash_secret(&secret))
        .bind(expires_at)
        .bind(&metadata.user_agent)
        .bind(&metadata.ip_address)
        .execute(&self.pool)
        .await?;

        tracing::debug!(%user_id, device_id, "refresh token rotated");

        Ok(RotatedSecret { secret, expires_at })
    }

    async fn validate(
        &self,
        secret: &str,
        device_id: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        // Match and touch in one statement; the row itself decides liveness.
        let record = sqlx::query_as::<_, RefreshTokenRecord>(
            r#"
            UPDATE refresh_tokens
            SET last_used_at = NOW()
            WHERE secret_hash = $1
              AND device_id = $2
              AND revoked_at IS NULL
              AND expires_at > NOW()
            RETURNING id, user_id, device_id, secret_hash, created_at, expires_at,
                      last_used_at, revoked_at, user_agent, ip_address
            "#,
        )
        .bind(hash_secret(secret))
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn revoke(&self, secret: &str, device_id: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = NOW()
            WHERE secret_hash = $1 AND device_id = $2 AND revoked_at IS NULL
            "#,
        )
        .bind(hash_secret(secret))
        .bind(device_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            tracing::debug!(device_id, "revoke matched no live row");
        }

        Ok(())
    }

    async fn revoke_all(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = NOW()
            WHERE user_id = $1 AND revoked_at IS NULL
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
