//! In-memory refresh token store
//!
//! Single-process implementation of [`RefreshTokenStore`] keyed by
//! (user, device), used by the test suite and by embedded deployments that
//! run without PostgreSQL. Semantics mirror the SQL implementation row for
//! row: replace-in-place rotation, idempotent revocation, one-statement
//! bulk revoke.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::core::db::models::{DeviceMetadata, RefreshTokenRecord};
use crate::core::db::repositories::refresh_token::{
    RefreshTokenStore, RotatedSecret, StoreError, generate_secret, hash_secret,
};

/// In-memory device-token table.
pub struct InMemoryRefreshTokenStore {
    refresh_token_days: i64,
    rows: Mutex<HashMap<(Uuid, String), RefreshTokenRecord>>,
}

impl InMemoryRefreshTokenStore {
    pub fn new(refresh_token_days: i64) -> Self {
        Self {
            refresh_token_days,
            rows: Mutex::new(HashMap::new()),
        }
    }

    /// All rows for a user, live or not.
    pub async fn find_by_user(&self, user_id: Uuid) -> Vec<RefreshTokenRecord> {
        let rows = self.rows.lock().await;
        rows.values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Drop rows expired beyond use, returning how many were removed.
    pub async fn purge_expired(&self) -> u64 {
        let now = Utc::now();
        let mut rows = self.rows.lock().await;
        let before = rows.len();
        rows.retain(|_, r| r.expires_at > now);
        (before - rows.len()) as u64
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryRefreshTokenStore {
    async fn create_or_replace(
        &self,
        user_id: Uuid,
        device_id: &str,
        metadata: &DeviceMetadata,
    ) -> Result<RotatedSecret, StoreError> {
        let secret = generate_secret();
        let now = Utc::now();
        let expires_at = now + Duration::days(self.refresh_token_days);

        let mut rows = self.rows.lock().await;
        match rows.entry((user_id, device_id.to_string())) {
            Entry::Occupied(mut entry) => {
                // Same row overwritten; created_at survives the replace.
                let existing = entry.get_mut();
                existing.secret_hash = hash_secret(&secret);
                existing.expires_at = expires_at;
                existing.last_used_at = now;
                existing.revoked_at = None;
                existing.user_agent = metadata.user_agent.clone();
                existing.ip_address = metadata.ip_address.clone();
            }
            Entry::Vacant(entry) => {
                entry.insert(RefreshTokenRecord {
                    id: Uuid::new_v4(),
                    user_id,
                    device_id: device_id.to_string(),
                    secret_hash: hash_secret(&secret),
                    created_at: now,
                    expires_at,
                    last_used_at: now,
                    revoked_at: None,
                    user_agent: metadata.user_agent.clone(),
                    ip_address: metadata.ip_address.clone(),
                });
            }
        }

        Ok(RotatedSecret { secret, expires_at })
    }

    async fn validate(
        &self,
        secret: &str,
        device_id: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let digest = hash_secret(secret);
        let now = Utc::now();

        let mut rows = self.rows.lock().await;
        let record = rows
            .values_mut()
            .find(|r| r.device_id == device_id && r.secret_hash == digest);

        match record {
            Some(r) if r.is_live(now) => {
                r.last_used_at = now;
                Ok(Some(r.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn revoke(&self, secret: &str, device_id: &str) -> Result<(), StoreError> {
        let digest = hash_secret(secret);
        let now = Utc::now();

        let mut rows = self.rows.lock().await;
        if let Some(r) = rows
            .values_mut()
            .find(|r| r.device_id == device_id && r.secret_hash == digest && r.is_live(now))
        {
            r.revoked_at = Some(now);
        }

        Ok(())
    }

    async fn revoke_all(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let now = Utc::now();
        let mut rows = self.rows.lock().await;

        let mut revoked = 0;
        for r in rows
            .values_mut()
            .filter(|r| r.user_id == user_id && r.revoked_at.is_none())
        {
            r.revoked_at = Some(now);
            revoked += 1;
        }

        Ok(revoked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const DEVICE_A: &str = "device-a";
    const DEVICE_B: &str = "device-b";

    fn store() -> InMemoryRefreshTokenStore {
        InMemoryRefreshTokenStore::new(30)
    }

    #[tokio::test]
    async fn test_create_then_validate() {
        let store = store();
        let user_id = Uuid::new_v4();

        let rotated = store
            .create_or_replace(user_id, DEVICE_A, &DeviceMetadata::default())
            .await
            .unwrap();

        let record = store.validate(&rotated.secret, DEVICE_A).await.unwrap();
        let record = record.expect("fresh secret should validate");
        assert_eq!(record.user_id, user_id);
        assert_eq!(record.device_id, DEVICE_A);
    }

    #[tokio::test]
    async fn test_replace_invalidates_previous_secret() {
        let store = store();
        let user_id = Uuid::new_v4();
        let metadata = DeviceMetadata::default();

        let first = store
            .create_or_replace(user_id, DEVICE_A, &metadata)
            .await
            .unwrap();
        let second = store
            .create_or_replace(user_id, DEVICE_A, &metadata)
            .await
            .unwrap();

        assert_ne!(first.secret, second.secret);
        assert!(store.validate(&first.secret, DEVICE_A).await.unwrap().is_none());
        assert!(store.validate(&second.secret, DEVICE_A).await.unwrap().is_some());

        // Replaced in place, never duplicated
        assert_eq!(store.find_by_user(user_id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_replace_preserves_row_identity() {
        let store = store();
        let user_id = Uuid::new_v4();
        let metadata = DeviceMetadata::default();

        let first = store
            .create_or_replace(user_id, DEVICE_A, &metadata)
            .await
            .unwrap();
        let original = store
            .validate(&first.secret, DEVICE_A)
            .await
            .unwrap()
            .unwrap();

        let second = store
            .create_or_replace(user_id, DEVICE_A, &metadata)
            .await
            .unwrap();
        let replaced = store
            .validate(&second.secret, DEVICE_A)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(replaced.id, original.id);
        assert_eq!(replaced.created_at, original.created_at);
    }

    #[tokio::test]
    async fn test_validate_unknown_secret() {
        let store = store();
        let user_id = Uuid::new_v4();

        store
            .create_or_replace(user_id, DEVICE_A, &DeviceMetadata::default())
            .await
            .unwrap();

        let result = store.validate(&generate_secret(), DEVICE_A).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_validate_wrong_device() {
        let store = store();
        let user_id = Uuid::new_v4();

        let rotated = store
            .create_or_replace(user_id, DEVICE_A, &DeviceMetadata::default())
            .await
            .unwrap();

        let result = store.validate(&rotated.secret, DEVICE_B).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_validate_revoked_record() {
        let store = store();
        let user_id = Uuid::new_v4();

        let rotated = store
            .create_or_replace(user_id, DEVICE_A, &DeviceMetadata::default())
            .await
            .unwrap();
        store.revoke(&rotated.secret, DEVICE_A).await.unwrap();

        let result = store.validate(&rotated.secret, DEVICE_A).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_validate_expired_record() {
        // Negative TTL writes an expiry already in the past
        let store = InMemoryRefreshTokenStore::new(-1);
        let user_id = Uuid::new_v4();

        let rotated = store
            .create_or_replace(user_id, DEVICE_A, &DeviceMetadata::default())
            .await
            .unwrap();

        let result = store.validate(&rotated.secret, DEVICE_A).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_validate_touches_last_used_at() {
        let store = store();
        let user_id = Uuid::new_v4();

        let rotated = store
            .create_or_replace(user_id, DEVICE_A, &DeviceMetadata::default())
            .await
            .unwrap();
        let first = store
            .validate(&rotated.secret, DEVICE_A)
            .await
            .unwrap()
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let second = store
            .validate(&rotated.secret, DEVICE_A)
            .await
            .unwrap()
            .unwrap();

        assert!(second.last_used_at > first.last_used_at);
        // Touch is the only mutation; the secret still validates
        assert_eq!(second.secret_hash, first.secret_hash);
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let store = store();
        let user_id = Uuid::new_v4();

        let rotated = store
            .create_or_replace(user_id, DEVICE_A, &DeviceMetadata::default())
            .await
            .unwrap();

        store.revoke(&rotated.secret, DEVICE_A).await.unwrap();
        store.revoke(&rotated.secret, DEVICE_A).await.unwrap();
        store.revoke("never-issued", DEVICE_A).await.unwrap();
    }

    #[tokio::test]
    async fn test_rotation_of_one_device_spares_the_other() {
        let store = store();
        let user_id = Uuid::new_v4();
        let metadata = DeviceMetadata::default();

        store
            .create_or_replace(user_id, DEVICE_A, &metadata)
            .await
            .unwrap();
        let on_b = store
            .create_or_replace(user_id, DEVICE_B, &metadata)
            .await
            .unwrap();

        // Rotate device A twice
        store
            .create_or_replace(user_id, DEVICE_A, &metadata)
            .await
            .unwrap();
        store
            .create_or_replace(user_id, DEVICE_A, &metadata)
            .await
            .unwrap();

        assert!(store.validate(&on_b.secret, DEVICE_B).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_revoke_all_hits_every_device_of_one_user() {
        let store = store();
        let user_a = Uuid::new_v4();
        let user_b = Uuid::new_v4();
        let metadata = DeviceMetadata::default();

        let a_phone = store
            .create_or_replace(user_a, "phone", &metadata)
            .await
            .unwrap();
        let a_laptop = store
            .create_or_replace(user_a, "laptop", &metadata)
            .await
            .unwrap();
        let b_phone = store
            .create_or_replace(user_b, "phone", &metadata)
            .await
            .unwrap();

        let revoked = store.revoke_all(user_a).await.unwrap();
        assert_eq!(revoked, 2);

        assert!(store.validate(&a_phone.secret, "phone").await.unwrap().is_none());
        assert!(store.validate(&a_laptop.secret, "laptop").await.unwrap().is_none());
        assert!(store.validate(&b_phone.secret, "phone").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_revoke_all_skips_already_revoked_rows() {
        let store = store();
        let user_id = Uuid::new_v4();
        let metadata = DeviceMetadata::default();

        let rotated = store
            .create_or_replace(user_id, DEVICE_A, &metadata)
            .await
            .unwrap();
        store.revoke(&rotated.secret, DEVICE_A).await.unwrap();
        store
            .create_or_replace(user_id, DEVICE_B, &metadata)
            .await
            .unwrap();

        let revoked = store.revoke_all(user_id).await.unwrap();
        assert_eq!(revoked, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_create_or_replace_single_live_row() {
        let store = Arc::new(InMemoryRefreshTokenStore::new(30));
        let user_id = Uuid::new_v4();

        let s1 = Arc::clone(&store);
        let s2 = Arc::clone(&store);
        let t1 = tokio::spawn(async move {
            s1.create_or_replace(user_id, DEVICE_A, &DeviceMetadata::default())
                .await
                .unwrap()
        });
        let t2 = tokio::spawn(async move {
            s2.create_or_replace(user_id, DEVICE_A, &DeviceMetadata::default())
                .await
                .unwrap()
        });

        let (a, b) = (t1.await.unwrap(), t2.await.unwrap());

        // Never zero, never two
        let rows = store.find_by_user(user_id).await;
        assert_eq!(rows.len(), 1);

        let a_valid = store.validate(&a.secret, DEVICE_A).await.unwrap().is_some();
        let b_valid = store.validate(&b.secret, DEVICE_A).await.unwrap().is_some();
        assert!(a_valid ^ b_valid, "exactly one writer's secret must survive");
    }

    #[tokio::test]
    async fn test_purge_expired_drops_only_dead_rows() {
        let expired = InMemoryRefreshTokenStore::new(-1);
        let user_id = Uuid::new_v4();

        expired
            .create_or_replace(user_id, DEVICE_A, &DeviceMetadata::default())
            .await
            .unwrap();
        assert_eq!(expired.purge_expired().await, 1);
        assert!(expired.find_by_user(user_id).await.is_empty());

        let live = store();
        live.create_or_replace(user_id, DEVICE_A, &DeviceMetadata::default())
            .await
            .unwrap();
        assert_eq!(live.purge_expired().await, 0);
    }
}
