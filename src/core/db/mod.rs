//! Persistence for the refresh token table
//!
//! Connectivity, the row model, and the store implementations over
//! PostgreSQL and memory.

pub mod models;
pub mod pool;
pub mod repositories;

pub use models::{DeviceMetadata, RefreshTokenRecord};
pub use pool::{DbConfig, DbError, health_check, run_migrations};
pub use repositories::{
    InMemoryRefreshTokenStore, PgRefreshTokenStore, RefreshTokenStore, RotatedSecret, StoreError,
};

pub use sqlx::PgPool;
