//! Refresh token store implementations
//!
//! The trait owns the contract; PostgreSQL is the authoritative backend and
//! the in-memory table backs tests and embedded runs.

pub mod memory;
pub mod refresh_token;

pub use memory::InMemoryRefreshTokenStore;
pub use refresh_token::{
    PgRefreshTokenStore, RefreshTokenStore, RotatedSecret, SECRET_BYTES, StoreError,
    generate_secret, hash_secret,
};
