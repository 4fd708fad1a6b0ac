//! Token issuing and session orchestration
//!
//! This module provides:
//! - Access token minting and validation (stateless, signed claims)
//! - The session orchestrator composing verifier, store and issuer
//! - The login/refresh/logout error taxonomy

pub mod jwt;
pub mod service;

pub use jwt::{AccessClaims, AccessTokenIssuer, IssuedAccessToken, JwtError};
pub use service::{SessionError, SessionService, SessionTokens, UserSummary};
