//! Core session/token lifecycle components

pub mod auth;
pub mod config;
pub mod db;
pub mod identity;

pub use config::{AuthConfig, ConfigError};
