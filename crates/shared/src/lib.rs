//! Shared types, errors, and configuration for Freightbill.
//!
//! This crate provides common types used across all other crates:
//! - Money and currency codes with decimal precision
//! - Typed IDs for type-safe entity references
//! - Pagination types for list endpoints
//! - Application-wide error types
//! - Configuration management
//! - JWT claims carrying the caller's tenant and role

pub mod auth;
pub mod config;
pub mod error;
pub mod jwt;
pub mod types;

pub use auth::Claims;
pub use config::{AppConfig, BillingConfig, CurrencyConfig};
pub use error::AppError;
pub use jwt::{JwtConfig, JwtError, JwtService};
