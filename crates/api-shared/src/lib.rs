//! # API Shared
//!
//! Shared definitions for the PhysiHome HTTP API.
//!
//! Contains:
//! - Request/response bodies with OpenAPI schemas (`dto` module)
//! - Session token issue and verification (`auth` module)
//! - `HealthService`
//!
//! Used by `api-rest` and the workspace's `physihome-run` binary.

pub mod auth;
pub mod dto;
pub mod health;

pub use auth::{token_from_headers, SessionClaims, SessionTokens};
pub use health::HealthService;
