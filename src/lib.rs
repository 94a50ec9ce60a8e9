//! # ip-whitelist-auth
//!
//! IP whitelist authentication for axum services.
//!
//! The decision engine lives in [`services::whitelist`]: it extracts the client address, matches
//! it against an ordered list of exact addresses and CIDR blocks, optionally checks a shared
//! token, merges default identity attributes and lets a caller-supplied callback make the final
//! call. [`middleware::auth::whitelist`] plugs it into an axum router.

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod services;
pub mod state;
