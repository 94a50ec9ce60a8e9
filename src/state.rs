/*
 * Responsibility
 * - Shared context attached to the Router (AppState)
 *   - strategy: the authentication strategy, options: per-request whitelist options
 * - Meant to be cloned (everything inside is Arc / cheap to clone)
 */
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::services::whitelist::{AuthenticateOptions, Strategy};

#[derive(Clone)]
pub struct AppState {
    pub strategy: Arc<dyn Strategy>,
    pub auth_options: Arc<AuthenticateOptions>,
    pub verify_timeout: Duration,
    pub body_limit_bytes: usize,
}

impl AppState {
    pub fn new(strategy: Arc<dyn Strategy>, config: &Config) -> Self {
        Self {
            strategy,
            auth_options: Arc::new(config.auth_options.clone()),
            verify_timeout: config.verify_timeout,
            body_limit_bytes: config.body_limit_bytes,
        }
    }
}
