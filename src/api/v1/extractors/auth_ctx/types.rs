/*
 * Responsibility
 * - The "authenticated context" type seen by handlers
 * - The whitelist middleware stores it in request extensions; handlers only receive this type
 *
 * Notes
 * - Address matching, token checks and verification belong to middleware/services
 */
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::services::whitelist::Identity;

/// Context attached to a request that passed the IP whitelist.
///
/// - `identity` is the matched identity, already merged with the default attributes
/// - `info` is whatever the verification callback passed along with its decision
#[derive(Debug, Clone, Serialize)]
pub struct AuthCtx {
    pub identity: Identity,
    pub info: Option<Value>,
    pub authenticated_at: DateTime<Utc>,
}

impl AuthCtx {
    pub fn new(identity: Identity, info: Option<Value>) -> Self {
        Self {
            identity,
            info,
            authenticated_at: Utc::now(),
        }
    }
}
