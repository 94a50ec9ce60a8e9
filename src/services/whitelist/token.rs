//! Shared-secret token check performed after a whitelist match.
use serde_json::Value;

use super::identity::{Identity, truthy};
use super::outcome::Rejection;
use super::request::AuthRequest;

pub const TOKEN_FIELD: &str = "token";
pub const DEFAULT_INVALID_TOKEN_MESSAGE: &str = "Provided token is invalid";

/// Token supplied by the request: header, then query parameter, then body field.
///
/// Empty or otherwise falsy values fall through to the next source.
pub fn supplied_token(req: &AuthRequest) -> Option<Value> {
    if let Some(v) = req.header(TOKEN_FIELD).filter(|v| !v.is_empty()) {
        return Some(Value::String(v.to_owned()));
    }
    if let Some(v) = req.query_param(TOKEN_FIELD).filter(|v| !v.is_empty()) {
        return Some(Value::String(v.to_owned()));
    }
    req.body_field(TOKEN_FIELD)
        .filter(|v| matches!(v, Value::String(_) | Value::Number(_) | Value::Bool(_)))
        .filter(|v| truthy(v))
        .cloned()
}

/// Compare the supplied token with the identity's stored one. Strict equality: no trimming,
/// no case folding, no type coercion.
pub fn validate(
    req: &AuthRequest,
    identity: &Identity,
    unauthorized_message: Option<&str>,
) -> Result<(), Rejection> {
    let Some(supplied) = supplied_token(req) else {
        return Err(Rejection::bad_request("Token is required"));
    };

    if identity.token() != Some(&supplied) {
        return Err(Rejection::unauthorized(
            unauthorized_message.unwrap_or(DEFAULT_INVALID_TOKEN_MESSAGE),
        ));
    }

    Ok(())
}
