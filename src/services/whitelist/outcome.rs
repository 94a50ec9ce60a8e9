//! Authentication outcomes and the rejection/error taxonomy reported by the strategy.
use serde_json::{Value, json};
use thiserror::Error;
use tower::BoxError;

use super::identity::Identity;

/// Recoverable rejection raised by one of the pipeline stages.
///
/// Reported as [`AuthOutcome::Fail`], never as an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// Malformed configuration or request (missing whitelist, no address, no token).
    #[error("{0}")]
    BadRequest(String),
    /// No whitelist entry matched, or the supplied token did not match.
    #[error("{0}")]
    Unauthorized(String),
}

impl Rejection {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn code(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::Unauthorized(_) => 401,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BadRequestError",
            Self::Unauthorized(_) => "UnauthorizedError",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest(m) | Self::Unauthorized(m) => m,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    /// Descriptive payload handed to the host framework.
    pub fn payload(&self) -> Value {
        json!({
            "name": self.name(),
            "message": self.message(),
            "code": self.code(),
        })
    }
}

/// Internal failure of the verification step.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// The callback failed, either by returning an error or by passing a cause to the
    /// continuation.
    #[error("verification callback failed: {0}")]
    Callback(#[source] BoxError),

    #[error("verification callback panicked: {0}")]
    Panicked(String),

    /// Every continuation handle was dropped without being resolved.
    #[error("verification callback never completed")]
    Abandoned,
}

/// Payload of a failed attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum FailInfo {
    Rejected(Rejection),
    /// Info passed by the verification callback alongside an absent user.
    Verifier(Option<Value>),
}

impl FailInfo {
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Rejected(r) => Some(r),
            Self::Verifier(_) => None,
        }
    }
}

/// Terminal result of one authentication attempt.
#[derive(Debug)]
pub enum AuthOutcome {
    Success {
        identity: Identity,
        info: Option<Value>,
    },
    Fail(FailInfo),
    Error(VerifyError),
}

impl AuthOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Self::Success { identity, .. } => Some(identity),
            _ => None,
        }
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Fail(info) => info.rejection(),
            _ => None,
        }
    }
}

impl From<Rejection> for AuthOutcome {
    fn from(r: Rejection) -> Self {
        Self::Fail(FailInfo::Rejected(r))
    }
}
