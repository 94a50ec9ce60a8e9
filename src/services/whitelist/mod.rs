//! IP whitelist authentication engine.
//!
//! Given a request, decides whether its origin address is whitelisted (exact address or CIDR
//! block), optionally checks a shared-secret token, merges default identity attributes and hands
//! the final decision to a caller-supplied verification callback.
//!
//! ```ignore
//! let strategy = IpWhitelistStrategy::builder()
//!     .verify(|user, done| {
//!         done.success(user, None);
//!         Ok(())
//!     })
//!     .build()?;
//!
//! let options = AuthenticateOptions::new(json!({
//!     "users": [{"address": "10.0.0.0/24", "identity": {"id": 2}}],
//! }));
//! match strategy.authenticate(&req, &options).await {
//!     AuthOutcome::Success { identity, .. } => { /* ... */ }
//!     AuthOutcome::Fail(info) => { /* 400 / 401 */ }
//!     AuthOutcome::Error(err) => { /* 500 */ }
//! }
//! ```
pub mod address;
pub mod identity;
pub mod matcher;
pub mod outcome;
pub mod request;
pub mod settings;
pub mod strategy;
pub mod token;
pub mod verify;

pub use identity::Identity;
pub use outcome::{AuthOutcome, FailInfo, Rejection, VerifyError};
pub use request::AuthRequest;
pub use settings::{AuthenticateOptions, MatchPolicy, Settings, WhitelistEntry};
pub use strategy::{IpWhitelistStrategy, Strategy, StrategyError};
pub use verify::{Verified, Verify, VerifyResult};
