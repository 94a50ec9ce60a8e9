//! The IP whitelist authentication strategy.
//!
//! Pipeline per attempt:
//! settings → address extraction → matching → token validation (optional) → default merge →
//! verification dispatch. Every stage may end the attempt with a rejection; exactly one
//! [`AuthOutcome`] is produced.
use async_trait::async_trait;
use thiserror::Error;

use super::address;
use super::identity::Identity;
use super::matcher;
use super::outcome::{AuthOutcome, Rejection};
use super::request::AuthRequest;
use super::settings::{AuthenticateOptions, Settings};
use super::token;
use super::verify::{self, Verify, Verified, VerifyResult};

pub const STRATEGY_NAME: &str = "ipwhitelist";

/// Capability implemented by authentication strategies.
#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Run one authentication attempt. Never panics out and never errors out: every failure is
    /// folded into the returned outcome.
    async fn authenticate(
        &self,
        req: &AuthRequest,
        options: &AuthenticateOptions,
    ) -> AuthOutcome;
}

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("ip whitelist authentication strategy requires a verify function")]
    MissingVerify,
}

#[derive(Debug, Clone)]
pub struct IpWhitelistStrategy {
    verify: Verify,
}

impl IpWhitelistStrategy {
    pub fn new(verify: Verify) -> Self {
        Self { verify }
    }

    pub fn builder() -> IpWhitelistStrategyBuilder {
        IpWhitelistStrategyBuilder::default()
    }

    pub fn passes_request(&self) -> bool {
        self.verify.passes_request()
    }

    /// Everything up to (not including) verification dispatch.
    fn resolve_identity(
        &self,
        req: &AuthRequest,
        options: &AuthenticateOptions,
    ) -> Result<Identity, Rejection> {
        let settings = Settings::resolve(options.whitelist.as_ref())?;

        let remote = address::remote_address(req)
            .ok_or_else(|| Rejection::bad_request("Can't find remote IP address in request"))?;

        let mut identity = matcher::find_identity(remote, &settings.users, settings.match_policy)
            .cloned()
            .ok_or_else(|| Rejection::unauthorized("Remote IP address not authenticated"))?;
        tracing::debug!(remote, id = ?identity.id(), "whitelist entry matched");

        if settings.token_validation {
            token::validate(req, &identity, settings.unauthorized_message.as_deref())?;
        }

        if let Some(defaults) = &settings.default_identity {
            identity.merge_defaults(defaults);
        }

        Ok(identity)
    }
}

#[async_trait]
impl Strategy for IpWhitelistStrategy {
    fn name(&self) -> &'static str {
        STRATEGY_NAME
    }

    async fn authenticate(
        &self,
        req: &AuthRequest,
        options: &AuthenticateOptions,
    ) -> AuthOutcome {
        let identity = match self.resolve_identity(req, options) {
            Ok(identity) => identity,
            Err(rejection) => {
                tracing::warn!(
                    code = rejection.code(),
                    reason = %rejection,
                    "ip whitelist authentication rejected"
                );
                return rejection.into();
            }
        };

        let outcome = verify::dispatch(&self.verify, req, identity).await;
        if let AuthOutcome::Error(err) = &outcome {
            tracing::error!(error = %err, "ip whitelist verification failed");
        }
        outcome
    }
}

/// Builder selecting the verification callback and its calling convention.
#[derive(Debug, Default)]
pub struct IpWhitelistStrategyBuilder {
    verify: Option<Verify>,
}

impl IpWhitelistStrategyBuilder {
    /// Callback receiving `(identity, verified)`.
    pub fn verify<F>(mut self, f: F) -> Self
    where
        F: Fn(Identity, Verified) -> VerifyResult + Send + Sync + 'static,
    {
        self.verify = Some(Verify::request_unaware(f));
        self
    }

    /// Callback receiving `(request, identity, verified)`.
    pub fn verify_with_request<F>(mut self, f: F) -> Self
    where
        F: Fn(&AuthRequest, Identity, Verified) -> VerifyResult + Send + Sync + 'static,
    {
        self.verify = Some(Verify::request_aware(f));
        self
    }

    pub fn build(self) -> Result<IpWhitelistStrategy, StrategyError> {
        self.verify
            .map(IpWhitelistStrategy::new)
            .ok_or(StrategyError::MissingVerify)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::whitelist::outcome::{FailInfo, VerifyError};
    use serde_json::{Value, json};

    fn accept_all() -> IpWhitelistStrategy {
        IpWhitelistStrategy::builder()
            .verify(|user, done| {
                done.success(user, None);
                Ok(())
            })
            .build()
            .unwrap()
    }

    fn from(addr: &str) -> AuthRequest {
        AuthRequest::new().with_remote_addr(addr)
    }

    fn options(whitelist: Value) -> AuthenticateOptions {
        AuthenticateOptions::new(whitelist)
    }

    fn rejection_of(outcome: AuthOutcome) -> Rejection {
        match outcome {
            AuthOutcome::Fail(FailInfo::Rejected(r)) => r,
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_builder_requires_verify() {
        let err = IpWhitelistStrategy::builder().build().unwrap_err();
        assert!(matches!(err, StrategyError::MissingVerify));
        assert_eq!(
            err.to_string(),
            "ip whitelist authentication strategy requires a verify function"
        );
    }

    #[test]
    fn test_name_and_convention() {
        let strategy = accept_all();
        assert_eq!(strategy.name(), "ipwhitelist");
        assert!(!strategy.passes_request());

        let strategy = IpWhitelistStrategy::builder()
            .verify_with_request(|_, user, done| {
                done.success(user, None);
                Ok(())
            })
            .build()
            .unwrap();
        assert!(strategy.passes_request());
    }

    #[tokio::test]
    async fn test_exact_match_merges_defaults() {
        let outcome = accept_all()
            .authenticate(
                &from("10.0.0.5"),
                &options(json!({"users": [{"address": "10.0.0.5", "identity": {"id": 1}}]})),
            )
            .await;

        let identity = outcome.identity().unwrap();
        assert_eq!(
            serde_json::to_value(identity).unwrap(),
            json!({"id": 1, "admin": false, "scope": [], "token": null})
        );
    }

    #[tokio::test]
    async fn test_cidr_match() {
        let outcome = accept_all()
            .authenticate(
                &from("10.0.0.42"),
                &options(json!({"users": [{"address": "10.0.0.0/24", "identity": {"id": 2}}]})),
            )
            .await;

        assert_eq!(outcome.identity().unwrap().id(), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_last_match_wins() {
        let outcome = accept_all()
            .authenticate(
                &from("10.0.0.5"),
                &options(json!({"users": [
                    {"address": "10.0.0.5", "identity": {"id": 1}},
                    {"address": "10.0.0.5", "identity": {"id": 2}},
                ]})),
            )
            .await;

        assert_eq!(outcome.identity().unwrap().id(), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_first_match_policy() {
        let outcome = accept_all()
            .authenticate(
                &from("10.0.0.5"),
                &options(json!({"matchPolicy": "first", "users": [
                    {"address": "10.0.0.5", "identity": {"id": 1}},
                    {"address": "10.0.0.5", "identity": {"id": 2}},
                ]})),
            )
            .await;

        assert_eq!(outcome.identity().unwrap().id(), Some(&json!(1)));
    }

    #[tokio::test]
    async fn test_forwarded_for_takes_precedence() {
        let req = from("10.9.9.9").with_header("x-forwarded-for", "1.2.3.4,5.6.7.8");
        let outcome = accept_all()
            .authenticate(
                &req,
                &options(json!({"users": [{"address": "1.2.3.4", "identity": {"id": 3}}]})),
            )
            .await;

        assert_eq!(outcome.identity().unwrap().id(), Some(&json!(3)));
    }

    #[tokio::test]
    async fn test_no_match_is_unauthorized() {
        let outcome = accept_all()
            .authenticate(
                &from("192.168.1.1"),
                &options(json!({"users": [{"address": "10.0.0.5", "identity": {"id": 1}}]})),
            )
            .await;

        let r = rejection_of(outcome);
        assert_eq!(r, Rejection::unauthorized("Remote IP address not authenticated"));
    }

    #[tokio::test]
    async fn test_empty_whitelist_is_unauthorized() {
        let r = rejection_of(
            accept_all()
                .authenticate(&from("10.0.0.5"), &options(json!({"users": []})))
                .await,
        );
        assert_eq!(r.code(), 401);

        let r = rejection_of(
            accept_all()
                .authenticate(&from("10.0.0.5"), &AuthenticateOptions::default())
                .await,
        );
        assert_eq!(r.code(), 401);
    }

    #[tokio::test]
    async fn test_malformed_whitelist_is_bad_request() {
        // checked before the address, so a request without any address still reports it
        let r = rejection_of(
            accept_all()
                .authenticate(&AuthRequest::new(), &options(json!({"users": null})))
                .await,
        );
        assert_eq!(r, Rejection::bad_request("No IP whitelist provided"));

        let r = rejection_of(
            accept_all()
                .authenticate(&from("10.0.0.5"), &options(json!({"users": "10.0.0.5"})))
                .await,
        );
        assert_eq!(r, Rejection::bad_request("Provided IP whitelist is not an array"));
    }

    #[tokio::test]
    async fn test_missing_address_is_bad_request() {
        let r = rejection_of(
            accept_all()
                .authenticate(&AuthRequest::new(), &options(json!({"users": []})))
                .await,
        );
        assert_eq!(r, Rejection::bad_request("Can't find remote IP address in request"));
    }

    #[tokio::test]
    async fn test_token_validation() {
        let whitelist = json!({
            "tokenValidation": true,
            "users": [{"address": "10.0.0.5", "identity": {"id": 1, "token": "abc"}}],
        });

        let ok = accept_all()
            .authenticate(
                &from("10.0.0.5").with_header("token", "abc"),
                &options(whitelist.clone()),
            )
            .await;
        assert!(ok.is_success());

        let r = rejection_of(
            accept_all()
                .authenticate(&from("10.0.0.5"), &options(whitelist.clone()))
                .await,
        );
        assert_eq!(r, Rejection::bad_request("Token is required"));

        let r = rejection_of(
            accept_all()
                .authenticate(
                    &from("10.0.0.5").with_query("token", "xyz"),
                    &options(whitelist),
                )
                .await,
        );
        assert_eq!(r, Rejection::unauthorized("Provided token is invalid"));
    }

    #[tokio::test]
    async fn test_token_mismatch_uses_custom_message() {
        let whitelist = json!({
            "tokenValidation": true,
            "unauthorizedMessage": "Bad token for this address",
            "users": [{"address": "10.0.0.5", "identity": {"token": "abc"}}],
        });

        let r = rejection_of(
            accept_all()
                .authenticate(&from("10.0.0.5").with_header("token", "xyz"), &options(whitelist))
                .await,
        );
        assert_eq!(r, Rejection::unauthorized("Bad token for this address"));
    }

    #[tokio::test]
    async fn test_token_checked_before_defaults_are_merged() {
        // the default token must not satisfy validation for an identity without one
        let whitelist = json!({
            "tokenValidation": true,
            "defaultIdentity": {"token": "shared"},
            "users": [{"address": "10.0.0.5", "identity": {"id": 1}}],
        });

        let r = rejection_of(
            accept_all()
                .authenticate(&from("10.0.0.5").with_header("token", "shared"), &options(whitelist))
                .await,
        );
        assert!(r.is_unauthorized());
    }

    #[tokio::test]
    async fn test_null_default_identity_skips_merge() {
        let outcome = accept_all()
            .authenticate(
                &from("10.0.0.5"),
                &options(json!({
                    "defaultIdentity": null,
                    "users": [{"address": "10.0.0.5", "identity": {"id": 1}}],
                })),
            )
            .await;

        assert_eq!(
            serde_json::to_value(outcome.identity().unwrap()).unwrap(),
            json!({"id": 1})
        );
    }

    #[tokio::test]
    async fn test_verifier_receives_merged_identity_and_request() {
        let strategy = IpWhitelistStrategy::builder()
            .verify_with_request(|req, user, done| {
                let is_admin = user.get("admin") == Some(&json!(true));
                if is_admin && req.header("x-admin") == Some("1") {
                    done.success(user, Some(json!({"via": "admin"})));
                } else {
                    done.fail(Some(json!({"message": "admins only"})));
                }
                Ok(())
            })
            .build()
            .unwrap();

        let whitelist = json!({
            "defaultUser": {"admin": true},
            "users": [{"address": "10.0.0.5", "identity": {"id": 1}}],
        });

        let outcome = strategy
            .authenticate(&from("10.0.0.5").with_header("x-admin", "1"), &options(whitelist.clone()))
            .await;
        assert!(matches!(
            outcome,
            AuthOutcome::Success { info: Some(ref info), .. } if info["via"] == "admin"
        ));

        let outcome = strategy
            .authenticate(&from("10.0.0.5"), &options(whitelist))
            .await;
        assert!(matches!(outcome, AuthOutcome::Fail(FailInfo::Verifier(Some(_)))));
    }

    #[tokio::test]
    async fn test_verifier_error_is_reported_as_error() {
        let strategy = IpWhitelistStrategy::builder()
            .verify(|_, _| Err("directory unavailable".into()))
            .build()
            .unwrap();

        let outcome = strategy
            .authenticate(
                &from("10.0.0.5"),
                &options(json!({"users": [{"address": "10.0.0.5", "identity": {"id": 1}}]})),
            )
            .await;
        assert!(matches!(outcome, AuthOutcome::Error(VerifyError::Callback(_))));
    }

    #[tokio::test]
    async fn test_verifier_not_called_on_rejection() {
        let strategy = IpWhitelistStrategy::builder()
            .verify(|_, _| panic!("must not be called"))
            .build()
            .unwrap();

        let outcome = strategy
            .authenticate(&from("10.0.0.6"), &options(json!({"users": []})))
            .await;
        assert!(outcome.rejection().is_some());
    }
}
