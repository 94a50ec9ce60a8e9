//! Factory: build the whitelist strategy and its verification callback from application `Config`.
use std::sync::Arc;

use serde_json::{Value, json};

use crate::config::Config;
use crate::services::whitelist::{
    AuthRequest, Identity, IpWhitelistStrategy, StrategyError, Verified, VerifyResult,
};

pub const TENANT_HEADER: &str = "x-tenant";

pub fn build_strategy(config: &Config) -> Result<Arc<IpWhitelistStrategy>, StrategyError> {
    let builder = IpWhitelistStrategy::builder();
    let builder = if config.pass_req_to_callback {
        builder.verify_with_request(verify_with_request)
    } else {
        builder.verify(verify_identity)
    };

    Ok(Arc::new(builder.build()?))
}

/// Accept every whitelisted identity that has not been disabled.
pub fn verify_identity(identity: Identity, done: Verified) -> VerifyResult {
    if identity.get("disabled") == Some(&Value::Bool(true)) {
        done.fail(Some(json!({"message": "Identity is disabled"})));
    } else {
        done.success(identity, None);
    }
    Ok(())
}

/// Like [`verify_identity`], and identities bound to a tenant must present it in `x-tenant`.
pub fn verify_with_request(req: &AuthRequest, identity: Identity, done: Verified) -> VerifyResult {
    if let Some(Value::String(tenant)) = identity.get("tenant") {
        if req.header(TENANT_HEADER) != Some(tenant.as_str()) {
            done.fail(Some(json!({"message": "Tenant mismatch"})));
            return Ok(());
        }
    }
    verify_identity(identity, done)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::whitelist::{AuthOutcome, AuthenticateOptions, FailInfo, Strategy};

    fn options(identity: Value) -> AuthenticateOptions {
        AuthenticateOptions::new(json!({
            "users": [{"address": "10.0.0.5", "identity": identity}],
        }))
    }

    fn strategy(pass_req: bool) -> IpWhitelistStrategy {
        let builder = IpWhitelistStrategy::builder();
        let builder = if pass_req {
            builder.verify_with_request(verify_with_request)
        } else {
            builder.verify(verify_identity)
        };
        builder.build().unwrap()
    }

    #[tokio::test]
    async fn test_disabled_identity_fails() {
        let req = AuthRequest::new().with_remote_addr("10.0.0.5");
        let outcome = strategy(false)
            .authenticate(&req, &options(json!({"id": 1, "disabled": true})))
            .await;

        match outcome {
            AuthOutcome::Fail(FailInfo::Verifier(Some(info))) => {
                assert_eq!(info["message"], "Identity is disabled");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_tenant_must_match_header() {
        let identity = json!({"id": 1, "tenant": "acme"});

        let req = AuthRequest::new().with_remote_addr("10.0.0.5");
        let outcome = strategy(true).authenticate(&req, &options(identity.clone())).await;
        assert!(matches!(outcome, AuthOutcome::Fail(FailInfo::Verifier(_))));

        let req = req.with_header(TENANT_HEADER, "acme");
        let outcome = strategy(true).authenticate(&req, &options(identity)).await;
        assert!(outcome.is_success());
    }
}
