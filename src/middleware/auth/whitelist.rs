//! IP whitelist authentication → AuthCtx in request extensions
//!
//! Host side of the whitelist strategy:
//! - build an `AuthRequest` (headers, peer address, query, JSON body) from the axum request
//! - run the strategy under the configured timeout
//! - Success → `AuthCtx` in extensions, Fail → 400/401, Error → 500

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::{
    Router,
    body::{self, Body},
    extract::{ConnectInfo, Query, State},
    http::{Request, header},
    middleware::{self, Next},
    response::Response,
};
use serde_json::Value;

use crate::api::v1::extractors::AuthCtx;
use crate::error::AppError;
use crate::services::whitelist::{AuthOutcome, AuthRequest, FailInfo};
use crate::state::AppState;

const DEFAULT_FAIL_MESSAGE: &str = "Unauthorized";

/// Put the whitelist in front of `router`.
///
/// ```ignore
/// let v1 = api::v1::routes();
/// let v1 = middleware::auth::whitelist::apply(v1, state.clone());
/// app = app.nest("/api/v1", v1);
/// ```
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    // axum 0.8 from_fn cannot take the State extractor, so pass state explicitly
    router.layer(middleware::from_fn_with_state(state, whitelist_middleware))
}

async fn whitelist_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let (auth_req, mut req) = auth_request(req, state.body_limit_bytes).await?;

    let outcome = tokio::time::timeout(
        state.verify_timeout,
        state.strategy.authenticate(&auth_req, &state.auth_options),
    )
    .await
    .map_err(|_| {
        tracing::warn!(
            strategy = state.strategy.name(),
            timeout = ?state.verify_timeout,
            "authentication did not complete in time"
        );
        AppError::Timeout
    })?;

    match outcome {
        AuthOutcome::Success { identity, info } => {
            // middleware → extractor
            req.extensions_mut().insert(AuthCtx::new(identity, info));
            Ok(next.run(req).await)
        }
        AuthOutcome::Fail(FailInfo::Rejected(rejection)) => Err(rejection.into()),
        AuthOutcome::Fail(FailInfo::Verifier(info)) => {
            let message = info
                .as_ref()
                .and_then(|i| i.get("message"))
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_FAIL_MESSAGE);
            tracing::warn!(message, "verification callback rejected identity");
            Err(AppError::unauthorized(message))
        }
        AuthOutcome::Error(err) => {
            tracing::error!(error = ?err, "authentication error");
            Err(AppError::Internal)
        }
    }
}

/// Split the request into the strategy's view of it and the request to forward.
///
/// A JSON body is buffered (up to `body_limit`) so the token lookup can read it; the same bytes
/// are put back for the downstream handler.
pub async fn auth_request(
    req: Request<Body>,
    body_limit: usize,
) -> Result<(AuthRequest, Request<Body>), AppError> {
    let remote_addr = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());

    let query = Query::<HashMap<String, String>>::try_from_uri(req.uri())
        .map(|Query(q)| q)
        .unwrap_or_default();

    let mut auth_req = AuthRequest {
        headers: req.headers().clone(),
        remote_addr,
        query,
        body: None,
    };

    if !is_json(&req) {
        return Ok((auth_req, req));
    }

    let (parts, body) = req.into_parts();
    let bytes = body::to_bytes(body, body_limit).await.map_err(|err| {
        tracing::warn!(error = %err, "failed to buffer request body");
        AppError::bad_request("Request body is too large or unreadable")
    })?;

    if let Ok(Value::Object(fields)) = serde_json::from_slice::<Value>(&bytes) {
        auth_req.body = Some(fields);
    }

    Ok((auth_req, Request::from_parts(parts, Body::from(bytes))))
}

fn is_json(req: &Request<Body>) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|ct| ct.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
}
