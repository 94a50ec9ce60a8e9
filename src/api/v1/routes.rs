/*
 * Responsibility
 * - URL layout of v1
 * - /health stays public, everything else goes behind the IP whitelist
 */
use axum::{Router, routing::get};

use crate::middleware::auth::whitelist;
use crate::state::AppState;

use crate::api::v1::handlers::{health::health, me::me};

pub fn routes(state: AppState) -> Router<AppState> {
    let protected = Router::new().route("/me", get(me));
    let protected = whitelist::apply(protected, state);

    Router::new()
        .route("/health", get(health))
        .merge(protected)
}
