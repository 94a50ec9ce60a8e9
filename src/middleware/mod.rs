/*
 * Responsibility
 * - Public interface of the middleware layer (re-exports)
 * - auth::whitelist (IP whitelist authentication), http (cross-cutting HTTP concerns)
 */
pub mod auth;
pub mod http;
