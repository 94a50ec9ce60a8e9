//! Request representation consumed by the whitelist strategy.
//!
//! The host adapter (axum middleware) fills this from an incoming request; the engine only
//! reads already-parsed fields from it.
use std::collections::HashMap;

use axum::http::HeaderMap;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default)]
pub struct AuthRequest {
    pub headers: HeaderMap,
    /// Low-level connection address, without port.
    pub remote_addr: Option<String>,
    pub query: HashMap<String, String>,
    /// Parsed JSON object body, when the request carried one.
    pub body: Option<Map<String, Value>>,
}

impl AuthRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.remote_addr = Some(addr.into());
        self
    }

    pub fn with_header(mut self, name: &'static str, value: &str) -> Self {
        if let Ok(value) = value.parse() {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: Map<String, Value>) -> Self {
        self.body = Some(body);
        self
    }

    /// Header value as UTF-8 text. Non-UTF-8 values are treated as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    pub fn body_field(&self, key: &str) -> Option<&Value> {
        self.body.as_ref().and_then(|b| b.get(key))
    }
}
