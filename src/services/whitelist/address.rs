//! Remote address extraction.
use super::request::AuthRequest;

pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Canonical client address of the request, or `None` when nothing usable was found.
///
/// `X-Forwarded-For` wins over the connection address. Only the first (originating) entry of
/// the comma-separated list is used, taken literally without trimming.
pub fn remote_address(req: &AuthRequest) -> Option<&str> {
    let raw = req
        .header(FORWARDED_FOR_HEADER)
        .filter(|v| !v.is_empty())
        .or(req.remote_addr.as_deref())?;

    raw.split(',').next().filter(|first| !first.is_empty())
}
