//! Whitelist matching of a remote address against exact and CIDR entries.
use std::net::IpAddr;

use ipnet::IpNet;

use super::identity::Identity;
use super::settings::{MatchPolicy, WhitelistEntry};

/// Test one entry address against the candidate.
///
/// Entries containing `/` are CIDR blocks, everything else is compared as a single address.
/// A malformed entry never matches.
pub fn entry_matches(entry: &str, candidate: IpAddr) -> bool {
    if entry.contains('/') {
        match entry.parse::<IpNet>() {
            Ok(net) => net_contains(&net, candidate),
            Err(err) => {
                tracing::warn!(entry, error = %err, "invalid CIDR block in whitelist");
                false
            }
        }
    } else {
        match entry.parse::<IpAddr>() {
            Ok(addr) => same_address(addr, candidate),
            Err(err) => {
                tracing::warn!(entry, error = %err, "invalid address in whitelist");
                false
            }
        }
    }
}

/// Find the identity of the matching entry.
///
/// With [`MatchPolicy::Last`] every entry is tested and the last match wins.
pub fn find_identity<'a>(
    candidate: &str,
    entries: &'a [WhitelistEntry],
    policy: MatchPolicy,
) -> Option<&'a Identity> {
    let Ok(candidate) = candidate.parse::<IpAddr>() else {
        tracing::debug!(candidate, "remote address is not an IP address");
        return None;
    };

    let mut found = None;
    for entry in entries {
        if entry_matches(&entry.address, candidate) {
            found = Some(&entry.identity);
            if policy == MatchPolicy::First {
                break;
            }
        }
    }
    found
}

/// Address equality across families: an IPv4-mapped or IPv4-compatible IPv6 address equals
/// its IPv4 form.
fn same_address(a: IpAddr, b: IpAddr) -> bool {
    match (a, b) {
        (IpAddr::V4(v4), IpAddr::V6(v6)) | (IpAddr::V6(v6), IpAddr::V4(v4)) => {
            v6.to_ipv4() == Some(v4)
        }
        _ => a == b,
    }
}

fn net_contains(net: &IpNet, candidate: IpAddr) -> bool {
    let candidate = match (net, candidate) {
        (IpNet::V4(_), IpAddr::V6(v6)) => match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => return false,
        },
        _ => candidate,
    };
    net.contains(&candidate)
}
