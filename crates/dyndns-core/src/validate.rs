//! Hostname and address checks applied to every update request.

use crate::error::ValidationError;
use std::net::{IpAddr, Ipv4Addr};

const MAX_FQDN_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// Purely syntactic FQDN check; no resolution is attempted.
///
/// Labels are 1–63 characters of `[A-Za-z0-9-]` that neither start nor end
/// with `-`; the last one is two or more letters.
pub fn is_valid_fqdn(hostname: &str) -> bool {
    if hostname.is_empty() || hostname.len() > MAX_FQDN_LEN {
        return false;
    }
    let labels: Vec<&str> = hostname.split('.').collect();
    let Some((tld, rest)) = labels.split_last() else {
        return false;
    };
    rest.iter().all(|l| is_valid_label(l))
        && is_valid_label(tld)
        && tld.len() >= 2
        && tld.bytes().all(|b| b.is_ascii_alphabetic())
}

fn is_valid_label(label: &str) -> bool {
    (1..=MAX_LABEL_LEN).contains(&label.len())
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

/// Case-insensitive exact match against the single managed hostname.
pub fn validate_hostname(hostname: &str, managed: &str) -> bool {
    hostname.eq_ignore_ascii_case(managed)
}

/// Check a `hostname` query value in the order the protocol reports errors.
/// An empty value counts as absent.
pub fn check_hostname(
    raw: Option<&str>,
    authorized: impl Fn(&str) -> bool,
) -> Result<(), ValidationError> {
    let hostname = raw
        .filter(|h| !h.is_empty())
        .ok_or(ValidationError::MissingHostname)?;
    if !is_valid_fqdn(hostname) {
        return Err(ValidationError::NotFqdn(hostname.to_owned()));
    }
    if !authorized(hostname) {
        return Err(ValidationError::UnknownHost(hostname.to_owned()));
    }
    Ok(())
}

/// `myip` must be an IPv4 literal; v6 addresses are refused since only A
/// records are maintained.
pub fn parse_ipv4(raw: Option<&str>) -> Result<Ipv4Addr, ValidationError> {
    let raw = raw.unwrap_or_default();
    match raw.trim().parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => Ok(v4),
        Ok(IpAddr::V6(_)) | Err(_) => Err(ValidationError::BadIp(raw.to_owned())),
    }
}
