//! Common zone-client trait and value objects for pluggable DNS backends.
//!
//! * [`ZoneClient`] is the only seam between the update logic and a provider.
//! * [`RecordSet`] / [`ChangeSet`] serialize to the shape most zone APIs use
//!   (`name`, `type`, `ttl`, `rrdatas`; `additions` / `deletions`).
//! * [`ProviderError::is_transient`] decides what the caller may retry.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordType {
    A,
    AAAA,
    /// Any type this service never writes (SOA, NS, CNAME, ...).
    #[serde(other)]
    Other,
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecordType::A => "A",
            RecordType::AAAA => "AAAA",
            RecordType::Other => "OTHER",
        })
    }
}

/*──────── value objects ────────*/

/// One resource record set as held by the remote zone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSet {
    /// Fully-qualified, dot-terminated owner name.
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: RecordType,
    #[serde(default)]
    pub ttl: u32,
    #[serde(default)]
    pub rrdatas: Vec<String>,
    /// Fields this crate does not model (`routingPolicy`, `signatureRrdatas`,
    /// ...). Kept so a deletion echoes the set exactly as the zone holds it.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RecordSet {
    pub fn new(name: &str, record_type: RecordType, ttl: u32, rrdatas: Vec<String>) -> Self {
        Self {
            name: name.to_owned(),
            record_type,
            ttl,
            rrdatas,
            extra: Map::new(),
        }
    }

    /// First datum of the set; an A record in this service carries exactly one.
    pub fn first_data(&self) -> Option<&str> {
        self.rrdatas.first().map(String::as_str)
    }

    pub fn matches(&self, name: &str, record_type: RecordType) -> bool {
        self.record_type == record_type && self.name == name
    }
}

/// Atomic batch of deletions and additions applied to one zone.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub additions: Vec<RecordSet>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub deletions: Vec<RecordSet>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, rr: RecordSet) -> Self {
        self.additions.push(rr);
        self
    }

    pub fn delete(mut self, rr: RecordSet) -> Self {
        self.deletions.push(rr);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.deletions.is_empty()
    }
}

/*──────── errors ────────*/

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("credentials unavailable: {0}")]
    Credentials(String),
}

impl ProviderError {
    /// Classify a non-success HTTP status returned by a zone API.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            429 => ProviderError::RateLimited(message),
            500..=599 => ProviderError::Server { status, message },
            _ => ProviderError::Api { status, message },
        }
    }

    /// Rate limits, 5xx answers and connection-level failures are worth
    /// another attempt; everything else is final.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::RateLimited(_) | ProviderError::Server { .. } => true,
            ProviderError::Http(e) => e.is_timeout() || e.is_connect(),
            ProviderError::Api { .. } | ProviderError::Credentials(_) => false,
        }
    }
}

/*──────── zone client ────────*/

/// Operations a managed zone has to offer; bound to one zone at construction.
#[async_trait]
pub trait ZoneClient: Send + Sync {
    fn name(&self) -> &'static str;
    fn zone(&self) -> &str;

    async fn zone_exists(&self) -> Result<bool, ProviderError>;

    async fn list_record_sets(&self) -> Result<Vec<RecordSet>, ProviderError>;

    /// Apply all deletions and additions as one change or not at all.
    async fn apply_changes(&self, changes: &ChangeSet) -> Result<(), ProviderError>;
}
