use dyndns_provider::ProviderError;
use thiserror::Error;

/// Startup-fatal configuration problems
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("invalid value for {var}: {reason}")]
    Malformed { var: &'static str, reason: String },

    #[error("environment source: {0}")]
    Source(#[from] config::ConfigError),
}

/// Errors raised while reconciling the managed record
#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("zone `{0}` does not exist")]
    ZoneMissing(String),

    #[error("gave up after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: ProviderError,
    },

    #[error("fatal provider error: {0}")]
    Fatal(#[source] ProviderError),
}

/// Request-level validation failures; each maps to one DynDNS code
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("hostname parameter missing")]
    MissingHostname,
    #[error("`{0}` is not a fully-qualified domain name")]
    NotFqdn(String),
    #[error("hostname `{0}` is not managed by this service")]
    UnknownHost(String),
    #[error("`{0}` is not an IPv4 address")]
    BadIp(String),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("no basic credentials supplied")]
    MissingCredentials,
    #[error("malformed authorization header")]
    Malformed,
    #[error("credentials rejected")]
    Rejected,
}
