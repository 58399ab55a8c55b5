//! Environment-driven configuration, validated once at startup
//!
//! Variables (required unless noted):
//!
//! | variable                    | field          | default        |
//! |-----------------------------|----------------|----------------|
//! | `DYNDNS_USERNAME`           | `username`     |                |
//! | `DYNDNS_PASSWORD`           | `password_hash`|                |
//! | `DNS_HOSTNAME`              | `hostname`     |                |
//! | `DNS_ZONE`                  | `zone`         |                |
//! | `PROJECT_ID` / `GCP_PROJECT`| `project_id`   |                |
//! | `DNS_TTL`                   | `ttl`          | 300            |
//! | `MAX_RETRIES`               | `max_retries`  | 3              |
//! | `RETRY_DELAY`               | `retry_delay`  | 1 (seconds)    |
//! | `DYNDNS_LISTEN`             | `listen`       | `0.0.0.0:$PORT`|
//! | `PORT`                      |                | 8080           |

use crate::{error::ConfigError, password::PasswordHash, validate::is_valid_fqdn};
use config::{Config as Layered, Environment};
use serde::Deserialize;
use std::{
    env,
    ffi::OsString,
    net::{Ipv4Addr, SocketAddr},
    str::FromStr,
    time::Duration,
};
use validator::Validate;

pub const DEFAULT_TTL: u32 = 300;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 1;
const DEFAULT_PORT: u16 = 8080;

/*──────── raw environment view ────────*/

/// Field names are the lower-cased variable names `Environment` produces.
#[derive(Debug, Deserialize, Validate)]
struct RawEnv {
    #[validate(required, length(min = 1))]
    dyndns_username: Option<String>,
    #[validate(required, length(min = 1))]
    dyndns_password: Option<String>,
    #[validate(required, length(min = 1))]
    dns_hostname: Option<String>,
    #[validate(required, length(min = 1))]
    dns_zone: Option<String>,

    project_id: Option<String>,
    gcp_project: Option<String>,

    dns_ttl: Option<String>,
    max_retries: Option<String>,
    retry_delay: Option<String>,
    dyndns_listen: Option<String>,
    port: Option<String>,
}

/// validator field → variable name, in reporting order
const REQUIRED: [(&str, &str); 4] = [
    ("dyndns_username", "DYNDNS_USERNAME"),
    ("dyndns_password", "DYNDNS_PASSWORD"),
    ("dns_hostname", "DNS_HOSTNAME"),
    ("dns_zone", "DNS_ZONE"),
];

/// Every variable the loader looks at.
const READ_VARS: [&str; 11] = [
    "DYNDNS_USERNAME",
    "DYNDNS_PASSWORD",
    "DNS_HOSTNAME",
    "DNS_ZONE",
    "PROJECT_ID",
    "GCP_PROJECT",
    "DNS_TTL",
    "MAX_RETRIES",
    "RETRY_DELAY",
    "DYNDNS_LISTEN",
    "PORT",
];

/*──────── Config ────────*/

/// Immutable operating parameters; build once, share behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Config {
    pub username: String,
    pub password_hash: PasswordHash,
    /// Managed FQDN without trailing dot.
    pub hostname: String,
    pub zone: String,
    pub project_id: String,
    pub ttl: u32,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub listen: SocketAddr,
}

impl Config {
    /// Read the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_os(env::vars_os())
    }

    /// Like [`Config::load_from`] for raw OS strings. Non-UTF-8 entries are
    /// skipped unless they are variables this loader reads.
    pub fn load_from_os<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        let mut utf8 = Vec::new();
        for (key, value) in vars {
            let Ok(key) = key.into_string() else {
                continue;
            };
            match value.into_string() {
                Ok(value) => utf8.push((key, value)),
                Err(_) => {
                    if let Some(var) = READ_VARS.iter().copied().find(|v| *v == key) {
                        return Err(ConfigError::Malformed {
                            var,
                            reason: "value is not valid UTF-8".into(),
                        });
                    }
                }
            }
        }
        Self::load_from(utf8)
    }

    /// Build from an explicit variable set; reports every missing required
    /// variable at once.
    pub fn load_from<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: config::Map<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let raw: RawEnv = Layered::builder()
            .add_source(Environment::default().source(Some(map)))
            .build()?
            .try_deserialize()?;

        let mut missing: Vec<&'static str> = match raw.validate() {
            Ok(()) => Vec::new(),
            Err(errs) => {
                let fields = errs.field_errors();
                REQUIRED
                    .iter()
                    .filter(|(field, _)| fields.contains_key(*field))
                    .map(|(_, var)| *var)
                    .collect()
            }
        };

        let project_id = [&raw.project_id, &raw.gcp_project]
            .into_iter()
            .flatten()
            .find(|v| !v.is_empty())
            .cloned();
        if project_id.is_none() {
            missing.push("PROJECT_ID (or GCP_PROJECT)");
        }

        let (username, password, hostname, zone, project_id) = match (
            raw.dyndns_username,
            raw.dyndns_password,
            raw.dns_hostname,
            raw.dns_zone,
            project_id,
        ) {
            (Some(u), Some(p), Some(h), Some(z), Some(pid)) if missing.is_empty() => {
                (u, p, h, z, pid)
            }
            _ => return Err(ConfigError::Missing(missing)),
        };

        let password_hash = password
            .parse::<PasswordHash>()
            .map_err(|reason| ConfigError::Malformed {
                var: "DYNDNS_PASSWORD",
                reason,
            })?;

        let hostname = hostname.trim_end_matches('.').to_ascii_lowercase();
        if !is_valid_fqdn(&hostname) {
            return Err(ConfigError::Malformed {
                var: "DNS_HOSTNAME",
                reason: format!("`{hostname}` is not a fully-qualified domain name"),
            });
        }

        let listen = match raw.dyndns_listen {
            Some(addr) => parse_num::<SocketAddr>("DYNDNS_LISTEN", Some(addr), None)?,
            None => SocketAddr::from((
                Ipv4Addr::UNSPECIFIED,
                parse_num("PORT", raw.port, Some(DEFAULT_PORT))?,
            )),
        };

        Ok(Self {
            username,
            password_hash,
            hostname,
            zone,
            project_id,
            ttl: parse_num("DNS_TTL", raw.dns_ttl, Some(DEFAULT_TTL))?,
            max_retries: parse_num("MAX_RETRIES", raw.max_retries, Some(DEFAULT_MAX_RETRIES))?,
            retry_delay: Duration::from_secs(parse_num(
                "RETRY_DELAY",
                raw.retry_delay,
                Some(DEFAULT_RETRY_DELAY_SECS),
            )?),
            listen,
        })
    }

    /// Dot-terminated owner name as zone APIs store it.
    pub fn record_name(&self) -> String {
        format!("{}.", self.hostname)
    }
}

fn parse_num<T: FromStr>(
    var: &'static str,
    raw: Option<String>,
    default: Option<T>,
) -> Result<T, ConfigError> {
    match (raw, default) {
        (Some(v), _) => v.trim().parse::<T>().map_err(|_| ConfigError::Malformed {
            var,
            reason: format!("`{v}` cannot be parsed"),
        }),
        (None, Some(d)) => Ok(d),
        (None, None) => Err(ConfigError::Missing(vec![var])),
    }
}
