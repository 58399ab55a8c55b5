//! HTTP Basic credentials against the configured account.

use crate::{cfg::Config, error::AuthError};
use axum::http::{HeaderMap, header};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use std::sync::Arc;

#[derive(Debug, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Extract `Authorization: Basic <base64(user:pass)>`.
pub fn basic_credentials(headers: &HeaderMap) -> Result<Credentials, AuthError> {
    let raw = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingCredentials)?
        .to_str()
        .map_err(|_| AuthError::Malformed)?;

    let (scheme, encoded) = raw.trim().split_once(' ').ok_or(AuthError::Malformed)?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return Err(AuthError::Malformed);
    }
    let decoded = B64.decode(encoded.trim()).map_err(|_| AuthError::Malformed)?;
    let decoded = String::from_utf8(decoded).map_err(|_| AuthError::Malformed)?;
    let (username, password) = decoded.split_once(':').ok_or(AuthError::Malformed)?;

    Ok(Credentials {
        username: username.to_owned(),
        password: password.to_owned(),
    })
}

/// Username must match exactly; the password is checked against the stored
/// hash on the blocking pool because PBKDF2 is deliberately slow.
pub async fn authenticate(config: &Arc<Config>, headers: &HeaderMap) -> Result<String, AuthError> {
    let creds = basic_credentials(headers)?;
    if creds.username != config.username {
        return Err(AuthError::Rejected);
    }

    let cfg = Arc::clone(config);
    let password = creds.password;
    let ok = tokio::task::spawn_blocking(move || cfg.password_hash.verify(&password))
        .await
        .map_err(|_| AuthError::Rejected)?;

    if ok {
        Ok(creds.username)
    } else {
        Err(AuthError::Rejected)
    }
}
