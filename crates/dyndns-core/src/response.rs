//! DynDNS2 result codes and their HTTP rendering.

use crate::error::{UpdateError, ValidationError};
use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

pub const AUTH_REALM: &str = r#"Basic realm="DynDNS Update Service""#;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DynDnsResponse {
    Good,
    NoHost,
    NotFqdn,
    BadIp,
    DnsErr,
    BadAuth,
    InternalError,
}

impl DynDnsResponse {
    pub const ALL: [DynDnsResponse; 7] = [
        DynDnsResponse::Good,
        DynDnsResponse::NoHost,
        DynDnsResponse::NotFqdn,
        DynDnsResponse::BadIp,
        DynDnsResponse::DnsErr,
        DynDnsResponse::BadAuth,
        DynDnsResponse::InternalError,
    ];

    /// `(code, http status, description)`
    const fn meta(self) -> (&'static str, StatusCode, &'static str) {
        match self {
            DynDnsResponse::Good => ("good", StatusCode::OK, "Update successful"),
            DynDnsResponse::NoHost => (
                "nohost",
                StatusCode::BAD_REQUEST,
                "Hostname not found or not authorized",
            ),
            DynDnsResponse::NotFqdn => ("notfqdn", StatusCode::BAD_REQUEST, "Invalid hostname format"),
            DynDnsResponse::BadIp => ("badip", StatusCode::BAD_REQUEST, "Invalid IP address format"),
            DynDnsResponse::DnsErr => ("dnserr", StatusCode::INTERNAL_SERVER_ERROR, "DNS update failed"),
            DynDnsResponse::BadAuth => ("badauth", StatusCode::UNAUTHORIZED, "Authentication failed"),
            DynDnsResponse::InternalError => (
                "911",
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
            ),
        }
    }

    pub const fn code(self) -> &'static str {
        self.meta().0
    }

    pub const fn status(self) -> StatusCode {
        self.meta().1
    }

    pub const fn description(self) -> &'static str {
        self.meta().2
    }

    pub fn body(self) -> Body {
        Body {
            status: self.code(),
            description: (self != DynDnsResponse::Good).then_some(self.description()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Body {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'static str>,
}

impl From<&ValidationError> for DynDnsResponse {
    fn from(e: &ValidationError) -> Self {
        match e {
            // an unknown host is reported exactly like an absent one
            ValidationError::MissingHostname | ValidationError::UnknownHost(_) => {
                DynDnsResponse::NoHost
            }
            ValidationError::NotFqdn(_) => DynDnsResponse::NotFqdn,
            ValidationError::BadIp(_) => DynDnsResponse::BadIp,
        }
    }
}

impl From<&UpdateError> for DynDnsResponse {
    fn from(_: &UpdateError) -> Self {
        DynDnsResponse::DnsErr
    }
}

/// CORS headers are added by the outer middleware; only the auth challenge
/// is attached here.
impl IntoResponse for DynDnsResponse {
    fn into_response(self) -> Response {
        let mut resp = (self.status(), Json(self.body())).into_response();
        if self == DynDnsResponse::BadAuth {
            resp.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(AUTH_REALM),
            );
        }
        resp
    }
}
