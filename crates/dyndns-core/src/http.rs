//! DynDNS2 update endpoint – axum 0.8
//!
//! Layers (outside-in): CORS / preflight → panic guard → Basic auth → handler.

use crate::{
    auth::authenticate,
    cfg::Config,
    response::DynDnsResponse,
    updater::DnsUpdater,
    validate::{check_hostname, parse_ipv4},
};
use axum::{
    Router,
    extract::{Query, Request, State, rejection::QueryRejection},
    http::{HeaderValue, Method, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use futures::FutureExt;
use serde::Deserialize;
use std::{any::Any, future::Future, panic::AssertUnwindSafe, sync::Arc};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/*──────── shared state ────────*/
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub updater: Arc<DnsUpdater>,
}

/*──────── middlewares ────────*/

/// Answers preflight probes directly; stamps `Access-Control-Allow-Origin`
/// on everything else.
async fn cors(req: Request, next: Next) -> Response {
    let mut resp = if req.method() == Method::OPTIONS {
        (
            StatusCode::NO_CONTENT,
            [
                (header::ACCESS_CONTROL_ALLOW_METHODS, "GET, POST, OPTIONS"),
                (header::ACCESS_CONTROL_ALLOW_HEADERS, "Authorization, Content-Type"),
                (header::ACCESS_CONTROL_MAX_AGE, "3600"),
            ],
        )
            .into_response()
    } else {
        next.run(req).await
    };
    resp.headers_mut()
        .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    resp
}

/// Turns a panic anywhere below into a plain `911`.
async fn catch_panic(req: Request, next: Next) -> Response {
    match AssertUnwindSafe(next.run(req)).catch_unwind().await {
        Ok(resp) => resp,
        Err(payload) => {
            error!(detail = panic_detail(payload.as_ref()), "request handler panicked");
            DynDnsResponse::InternalError.into_response()
        }
    }
}

fn panic_detail(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

async fn auth_guard(State(st): State<AppState>, req: Request, next: Next) -> Response {
    match authenticate(&st.config, req.headers()).await {
        Ok(user) => {
            debug!(user = %user, "authenticated");
            next.run(req).await
        }
        Err(e) => {
            warn!(uri = %req.uri().path(), error = %e, "authentication failed");
            DynDnsResponse::BadAuth.into_response()
        }
    }
}

/*──────── router bootstrap ────────*/

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(update).post(update))
        .route("/nic/update", get(update).post(update))
        .with_state(state.clone())
        // middlewares (inside-out)
        .layer(middleware::from_fn_with_state(state, auth_guard))
        .layer(middleware::from_fn(catch_panic))
        .layer(middleware::from_fn(cors))
}

pub async fn run_http_server<S>(state: AppState, shutdown: S) -> anyhow::Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    let listen = state.config.listen;
    let listener = TcpListener::bind(listen).await?;
    info!("DynDNS endpoint listening at http://{listen}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/*──────── update handler ────────*/

#[derive(Debug, Deserialize)]
struct UpdateParams {
    hostname: Option<String>,
    myip: Option<String>,
}

async fn update(
    State(st): State<AppState>,
    params: Result<Query<UpdateParams>, QueryRejection>,
) -> DynDnsResponse {
    let params = match params {
        Ok(Query(p)) => p,
        Err(e) => {
            warn!(error = %e, "unreadable query string");
            return DynDnsResponse::NoHost;
        }
    };
    let hostname = params.hostname.as_deref();
    let myip = params.myip.as_deref();

    if let Err(e) = check_hostname(hostname, |h| st.updater.validate_hostname(h)) {
        info!(hostname, error = %e, "rejected hostname");
        return (&e).into();
    }
    let ip = match parse_ipv4(myip) {
        Ok(ip) => ip,
        Err(e) => {
            info!(hostname, error = %e, "rejected address");
            return (&e).into();
        }
    };

    match st.updater.update_record(ip).await {
        Ok(outcome) => {
            info!(hostname, %ip, ?outcome, "update accepted");
            DynDnsResponse::Good
        }
        Err(e) => {
            error!(hostname, %ip, error = %e, "DNS update failed");
            (&e).into()
        }
    }
}
