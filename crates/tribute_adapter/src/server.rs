#![forbid(unsafe_code)]

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::ProxyConfig;
use crate::proxy::{ForwardingProxy, UpstreamReply};

const ALLOW_ANY_ORIGIN: &str = "*";
const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Serialize)]
struct ProxyFailureBody {
    status: &'static str,
    error: String,
}

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
    target: String,
}

/// Router exposing the forwarder on `config.route` for every method, plus `/healthz`.
pub fn build_router(config: &ProxyConfig) -> Router {
    let proxy = Arc::new(ForwardingProxy::new(config));
    Router::new()
        .route("/healthz", get(healthz))
        .route(&config.route, any(forward))
        .with_state(proxy)
}

async fn healthz(State(proxy): State<Arc<ForwardingProxy>>) -> (StatusCode, Json<HealthBody>) {
    (
        StatusCode::OK,
        Json(HealthBody {
            status: "ok",
            target: proxy.target_url().to_string(),
        }),
    )
}

async fn forward(
    State(proxy): State<Arc<ForwardingProxy>>,
    method: Method,
    body: Bytes,
) -> Response {
    let method_name = method.as_str().to_string();
    let joined = tokio::task::spawn_blocking(move || proxy.forward(&method_name, &body)).await;
    match joined {
        Ok(Ok(reply)) => {
            info!(method = %method, upstream_status = reply.status, "request forwarded");
            relay(reply)
        }
        Ok(Err(err)) => {
            warn!(method = %method, error = %err, "forwarding failed");
            failure(err.to_string())
        }
        Err(err) => {
            warn!(method = %method, error = %err, "forwarding task aborted");
            failure(format!("forwarding task aborted: {err}"))
        }
    }
}

/// Any upstream answer is relayed as 200; the upstream status only reaches the log.
fn relay(reply: UpstreamReply) -> Response {
    (
        StatusCode::OK,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, ALLOW_ANY_ORIGIN),
            (header::CONTENT_TYPE, JSON_CONTENT_TYPE),
        ],
        reply.body,
    )
        .into_response()
}

fn failure(reason: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::ACCESS_CONTROL_ALLOW_ORIGIN, ALLOW_ANY_ORIGIN)],
        Json(ProxyFailureBody {
            status: "error",
            error: reason,
        }),
    )
        .into_response()
}
