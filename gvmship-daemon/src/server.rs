//! HTTP trigger endpoint.
//!
//! | Route | Response |
//! |---|---|
//! | `GET /` | `200` liveness text |
//! | `POST /api/report/latest` (also `GET`) | `202` queued, `409` run already pending, `503` shutting down |
//!
//! Every route sits behind the caller allow-list; refused callers get `403`.

use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::Router;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use gvmship_core::metrics as m;
use metrics::counter;
use tokio::net::TcpListener;

use crate::allowlist::AllowList;
use crate::queue::{RejectReason, ShipQueue, TriggerOutcome};

/// Liveness response body.
pub const LIVENESS_BODY: &str = "gvmship hooks is running\n";
/// Body for a queued trigger.
pub const ACKNOWLEDGED_BODY: &str = "Acknowledged\n";
/// Body when the queue is full.
pub const BUSY_BODY: &str = "Already shipping\n";
/// Body for refused callers.
pub const FORBIDDEN_BODY: &str = "Forbidden\n";
/// Body once the queue stopped accepting triggers.
pub const CLOSED_BODY: &str = "Shutting down\n";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    queue: Arc<ShipQueue>,
    allowlist: Option<Arc<AllowList>>,
}

impl AppState {
    /// `allowlist = None` disables the caller gate.
    pub fn new(queue: Arc<ShipQueue>, allowlist: Option<AllowList>) -> Self {
        Self {
            queue,
            allowlist: allowlist.map(Arc::new),
        }
    }

    fn permits(&self, ip: IpAddr) -> bool {
        self.allowlist.as_ref().is_none_or(|list| list.is_allowed(ip))
    }
}

/// Build the router. Serve it with
/// `into_make_service_with_connect_info::<SocketAddr>()` so the gate can
/// see the peer address.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(liveness))
        .route("/api/report/latest", get(trigger_latest).post(trigger_latest))
        .layer(middleware::from_fn_with_state(state.clone(), allowlist_gate))
        .with_state(state)
}

/// Serve until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    tracing::info!(listen_addr = %addr, "trigger endpoint listening");

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    .map_err(|e| anyhow::anyhow!("trigger endpoint failed: {}", e))?;

    tracing::info!("trigger endpoint stopped");
    Ok(())
}

async fn allowlist_gate(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    if !state.permits(peer.ip()) {
        tracing::warn!(peer = %peer.ip(), path = %request.uri().path(), "refused connection");
        counter!(m::TRIGGER_REQUESTS_TOTAL, m::LABEL_RESULT => m::RESULT_FORBIDDEN).increment(1);
        return (StatusCode::FORBIDDEN, FORBIDDEN_BODY).into_response();
    }
    next.run(request).await
}

async fn liveness() -> &'static str {
    LIVENESS_BODY
}

async fn trigger_latest(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> Response {
    match state.queue.trigger(Some(peer.ip())) {
        TriggerOutcome::Accepted(id) => {
            tracing::info!(trigger_id = %id, peer = %peer.ip(), "ship of latest report requested");
            counter!(m::TRIGGER_REQUESTS_TOTAL, m::LABEL_RESULT => m::RESULT_ACCEPTED).increment(1);
            (StatusCode::ACCEPTED, ACKNOWLEDGED_BODY).into_response()
        }
        TriggerOutcome::Rejected(RejectReason::Busy) => {
            tracing::info!(peer = %peer.ip(), "ship already pending, trigger rejected");
            counter!(m::TRIGGER_REQUESTS_TOTAL, m::LABEL_RESULT => m::RESULT_BUSY).increment(1);
            (StatusCode::CONFLICT, BUSY_BODY).into_response()
        }
        TriggerOutcome::Rejected(RejectReason::Closed) => {
            (StatusCode::SERVICE_UNAVAILABLE, CLOSED_BODY).into_response()
        }
    }
}
