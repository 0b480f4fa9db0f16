//! HTTP routing: the fixed route table, handlers, and the explicit mapping
//! from domain errors to transport statuses.
//!
//! Handlers depend only on the [`Echo`] trait carried in the router state,
//! never on a concrete engine. The route table is built once during wiring
//! and is read-only while serving. The error response shape
//! `{"code": "...", "message": "..."}` is a documented contract; integration
//! tests assert on it exactly.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::logic::{DomainError, Echo, EchoRequest};

/// State shared by all handlers. Holds the business capability as a trait
/// object only; concrete types stay behind the lifecycle manager.
#[derive(Clone)]
pub(crate) struct RouterState {
    pub echo: Arc<dyn Echo>,
    pub started_at: Instant,
    pub in_flight: Arc<AtomicUsize>,
}

/// Stable JSON error body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

/// Build the route table. Called exactly once, during wiring.
pub(crate) fn build_router(state: RouterState) -> Router {
    let in_flight = Arc::clone(&state.in_flight);

    Router::new()
        .route("/echo/{message}", get(echo_message))
        .route("/health", get(health))
        .fallback(not_found)
        .with_state(state)
        .layer(middleware::from_fn_with_state(in_flight, track_in_flight))
        .layer(TraceLayer::new_for_http())
}

/// Count requests between dispatch and response so the lifecycle manager can
/// report how many were abandoned at the drain deadline.
async fn track_in_flight(
    State(counter): State<Arc<AtomicUsize>>,
    request: Request,
    next: Next,
) -> Response {
    counter.fetch_add(1, Ordering::SeqCst);
    let response = next.run(request).await;
    counter.fetch_sub(1, Ordering::SeqCst);
    response
}

/// The single application route: echo the path segment back verbatim.
async fn echo_message(
    State(state): State<RouterState>,
    Path(message): Path<String>,
) -> Response {
    match state.echo.execute(EchoRequest { message }).await {
        Ok(reply) => (StatusCode::OK, reply.message).into_response(),
        Err(err) => domain_error_response(err),
    }
}

/// Liveness probe.
async fn health(State(state): State<RouterState>) -> Response {
    let uptime_secs = state.started_at.elapsed().as_secs();
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "alive",
            "uptime_secs": uptime_secs,
        })),
    )
        .into_response()
}

/// Fallback for unmatched routes, regardless of method.
async fn not_found() -> Response {
    error_response(
        StatusCode::NOT_FOUND,
        "NOT_FOUND",
        "no route matched the request".to_string(),
    )
}

/// Fixed mapping from domain errors to transport statuses. This table is the
/// only place a domain error becomes a status; it is matched explicitly,
/// never inferred.
fn domain_error_response(err: DomainError) -> Response {
    match err {
        DomainError::Empty => {
            error_response(StatusCode::BAD_REQUEST, "EMPTY_MESSAGE", err.to_string())
        }
        DomainError::TooLong { .. } => error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "MESSAGE_TOO_LONG",
            err.to_string(),
        ),
        DomainError::Store(source) => {
            // Internal detail is logged, never leaked to the client.
            error!(error = %source, "Store failure while handling request");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORE_ERROR",
                "internal store failure".to_string(),
            )
        }
    }
}

fn error_response(status: StatusCode, code: &'static str, message: String) -> Response {
    (status, Json(ErrorBody { code, message })).into_response()
}
