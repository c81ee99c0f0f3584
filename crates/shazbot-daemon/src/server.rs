//! HTTP surface over the engine's inbound handlers.
//!
//! Routes:
//! - `POST /clustershazbot/gossip`: bidirectional gossip exchange
//! - `GET /clustershazbot/list`: current view, offline included for the control secret
//! - `PUT|POST /clustershazbot/control`: force our own online/offline state
//! - `GET /health`: liveness and lifecycle

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::json;
use shazbot_core::record::{ControlMessage, GossipMessage, MessageKind, PeerList};
use shazbot_core::{Engine, EngineError};
use std::future::Future;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::debug;

/// Error returned by a route handler.
#[derive(Debug)]
pub enum ApiError {
    Engine(EngineError),
    /// Body carried the envelope of a different route
    WrongMessage(MessageKind),
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError::Engine(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Engine(e @ EngineError::Unauthorized(_)) => {
                (StatusCode::UNAUTHORIZED, e.to_string())
            }
            ApiError::Engine(e @ EngineError::NotStarted) => {
                (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
            }
            ApiError::WrongMessage(expected) => (
                StatusCode::BAD_REQUEST,
                format!("Expected a {:?} message", expected).to_lowercase(),
            ),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[derive(Debug, Serialize)]
struct Health {
    version: &'static str,
    online: bool,
    lifecycle: &'static str,
}

/// Build the router serving `engine`.
pub fn router(engine: Engine) -> Router {
    Router::new()
        .route("/clustershazbot/gossip", post(gossip))
        .route("/clustershazbot/list", get(list))
        .route("/clustershazbot/control", post(control).put(control))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(engine)
}

/// Serve `engine` on `listener` until `signal` resolves, then shut the engine down.
///
/// The server is listening before bootstrap starts so peers answering our
/// fan-out can gossip back. The engine announces its departure even when the
/// server failed; the server error is returned afterwards.
pub async fn serve_node<S>(listener: TcpListener, engine: Engine, signal: S) -> std::io::Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    let server = tokio::spawn(
        axum::serve(listener, router(engine.clone()))
            .with_graceful_shutdown(signal)
            .into_future(),
    );

    engine.start().await;

    let served = server.await;
    engine.shutdown().await;

    served.map_err(std::io::Error::other)?
}

/// The secret from an `Authorization` header, raw or as `Bearer <secret>`.
fn credential(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    Some(value.strip_prefix("Bearer ").map(str::trim).unwrap_or(value))
}

async fn gossip(
    State(engine): State<Engine>,
    headers: HeaderMap,
    Json(message): Json<GossipMessage>,
) -> Result<Json<GossipMessage>, ApiError> {
    if message.message != MessageKind::Gossip {
        return Err(ApiError::WrongMessage(MessageKind::Gossip));
    }

    let reply = engine.handle_gossip(credential(&headers).unwrap_or_default(), message)?;
    Ok(Json(reply))
}

async fn list(State(engine): State<Engine>, headers: HeaderMap) -> Result<Json<PeerList>, ApiError> {
    Ok(Json(engine.handle_list(credential(&headers))?))
}

async fn control(
    State(engine): State<Engine>,
    headers: HeaderMap,
    Json(command): Json<ControlMessage>,
) -> Result<StatusCode, ApiError> {
    if command.message != MessageKind::Control {
        return Err(ApiError::WrongMessage(MessageKind::Control));
    }

    engine.handle_control(credential(&headers).unwrap_or_default(), &command)?;
    debug!("Control command applied: online={}", command.online);
    Ok(StatusCode::NO_CONTENT)
}

async fn health(State(engine): State<Engine>) -> Json<Health> {
    Json(Health {
        version: env!("CARGO_PKG_VERSION"),
        online: engine.is_self_online(),
        lifecycle: engine.lifecycle().as_str(),
    })
}
