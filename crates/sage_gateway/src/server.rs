use crate::types::{ErrorFrame, QueryRequest};
use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use sage_core::config::GatewayConfig;
use sage_reasoning::{EngineResult, ReActEngine};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

/// Builds a fresh engine (with empty memory) for each session.
pub type EngineFactory = Arc<dyn Fn() -> ReActEngine + Send + Sync>;

#[derive(Clone)]
struct AppState {
    factory: EngineFactory,
    /// Number of active WebSocket connections.
    active_ws: Arc<AtomicUsize>,
    http_query_timeout: Duration,
    ws_query_timeout: Duration,
    max_queued: usize,
}

/// The HTTP + WebSocket front door.
///
/// - `GET /ws/query/`: one engine per connection, one JSON result per text frame
/// - `POST /query`: stateless single query
/// - `GET /health`: health check
pub struct GatewayServer {
    factory: EngineFactory,
    active_ws: Arc<AtomicUsize>,
    host: String,
    port: u16,
    http_query_timeout: Duration,
    ws_query_timeout: Duration,
    max_queued: usize,
}

impl GatewayServer {
    pub fn new(factory: EngineFactory, config: &GatewayConfig) -> Self {
        Self {
            factory,
            active_ws: Arc::new(AtomicUsize::new(0)),
            host: config.host.clone(),
            port: config.port,
            http_query_timeout: Duration::from_secs(config.http_query_timeout_secs),
            ws_query_timeout: Duration::from_secs(config.ws_query_timeout_secs),
            max_queued: config.max_queued_queries.max(1),
        }
    }

    pub fn active_connections(&self) -> Arc<AtomicUsize> {
        self.active_ws.clone()
    }

    pub fn router(&self) -> Router {
        let state = AppState {
            factory: self.factory.clone(),
            active_ws: self.active_ws.clone(),
            http_query_timeout: self.http_query_timeout,
            ws_query_timeout: self.ws_query_timeout,
            max_queued: self.max_queued,
        };
        Router::new()
            .route("/health", get(health))
            .route("/query", post(handle_query))
            .route("/ws/query/", get(ws_upgrade))
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Bind and serve until Ctrl-C.
    pub async fn serve(self) -> Result<()> {
        let addr = format!("{}:{}", self.host, self.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Gateway failed to bind {}", addr))?;
        tracing::info!("Gateway listening on {}", addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("Shutdown signal received");
            })
            .await
            .context("Gateway server error")
    }
}

// ============================================================================
// Route handlers
// ============================================================================

async fn health() -> &'static str {
    "ok"
}

/// POST /query: answer one query with a throwaway engine.
async fn handle_query(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<EngineResult>, (StatusCode, Json<ErrorFrame>)> {
    let mut engine = (state.factory)();
    let mut task = tokio::spawn(async move { engine.run(&req.query).await });

    match tokio::time::timeout(state.http_query_timeout, &mut task).await {
        Ok(Ok(result)) => Ok(Json(result)),
        Ok(Err(e)) => {
            tracing::error!("Query task failed: {}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorFrame::internal())))
        }
        Err(_) => {
            task.abort();
            tracing::warn!("Query exceeded {:?}", state.http_query_timeout);
            Err((StatusCode::GATEWAY_TIMEOUT, Json(ErrorFrame::timeout())))
        }
    }
}

/// GET /ws/query/: WebSocket upgrade.
async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

type QueryTask = JoinHandle<(ReActEngine, EngineResult)>;

enum WsEvent {
    Frame(Option<Result<Message, axum::Error>>),
    Finished(Result<(ReActEngine, EngineResult), JoinError>),
    TimedOut,
}

/// Drive one WebSocket session.
///
/// The engine is moved into a task for each query and handed back when the
/// query completes, so queries run one at a time while the socket is still
/// watched for disconnects. Frames arriving mid-query wait their turn, up to
/// `max_queued` of them. A query running past its deadline is aborted and the
/// socket closed.
async fn handle_ws(socket: WebSocket, state: AppState) {
    let session_id = Uuid::new_v4();
    state.active_ws.fetch_add(1, Ordering::Relaxed);
    tracing::info!("New engine for WebSocket session {}", session_id);

    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut engine = Some((state.factory)());
    let mut queued: VecDeque<String> = VecDeque::new();
    let mut in_flight: Option<QueryTask> = None;
    let mut deadline: Option<Instant> = None;

    loop {
        if in_flight.is_none() {
            if let Some(query) = queued.pop_front() {
                if let Some(mut idle) = engine.take() {
                    deadline = Some(Instant::now() + state.ws_query_timeout);
                    in_flight = Some(tokio::spawn(async move {
                        let result = idle.run(&query).await;
                        (idle, result)
                    }));
                }
            }
        }

        let event = tokio::select! {
            frame = ws_rx.next() => WsEvent::Frame(frame),
            joined = join_in_flight(&mut in_flight) => WsEvent::Finished(joined),
            _ = deadline_elapsed(deadline) => WsEvent::TimedOut,
        };

        match event {
            WsEvent::Frame(Some(Ok(Message::Text(text)))) => {
                if queued.len() >= state.max_queued {
                    tracing::warn!(
                        "Session {} has {} queries queued, dropping frame",
                        session_id,
                        queued.len()
                    );
                    let busy = frame_payload(&ErrorFrame::busy());
                    if ws_tx.send(Message::Text(busy)).await.is_err() {
                        break;
                    }
                } else {
                    queued.push_back(text.to_string());
                }
            }
            WsEvent::Frame(Some(Ok(Message::Close(_)))) | WsEvent::Frame(None) => break,
            WsEvent::Frame(Some(Err(e))) => {
                tracing::debug!("WebSocket read error: {}", e);
                break;
            }
            WsEvent::Frame(Some(Ok(_))) => {}
            WsEvent::Finished(Ok((idle, result))) => {
                in_flight = None;
                deadline = None;
                engine = Some(idle);
                let payload = match serde_json::to_string(&result) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!("Failed to serialize result: {}", e);
                        error_payload()
                    }
                };
                if ws_tx.send(Message::Text(payload)).await.is_err() {
                    break;
                }
            }
            WsEvent::Finished(Err(e)) => {
                in_flight = None;
                tracing::error!("Error occurred: {}", e);
                let _ = ws_tx.send(Message::Text(error_payload())).await;
                let _ = ws_tx.send(Message::Close(None)).await;
                break;
            }
            WsEvent::TimedOut => {
                if let Some(task) = in_flight.take() {
                    task.abort();
                }
                tracing::warn!(
                    "Query exceeded {:?}, closing session {}",
                    state.ws_query_timeout,
                    session_id
                );
                let timeout = frame_payload(&ErrorFrame::timeout());
                let _ = ws_tx.send(Message::Text(timeout)).await;
                let _ = ws_tx.send(Message::Close(None)).await;
                break;
            }
        }
    }

    if let Some(task) = in_flight.take() {
        task.abort();
        tracing::info!("Client disconnected mid-query, aborted session {}", session_id);
    } else {
        tracing::info!("Client disconnected, closing session {}", session_id);
    }
    state.active_ws.fetch_sub(1, Ordering::Relaxed);
}

async fn join_in_flight(
    task: &mut Option<QueryTask>,
) -> Result<(ReActEngine, EngineResult), JoinError> {
    match task {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

async fn deadline_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

fn frame_payload(frame: &ErrorFrame) -> String {
    serde_json::to_string(frame).unwrap_or_default()
}

fn error_payload() -> String {
    frame_payload(&ErrorFrame::internal())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_endpoint() {
        assert_eq!(health().await, "ok");
    }

    #[test]
    fn test_error_payload() {
        assert_eq!(error_payload(), r#"{"type":"error","data":"Internal server error"}"#);
    }
}
