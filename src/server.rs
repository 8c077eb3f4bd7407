//! HTTP and WebSocket surface over the query pipeline.

use crate::app::Pipeline;
use crate::history::{HistoryStore, InMemoryHistoryStore};
use crate::models::{ChatRequest, ChatResponse, Config};
use crate::stream::{ChannelState, DeliveryChannel, FragmentSink};
use crate::{Error, Result};
use async_trait::async_trait;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{debug, info, warn};

/// Header carrying the opaque caller id used for chat history.
pub const USER_ID_HEADER: &str = "x-user-id";

// Attachments arrive base64-encoded inside JSON bodies.
const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

pub struct AppState {
    pub pipeline: Pipeline,
    pub history: Arc<dyn HistoryStore>,
}

pub type SharedState = Arc<AppState>;

pub fn build_router(state: SharedState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(health_handler))
        .route("/api/chat", get(chat_query_handler).post(chat_post_handler))
        .route("/api/history", get(history_handler))
        .route("/chat/{query}", get(legacy_chat_handler))
        .route("/ws/chat", get(ws_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors_layer(cors_origins))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(origins))
}

/// Builds the production state and serves until the listener fails.
pub async fn serve(config: Config) -> Result<()> {
    let state = Arc::new(AppState {
        pipeline: Pipeline::from_config(&config),
        history: Arc::new(InMemoryHistoryStore::new()),
    });
    let app = build_router(state, &config.cors_origins);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

fn client_error(detail: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "detail": detail }))).into_response()
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "message": "API is working!" }))
}

async fn chat_post_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Response {
    let Some(prompt) = request.prompt_text() else {
        return client_error("Missing prompt");
    };
    let attachment = request.resolved_attachment();

    let response = state.pipeline.answer(prompt, attachment.as_ref()).await;
    record_history(&state, &headers, prompt, &response).await;

    Json(ChatResponse { response }).into_response()
}

#[derive(Debug, Deserialize)]
struct ChatQuery {
    #[serde(default)]
    q: Option<String>,
}

async fn chat_query_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(params): Query<ChatQuery>,
) -> Response {
    let Some(prompt) = params.q.as_deref().filter(|q| !q.trim().is_empty()) else {
        return client_error("Missing prompt");
    };

    let response = state.pipeline.answer(prompt, None).await;
    record_history(&state, &headers, prompt, &response).await;

    Json(ChatResponse { response }).into_response()
}

async fn legacy_chat_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(query): Path<String>,
) -> Response {
    if query.trim().is_empty() {
        return client_error("Missing prompt");
    }

    let response = state.pipeline.answer(&query, None).await;
    record_history(&state, &headers, &query, &response).await;

    Json(ChatResponse { response }).into_response()
}

async fn history_handler(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let Some(user_id) = user_id(&headers) else {
        return client_error("Missing x-user-id");
    };

    match state.history.entries(user_id).await {
        Ok(entries) => Json(entries).into_response(),
        Err(e) => {
            warn!("Failed to read history for {}: {}", user_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "detail": "History unavailable" })),
            )
                .into_response()
        }
    }
}

fn user_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
}

async fn record_history(state: &AppState, headers: &HeaderMap, query: &str, response: &str) {
    let Some(user_id) = user_id(headers) else {
        return;
    };
    if let Err(e) = state.history.record(user_id, query, response).await {
        warn!("Failed to record chat history: {}", e);
    }
}

// ── WebSocket ─────────────────────────────────────────────────────────────

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

/// Outbound half of a WebSocket as a fragment sink.
struct WsSink {
    sender: SplitSink<WebSocket, WsMessage>,
}

#[async_trait]
impl FragmentSink for WsSink {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.sender
            .send(WsMessage::Text(text.into()))
            .await
            .map_err(|e| Error::Connection(e.to_string()))
    }

    async fn close(&mut self) -> Result<()> {
        self.sender
            .close()
            .await
            .map_err(|e| Error::Connection(e.to_string()))
    }
}

/// A text frame is either a bare prompt or a JSON [`ChatRequest`].
fn parse_ws_message(text: &str) -> ChatRequest {
    if text.trim_start().starts_with('{') {
        if let Ok(request) = serde_json::from_str::<ChatRequest>(text) {
            return request;
        }
    }

    ChatRequest {
        prompt: Some(text.to_string()),
        ..Default::default()
    }
}

enum Inbound {
    Text(String),
    Ignored,
    Closed,
}

fn classify_frame(frame: Option<std::result::Result<WsMessage, axum::Error>>) -> Inbound {
    match frame {
        Some(Ok(WsMessage::Text(text))) => Inbound::Text(text.as_str().to_string()),
        Some(Ok(WsMessage::Close(_))) | None => Inbound::Closed,
        Some(Ok(_)) => Inbound::Ignored, // binary, ping, pong
        Some(Err(e)) => {
            debug!("WebSocket receive failed: {}", e);
            Inbound::Closed
        }
    }
}

/// Keeps reading while a reply streams. Queries that arrive meanwhile are
/// queued; returns once the client is gone.
async fn watch_for_close(
    receiver: &mut SplitStream<WebSocket>,
    pending: &mut VecDeque<String>,
) {
    loop {
        match classify_frame(receiver.next().await) {
            Inbound::Text(text) => pending.push_back(text),
            Inbound::Ignored => {}
            Inbound::Closed => return,
        }
    }
}

async fn handle_ws_connection(socket: WebSocket, state: SharedState) {
    info!("WebSocket connection established");

    let (sender, mut receiver) = socket.split();
    let mut channel = DeliveryChannel::new(WsSink { sender });
    let mut pending = VecDeque::new();

    loop {
        let text = match pending.pop_front() {
            Some(text) => text,
            None => match classify_frame(receiver.next().await) {
                Inbound::Text(text) => text,
                Inbound::Ignored => continue,
                Inbound::Closed => break,
            },
        };

        if !channel.begin_receiving() {
            break;
        }

        let request = parse_ws_message(&text);
        let Some(prompt) = request.prompt_text() else {
            channel.fail("Missing prompt").await;
            break;
        };
        let attachment = request.resolved_attachment();

        let reply = async {
            let fragments = state.pipeline.answer_stream(prompt, attachment.as_ref()).await;
            channel.relay(fragments).await
        };

        // Dropping the reply future drops the fragment stream, which stops generation
        let finished = tokio::select! {
            channel_state = reply => Some(channel_state),
            _ = watch_for_close(&mut receiver, &mut pending) => None,
        };

        match finished {
            Some(ChannelState::Error) => break,
            Some(_) => {}
            None => {
                info!("Client disconnected mid-reply, abandoning generation");
                break;
            }
        }
    }

    info!("WebSocket connection closed");
}
