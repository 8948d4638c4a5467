use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use skillsync_shared::Principal;
use skillsync_store::{Conversation, Message};

use crate::directory::CreateConversation;
use crate::error::ApiError;
use crate::session::expired_session_cookie;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/me", get(current_principal))
        .route("/auth/logout", get(logout))
        .route(
            "/conversations",
            get(list_conversations).post(create_conversation),
        )
        .route(
            "/conversations/:id",
            get(get_conversation).post(send_message),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    name: String,
    version: &'static str,
}

#[derive(Deserialize)]
struct SendMessageRequest {
    #[serde(default)]
    content: String,
}

/// Run store-bound work off the async executor.
async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::Internal(format!("worker task failed: {e}")))?
}

/// Unparseable ids cannot name a conversation.
fn parse_conversation_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound)
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn current_principal(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Principal>, ApiError> {
    let principal = state.sessions.resolve_headers(&headers)?;
    Ok(Json(principal))
}

async fn logout() -> impl IntoResponse {
    (
        [(header::SET_COOKIE, expired_session_cookie())],
        Json(serde_json::json!({
            "success": true,
            "message": "Logged out successfully",
        })),
    )
}

async fn list_conversations(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Conversation>>, ApiError> {
    let principal = state.sessions.resolve_headers(&headers)?;
    let directory = state.directory.clone();
    let conversations = blocking(move || directory.list(&principal)).await?;
    Ok(Json(conversations))
}

async fn create_conversation(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<CreateConversation>, JsonRejection>,
) -> Result<(StatusCode, Json<Conversation>), ApiError> {
    let principal = state.sessions.resolve_headers(&headers)?;
    let Json(request) = body.map_err(|e| ApiError::Validation(e.body_text()))?;

    let directory = state.directory.clone();
    let outcome = blocking(move || directory.create(&principal, request)).await?;

    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome.conversation)))
}

async fn get_conversation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Conversation>, ApiError> {
    let principal = state.sessions.resolve_headers(&headers)?;
    let id = parse_conversation_id(&id)?;

    let messages = state.messages.clone();
    let conversation = blocking(move || messages.get(id, &principal)).await?;
    Ok(Json(conversation))
}

async fn send_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<Json<Message>, ApiError> {
    let principal = state.sessions.resolve_headers(&headers)?;
    let id = parse_conversation_id(&id)?;
    let Json(request) = body.map_err(|e| ApiError::Validation(e.body_text()))?;

    let messages = state.messages.clone();
    let message = blocking(move || messages.append(id, &principal, request.content)).await?;
    Ok(Json(message))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
