use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::{Query, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use serde_json::json;
use sha2::{Digest, Sha256};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use uuid::Uuid;

use crate::catalog::{self, ModelCapability};
use crate::db::Database;
use crate::error::ApiError;
use crate::models::{ConversationSnapshot, LoginRequest, SessionResponse, TurnRequest, TurnResponse};
use crate::router::route_turn;
use crate::upstream::ModelBackend;

const SESSION_TTL: Duration = Duration::from_secs(24 * 3600);

#[derive(Clone)]
pub struct AppState {
    db: Database,
    backend: Arc<dyn ModelBackend>,
    password_sha256: String,
    sessions: Arc<Mutex<HashMap<String, Instant>>>,
}

impl AppState {
    pub fn new(db: Database, backend: Arc<dyn ModelBackend>, password_sha256: String) -> Self {
        Self {
            db,
            backend,
            password_sha256,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn issue_session(&self) -> Result<SessionResponse, ApiError> {
        let token = Uuid::new_v4().to_string();
        let expires_at = Instant::now() + SESSION_TTL;
        let iso = (Utc::now() + chrono::Duration::seconds(SESSION_TTL.as_secs() as i64))
            .to_rfc3339();

        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| ApiError::Auth("failed to lock session table".to_string()))?;
        sessions.insert(token.clone(), expires_at);

        Ok(SessionResponse {
            token,
            expires_at: iso,
        })
    }

    fn verify_session(&self, token: &str) -> bool {
        let Ok(mut sessions) = self.sessions.lock() else {
            return false;
        };

        sessions.retain(|_, exp| *exp > Instant::now());
        sessions.contains_key(token)
    }

    fn check_password(&self, password: &str) -> bool {
        sha256_hex(password) == self.password_sha256
    }

    #[cfg(test)]
    fn insert_session(&self, token: &str, expires_at: Instant) {
        self.sessions
            .lock()
            .unwrap()
            .insert(token.to_string(), expires_at);
    }
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn require_session(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let token = headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::Auth("missing bearer token".to_string()))?;

    if !state.verify_session(token) {
        return Err(ApiError::Auth("invalid or expired token".to_string()));
    }
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/auth/login", post(login))
        .route("/v1/models", get(list_models))
        .route("/v1/turn", post(submit_turn))
        .route("/v1/snapshot", get(get_snapshot))
        .route("/v1/snapshot", put(put_snapshot))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
                .allow_headers(Any)
                .allow_origin(Any),
        )
}

pub async fn start_server(state: AppState, addr: &str) -> Result<(), String> {
    let app = build_router(state);

    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| format!("invalid listen addr: {e}"))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("bind {addr} failed: {e}"))?;

    info!(%addr, "console backend listening");
    axum::serve(listener, app)
        .await
        .map_err(|e| format!("server stopped: {e}"))
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "ok"})))
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.check_password(&payload.password) {
        warn!("login attempt with wrong password");
        return Err(ApiError::Auth("wrong password".to_string()));
    }

    let session = state.issue_session()?;
    Ok((StatusCode::OK, Json(session)))
}

async fn list_models(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ApiError> {
    require_session(&state, &headers)?;

    let capability = ModelCapability::from_query(params.get("capability").map(|s| s.as_str()));
    let raw = state.backend.list_models().await?;
    let descriptors = catalog::normalize_models(&raw);
    let listing = catalog::models_for_capability(&descriptors, capability);

    Ok((StatusCode::OK, Json(listing)))
}

async fn submit_turn(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<TurnRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_session(&state, &headers)?;

    let message = route_turn(state.backend.as_ref(), &payload, Utc::now()).await?;
    Ok((StatusCode::OK, Json(TurnResponse { message })))
}

async fn get_snapshot(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    require_session(&state, &headers)?;

    let snapshot = state.db.load().map_err(ApiError::Persistence)?;
    Ok((StatusCode::OK, Json(snapshot)))
}

async fn put_snapshot(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(snapshot): Json<ConversationSnapshot>,
) -> Result<impl IntoResponse, ApiError> {
    require_session(&state, &headers)?;

    snapshot.validate().map_err(ApiError::Input)?;
    state.db.save(&snapshot).map_err(ApiError::Persistence)?;
    Ok(StatusCode::NO_CONTENT)
}
