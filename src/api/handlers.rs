//! HTTP request handlers

use super::types::{ErrorResponse, GenericResponse, HealthResponse, RegistrationRequest};
use super::ws::user_chat;
use super::AppState;
use crate::db::User;
use crate::relay::BroadcastMessage;
use crate::store::StoreError;
use crate::tools::ACTIVE_USERNAME_KEY;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;
use tower_http::services::ServeDir;

/// Multipart field carrying the uploaded files
const IMAGES_FIELD: &str = "images";
const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";
const MAX_UPLOAD_BYTES: usize = 32 << 20;

/// Broadcast when an upload arrives before anyone identified themselves
pub const USERNAME_PROMPT: &str = "Please enter username in the chatbox to proceed!!";
pub const UPLOAD_SUCCESS: &str = "uploaded successfully";

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let photos = ServeDir::new(&state.photo_dir);

    Router::new()
        .route("/v1/ws/user_chat", get(user_chat))
        .route("/v1/user_registration", put(register_user))
        .route(
            "/v1/upload_photos",
            post(upload_photos).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/_healthz", get(health))
        .route("/_readyz", get(health))
        .nest_service("/photos", photos)
        .with_state(state)
}

// ============================================================
// Registration
// ============================================================

async fn register_user(
    State(state): State<AppState>,
    Json(req): Json<RegistrationRequest>,
) -> Result<Json<GenericResponse>, AppError> {
    let username = req.username.trim();
    if username.is_empty() {
        return Err(AppError::Unprocessable("username must not be empty".to_string()));
    }

    let user = state
        .users
        .upsert_by_username(username)
        .await
        .map_err(|e| AppError::Unprocessable(e.to_string()))?;
    tracing::info!(user_id = user.id, username = %user.username, "User registered");

    Ok(Json(GenericResponse::ok(
        "Registration successfully done",
        json!(user),
    )))
}

// ============================================================
// Photo upload
// ============================================================

/// One file taken from the multipart body
struct UploadedFile {
    original_name: String,
    content_type: String,
    data: Bytes,
}

async fn upload_photos(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<GenericResponse>, AppError> {
    let owner = active_uploader(&state).await?;

    let mut urls = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() != Some(IMAGES_FIELD) {
            continue;
        }
        let original_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        let file = UploadedFile {
            original_name,
            content_type,
            data,
        };
        urls.push(store_file(&state, &owner, file).await?);
    }

    if urls.is_empty() {
        return Err(AppError::BadRequest(format!(
            "no files in multipart field `{IMAGES_FIELD}`"
        )));
    }

    Ok(Json(GenericResponse::ok(
        UPLOAD_SUCCESS,
        json!({ "user_id": owner.id, "urls": urls }),
    )))
}

/// The user who most recently identified themselves in chat. Without one,
/// connected sessions are prompted for a username.
async fn active_uploader(state: &AppState) -> Result<User, AppError> {
    let username = match state.cache.get(ACTIVE_USERNAME_KEY).await {
        Ok(username) => username,
        Err(e) => {
            tracing::info!(error = %e, "Upload without an active username");
            state.relay().publish(BroadcastMessage::new(USERNAME_PROMPT));
            return Err(AppError::BadRequest("no active username".to_string()));
        }
    };

    state
        .users
        .fetch_by_username(&username)
        .await
        .map_err(|e| match e {
            StoreError::NotFound(name) => AppError::BadRequest(format!("unknown user {name}")),
            other => AppError::from(other),
        })
}

async fn store_file(state: &AppState, owner: &User, file: UploadedFile) -> Result<String, AppError> {
    let filename = format!("{}-{}", file.original_name, uuid::Uuid::new_v4());
    let url = state
        .photos
        .store_upload(owner.id, &file.data, &filename, &file.content_type)
        .await
        .map_err(|e| AppError::Unprocessable(e.to_string()))?;

    state
        .relay()
        .publish(BroadcastMessage::with_files(UPLOAD_SUCCESS, vec![filename]));
    Ok(url)
}

// ============================================================
// Health
// ============================================================

async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    state
        .db
        .ping()
        .map_err(|e| AppError::FailedDependency(e.to_string()))?;
    Ok(Json(HealthResponse { ok: "ok" }))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    Unprocessable(String),
    FailedDependency(String),
    Internal(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => AppError::BadRequest(format!("not found: {msg}")),
            StoreError::InvalidName(name) => AppError::BadRequest(format!("invalid filename {name}")),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::FailedDependency(msg) => (StatusCode::FAILED_DEPENDENCY, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        if status.is_server_error() {
            tracing::error!(status = %status, error = %message, "Request failed");
        } else {
            tracing::warn!(status = %status, error = %message, "Request rejected");
        }

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
