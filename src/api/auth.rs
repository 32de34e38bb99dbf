use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::api::session::{append_set_cookie, expired_cookie, session_cookie, Session, ACCESS_TOKEN_COOKIE};
use crate::api::AppState;
use crate::auth::client_users;
use crate::error::ApiError;

/// 未提供 expires_in 时的 cookie 有效期
const DEFAULT_SESSION_SECONDS: u64 = 60 * 60;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetRequest {
    #[serde(default)]
    pub email: String,
}

pub async fn login(State(state): State<Arc<AppState>>, Json(req): Json<LoginRequest>) -> Result<Response, ApiError> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::validation("Email and password are required"));
    }

    let session = state
        .auth
        .sign_in(req.email.trim(), &req.password)
        .await
        .map_err(ApiError::auth("Authentication failed"))?;
    tracing::info!("User {} logged in", session.user.id);

    let max_age = session.expires_in.unwrap_or(DEFAULT_SESSION_SECONDS);
    let mut response = (StatusCode::OK, Json(json!({ "message": "Login successful" }))).into_response();
    append_set_cookie(
        &mut response,
        &session_cookie(ACCESS_TOKEN_COOKIE, &session.access_token, max_age),
    );
    Ok(response)
}

pub async fn logout(State(state): State<Arc<AppState>>, session: Session) -> Result<Response, ApiError> {
    state
        .auth
        .sign_out(&session.access_token)
        .await
        .map_err(ApiError::auth("Logout failed"))?;

    let mut response = (StatusCode::OK, Json(json!({ "message": "Logout successful" }))).into_response();
    append_set_cookie(&mut response, &expired_cookie(ACCESS_TOKEN_COOKIE));
    Ok(response)
}

pub async fn send_password_reset_email(
    State(state): State<Arc<AppState>>,
    _session: Session,
    Json(req): Json<PasswordResetRequest>,
) -> Result<Response, ApiError> {
    if req.email.trim().is_empty() {
        return Err(ApiError::validation("Email is required"));
    }
    state
        .auth
        .send_password_reset(req.email.trim())
        .await
        .map_err(ApiError::auth("Error sending password reset email"))?;
    Ok((StatusCode::OK, Json(json!({ "message": "Password reset email sent" }))).into_response())
}

pub async fn current_user(session: Session) -> Response {
    (StatusCode::OK, Json(session.user)).into_response()
}

/// 所有客户用户的 user_metadata
pub async fn clients(State(state): State<Arc<AppState>>, _session: Session) -> Result<Response, ApiError> {
    let users = state
        .auth
        .list_users()
        .await
        .map_err(ApiError::auth("Error fetching clients"))?;

    let metadata: Vec<Value> = client_users(users)
        .map(|u| serde_json::to_value(u.user_metadata))
        .collect::<Result<_, _>>()
        .map_err(|e| ApiError::Internal(format!("Error encoding clients: {}", e)))?;
    Ok((StatusCode::OK, Json(metadata)).into_response())
}
