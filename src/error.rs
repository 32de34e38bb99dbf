use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::auth::AuthError;
use crate::delfos::DelfosError;

/// 存储层错误
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("table {0} is not searchable")]
    TableNotAllowed(String),

    #[error("unknown column {column} for table {table}")]
    UnknownColumn { table: &'static str, column: String },

    #[error("malformed row: {0}")]
    MalformedRow(String),
}

/// HTTP 层错误, 在边界处统一转换为状态码
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{context}: {source}")]
    Store {
        context: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("{context}: {source}")]
    Delfos {
        context: &'static str,
        #[source]
        source: DelfosError,
    },

    #[error("{context}: {source}")]
    Auth {
        context: &'static str,
        #[source]
        source: AuthError,
    },

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError::NotFound(msg.into())
    }

    pub fn store(context: &'static str) -> impl FnOnce(StoreError) -> ApiError {
        move |source| ApiError::Store { context, source }
    }

    pub fn delfos(context: &'static str) -> impl FnOnce(DelfosError) -> ApiError {
        move |source| ApiError::Delfos { context, source }
    }

    pub fn auth(context: &'static str) -> impl FnOnce(AuthError) -> ApiError {
        move |source| ApiError::Auth { context, source }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Store { .. } | ApiError::Delfos { .. } => StatusCode::BAD_REQUEST,
            ApiError::Auth { source, .. } => match source {
                AuthError::InvalidCredentials(_) => StatusCode::UNAUTHORIZED,
                _ => StatusCode::BAD_REQUEST,
            },
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Unauthorized(msg) => json!({ "message": msg }),
            ApiError::Validation(msg) | ApiError::NotFound(msg) | ApiError::Internal(msg) => {
                json!({ "error": msg })
            }
            ApiError::Store { context, source } => {
                tracing::error!("{}: {:?}", context, source);
                json!({ "error": context })
            }
            ApiError::Delfos { context, source } => {
                tracing::error!("{}: {:?}", context, source);
                json!({ "error": context })
            }
            ApiError::Auth { context, source } => {
                tracing::error!("{}: {:?}", context, source);
                json!({ "error": context })
            }
        };
        if status.is_server_error() {
            tracing::error!("{}", self);
        }
        (status, Json(body)).into_response()
    }
}
