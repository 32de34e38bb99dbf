use axum::{
    extract::{Json, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::Value;
use std::sync::Arc;

use crate::api::session::{cookie_value, with_delfos_cookie, ClientSession};
use crate::api::AppState;
use crate::delfos::DELFOS_COOKIE;
use crate::error::ApiError;
use crate::models::ClientContext;

/// Delfos 上客户地址的路径
pub fn addresses_path(client_number: i64) -> String {
    format!("clientes/{}/direcciones", client_number)
}

fn require_client_number(ctx: &ClientContext) -> Result<i64, ApiError> {
    ctx.client_number()
        .ok_or_else(|| ApiError::validation("Client number not found"))
}

pub async fn list_addresses(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ClientSession(ctx): ClientSession,
) -> Result<Response, ApiError> {
    let client_number = require_client_number(&ctx)?;
    let mut delfos = state.delfos.session(cookie_value(&headers, DELFOS_COOKIE));
    let addresses = delfos
        .get(&addresses_path(client_number))
        .await
        .map_err(ApiError::delfos("Internal server error while getting the addresses."))?;
    let response = (StatusCode::OK, Json(addresses)).into_response();
    Ok(with_delfos_cookie(response, &delfos))
}

pub async fn create_address(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ClientSession(ctx): ClientSession,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let client_number = require_client_number(&ctx)?;
    let mut delfos = state.delfos.session(cookie_value(&headers, DELFOS_COOKIE));
    let created = delfos
        .post(&addresses_path(client_number), &body)
        .await
        .map_err(ApiError::delfos("Internal server error while posting the address."))?;
    let response = (StatusCode::CREATED, Json(created)).into_response();
    Ok(with_delfos_cookie(response, &delfos))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_per_client() {
        assert_eq!(addresses_path(42), "clientes/42/direcciones");
    }
}
