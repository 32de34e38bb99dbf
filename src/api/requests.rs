use axum::{
    extract::{Json, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::api::session::{cookie_value, with_delfos_cookie, ClientSession, Session};
use crate::api::{camel_rows, AppState};
use crate::db::queries::{request_list_select, ClientScope, RequestListQuery};
use crate::delfos::DELFOS_COOKIE;
use crate::error::ApiError;
use crate::models::{AuthUser, RequestFilter, RequestRecord, Role};
use crate::service::{reconcile, ReconcileError};

const DEFAULT_SORT: &str = "deliveryDate:asc";
const DEFAULT_LIMIT: i64 = 10;

fn reconcile_error(err: ReconcileError) -> ApiError {
    const CONTEXT: &str = "Error creating request.";
    match err {
        ReconcileError::Mapping(source) | ReconcileError::Persist(source) => ApiError::Store {
            context: CONTEXT,
            source,
        },
        ReconcileError::Forward(source) => ApiError::Delfos {
            context: CONTEXT,
            source,
        },
        ReconcileError::Encode(e) => ApiError::Internal(format!("{}: {}", CONTEXT, e)),
    }
}

/// 预算/订单: 订单先转发 Delfos, 再落库
pub async fn create_request(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ClientSession(ctx): ClientSession,
    Json(payload): Json<Value>,
) -> Result<Response, ApiError> {
    let record: RequestRecord = serde_json::from_value(payload)
        .map_err(|e| ApiError::validation(format!("Invalid request payload: {}", e)))?;

    let mut delfos = state.delfos.session(cookie_value(&headers, DELFOS_COOKIE));
    let outcome = reconcile(&state.store, &mut delfos, record, &ctx)
        .await
        .map_err(reconcile_error)?;
    tracing::info!("{} (client {:?})", outcome.message(), ctx.client_number());

    let response = (StatusCode::CREATED, Json(json!({ "message": outcome.message() }))).into_response();
    Ok(with_delfos_cookie(response, &delfos))
}

fn scope_for(user: &AuthUser) -> ClientScope {
    if user.role() == Role::AdvancedWorker {
        return ClientScope::All;
    }
    match user.client_number() {
        Some(n) => ClientScope::Client(n),
        None => ClientScope::Nobody,
    }
}

fn number_param(params: &HashMap<String, String>, key: &str, default: i64) -> Result<i64, ApiError> {
    match params.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(v) => v
            .parse::<i64>()
            .map(|n| n.max(0))
            .map_err(|_| ApiError::validation(format!("Invalid {} parameter.", key))),
    }
}

/// 查询串 -> 列表查询; filters 是 `[{column, value}]` 的 JSON
pub fn list_query(user: &AuthUser, params: &HashMap<String, String>) -> Result<RequestListQuery, ApiError> {
    let filters: Vec<RequestFilter> = match params.get("filters").filter(|f| !f.is_empty()) {
        Some(raw) => serde_json::from_str(raw).map_err(|_| ApiError::validation("Invalid filters parameter."))?,
        None => Vec::new(),
    };
    let sorted_by = params
        .get("sortedBy")
        .cloned()
        .unwrap_or_else(|| DEFAULT_SORT.to_string());

    Ok(RequestListQuery {
        scope: scope_for(user),
        filters,
        sorted_by: Some(sorted_by),
        offset: number_param(params, "offset", 0)?,
        limit: number_param(params, "limit", DEFAULT_LIMIT)?,
    })
}

pub async fn list_requests(
    State(state): State<Arc<AppState>>,
    session: Session,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    const CONTEXT: &str = "Error fetching requests.";
    let query = list_query(&session.user, &params)?;
    let rows = request_list_select(&query)
        .map_err(ApiError::store(CONTEXT))?
        .fetch_all(state.store.pool())
        .await
        .map_err(ApiError::store(CONTEXT))?;
    Ok((StatusCode::OK, Json(camel_rows(rows))).into_response())
}
