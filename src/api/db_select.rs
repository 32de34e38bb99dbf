use axum::{
    extract::{Json, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::sync::Arc;

use crate::api::session::Session;
use crate::api::{camel_rows, AppState};
use crate::db::queries::{parse_search_filter, search_select};
use crate::db::{Filter, Select};
use crate::error::{ApiError, StoreError};

/// 查询串 -> 白名单内的 SELECT
///
/// 参数: `tableName`, `columns` (逗号分隔), `search`, 以及任意以 `filter` 开头的 `COL=VAL` / `COL!=VAL`.
pub fn search_from_params(allowed_tables: &[String], params: &HashMap<String, String>) -> Result<Select, StoreError> {
    let table = params.get("tableName").map(String::as_str).unwrap_or_default();
    let columns: Vec<String> = params
        .get("columns")
        .map(|c| {
            c.split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let term = params.get("search").map(String::as_str).unwrap_or_default();

    let mut filter_keys: Vec<&String> = params.keys().filter(|k| k.starts_with("filter")).collect();
    filter_keys.sort();
    let filters: Vec<Filter> = filter_keys
        .into_iter()
        .filter_map(|key| parse_search_filter(&params[key]))
        .collect();

    search_select(allowed_tables, table, &columns, term, filters)
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    _session: Session,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    const CONTEXT: &str = "Error while retrieving database results.";
    let select = search_from_params(&state.config.search.tables, &params).map_err(ApiError::store(CONTEXT))?;
    let rows = select
        .fetch_all(state.store.pool())
        .await
        .map_err(ApiError::store(CONTEXT))?;
    Ok((StatusCode::OK, Json(camel_rows(rows))).into_response())
}
