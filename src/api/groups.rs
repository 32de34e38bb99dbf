use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::fields::IdBody;
use crate::api::session::Session;
use crate::api::{camel_rows, message, required, storage_row, AppState};
use crate::db::rows::text_of;
use crate::db::{queries, Row, Table};
use crate::error::ApiError;
use crate::service::{assemble_groups, move_item};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupsOrderBody {
    pub previous_index: i64,
    pub current_index: i64,
}

/// 完整目录树
pub async fn list_groups(State(state): State<Arc<AppState>>, _session: Session) -> Result<Response, ApiError> {
    let rows = queries::catalog_rows(state.store.pool())
        .await
        .map_err(ApiError::store("Error getting groups."))?;
    Ok((StatusCode::OK, Json(assemble_groups(rows, None))).into_response())
}

/// 只含遮阳篷已启用配置的目录树
pub async fn groups_for_awning(
    State(state): State<Arc<AppState>>,
    _session: Session,
    Path(awning_id): Path<String>,
) -> Result<Response, ApiError> {
    let pool = state.store.pool();
    let active = queries::linked_config_id_set(pool, &awning_id)
        .await
        .map_err(ApiError::store("Error getting active fields for awning."))?;
    let rows = queries::catalog_rows(pool)
        .await
        .map_err(ApiError::store("Error getting groups."))?;
    Ok((StatusCode::OK, Json(assemble_groups(rows, Some(&active)))).into_response())
}

/// 新组排在末尾
pub async fn create_group(
    State(state): State<Arc<AppState>>,
    _session: Session,
    Json(body): Json<Row>,
) -> Result<Response, ApiError> {
    let (_, mut row) = storage_row(body);
    let order = queries::count_groups(state.store.pool())
        .await
        .map_err(ApiError::store("Error while creating group."))?;
    row.insert("ORDER".to_string(), order.into());

    let rows = queries::insert_row(state.store.pool(), Table::Groups, row)
        .await
        .map_err(ApiError::store("Error while creating group."))?;
    Ok((StatusCode::CREATED, Json(camel_rows(rows))).into_response())
}

pub async fn update_group(
    State(state): State<Arc<AppState>>,
    _session: Session,
    Json(body): Json<Row>,
) -> Result<Response, ApiError> {
    let (id, mut row) = storage_row(body);
    let id = required(id, "id")?;
    row.remove("ORDER");
    let rows = queries::update_by_id(state.store.pool(), Table::Groups, &id, &row)
        .await
        .map_err(ApiError::store("Error while updating group."))?;
    Ok((StatusCode::OK, Json(camel_rows(rows))).into_response())
}

pub async fn delete_group(
    State(state): State<Arc<AppState>>,
    _session: Session,
    Json(body): Json<IdBody>,
) -> Result<Response, ApiError> {
    let id = required(body.id, "id")?;
    queries::delete_by_id(state.store.pool(), Table::Groups, &id)
        .await
        .map_err(ApiError::store("Error while deleting group."))?;
    Ok(message("Group deleted successfully"))
}

pub async fn reorder_groups(
    State(state): State<Arc<AppState>>,
    _session: Session,
    Json(body): Json<GroupsOrderBody>,
) -> Result<Response, ApiError> {
    const CONTEXT: &str = "Internal server error while updating groups order.";
    let groups = queries::groups_ordered(state.store.pool())
        .await
        .map_err(ApiError::store(CONTEXT))?;

    let moved = move_item(groups, body.previous_index, body.current_index)
        .map_err(|e| ApiError::validation(e.to_string()))?;
    let (ids, orders): (Vec<String>, Vec<i32>) = moved
        .iter()
        .filter_map(|(row, order)| text_of(row, "ID").map(|id| (id, *order)))
        .unzip();

    queries::set_order(state.store.pool(), Table::Groups, &ids, &orders)
        .await
        .map_err(ApiError::store(CONTEXT))?;
    tracing::info!("Moved group from {} to {}", body.previous_index, body.current_index);
    Ok(message("Groups order updated successfully"))
}
