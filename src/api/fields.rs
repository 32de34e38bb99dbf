use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::future::join_all;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::api::session::Session;
use crate::api::{camel_rows, message, required, storage_row, AppState};
use crate::case::{convert_keys, convert_map, KeyCase};
use crate::db::rows::text_of;
use crate::db::{queries, Row, Table};
use crate::error::ApiError;
use crate::service::{self, move_item, relink_config, SubconfigError};

#[derive(Debug, Deserialize)]
pub struct IdBody {
    #[serde(default)]
    pub id: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderBody {
    pub previous_index: i64,
    pub current_index: i64,
    #[serde(default)]
    pub group_id: Value,
}

#[derive(Debug, Deserialize)]
pub struct SubconfigsBody {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub configs: Vec<Row>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkBody {
    #[serde(default)]
    pub fields_ids_to_unlink: Vec<Value>,
    #[serde(default)]
    pub field_id_to_link: Value,
    #[serde(default)]
    pub awning_id: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlinkBody {
    #[serde(default)]
    pub field_id_to_unlink: Value,
    #[serde(default)]
    pub awning_id: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigForAllBody {
    #[serde(default)]
    pub field_config_id: Value,
}

pub async fn create_field(
    State(state): State<Arc<AppState>>,
    _session: Session,
    Json(body): Json<Row>,
) -> Result<Response, ApiError> {
    let (_, mut row) = storage_row(body);
    let group_id = required(row.get("GROUP_ID").cloned().unwrap_or(Value::Null), "groupId")?;

    let order = queries::count_fields_in_group(state.store.pool(), &group_id)
        .await
        .map_err(ApiError::store("Error while creating field."))?;
    row.insert("ORDER".to_string(), order.into());

    let rows = queries::insert_row(state.store.pool(), Table::Fields, row)
        .await
        .map_err(ApiError::store("Error while creating field."))?;
    tracing::info!("Field created in group {} at position {}", group_id, order);
    Ok((StatusCode::CREATED, Json(camel_rows(rows))).into_response())
}

pub async fn update_field(
    State(state): State<Arc<AppState>>,
    _session: Session,
    Json(body): Json<Row>,
) -> Result<Response, ApiError> {
    let (id, mut row) = storage_row(body);
    let id = required(id, "id")?;
    // ORDER 只由排序接口维护
    row.remove("ORDER");

    let rows = queries::update_by_id(state.store.pool(), Table::Fields, &id, &row)
        .await
        .map_err(ApiError::store("Error while updating field."))?;
    Ok((StatusCode::OK, Json(camel_rows(rows))).into_response())
}

pub async fn reorder_fields(
    State(state): State<Arc<AppState>>,
    _session: Session,
    Json(body): Json<ReorderBody>,
) -> Result<Response, ApiError> {
    const CONTEXT: &str = "Internal server error while updating fields order.";
    let group_id = required(body.group_id, "groupId")?;
    let fields = queries::fields_in_group(state.store.pool(), &group_id)
        .await
        .map_err(ApiError::store(CONTEXT))?;

    let moved = move_item(fields, body.previous_index, body.current_index)
        .map_err(|e| ApiError::validation(e.to_string()))?;
    let (ids, orders): (Vec<String>, Vec<i32>) = moved
        .iter()
        .filter_map(|(row, order)| text_of(row, "ID").map(|id| (id, *order)))
        .unzip();

    queries::set_order(state.store.pool(), Table::Fields, &ids, &orders)
        .await
        .map_err(ApiError::store(CONTEXT))?;
    Ok(message("Fields order updated successfully"))
}

pub async fn delete_field(
    State(state): State<Arc<AppState>>,
    _session: Session,
    Json(body): Json<IdBody>,
) -> Result<Response, ApiError> {
    let id = required(body.id, "id")?;
    queries::delete_by_id(state.store.pool(), Table::Fields, &id)
        .await
        .map_err(ApiError::store("Error while deleting field."))?;
    Ok(message("Field deleted successfully"))
}

/// 用提交的集合整体替换某字段配置的子配置
pub async fn replace_subconfigs(
    State(state): State<Arc<AppState>>,
    _session: Session,
    Json(body): Json<SubconfigsBody>,
) -> Result<Response, ApiError> {
    let config_id = required(body.id, "id")?;
    let submitted: Vec<Row> = body
        .configs
        .into_iter()
        .map(|c| convert_map(c, KeyCase::UpperSnake))
        .collect();

    service::replace_subconfigs(&state.store, &config_id, submitted)
        .await
        .map_err(subconfig_error)?;
    Ok(message("Field configs updated successfully"))
}

fn subconfig_error(err: SubconfigError) -> ApiError {
    let (context, source) = match err {
        SubconfigError::Fetch(e) => ("Error while fetching field config IDs.", e),
        SubconfigError::Insert(e) => ("Error while inserting field config.", e),
        SubconfigError::Update(e) => ("Error while updating field config.", e),
        SubconfigError::Delete(e) => ("Error while deleting field config.", e),
    };
    ApiError::Store { context, source }
}

pub async fn create_config(
    State(state): State<Arc<AppState>>,
    _session: Session,
    Json(body): Json<IdBody>,
) -> Result<Response, ApiError> {
    let field_id = required(body.id, "id")?;
    let mut row = Row::new();
    row.insert("FIELD_ID".to_string(), field_id);
    let rows = queries::insert_row(state.store.pool(), Table::FieldsConfigs, row)
        .await
        .map_err(ApiError::store("Error while creating config."))?;
    Ok((StatusCode::CREATED, Json(camel_rows(rows))).into_response())
}

pub async fn delete_config(
    State(state): State<Arc<AppState>>,
    _session: Session,
    Json(body): Json<IdBody>,
) -> Result<Response, ApiError> {
    let id = required(body.id, "id")?;
    queries::delete_by_id(state.store.pool(), Table::FieldsConfigs, &id)
        .await
        .map_err(ApiError::store("Error while deleting config."))?;
    Ok(message("Config deleted successfully"))
}

/// 遮阳篷启用的字段配置ID
pub async fn active_config_ids(
    State(state): State<Arc<AppState>>,
    _session: Session,
    Path(awning_id): Path<String>,
) -> Result<Response, ApiError> {
    let ids = queries::linked_config_ids(state.store.pool(), &awning_id)
        .await
        .map_err(ApiError::store("Error while getting active fields for awning."))?;
    Ok((StatusCode::OK, Json(convert_keys(Value::Array(ids), KeyCase::Camel))).into_response())
}

/// 先解除同组的其它配置 (逐个记录失败), 再链接; 只有链接结果决定响应
pub async fn link_config_to_awning(
    State(state): State<Arc<AppState>>,
    _session: Session,
    Json(body): Json<LinkBody>,
) -> Result<Response, ApiError> {
    let awning_id = required(body.awning_id, "awningId")?;
    let config_id = required(body.field_id_to_link, "fieldIdToLink")?;

    let failed = relink_config(&state.store, &awning_id, &body.fields_ids_to_unlink, &config_id)
        .await
        .map_err(ApiError::store("Error linking field config to awning."))?;
    if failed > 0 {
        tracing::warn!("Linked field config {} to awning {} with {} failed unlinks", config_id, awning_id, failed);
    }
    Ok(message("Field config linked successfully"))
}

pub async fn unlink_config_from_awning(
    State(state): State<Arc<AppState>>,
    _session: Session,
    Json(body): Json<UnlinkBody>,
) -> Result<Response, ApiError> {
    let awning_id = required(body.awning_id, "awningId")?;
    let config_id = required(body.field_id_to_unlink, "fieldIdToUnlink")?;
    queries::unlink_config(state.store.pool(), &awning_id, &config_id)
        .await
        .map_err(ApiError::store("Error unlinking field config from awning."))?;
    Ok(message("Field config unlinked successfully"))
}

/// 链接到所有尚未链接的遮阳篷; 单个失败只记录日志
pub async fn link_config_to_all_awnings(
    State(state): State<Arc<AppState>>,
    _session: Session,
    Json(body): Json<ConfigForAllBody>,
) -> Result<Response, ApiError> {
    let config_id = required(body.field_config_id, "fieldConfigId")?;
    let pool = state.store.pool();
    let awnings = queries::awning_ids(pool)
        .await
        .map_err(ApiError::store("Error getting awnings."))?;

    let config_id = &config_id;
    let links = awnings.iter().map(|awning_id| async move {
        let linked = match queries::link_exists(pool, awning_id, config_id).await {
            Ok(true) => Ok(false),
            Ok(false) => queries::link_config(pool, awning_id, config_id).await.map(|_| true),
            Err(e) => Err(e),
        };
        linked.map_err(|e| (awning_id, e))
    });

    let mut linked = 0;
    for result in join_all(links).await {
        match result {
            Ok(true) => linked += 1,
            Ok(false) => {}
            Err((awning_id, e)) => tracing::error!("Error linking field config to awning {}: {}", awning_id, e),
        }
    }
    tracing::info!("Field config {} linked to {} new awnings", config_id, linked);
    Ok(message("Field config linked to all awnings successfully"))
}

pub async fn unlink_config_from_all_awnings(
    State(state): State<Arc<AppState>>,
    _session: Session,
    Json(body): Json<ConfigForAllBody>,
) -> Result<Response, ApiError> {
    let config_id = required(body.field_config_id, "fieldConfigId")?;
    queries::unlink_config_everywhere(state.store.pool(), &config_id)
        .await
        .map_err(ApiError::store("Error unlinking from all awnings."))?;
    Ok(message("Field config unlinked from all awnings successfully"))
}
