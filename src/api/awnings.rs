use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::api::session::{ClientSession, Session};
use crate::api::{camel_rows, AppState};
use crate::case::{convert_map, KeyCase};
use crate::db::{queries, Row};
use crate::error::ApiError;
use crate::service::awning_price::quote_or_empty;
use crate::service::{quote_awning, AwningPriceQuery, DiscountContext};

/// POST/PUT /awnings 请求体
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwningBody {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub awning_model_id: Option<Value>,
}

impl AwningBody {
    /// 转为 AWNINGS 行, 省略未提供的列
    fn into_row(self, include_id: bool) -> Row {
        let mut row = Row::new();
        let columns = [
            ("ID", if include_id { self.id } else { None }),
            ("VALUE", self.value),
            ("AWNING_MODEL_ID", self.awning_model_id),
        ];
        for (column, value) in columns {
            if let Some(value) = value {
                row.insert(column.to_string(), value);
            }
        }
        row
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateRequest {
    #[serde(default)]
    pub new_id: Value,
}

/// 价格查询参数; line/exit 必须是整数
pub fn parse_price_query(params: &HashMap<String, String>) -> Result<AwningPriceQuery, ApiError> {
    let number = |key: &str| params.get(key).and_then(|v| v.trim().parse::<i64>().ok());
    let (Some(line), Some(exit)) = (number("line"), number("exit")) else {
        return Err(ApiError::validation("Invalid line or exit parameter."));
    };
    let text = |key: &str| params.get(key).filter(|v| !v.is_empty()).cloned();
    Ok(AwningPriceQuery {
        model: params.get("model").cloned().unwrap_or_default(),
        line,
        exit,
        tarp: text("tarp"),
        ral: text("ral"),
        family_code: text("familyCode"),
    })
}

pub async fn awning_price(
    State(state): State<Arc<AppState>>,
    ClientSession(ctx): ClientSession,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let query = parse_price_query(&params)?;
    let discounts = DiscountContext::from_commercial(&ctx.commercial);
    let quote = quote_awning(&state.store, &query, &discounts)
        .await
        .map_err(ApiError::store("Internal server error while getting awning price."))?;
    Ok((StatusCode::OK, Json(quote_or_empty(quote))).into_response())
}

pub async fn list_awnings(State(state): State<Arc<AppState>>, _session: Session) -> Result<Response, ApiError> {
    let rows = queries::list_awnings(state.store.pool())
        .await
        .map_err(ApiError::store("Internal server error while getting awnings."))?;
    Ok((StatusCode::OK, Json(camel_rows(rows))).into_response())
}

pub async fn get_awning(
    State(state): State<Arc<AppState>>,
    _session: Session,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let row = queries::get_awning(state.store.pool(), &id)
        .await
        .map_err(ApiError::store("Internal server error while getting awning."))?
        .ok_or_else(|| ApiError::not_found("Awning not found."))?;
    Ok((StatusCode::OK, Json(convert_map(row, KeyCase::Camel))).into_response())
}

pub async fn create_awning(
    State(state): State<Arc<AppState>>,
    _session: Session,
    Json(body): Json<AwningBody>,
) -> Result<Response, ApiError> {
    let rows = queries::insert_awning(state.store.pool(), &body.into_row(true))
        .await
        .map_err(ApiError::store("Internal server error while creating awning."))?;
    Ok((StatusCode::OK, Json(camel_rows(rows))).into_response())
}

pub async fn update_awning(
    State(state): State<Arc<AppState>>,
    _session: Session,
    Path(id): Path<String>,
    Json(body): Json<AwningBody>,
) -> Result<Response, ApiError> {
    let row = body.into_row(false);
    if row.is_empty() {
        return Err(ApiError::validation("Nothing to update."));
    }
    let rows = queries::update_awning(state.store.pool(), &id, &row)
        .await
        .map_err(ApiError::store("Internal server error while updating awning."))?;
    Ok((StatusCode::OK, Json(camel_rows(rows))).into_response())
}

pub async fn delete_awning(
    State(state): State<Arc<AppState>>,
    _session: Session,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let deleted = queries::delete_awning(state.store.pool(), &id)
        .await
        .map_err(ApiError::store("Internal server error while deleting awning."))?;
    tracing::info!("Deleted awning {} ({} rows)", id, deleted);
    Ok((StatusCode::OK, Json(json!({ "message": "Awning deleted successfully." }))).into_response())
}

/// 把遮阳篷的字段配置链接复制到 `newId`
pub async fn duplicate_awning_fields(
    State(state): State<Arc<AppState>>,
    _session: Session,
    Path(id): Path<String>,
    Json(req): Json<DuplicateRequest>,
) -> Result<Response, ApiError> {
    let new_id = match req.new_id {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        other => Some(other),
    }
    .ok_or_else(|| ApiError::validation("newId is required."))?;

    let copies = queries::duplicate_links(state.store.pool(), &id, &new_id)
        .await
        .map_err(ApiError::store("Internal server error while duplicating awning fields."))?
        .ok_or_else(|| ApiError::not_found("No fields found for the specified awning ID."))?;
    tracing::info!("Copied {} field config links from awning {} to {}", copies.len(), id, new_id);

    Ok((StatusCode::OK, Json(json!({ "message": "Fields duplicated successfully." }))).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn price_query_requires_integer_sizes() {
        let err = parse_price_query(&params(&[("model", "M1"), ("line", "abc"), ("exit", "200")])).unwrap_err();
        assert_eq!(err.to_string(), "Invalid line or exit parameter.");
        assert!(parse_price_query(&params(&[("model", "M1"), ("line", "300")])).is_err());

        let query = parse_price_query(&params(&[
            ("model", "M1"),
            ("line", "300"),
            ("exit", " 200 "),
            ("tarp", "LONA-A"),
            ("ral", ""),
        ]))
        .unwrap();
        assert_eq!(query.line, 300);
        assert_eq!(query.exit, 200);
        assert_eq!(query.tarp.as_deref(), Some("LONA-A"));
        assert_eq!(query.ral, None);
        assert_eq!(query.family_code, None);
    }

    #[test]
    fn awning_body_maps_to_columns() {
        let body: AwningBody = serde_json::from_value(json!({
            "id": "a9",
            "value": "Toldo cofre",
            "awningModelId": 3
        }))
        .unwrap();
        let row = body.into_row(true);
        assert_eq!(row["ID"], json!("a9"));
        assert_eq!(row["AWNING_MODEL_ID"], json!(3));

        let body: AwningBody = serde_json::from_value(json!({ "id": "a9", "value": "Nuevo" })).unwrap();
        let row = body.into_row(false);
        assert!(!row.contains_key("ID"));
        assert!(!row.contains_key("AWNING_MODEL_ID"));
        assert_eq!(row["VALUE"], json!("Nuevo"));
    }
}
