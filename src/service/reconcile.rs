use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use thiserror::Error;

use crate::case::{convert_keys, KeyCase};
use crate::db::rows::Row;
use crate::delfos::DelfosError;
use crate::error::StoreError;
use crate::models::{ArticleKind, ClientContext, FieldMapping, RequestRecord, RequestType};

/// REQUESTS 表的持久化
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// 同ID且类型为 budget 的记录是否存在
    async fn budget_exists(&self, id: &str) -> Result<bool, StoreError>;
    async fn insert_request(&self, row: &Row) -> Result<(), StoreError>;
    async fn update_request(&self, id: &str, row: &Row) -> Result<(), StoreError>;
}

/// FIELDS 表中的 Delfos 映射
#[async_trait]
pub trait FieldMappingSource: Send + Sync {
    async fn field_mappings(&self, field_ids: &[String]) -> Result<Vec<FieldMapping>, StoreError>;
}

/// 订单转发到外部 ERP
#[async_trait]
pub trait OrderForwarder: Send {
    async fn forward_order(&mut self, order: &Value) -> Result<Value, DelfosError>;
}

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("failed to load field mappings: {0}")]
    Mapping(#[source] StoreError),

    #[error("failed to forward order: {0}")]
    Forward(#[source] DelfosError),

    #[error("failed to persist request: {0}")]
    Persist(#[source] StoreError),

    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
}

/// 协调结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    BudgetCreated,
    OrderCreated,
    BudgetPromoted,
}

impl ReconcileOutcome {
    pub fn message(self) -> &'static str {
        match self {
            ReconcileOutcome::BudgetCreated => "Budget created successfully.",
            ReconcileOutcome::OrderCreated => "Order created successfully.",
            ReconcileOutcome::BudgetPromoted => "Budget converted to order successfully.",
        }
    }
}

/// 配置值是否需要转发 (空串/false/null 丢弃)
fn is_forwardable(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Bool(false)) && value != &Value::String(String::new())
}

/// 将配置键从内部字段ID映射为 Delfos 字段ID
pub fn remap_config(config: &Map<String, Value>, mappings: &HashMap<String, FieldMapping>) -> Map<String, Value> {
    config
        .iter()
        .filter(|(_, value)| is_forwardable(value))
        .filter_map(|(field_id, value)| {
            let mapping = mappings.get(field_id)?;
            if !mapping.save_on_request {
                return None;
            }
            let external = mapping.external_id.as_ref()?;
            Some((external.clone(), value.clone()))
        })
        .collect()
}

fn awning_config_keys(record: &RequestRecord) -> Vec<String> {
    let mut keys: Vec<String> = record
        .articles
        .iter()
        .filter(|a| a.kind == ArticleKind::Awning)
        .filter_map(|a| a.config.as_ref())
        .flat_map(|c| c.keys().cloned())
        .collect();
    keys.sort();
    keys.dedup();
    keys
}

/// 构建 Delfos 订单: 仅 awning 类明细的配置被重映射
pub fn build_order_payload(
    record: &RequestRecord,
    mappings: &HashMap<String, FieldMapping>,
) -> Result<Value, serde_json::Error> {
    let mut order = record.clone();
    for article in order.articles.iter_mut().filter(|a| a.kind == ArticleKind::Awning) {
        if let Some(config) = article.config.as_ref() {
            article.config = Some(remap_config(config, mappings));
        }
    }
    serde_json::to_value(order)
}

/// 记录 -> REQUESTS 行 (UPPER_SNAKE)
pub fn to_storage_row(record: &RequestRecord) -> Result<Row, serde_json::Error> {
    match convert_keys(serde_json::to_value(record)?, KeyCase::UpperSnake) {
        Value::Object(map) => Ok(map),
        // RequestRecord 总是序列化为对象
        _ => Ok(Map::new()),
    }
}

/// 客户号/客户名只取自会话上下文
fn stamp_client(record: &mut RequestRecord, ctx: &ClientContext) {
    record.client_number = ctx.commercial.client_number.unwrap_or(0);
    record.client_name = ctx.commercial.commercial_desc.clone().unwrap_or_default();
}

/// 预算/订单协调
///
/// 订单先转发到 Delfos (失败则不落库), 然后若存在同ID预算则原地升级为订单,
/// 否则新增. 转发成功但落库失败时不做补偿.
pub async fn reconcile<S, F>(
    store: &S,
    forwarder: &mut F,
    mut record: RequestRecord,
    ctx: &ClientContext,
) -> Result<ReconcileOutcome, ReconcileError>
where
    S: RequestStore + FieldMappingSource + ?Sized,
    F: OrderForwarder + ?Sized,
{
    stamp_client(&mut record, ctx);
    match record.kind {
        RequestType::Budget => {
            let row = to_storage_row(&record)?;
            store.insert_request(&row).await.map_err(ReconcileError::Persist)?;
            tracing::info!("Budget {:?} created for client {}", record.id, record.client_number);
            Ok(ReconcileOutcome::BudgetCreated)
        }
        RequestType::Order => {
            let keys = awning_config_keys(&record);
            let mappings: HashMap<String, FieldMapping> = if keys.is_empty() {
                HashMap::new()
            } else {
                store
                    .field_mappings(&keys)
                    .await
                    .map_err(ReconcileError::Mapping)?
                    .into_iter()
                    .map(|m| (m.field_id.clone(), m))
                    .collect()
            };

            let order = build_order_payload(&record, &mappings)?;
            forwarder.forward_order(&order).await.map_err(ReconcileError::Forward)?;
            tracing::info!("Order {:?} forwarded to Delfos", record.id);

            let row = to_storage_row(&record)?;
            let existing_budget = match record.id.as_deref() {
                Some(id) => store.budget_exists(id).await.map_err(ReconcileError::Persist)?,
                None => false,
            };

            match (existing_budget, record.id.as_deref()) {
                (true, Some(id)) => {
                    store.update_request(id, &row).await.map_err(ReconcileError::Persist)?;
                    tracing::info!("Budget {} converted to order", id);
                    Ok(ReconcileOutcome::BudgetPromoted)
                }
                _ => {
                    store.insert_request(&row).await.map_err(ReconcileError::Persist)?;
                    Ok(ReconcileOutcome::OrderCreated)
                }
            }
        }
    }
}
