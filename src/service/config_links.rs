use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use thiserror::Error;

use crate::db::rows::Row;
use crate::error::StoreError;
use crate::service::config_diff::{diff_configs, ConfigDiff};

/// 遮阳篷-字段配置链接与子配置的写入
#[async_trait]
pub trait ConfigLinkStore: Send + Sync {
    async fn link_config(&self, awning_id: &Value, config_id: &Value) -> Result<(), StoreError>;
    async fn unlink_config(&self, awning_id: &Value, config_id: &Value) -> Result<(), StoreError>;

    /// 某字段配置下现有子配置的ID
    async fn subconfig_ids(&self, config_id: &Value) -> Result<Vec<String>, StoreError>;
    async fn insert_subconfig(&self, row: Row) -> Result<(), StoreError>;
    async fn update_subconfig(&self, id: &Value, row: &Row) -> Result<(), StoreError>;
    async fn delete_subconfig(&self, id: &str) -> Result<(), StoreError>;
}

#[derive(Error, Debug)]
pub enum SubconfigError {
    #[error("failed to load subconfig ids: {0}")]
    Fetch(#[source] StoreError),

    #[error("failed to insert subconfig: {0}")]
    Insert(#[source] StoreError),

    #[error("failed to update subconfig: {0}")]
    Update(#[source] StoreError),

    #[error("failed to delete subconfig: {0}")]
    Delete(#[source] StoreError),
}

/// 并发解除 `unlink_ids`, 失败只记日志, 然后链接 `config_id`.
/// 返回解除失败的个数; 只有链接失败才返回错误
pub async fn relink_config<S>(
    store: &S,
    awning_id: &Value,
    unlink_ids: &[Value],
    config_id: &Value,
) -> Result<usize, StoreError>
where
    S: ConfigLinkStore + ?Sized,
{
    let unlinks = unlink_ids
        .iter()
        .map(|id| async move { (id, store.unlink_config(awning_id, id).await) });

    let mut failed = 0;
    for (id, result) in join_all(unlinks).await {
        if let Err(e) = result {
            failed += 1;
            tracing::error!("Error unlinking field config {} from awning {}: {}", id, awning_id, e);
        }
    }

    store.link_config(awning_id, config_id).await?;
    Ok(failed)
}

/// 用提交的集合整体替换子配置: 先插入, 再更新, 最后删除未提交的
pub async fn replace_subconfigs<S>(
    store: &S,
    config_id: &Value,
    submitted: Vec<Row>,
) -> Result<ConfigDiff, SubconfigError>
where
    S: ConfigLinkStore + ?Sized,
{
    let current = store.subconfig_ids(config_id).await.map_err(SubconfigError::Fetch)?;
    let diff = diff_configs(submitted, &current);
    tracing::debug!(
        "Subconfigs of {}: {} new, {} updated, {} removed",
        config_id,
        diff.to_insert.len(),
        diff.to_update.len(),
        diff.to_delete.len()
    );

    for row in &diff.to_insert {
        let mut row = row.clone();
        row.insert("FIELD_CONFIG_ID".to_string(), config_id.clone());
        store.insert_subconfig(row).await.map_err(SubconfigError::Insert)?;
    }

    for row in &diff.to_update {
        let mut row = row.clone();
        let id = row.remove("ID").unwrap_or(Value::Null);
        row.remove("FIELD_CONFIG_ID");
        store
            .update_subconfig(&id, &row)
            .await
            .map_err(SubconfigError::Update)?;
    }

    for id in &diff.to_delete {
        store.delete_subconfig(id).await.map_err(SubconfigError::Delete)?;
    }

    Ok(diff)
}
