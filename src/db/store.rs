use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde_json::Value;
use sqlx::PgPool;

use crate::db::queries;
use crate::db::rows::Row;
use crate::db::table::Table;
use crate::error::StoreError;
use crate::models::{DiscountTiers, FieldMapping};
use crate::service::{AwningPriceSource, ConfigLinkStore, DiscountSource, FieldMappingSource, RequestStore};

/// Postgres 上的业务数据源
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl DiscountSource for PgStore {
    async fn client_family_tiers(
        &self,
        client_number: i64,
        family_code: &str,
    ) -> Result<Option<DiscountTiers>, StoreError> {
        queries::client_family_tiers(&self.pool, client_number, family_code).await
    }
}

#[async_trait]
impl RequestStore for PgStore {
    async fn budget_exists(&self, id: &str) -> Result<bool, StoreError> {
        queries::budget_exists(&self.pool, id).await
    }

    async fn insert_request(&self, row: &Row) -> Result<(), StoreError> {
        queries::insert_request(&self.pool, row).await?;
        Ok(())
    }

    async fn update_request(&self, id: &str, row: &Row) -> Result<(), StoreError> {
        let updated = queries::update_request(&self.pool, id, row).await?;
        if updated.is_empty() {
            return Err(StoreError::MalformedRow(format!("request {} not updated", id)));
        }
        Ok(())
    }
}

#[async_trait]
impl FieldMappingSource for PgStore {
    async fn field_mappings(&self, field_ids: &[String]) -> Result<Vec<FieldMapping>, StoreError> {
        queries::field_mappings(&self.pool, field_ids).await
    }
}

#[async_trait]
impl AwningPriceSource for PgStore {
    async fn tarp_rate_class(&self, tarp_article: &str) -> Result<Option<String>, StoreError> {
        queries::tarp_rate_class(&self.pool, tarp_article).await
    }

    async fn closest_awning(
        &self,
        model: &str,
        rate_class: &str,
        line: i64,
        exit: i64,
    ) -> Result<Option<Row>, StoreError> {
        queries::closest_awning(&self.pool, model, rate_class, line, exit).await
    }

    async fn awning_rate(
        &self,
        model: &str,
        rate_class: &str,
        line: i64,
        exit: i64,
    ) -> Result<Option<BigDecimal>, StoreError> {
        queries::awning_rate(&self.pool, model, rate_class, line, exit).await
    }

    async fn color_surcharge(&self, model: &str, color: &str) -> Result<Option<BigDecimal>, StoreError> {
        queries::color_surcharge(&self.pool, model, color).await
    }
}

#[async_trait]
impl ConfigLinkStore for PgStore {
    async fn link_config(&self, awning_id: &Value, config_id: &Value) -> Result<(), StoreError> {
        queries::link_config(&self.pool, awning_id, config_id).await?;
        Ok(())
    }

    async fn unlink_config(&self, awning_id: &Value, config_id: &Value) -> Result<(), StoreError> {
        queries::unlink_config(&self.pool, awning_id, config_id).await?;
        Ok(())
    }

    async fn subconfig_ids(&self, config_id: &Value) -> Result<Vec<String>, StoreError> {
        queries::subconfig_ids(&self.pool, config_id).await
    }

    async fn insert_subconfig(&self, row: Row) -> Result<(), StoreError> {
        queries::insert_row(&self.pool, Table::FieldsSubconfigs, row).await?;
        Ok(())
    }

    async fn update_subconfig(&self, id: &Value, row: &Row) -> Result<(), StoreError> {
        queries::update_by_id(&self.pool, Table::FieldsSubconfigs, id, row).await?;
        Ok(())
    }

    async fn delete_subconfig(&self, id: &str) -> Result<(), StoreError> {
        queries::delete_by_id(&self.pool, Table::FieldsSubconfigs, &Value::String(id.to_string())).await?;
        Ok(())
    }
}
