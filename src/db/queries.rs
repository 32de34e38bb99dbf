use bigdecimal::BigDecimal;
use serde_json::Value;
use sqlx::PgPool;
use std::collections::HashSet;

use crate::case::{convert_map, to_upper_snake_case, KeyCase};
use crate::db::rows::{
    delete_rows, insert_rows, text_of, update_rows, Filter, Row, Select,
};
use crate::db::table::{quote_ident, Table};
use crate::error::StoreError;
use crate::models::pricing::decimal_from_json;
use crate::models::{DiscountTiers, FieldMapping, RequestFilter, RequestType};
use crate::service::CatalogRows;

// ---------------------------------------------------------------------------
// REQUESTS
// ---------------------------------------------------------------------------

/// 同ID的预算是否存在
pub async fn budget_exists(pool: &PgPool, id: &str) -> Result<bool, StoreError> {
    let exists = sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM "REQUESTS"
            WHERE "ID"::text = $1
              AND lower("TYPE"::text) = $2
        )
        "#,
    )
    .bind(id)
    .bind(RequestType::Budget.as_str())
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

pub async fn insert_request(pool: &PgPool, row: &Row) -> Result<Row, StoreError> {
    insert_rows(pool, Table::Requests, std::slice::from_ref(row))
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| StoreError::MalformedRow("insert returned no row".to_string()))
}

pub async fn update_request(pool: &PgPool, id: &str, row: &Row) -> Result<Vec<Row>, StoreError> {
    update_rows(pool, Table::Requests, row, &[Filter::eq("ID", id)]).await
}

/// 列表可见范围
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientScope {
    /// 高级员工: 全部客户
    All,
    Client(i64),
    /// 会话中没有客户号
    Nobody,
}

/// GET /requests 的查询参数 (已解析)
#[derive(Debug, Clone, PartialEq)]
pub struct RequestListQuery {
    pub scope: ClientScope,
    pub filters: Vec<RequestFilter>,
    pub sorted_by: Option<String>,
    pub offset: i64,
    pub limit: i64,
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64() != Some(0.0),
        _ => true,
    }
}

/// 请求列表的 SELECT; 过滤/排序列必须在 REQUESTS 白名单中
pub fn request_list_select(query: &RequestListQuery) -> Result<Select, StoreError> {
    let mut select = Select::from(Table::Requests);

    select = match query.scope {
        ClientScope::All => select,
        ClientScope::Client(n) => select.eq("CLIENT_NUMBER", n),
        ClientScope::Nobody => select.filter(Filter::In("CLIENT_NUMBER".to_string(), Vec::new())),
    };

    for filter in &query.filters {
        let (Some(column), Some(value)) = (filter.column.as_deref(), filter.value.as_ref()) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        let name = Table::Requests.column(&to_upper_snake_case(column))?;
        select = match value {
            Value::Bool(b) => select.eq(name, *b),
            v if column.to_lowercase().contains("date") && is_truthy(v) => {
                select.filter(Filter::Gte(name.to_string(), value_text(v)))
            }
            v => select.filter(Filter::ILike(name.to_string(), value_text(v))),
        };
    }

    if let Some(sorted_by) = query.sorted_by.as_deref() {
        if let Some((column, direction)) = sorted_by.split_once(':') {
            if !column.is_empty() && matches!(direction, "asc" | "desc") {
                let name = Table::Requests.column(&to_upper_snake_case(column))?;
                select = select.order_by(name, direction == "asc");
            }
        }
    }

    Ok(select.range(query.offset, query.limit))
}

// ---------------------------------------------------------------------------
// ARTICLES / 折扣
// ---------------------------------------------------------------------------

pub async fn articles_by_ids(pool: &PgPool, ids: &[String]) -> Result<Vec<Row>, StoreError> {
    Select::from(Table::Articles)
        .filter(Filter::In("ARTICLE".to_string(), ids.to_vec()))
        .fetch_all(pool)
        .await
}

/// 篷布物料的 LON_RATE
pub async fn tarp_rate_class(pool: &PgPool, article: &str) -> Result<Option<String>, StoreError> {
    let class = sqlx::query_scalar::<_, Option<String>>(
        r#"
        SELECT "LON_RATE"::text
        FROM "ARTICLES"
        WHERE "ARTICLE"::text = $1
        LIMIT 1
        "#,
    )
    .bind(article)
    .fetch_optional(pool)
    .await?;
    Ok(class.flatten())
}

/// 客户-家族三级折扣
pub async fn client_family_tiers(
    pool: &PgPool,
    client_number: i64,
    family_code: &str,
) -> Result<Option<DiscountTiers>, StoreError> {
    let row = sqlx::query_as::<_, (Option<BigDecimal>, Option<BigDecimal>, Option<BigDecimal>)>(
        r#"
        SELECT "DTO_1"::numeric, "DTO_2"::numeric, "DTO_3"::numeric
        FROM "CLIENTS_FAMILY_DTO"
        WHERE "CLIENT_CODE"::text = $1
          AND "FAMILY_CODE"::text = $2
        LIMIT 1
        "#,
    )
    .bind(client_number.to_string())
    .bind(family_code)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(d1, d2, d3)| {
        DiscountTiers([d1.unwrap_or_default(), d2.unwrap_or_default(), d3.unwrap_or_default()])
    }))
}

// ---------------------------------------------------------------------------
// AWNINGS
// ---------------------------------------------------------------------------

const AWNING_WITH_MODEL: &str = r#"
    SELECT to_jsonb(a) || jsonb_build_object(
        'FAMILY_CODE', m."FAMILY_CODE",
        'FAMILY_DESC', m."FAMILY_DESC",
        'SUBFAMILY_CODE', m."SUBFAMILY_CODE",
        'SUBFAMILY_DESC', m."SUBFAMILY_DESC"
    )
    FROM "AWNINGS" AS a
    LEFT JOIN "AWNINGS_MODELS" AS m ON m."ID" = a."AWNING_MODEL_ID"
"#;

fn object_rows(values: Vec<Value>) -> Vec<Row> {
    values
        .into_iter()
        .filter_map(|v| match v {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect()
}

/// 遮阳篷列表, 型号的家族字段平铺到行上
pub async fn list_awnings(pool: &PgPool) -> Result<Vec<Row>, StoreError> {
    let values = sqlx::query_scalar::<_, Value>(AWNING_WITH_MODEL)
        .fetch_all(pool)
        .await?;
    Ok(object_rows(values))
}

pub async fn get_awning(pool: &PgPool, id: &str) -> Result<Option<Row>, StoreError> {
    let sql = format!("{} WHERE a.\"ID\"::text = $1", AWNING_WITH_MODEL);
    let value = sqlx::query_scalar::<_, Value>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(value.and_then(|v| object_rows(vec![v]).into_iter().next()))
}

pub async fn insert_awning(pool: &PgPool, row: &Row) -> Result<Vec<Row>, StoreError> {
    insert_rows(pool, Table::Awnings, std::slice::from_ref(row)).await
}

pub async fn update_awning(pool: &PgPool, id: &str, row: &Row) -> Result<Vec<Row>, StoreError> {
    update_rows(pool, Table::Awnings, row, &[Filter::eq("ID", id)]).await
}

pub async fn delete_awning(pool: &PgPool, id: &str) -> Result<u64, StoreError> {
    delete_rows(pool, Table::Awnings, &[Filter::eq("ID", id)]).await
}

pub async fn awning_ids(pool: &PgPool) -> Result<Vec<Value>, StoreError> {
    let ids = sqlx::query_scalar::<_, Value>(r#"SELECT to_jsonb("ID") FROM "AWNINGS""#)
        .fetch_all(pool)
        .await?;
    Ok(ids)
}

/// 价格 RPC 的第一行
async fn awning_rpc(
    pool: &PgPool,
    function: &str,
    model: &str,
    rate_class: &str,
    line: i64,
    exit: i64,
) -> Result<Option<Row>, StoreError> {
    let line = i32::try_from(line).map_err(|_| StoreError::MalformedRow(format!("line {} out of range", line)))?;
    let exit = i32::try_from(exit).map_err(|_| StoreError::MalformedRow(format!("exit {} out of range", exit)))?;
    let sql = format!(
        "SELECT to_jsonb(r) FROM {}(_model => $1, _tarp => $2, _line => $3, _exit => $4) AS r LIMIT 1",
        quote_ident(function)?
    );
    let value = sqlx::query_scalar::<_, Value>(&sql)
        .bind(model)
        .bind(rate_class)
        .bind(line)
        .bind(exit)
        .fetch_optional(pool)
        .await?;
    Ok(value.and_then(|v| object_rows(vec![v]).into_iter().next()))
}

/// get_closest_awning: 不小于请求尺寸的最近规格
pub async fn closest_awning(
    pool: &PgPool,
    model: &str,
    rate_class: &str,
    line: i64,
    exit: i64,
) -> Result<Option<Row>, StoreError> {
    awning_rpc(pool, "get_closest_awning", model, rate_class, line, exit).await
}

/// "get_awningPrice_awning" 的 rate
pub async fn awning_rate(
    pool: &PgPool,
    model: &str,
    rate_class: &str,
    line: i64,
    exit: i64,
) -> Result<Option<BigDecimal>, StoreError> {
    let row = awning_rpc(pool, "get_awningPrice_awning", model, rate_class, line, exit).await?;
    Ok(row
        .map(|r| convert_map(r, KeyCase::Camel))
        .and_then(|r| r.get("rate").and_then(decimal_from_json)))
}

pub async fn color_surcharge(pool: &PgPool, model: &str, color: &str) -> Result<Option<BigDecimal>, StoreError> {
    let surcharge = sqlx::query_scalar::<_, Option<BigDecimal>>(
        r#"
        SELECT "SURCHAGE_PERCENTAGE"::numeric
        FROM "COLOR_SURCHAGES"
        WHERE "MODEL_CODE"::text = $1
          AND "COLOR_DESCRIPTION"::text = $2
        LIMIT 1
        "#,
    )
    .bind(model)
    .bind(color)
    .fetch_optional(pool)
    .await?;
    Ok(surcharge.flatten())
}

// ---------------------------------------------------------------------------
// AWNINGS_FIELDS_CONFIGS
// ---------------------------------------------------------------------------

pub async fn awning_links(pool: &PgPool, awning_id: &str) -> Result<Vec<Row>, StoreError> {
    Select::from(Table::AwningsFieldsConfigs)
        .eq("AWNING_ID", awning_id)
        .fetch_all(pool)
        .await
}

/// 遮阳篷启用的字段配置ID (保持原始 JSON 类型)
pub async fn linked_config_ids(pool: &PgPool, awning_id: &str) -> Result<Vec<Value>, StoreError> {
    Ok(awning_links(pool, awning_id)
        .await?
        .into_iter()
        .filter_map(|mut r| r.remove("FIELD_CONFIG_ID"))
        .collect())
}

pub async fn linked_config_id_set(pool: &PgPool, awning_id: &str) -> Result<HashSet<String>, StoreError> {
    Ok(awning_links(pool, awning_id)
        .await?
        .iter()
        .filter_map(|r| text_of(r, "FIELD_CONFIG_ID"))
        .collect())
}

fn link_row(awning_id: &Value, config_id: &Value) -> Row {
    let mut row = Row::new();
    row.insert("AWNING_ID".to_string(), awning_id.clone());
    row.insert("FIELD_CONFIG_ID".to_string(), config_id.clone());
    row
}

pub async fn link_config(pool: &PgPool, awning_id: &Value, config_id: &Value) -> Result<Vec<Row>, StoreError> {
    insert_rows(pool, Table::AwningsFieldsConfigs, &[link_row(awning_id, config_id)]).await
}

pub async fn unlink_config(pool: &PgPool, awning_id: &Value, config_id: &Value) -> Result<u64, StoreError> {
    delete_rows(
        pool,
        Table::AwningsFieldsConfigs,
        &[
            Filter::Eq("FIELD_CONFIG_ID".to_string(), config_id.clone()),
            Filter::Eq("AWNING_ID".to_string(), awning_id.clone()),
        ],
    )
    .await
}

pub async fn unlink_config_everywhere(pool: &PgPool, config_id: &Value) -> Result<u64, StoreError> {
    delete_rows(
        pool,
        Table::AwningsFieldsConfigs,
        &[Filter::Eq("FIELD_CONFIG_ID".to_string(), config_id.clone())],
    )
    .await
}

pub async fn link_exists(pool: &PgPool, awning_id: &Value, config_id: &Value) -> Result<bool, StoreError> {
    Ok(Select::from(Table::AwningsFieldsConfigs)
        .filter(Filter::Eq("FIELD_CONFIG_ID".to_string(), config_id.clone()))
        .filter(Filter::Eq("AWNING_ID".to_string(), awning_id.clone()))
        .fetch_optional(pool)
        .await?
        .is_some())
}

/// 复制链接行到新遮阳篷 (去掉 ID), 返回新行; 源遮阳篷没有链接时返回 `None`
pub async fn duplicate_links(pool: &PgPool, awning_id: &str, new_id: &Value) -> Result<Option<Vec<Row>>, StoreError> {
    let links = awning_links(pool, awning_id).await?;
    if links.is_empty() {
        return Ok(None);
    }
    let copies: Vec<Row> = links
        .into_iter()
        .map(|mut row| {
            row.remove("ID");
            row.insert("AWNING_ID".to_string(), new_id.clone());
            row
        })
        .collect();
    Ok(Some(insert_rows(pool, Table::AwningsFieldsConfigs, &copies).await?))
}

// ---------------------------------------------------------------------------
// GROUPS / FIELDS / FIELDS_CONFIGS / FIELDS_SUBCONFIGS
// ---------------------------------------------------------------------------

/// 目录树所需的全部扁平行
pub async fn catalog_rows(pool: &PgPool) -> Result<CatalogRows, StoreError> {
    let groups = Select::from(Table::Groups).order_by("ORDER", true);
    let fields = Select::from(Table::Fields).order_by("ORDER", true);
    let configs = Select::from(Table::FieldsConfigs);
    let subconfigs = Select::from(Table::FieldsSubconfigs);

    let (groups, fields, configs, subconfigs) = futures::try_join!(
        groups.fetch_all(pool),
        fields.fetch_all(pool),
        configs.fetch_all(pool),
        subconfigs.fetch_all(pool),
    )?;
    Ok(CatalogRows {
        groups,
        fields,
        configs,
        subconfigs,
    })
}

pub async fn groups_ordered(pool: &PgPool) -> Result<Vec<Row>, StoreError> {
    Select::from(Table::Groups).order_by("ORDER", true).fetch_all(pool).await
}

pub async fn fields_in_group(pool: &PgPool, group_id: &Value) -> Result<Vec<Row>, StoreError> {
    Select::from(Table::Fields)
        .filter(Filter::Eq("GROUP_ID".to_string(), group_id.clone()))
        .order_by("ORDER", true)
        .fetch_all(pool)
        .await
}

pub async fn count_groups(pool: &PgPool) -> Result<i64, StoreError> {
    let count = sqlx::query_scalar::<_, i64>(r#"SELECT count(*) FROM "GROUPS""#)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

pub async fn count_fields_in_group(pool: &PgPool, group_id: &Value) -> Result<i64, StoreError> {
    let count = sqlx::query_scalar::<_, i64>(r#"SELECT count(*) FROM "FIELDS" WHERE "GROUP_ID"::text = $1"#)
        .bind(value_text(group_id))
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// 批量写 ORDER 列
pub async fn set_order(pool: &PgPool, table: Table, ids: &[String], orders: &[i32]) -> Result<u64, StoreError> {
    let order_column = table.column("ORDER")?;
    let sql = format!(
        r#"
        UPDATE {table} AS t
        SET {order} = u.ord
        FROM unnest($1::text[], $2::int[]) AS u(id, ord)
        WHERE t."ID"::text = u.id
        "#,
        table = quote_ident(table.name())?,
        order = quote_ident(order_column)?,
    );
    let result = sqlx::query(&sql)
        .bind(ids.to_vec())
        .bind(orders.to_vec())
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn insert_row(pool: &PgPool, table: Table, row: Row) -> Result<Vec<Row>, StoreError> {
    insert_rows(pool, table, &[row]).await
}

pub async fn update_by_id(pool: &PgPool, table: Table, id: &Value, row: &Row) -> Result<Vec<Row>, StoreError> {
    update_rows(pool, table, row, &[Filter::Eq("ID".to_string(), id.clone())]).await
}

pub async fn delete_by_id(pool: &PgPool, table: Table, id: &Value) -> Result<u64, StoreError> {
    delete_rows(pool, table, &[Filter::Eq("ID".to_string(), id.clone())]).await
}

/// 某字段配置下现有子配置的ID
pub async fn subconfig_ids(pool: &PgPool, config_id: &Value) -> Result<Vec<String>, StoreError> {
    Ok(Select::from(Table::FieldsSubconfigs)
        .filter(Filter::Eq("FIELD_CONFIG_ID".to_string(), config_id.clone()))
        .fetch_all(pool)
        .await?
        .iter()
        .filter_map(|r| text_of(r, "ID"))
        .collect())
}

/// FIELDS 中的 Delfos 映射
pub async fn field_mappings(pool: &PgPool, field_ids: &[String]) -> Result<Vec<FieldMapping>, StoreError> {
    let rows = sqlx::query_as::<_, (String, Option<String>, bool)>(
        r#"
        SELECT "ID"::text, NULLIF("DELFOS_ID"::text, ''), COALESCE("SAVE_ON_REQUEST", false)
        FROM "FIELDS"
        WHERE "ID"::text = ANY($1)
        "#,
    )
    .bind(field_ids.to_vec())
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(field_id, external_id, save_on_request)| FieldMapping {
            field_id,
            external_id,
            save_on_request,
        })
        .collect())
}

// ---------------------------------------------------------------------------
// /db-select
// ---------------------------------------------------------------------------

/// 下一个 `=` 或 `!=` 的位置与长度
fn next_operator(s: &str) -> Option<(usize, usize)> {
    s.char_indices().find_map(|(i, c)| match c {
        '=' => Some((i, 1)),
        '!' if s[i + 1..].starts_with('=') => Some((i, 2)),
        _ => None,
    })
}

/// `COL=VAL` / `COL!=VAL`; 值在下一个运算符处截断, 为 `null` 时变为 IS (NOT) NULL
pub fn parse_search_filter(raw: &str) -> Option<Filter> {
    let (pos, len) = next_operator(raw)?;
    let column = &raw[..pos];
    if column.is_empty() {
        return None;
    }
    let negate = len == 2;
    let rest = &raw[pos + len..];
    let value = match next_operator(rest) {
        Some((end, _)) => &rest[..end],
        None => rest,
    };

    let column = column.to_string();
    Some(match (negate, value) {
        (false, "null") => Filter::IsNull(column),
        (true, "null") => Filter::NotNull(column),
        (false, v) => Filter::Eq(column, Value::String(v.to_string())),
        (true, v) => Filter::Neq(column, Value::String(v.to_string())),
    })
}

/// 白名单表上的模糊搜索
pub fn search_select(
    allowed_tables: &[String],
    table: &str,
    columns: &[String],
    term: &str,
    filters: Vec<Filter>,
) -> Result<Select, StoreError> {
    if !allowed_tables.iter().any(|t| t == table) {
        return Err(StoreError::TableNotAllowed(table.to_string()));
    }
    let mut select = Select::from_name(table);
    for filter in filters {
        select = select.filter(filter);
    }
    if !columns.is_empty() {
        select = select.filter(Filter::AnyILike(columns.to_vec(), term.to_string()));
    }
    Ok(select)
}
