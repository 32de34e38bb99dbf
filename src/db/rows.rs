//! 以 JSON 对象为行的通用读写
//!
//! 读: `to_jsonb(t)` 返回 UPPER_SNAKE 键的对象; 写: `jsonb_populate_record(set)`
//! 按表的列白名单写入. 动态拼接的标识符全部经过 [`quote_ident`] 或白名单.

use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::db::table::{quote_ident, Table};
use crate::error::StoreError;

pub type Row = Map<String, Value>;

/// 行中某列的文本形式 (字符串或数字); 用于ID比较
pub fn text_of(row: &Row, column: &str) -> Option<String> {
    match row.get(column) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// 过滤条件 (列名在构建 SQL 时校验)
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    Neq(String, Value),
    IsNull(String),
    NotNull(String),
    Gte(String, String),
    ILike(String, String),
    In(String, Vec<String>),
    /// 任一列 ILIKE %term%
    AnyILike(Vec<String>, String),
}

impl Filter {
    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Filter::Eq(column.to_string(), value.into())
    }
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &Filter) -> Result<(), StoreError> {
    match filter {
        Filter::Eq(col, value) | Filter::Neq(col, value) => {
            let negate = matches!(filter, Filter::Neq(..));
            let col = quote_ident(col)?;
            match value {
                Value::Null => {
                    qb.push(format!("t.{} IS {}NULL", col, if negate { "NOT " } else { "" }));
                }
                Value::Bool(b) => {
                    qb.push(format!("t.{} {} ", col, if negate { "<>" } else { "=" }));
                    qb.push_bind(*b);
                }
                Value::String(s) => {
                    qb.push(format!("t.{}::text {} ", col, if negate { "<>" } else { "=" }));
                    qb.push_bind(s.clone());
                }
                Value::Number(n) => {
                    qb.push(format!("t.{}::text {} ", col, if negate { "<>" } else { "=" }));
                    qb.push_bind(n.to_string());
                }
                other => {
                    qb.push(format!("to_jsonb(t.{}) {} ", col, if negate { "<>" } else { "=" }));
                    qb.push_bind(Json(other.clone()));
                }
            }
        }
        Filter::IsNull(col) => {
            qb.push(format!("t.{} IS NULL", quote_ident(col)?));
        }
        Filter::NotNull(col) => {
            qb.push(format!("t.{} IS NOT NULL", quote_ident(col)?));
        }
        Filter::Gte(col, value) => {
            qb.push(format!("t.{} >= CAST(", quote_ident(col)?));
            qb.push_bind(value.clone());
            qb.push(" AS timestamptz)");
        }
        Filter::ILike(col, term) => {
            qb.push(format!("t.{}::text ILIKE ", quote_ident(col)?));
            qb.push_bind(format!("%{}%", term));
        }
        Filter::In(col, values) => {
            qb.push(format!("t.{}::text = ANY(", quote_ident(col)?));
            qb.push_bind(values.clone());
            qb.push(")");
        }
        Filter::AnyILike(cols, term) => {
            qb.push("(");
            for (i, col) in cols.iter().enumerate() {
                if i > 0 {
                    qb.push(" OR ");
                }
                qb.push(format!("t.{}::text ILIKE ", quote_ident(col)?));
                qb.push_bind(format!("%{}%", term));
            }
            qb.push(")");
        }
    }
    Ok(())
}

fn push_where(qb: &mut QueryBuilder<'_, Postgres>, filters: &[Filter]) -> Result<(), StoreError> {
    for (i, filter) in filters.iter().enumerate() {
        qb.push(if i == 0 { " WHERE " } else { " AND " });
        push_filter(qb, filter)?;
    }
    Ok(())
}

fn into_rows(values: Vec<Value>) -> Result<Vec<Row>, StoreError> {
    values
        .into_iter()
        .map(|v| match v {
            Value::Object(map) => Ok(map),
            other => Err(StoreError::MalformedRow(other.to_string())),
        })
        .collect()
}

/// SELECT 构建器
#[derive(Debug, Clone)]
pub struct Select {
    table: String,
    filters: Vec<Filter>,
    order: Vec<(String, bool)>,
    range: Option<(i64, i64)>,
}

impl Select {
    pub fn from(table: Table) -> Self {
        Self {
            table: table.name().to_string(),
            filters: Vec::new(),
            order: Vec::new(),
            range: None,
        }
    }

    /// 表名来自外部输入时使用, 构建时校验
    pub fn from_name(table: &str) -> Self {
        Self {
            table: table.to_string(),
            filters: Vec::new(),
            order: Vec::new(),
            range: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::eq(column, value))
    }

    pub fn order_by(mut self, column: &str, ascending: bool) -> Self {
        self.order.push((column.to_string(), ascending));
        self
    }

    /// offset 起取 limit 行
    pub fn range(mut self, offset: i64, limit: i64) -> Self {
        self.range = Some((offset.max(0), limit.max(0)));
        self
    }

    pub fn build(&self) -> Result<QueryBuilder<'static, Postgres>, StoreError> {
        let mut qb = QueryBuilder::new(format!(
            "SELECT to_jsonb(t) FROM {} AS t",
            quote_ident(&self.table)?
        ));
        push_where(&mut qb, &self.filters)?;

        for (i, (col, asc)) in self.order.iter().enumerate() {
            qb.push(if i == 0 { " ORDER BY " } else { ", " });
            qb.push(format!("t.{} {}", quote_ident(col)?, if *asc { "ASC" } else { "DESC" }));
        }

        if let Some((offset, limit)) = self.range {
            qb.push(" LIMIT ");
            qb.push_bind(limit);
            qb.push(" OFFSET ");
            qb.push_bind(offset);
        }
        Ok(qb)
    }

    pub async fn fetch_all(&self, pool: &PgPool) -> Result<Vec<Row>, StoreError> {
        let mut qb = self.build()?;
        let values: Vec<Value> = qb.build_query_scalar().fetch_all(pool).await?;
        into_rows(values)
    }

    pub async fn fetch_optional(&self, pool: &PgPool) -> Result<Option<Row>, StoreError> {
        Ok(self.clone().range(0, 1).fetch_all(pool).await?.into_iter().next())
    }
}

/// 行中属于白名单的列 (按表定义顺序)
fn writable_columns(table: Table, rows: &[Row]) -> Vec<&'static str> {
    table
        .columns()
        .iter()
        .copied()
        .filter(|col| rows.iter().any(|row| row.contains_key(*col)))
        .collect()
}

fn log_dropped_keys(table: Table, rows: &[Row]) {
    for key in rows.iter().flat_map(|r| r.keys()) {
        if !table.has_column(key) {
            tracing::debug!("Ignoring non-writable key {} for table {}", key, table.name());
        }
    }
}

fn column_list(columns: &[&str]) -> String {
    columns
        .iter()
        .map(|c| format!("\"{}\"", c))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn insert_query(table: Table, rows: &[Row]) -> Result<QueryBuilder<'static, Postgres>, StoreError> {
    let columns = writable_columns(table, rows);
    if columns.is_empty() {
        return Err(StoreError::MalformedRow(format!(
            "no writable columns for {}",
            table.name()
        )));
    }
    let cols = column_list(&columns);
    let mut qb = QueryBuilder::new(format!(
        "INSERT INTO \"{table}\" AS t ({cols}) SELECT {cols} FROM jsonb_populate_recordset(NULL::\"{table}\", ",
        table = table.name(),
        cols = cols,
    ));
    qb.push_bind(Json(Value::Array(rows.iter().cloned().map(Value::Object).collect())));
    qb.push(") RETURNING to_jsonb(t)");
    Ok(qb)
}

/// 批量插入, 返回插入后的行
pub async fn insert_rows(pool: &PgPool, table: Table, rows: &[Row]) -> Result<Vec<Row>, StoreError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    log_dropped_keys(table, rows);
    let mut qb = insert_query(table, rows)?;
    let values: Vec<Value> = qb.build_query_scalar().fetch_all(pool).await?;
    into_rows(values)
}

pub fn update_query(
    table: Table,
    values: &Row,
    filters: &[Filter],
) -> Result<QueryBuilder<'static, Postgres>, StoreError> {
    if filters.is_empty() {
        return Err(StoreError::MalformedRow("update without filter".to_string()));
    }
    let columns = writable_columns(table, std::slice::from_ref(values));
    if columns.is_empty() {
        return Err(StoreError::MalformedRow(format!(
            "no writable columns for {}",
            table.name()
        )));
    }
    let assignments = columns
        .iter()
        .map(|c| format!("\"{c}\" = r.\"{c}\""))
        .collect::<Vec<_>>()
        .join(", ");
    let mut qb = QueryBuilder::new(format!(
        "UPDATE \"{table}\" AS t SET {assignments} FROM jsonb_populate_record(NULL::\"{table}\", ",
        table = table.name(),
        assignments = assignments,
    ));
    qb.push_bind(Json(Value::Object(values.clone())));
    qb.push(") AS r");
    push_where(&mut qb, filters)?;
    qb.push(" RETURNING to_jsonb(t)");
    Ok(qb)
}

/// 按条件更新, 返回更新后的行
pub async fn update_rows(
    pool: &PgPool,
    table: Table,
    values: &Row,
    filters: &[Filter],
) -> Result<Vec<Row>, StoreError> {
    log_dropped_keys(table, std::slice::from_ref(values));
    let mut qb = update_query(table, values, filters)?;
    let values: Vec<Value> = qb.build_query_scalar().fetch_all(pool).await?;
    into_rows(values)
}

pub fn delete_query(table: Table, filters: &[Filter]) -> Result<QueryBuilder<'static, Postgres>, StoreError> {
    if filters.is_empty() {
        return Err(StoreError::MalformedRow("delete without filter".to_string()));
    }
    let mut qb = QueryBuilder::new(format!("DELETE FROM \"{}\" AS t", table.name()));
    push_where(&mut qb, filters)?;
    Ok(qb)
}

/// 按条件删除, 返回影响行数
pub async fn delete_rows(pool: &PgPool, table: Table, filters: &[Filter]) -> Result<u64, StoreError> {
    let mut qb = delete_query(table, filters)?;
    let result = qb.build().execute(pool).await?;
    Ok(result.rows_affected())
}
