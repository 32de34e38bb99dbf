use axum::{
    extract::{Json, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::future::join_all;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::api::session::ClientSession;
use crate::api::AppState;
use crate::case::{convert_map, KeyCase};
use crate::db::{queries, Row};
use crate::error::ApiError;
use crate::models::pricing::decimal_from_json;
use crate::service::{apply_discounts, DiscountContext, DiscountSource};

#[derive(Debug, Deserialize)]
pub struct ArticlesQuery {
    pub ids: Option<String>,
}

/// `a,b,,c` -> [a, b, c]
pub fn split_ids(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

/// 单个物料: salePrice 折后, salePriceBeforeDiscount 原价, dto1..3
pub async fn price_article<S>(source: &S, row: Row, ctx: &DiscountContext) -> Row
where
    S: DiscountSource + ?Sized,
{
    let mut article = convert_map(row, KeyCase::Camel);
    let Some(base) = article.get("salePrice").and_then(decimal_from_json) else {
        return article;
    };
    let family = article
        .get("familyCode")
        .and_then(Value::as_str)
        .map(str::to_string);
    let priced = apply_discounts(source, &base, family.as_deref(), ctx).await;
    priced.write_into(&mut article, "salePrice", "salePriceBeforeDiscount");
    article
}

pub async fn articles_by_ids(
    State(state): State<Arc<AppState>>,
    ClientSession(ctx): ClientSession,
    Query(query): Query<ArticlesQuery>,
) -> Result<Response, ApiError> {
    let ids = split_ids(query.ids.as_deref());
    if ids.is_empty() {
        return Err(ApiError::validation("No article IDs provided."));
    }

    let rows = queries::articles_by_ids(state.store.pool(), &ids)
        .await
        .map_err(ApiError::store("Internal server error while getting the articles by ids."))?;

    let discounts = DiscountContext::from_commercial(&ctx.commercial);
    let articles = join_all(
        rows.into_iter()
            .map(|row| price_article(&state.store, row, &discounts)),
    )
    .await;

    Ok((StatusCode::OK, Json(articles)).into_response())
}
