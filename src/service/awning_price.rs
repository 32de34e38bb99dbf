use async_trait::async_trait;
use bigdecimal::{BigDecimal, One, Zero};
use serde_json::{Map, Value};

use crate::case::{convert_map, KeyCase};
use crate::db::rows::Row;
use crate::error::StoreError;
use crate::models::pricing::decimal_from_json;
use crate::service::discount::{apply_discounts, DiscountContext, DiscountSource};

/// 基准篷布, 其它篷布的颜色附加费以它的价格为基数
pub const BASE_TARP: &str = "A";

/// 遮阳篷报价所需的数据来源
#[async_trait]
pub trait AwningPriceSource: Send + Sync {
    /// ARTICLES.LON_RATE (篷布等级)
    async fn tarp_rate_class(&self, tarp_article: &str) -> Result<Option<String>, StoreError>;

    /// get_closest_awning RPC 的第一行
    async fn closest_awning(
        &self,
        model: &str,
        rate_class: &str,
        line: i64,
        exit: i64,
    ) -> Result<Option<Row>, StoreError>;

    /// "get_awningPrice_awning" RPC 的第一行的 RATE
    async fn awning_rate(
        &self,
        model: &str,
        rate_class: &str,
        line: i64,
        exit: i64,
    ) -> Result<Option<BigDecimal>, StoreError>;

    /// COLOR_SURCHAGES.SURCHAGE_PERCENTAGE
    async fn color_surcharge(&self, model: &str, color: &str) -> Result<Option<BigDecimal>, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwningPriceQuery {
    pub model: String,
    pub line: i64,
    pub exit: i64,
    pub tarp: Option<String>,
    pub ral: Option<String>,
    pub family_code: Option<String>,
}

fn rate_of(quote: &Map<String, Value>) -> BigDecimal {
    quote.get("rate").and_then(decimal_from_json).unwrap_or_else(BigDecimal::zero)
}

/// 计算遮阳篷报价; 无可报价的组合返回 `None`
///
/// 顺序: 最近尺寸 -> rate 为 1 表示无价格 -> 颜色附加费 -> 三级折扣.
pub async fn quote_awning<S>(
    source: &S,
    query: &AwningPriceQuery,
    ctx: &DiscountContext,
) -> Result<Option<Map<String, Value>>, StoreError>
where
    S: AwningPriceSource + DiscountSource + ?Sized,
{
    let Some(tarp) = query.tarp.as_deref().filter(|t| !t.is_empty()) else {
        return Ok(None);
    };

    let rate_class = match source.tarp_rate_class(tarp).await? {
        Some(class) if !class.trim().is_empty() => class.trim().to_string(),
        _ => return Ok(None),
    };

    let Some(row) = source
        .closest_awning(&query.model, &rate_class, query.line, query.exit)
        .await?
    else {
        return Ok(None);
    };

    let mut quote = convert_map(row, KeyCase::Camel);
    let mut rate = rate_of(&quote);
    if rate == BigDecimal::one() {
        rate = BigDecimal::zero();
    }

    let surcharge = match query.ral.as_deref() {
        Some(ral) => source.color_surcharge(&query.model, ral).await?,
        None => None,
    };
    if let Some(surcharge) = surcharge.filter(|s| !s.is_zero()) {
        let hundred = BigDecimal::from(100);
        if rate_class == BASE_TARP {
            rate = &rate + &rate * &surcharge / &hundred;
        } else if let Some(base_rate) = source
            .awning_rate(&query.model, BASE_TARP, query.line, query.exit)
            .await?
        {
            rate = &rate + base_rate * &surcharge / &hundred;
        }
    }

    let priced = apply_discounts(source, &rate, query.family_code.as_deref(), ctx).await;
    priced.write_into(&mut quote, "rate", "rateBeforeDiscount");
    tracing::debug!(
        "Awning {} quoted at {} (before discount {})",
        query.model, priced.final_amount, priced.amount_before_discount
    );
    Ok(Some(quote))
}

/// 供响应使用: 报价或空数组
pub fn quote_or_empty(quote: Option<Map<String, Value>>) -> Value {
    quote.map(Value::Object).unwrap_or_else(|| Value::Array(Vec::new()))
}
