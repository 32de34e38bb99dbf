use async_trait::async_trait;
use bigdecimal::{BigDecimal, Zero};

use crate::error::StoreError;
use crate::models::{CommercialData, DiscountTiers, PricedLine};

/// 客户-家族折扣来源 (CLIENTS_FAMILY_DTO)
#[async_trait]
pub trait DiscountSource: Send + Sync {
    async fn client_family_tiers(
        &self,
        client_number: i64,
        family_code: &str,
    ) -> Result<Option<DiscountTiers>, StoreError>;
}

/// 折扣上下文: 客户号 + 商务账户默认折扣
#[derive(Debug, Clone)]
pub struct DiscountContext {
    pub client_number: Option<i64>,
    pub account_defaults: DiscountTiers,
}

impl DiscountContext {
    pub fn from_commercial(data: &CommercialData) -> Self {
        Self {
            client_number: data.client_number,
            account_defaults: data.account_tiers(),
        }
    }
}

/// 依次应用三级折扣 (复利式, 0 跳过)
pub fn apply_tiers(base: &BigDecimal, tiers: &DiscountTiers) -> PricedLine {
    let hundred = BigDecimal::from(100);
    let mut amount = base.clone();
    for tier in tiers.iter() {
        if tier.is_zero() {
            continue;
        }
        let reduction = &amount * tier / &hundred;
        amount = &amount - &reduction;
    }
    PricedLine {
        base_amount: base.clone(),
        tiers_applied: tiers.clone(),
        final_amount: amount,
        amount_before_discount: base.clone(),
    }
}

/// 选择折扣来源: 有客户号且存在客户-家族折扣行时使用该行 (即使全为0), 否则用账户默认值
pub async fn resolve_tiers<S>(source: &S, family_code: Option<&str>, ctx: &DiscountContext) -> DiscountTiers
where
    S: DiscountSource + ?Sized,
{
    let (Some(client_number), Some(family_code)) = (ctx.client_number, family_code) else {
        return ctx.account_defaults.clone();
    };

    match source.client_family_tiers(client_number, family_code).await {
        Ok(Some(tiers)) => tiers,
        Ok(None) => ctx.account_defaults.clone(),
        Err(e) => {
            tracing::warn!(
                "Client family discount lookup failed for client {} family {}: {}",
                client_number, family_code, e
            );
            ctx.account_defaults.clone()
        }
    }
}

pub async fn apply_discounts<S>(
    source: &S,
    base: &BigDecimal,
    family_code: Option<&str>,
    ctx: &DiscountContext,
) -> PricedLine
where
    S: DiscountSource + ?Sized,
{
    let tiers = resolve_tiers(source, family_code, ctx).await;
    apply_tiers(base, &tiers)
}
