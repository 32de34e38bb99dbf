use bigdecimal::{BigDecimal, ToPrimitive, Zero};
use serde_json::{Number, Value};
use std::str::FromStr;

/// 三级折扣 (百分比, 0 表示不适用)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscountTiers(pub [BigDecimal; 3]);

impl DiscountTiers {
    pub fn none() -> Self {
        Self([BigDecimal::zero(), BigDecimal::zero(), BigDecimal::zero()])
    }

    pub fn from_f64(tiers: [f64; 3]) -> Self {
        Self(tiers.map(|t| decimal_from_f64(t).unwrap_or_else(BigDecimal::zero)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &BigDecimal> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|t| t.is_zero())
    }
}

/// 折扣计算结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub base_amount: BigDecimal,
    pub tiers_applied: DiscountTiers,
    pub final_amount: BigDecimal,
    pub amount_before_discount: BigDecimal,
}

impl PricedLine {
    /// 写回响应对象: `{amount_key}`, `{before_key}`, `dto1..dto3`
    pub fn write_into(&self, target: &mut serde_json::Map<String, Value>, amount_key: &str, before_key: &str) {
        target.insert(amount_key.to_string(), decimal_to_json(&self.final_amount));
        target.insert(before_key.to_string(), decimal_to_json(&self.amount_before_discount));
        for (i, tier) in self.tiers_applied.iter().enumerate() {
            target.insert(format!("dto{}", i + 1), decimal_to_json(tier));
        }
    }
}

pub fn decimal_from_f64(value: f64) -> Option<BigDecimal> {
    if !value.is_finite() {
        return None;
    }
    BigDecimal::from_str(&value.to_string()).ok()
}

/// JSON 数字/数字字符串 -> BigDecimal
pub fn decimal_from_json(value: &Value) -> Option<BigDecimal> {
    match value {
        Value::Number(n) => BigDecimal::from_str(&n.to_string()).ok(),
        Value::String(s) => BigDecimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

pub fn decimal_to_json(value: &BigDecimal) -> Value {
    if value.with_scale(0) == *value {
        if let Some(i) = value.to_i64() {
            return Value::Number(i.into());
        }
    }
    value
        .to_f64()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_decimal_conversions() {
        assert_eq!(decimal_from_json(&json!(85.5)), BigDecimal::from_str("85.5").ok());
        assert_eq!(decimal_from_json(&json!(" 12 ")), Some(BigDecimal::from(12)));
        assert_eq!(decimal_from_json(&json!(null)), None);
        assert_eq!(decimal_to_json(&BigDecimal::from(100)), json!(100));
        assert_eq!(decimal_to_json(&BigDecimal::from_str("85.50").unwrap()), json!(85.5));
    }

    #[test]
    fn empty_tiers() {
        assert!(DiscountTiers::none().is_empty());
        assert!(!DiscountTiers::from_f64([0.0, 5.0, 0.0]).is_empty());
    }
}
