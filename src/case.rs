//! camelCase <-> UPPER_SNAKE_CASE 键名转换
//!
//! HTTP 边界上的 JSON 一律 camelCase, 存储层一律 UPPER_SNAKE_CASE,
//! 两者之间只通过 [`convert_keys`] 转换. UUID 形式的键原样保留.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// 转换方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCase {
    Camel,
    UpperSnake,
}

impl KeyCase {
    pub fn apply(self, key: &str) -> String {
        match self {
            KeyCase::Camel => to_camel_case(key),
            KeyCase::UpperSnake => to_upper_snake_case(key),
        }
    }
}

fn uuid_regex() -> &'static Regex {
    static UUID: OnceLock<Regex> = OnceLock::new();
    UUID.get_or_init(|| {
        Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
            .expect("uuid regex is valid")
    })
}

pub fn is_uuid(s: &str) -> bool {
    uuid_regex().is_match(s)
}

/// 递归转换 JSON 中所有对象的键名
pub fn convert_keys(value: Value, case: KeyCase) -> Value {
    match value {
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| convert_keys(item, case))
                .collect(),
        ),
        Value::Object(map) => Value::Object(convert_map(map, case)),
        // 空字符串及其他基本类型不含键, 直接返回
        other => other,
    }
}

pub fn convert_map(map: Map<String, Value>, case: KeyCase) -> Map<String, Value> {
    map.into_iter()
        .map(|(key, value)| {
            let key = if is_uuid(&key) { key } else { case.apply(&key) };
            (key, convert_keys(value, case))
        })
        .collect()
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum CharKind {
    Upper,
    Lower,
    Digit,
}

fn kind_of(c: char) -> Option<CharKind> {
    if c.is_ascii_digit() {
        Some(CharKind::Digit)
    } else if c.is_uppercase() {
        Some(CharKind::Upper)
    } else if c.is_alphabetic() {
        Some(CharKind::Lower)
    } else {
        None
    }
}

/// 拆词: 分隔符、小写->大写、连续大写后接小写、字母<->数字 均为词边界
pub fn split_words(s: &str) -> Vec<String> {
    let chars: Vec<char> = s.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        let Some(kind) = kind_of(c) else {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        };

        if let Some(prev) = current.chars().last().and_then(kind_of) {
            let next = chars.get(i + 1).copied().and_then(kind_of);
            let boundary = match (prev, kind) {
                (CharKind::Lower, CharKind::Upper) => true,
                (CharKind::Digit, CharKind::Upper | CharKind::Lower) => true,
                (CharKind::Upper | CharKind::Lower, CharKind::Digit) => true,
                (CharKind::Upper, CharKind::Upper) => next == Some(CharKind::Lower),
                _ => false,
            };
            if boundary {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }

    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn capitalize(word: &str) -> String {
    let lower = word.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn to_camel_case(s: &str) -> String {
    split_words(s)
        .iter()
        .enumerate()
        .map(|(i, w)| if i == 0 { w.to_lowercase() } else { capitalize(w) })
        .collect()
}

pub fn to_upper_snake_case(s: &str) -> String {
    split_words(s)
        .iter()
        .map(|w| w.to_uppercase())
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn word_boundaries() {
        assert_eq!(split_words("salePriceBeforeDiscount"), ["sale", "Price", "Before", "Discount"]);
        assert_eq!(split_words("XMLHttpRequest"), ["XML", "Http", "Request"]);
        assert_eq!(split_words("DTO_1"), ["DTO", "1"]);
        assert_eq!(split_words("dto1"), ["dto", "1"]);
        assert_eq!(split_words("  --foo bar--"), ["foo", "bar"]);
        assert!(split_words("").is_empty());
    }

    #[test]
    fn case_functions() {
        assert_eq!(to_camel_case("SALE_PRICE_BEFORE_DISCOUNT"), "salePriceBeforeDiscount");
        assert_eq!(to_camel_case("ID"), "id");
        assert_eq!(to_camel_case("DTO_3"), "dto3");
        assert_eq!(to_upper_snake_case("clientNumber"), "CLIENT_NUMBER");
        assert_eq!(to_upper_snake_case("commercialDiscount1"), "COMMERCIAL_DISCOUNT_1");
        assert_eq!(to_upper_snake_case("fieldsConfigs"), "FIELDS_CONFIGS");
    }

    #[test]
    fn uuid_keys_are_never_transformed() {
        let id = "3F2504E0-4F89-11D3-9A0C-0305E82C3301";
        let value = json!({ id: { "showName": true }, "deliveryDate": "" });

        let snake = convert_keys(value.clone(), KeyCase::UpperSnake);
        assert_eq!(snake, json!({ id: { "SHOW_NAME": true }, "DELIVERY_DATE": "" }));

        let camel = convert_keys(snake, KeyCase::Camel);
        assert_eq!(camel, value);
        assert!(is_uuid(&id.to_lowercase()));
        assert!(!is_uuid("3f2504e0-4f89-11d3-9a0c"));
    }

    #[test]
    fn nested_round_trip() {
        let value = json!({
            "clientNumber": 42,
            "articles": [
                { "rateBeforeDiscount": 10.5, "dto1": 0, "config": null },
                { "units": 2, "tags": ["a", "b"] }
            ],
            "resume": { "salesBudget": "100", "observations": "" },
            "active": true
        });
        let stored = convert_keys(value.clone(), KeyCase::UpperSnake);
        assert_eq!(stored["ARTICLES"][0]["RATE_BEFORE_DISCOUNT"], json!(10.5));
        assert_eq!(stored["ARTICLES"][0]["DTO_1"], json!(0));
        assert_eq!(stored["RESUME"]["SALES_BUDGET"], json!("100"));
        assert_eq!(convert_keys(stored, KeyCase::Camel), value);
    }

    #[test]
    fn primitives_pass_through() {
        assert_eq!(convert_keys(json!("SOME_VALUE"), KeyCase::Camel), json!("SOME_VALUE"));
        assert_eq!(convert_keys(json!(null), KeyCase::UpperSnake), json!(null));
        assert_eq!(convert_keys(json!([1, "x"]), KeyCase::Camel), json!([1, "x"]));
    }
}
