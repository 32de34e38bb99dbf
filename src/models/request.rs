use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 请求类型: 预算 / 订单
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestType {
    Budget,
    Order,
}

impl RequestType {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestType::Budget => "budget",
            RequestType::Order => "order",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArticleKind {
    #[serde(rename = "awning")]
    Awning,
    #[serde(rename = "article")]
    Article,
    #[serde(rename = "awning-article")]
    AwningArticle,
}

/// 请求中的明细行; 未建模字段原样保留
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestArticle {
    #[serde(rename = "type")]
    pub kind: ArticleKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// 预算/订单记录 (线上 camelCase 形态)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: RequestType,
    #[serde(default)]
    pub client_number: i64,
    #[serde(default)]
    pub client_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Value,
    #[serde(default)]
    pub articles: Vec<RequestArticle>,
    #[serde(default)]
    pub resume: Value,
    #[serde(default)]
    pub delivery_date: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub number: Option<i64>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// 字段映射: 内部字段ID -> Delfos 字段ID
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    pub field_id: String,
    pub external_id: Option<String>,
    pub save_on_request: bool,
}

/// GET /requests 的单个过滤条件
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RequestFilter {
    pub column: Option<String>,
    pub value: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_request_payload() {
        let record: RequestRecord = serde_json::from_value(json!({
            "id": "R1",
            "type": "budget",
            "clientNumber": 999,
            "reference": "obra norte",
            "deliveryDate": null,
            "articles": [
                { "type": "awning", "id": "a1", "units": 1, "config": { "f1": "120" } },
                { "type": "article", "id": "a2", "total": 10.5 }
            ],
            "resume": { "totalImport": 10 }
        }))
        .unwrap();

        assert_eq!(record.kind, RequestType::Budget);
        assert!(record.active);
        assert_eq!(record.articles[0].kind, ArticleKind::Awning);
        assert_eq!(record.articles[1].rest["total"], json!(10.5));
        assert!(record.articles[1].config.is_none());

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["type"], json!("budget"));
        assert_eq!(back["articles"][0]["units"], json!(1));
        assert_eq!(back["articles"][0]["config"]["f1"], json!("120"));
    }

    #[test]
    fn rejects_unknown_type() {
        let err = serde_json::from_value::<RequestRecord>(json!({ "type": "invoice" }));
        assert!(err.is_err());
    }
}
