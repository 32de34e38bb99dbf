use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::pricing::DiscountTiers;

/// 认证服务中的角色
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Client,
    Worker,
    AdvancedWorker,
    Other(String),
}

impl Role {
    pub fn parse(role: &str) -> Self {
        match role {
            "lonper_client" => Role::Client,
            "lonper_worker" => Role::Worker,
            "lonper_worker_advanced" => Role::AdvancedWorker,
            other => Role::Other(other.to_string()),
        }
    }
}

/// 客户商务数据 (user_metadata.commercialData)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommercialData {
    #[serde(default)]
    pub client_number: Option<i64>,
    #[serde(default)]
    pub commercial_desc: Option<String>,
    #[serde(default)]
    pub commercial_discount1: f64,
    #[serde(default)]
    pub commercial_discount2: f64,
    #[serde(default)]
    pub commercial_discount3: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CommercialData {
    pub fn account_tiers(&self) -> DiscountTiers {
        DiscountTiers::from_f64([
            self.commercial_discount1,
            self.commercial_discount2,
            self.commercial_discount3,
        ])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commercial_data: Option<CommercialData>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 认证服务返回的用户
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub user_metadata: UserMetadata,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AuthUser {
    pub fn role(&self) -> Role {
        Role::parse(&self.role)
    }

    pub fn commercial_data(&self) -> Option<&CommercialData> {
        self.user_metadata.commercial_data.as_ref()
    }

    pub fn client_number(&self) -> Option<i64> {
        self.commercial_data().and_then(|c| c.client_number)
    }
}

/// 单次请求的客户上下文, 显式传入计算函数
#[derive(Debug, Clone)]
pub struct ClientContext {
    pub user: AuthUser,
    pub commercial: CommercialData,
}

impl ClientContext {
    pub fn client_number(&self) -> Option<i64> {
        self.commercial.client_number
    }
}
