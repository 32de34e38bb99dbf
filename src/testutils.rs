//! 测试用内存实现

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::auth::{AuthError, AuthProvider, AuthSession};
use crate::db::rows::{text_of, Row};
use crate::delfos::DelfosError;
use crate::error::StoreError;
use crate::models::{AuthUser, ClientContext, DiscountTiers, FieldMapping};
use crate::service::{
    AwningPriceSource, ConfigLinkStore, DiscountSource, FieldMappingSource, OrderForwarder, RequestStore,
};

pub fn auth_user(id: &str, role: &str, client_number: Option<i64>, desc: &str) -> AuthUser {
    serde_json::from_value(json!({
        "id": id,
        "email": format!("{}@lonper.test", id),
        "role": role,
        "user_metadata": {
            "commercialData": {
                "clientNumber": client_number,
                "commercialDesc": desc,
                "commercialDiscount1": 0,
                "commercialDiscount2": 0,
                "commercialDiscount3": 0
            }
        }
    }))
    .unwrap()
}

pub fn client_context(role: &str, client_number: i64, desc: &str) -> ClientContext {
    let user = auth_user("u-ctx", role, Some(client_number), desc);
    let commercial = user.commercial_data().cloned().unwrap();
    ClientContext { user, commercial }
}

#[derive(Default)]
pub struct FakeStore {
    family_tiers: Mutex<HashMap<(i64, String), DiscountTiers>>,
    discount_lookups_fail: AtomicBool,
    requests: Mutex<Vec<Row>>,
    writes_fail: AtomicBool,
    duplicate_ids_rejected: AtomicBool,
    mappings: Mutex<Vec<FieldMapping>>,
    tarp_classes: Mutex<HashMap<String, String>>,
    awning_rates: Mutex<HashMap<(String, String), BigDecimal>>,
    surcharges: Mutex<HashMap<(String, String), BigDecimal>>,
    links: Mutex<Vec<(String, String)>>,
    failing_unlinks: Mutex<HashSet<String>>,
    links_fail: AtomicBool,
    subconfigs: Mutex<Vec<Row>>,
    deleted_subconfigs: Mutex<Vec<String>>,
}

/// JSON 标识的文本形式
fn key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl FakeStore {
    pub fn set_family_tiers(&self, client_number: i64, family: &str, tiers: DiscountTiers) {
        self.family_tiers
            .lock()
            .unwrap()
            .insert((client_number, family.to_string()), tiers);
    }

    pub fn fail_discount_lookups(&self) {
        self.discount_lookups_fail.store(true, Ordering::SeqCst);
    }

    pub fn fail_writes(&self) {
        self.writes_fail.store(true, Ordering::SeqCst);
    }

    pub fn reject_duplicate_ids(&self) {
        self.duplicate_ids_rejected.store(true, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<Row> {
        self.requests.lock().unwrap().clone()
    }

    pub fn add_field_mapping(&self, field_id: &str, external_id: Option<&str>, save_on_request: bool) {
        self.mappings.lock().unwrap().push(FieldMapping {
            field_id: field_id.to_string(),
            external_id: external_id.map(str::to_string),
            save_on_request,
        });
    }

    pub fn set_tarp_class(&self, article: &str, class: &str) {
        self.tarp_classes
            .lock()
            .unwrap()
            .insert(article.to_string(), class.to_string());
    }

    pub fn set_awning_rate(&self, model: &str, class: &str, rate: BigDecimal) {
        self.awning_rates
            .lock()
            .unwrap()
            .insert((model.to_string(), class.to_string()), rate);
    }

    pub fn set_color_surcharge(&self, model: &str, color: &str, percentage: BigDecimal) {
        self.surcharges
            .lock()
            .unwrap()
            .insert((model.to_string(), color.to_string()), percentage);
    }

    pub fn add_link(&self, awning_id: &str, config_id: &str) {
        self.links
            .lock()
            .unwrap()
            .push((awning_id.to_string(), config_id.to_string()));
    }

    pub fn links(&self) -> Vec<(String, String)> {
        self.links.lock().unwrap().clone()
    }

    pub fn fail_unlink_of(&self, config_id: &str) {
        self.failing_unlinks.lock().unwrap().insert(config_id.to_string());
    }

    pub fn fail_links(&self) {
        self.links_fail.store(true, Ordering::SeqCst);
    }

    pub fn add_subconfig(&self, config_id: &str, mut row: Row) {
        row.insert("FIELD_CONFIG_ID".to_string(), json!(config_id));
        self.subconfigs.lock().unwrap().push(row);
    }

    pub fn subconfigs(&self) -> Vec<Row> {
        self.subconfigs.lock().unwrap().clone()
    }

    pub fn deleted_subconfigs(&self) -> Vec<String> {
        self.deleted_subconfigs.lock().unwrap().clone()
    }

    fn check_writes(&self) -> Result<(), StoreError> {
        if self.writes_fail.load(Ordering::SeqCst) {
            return Err(StoreError::MalformedRow("write rejected by fake store".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DiscountSource for FakeStore {
    async fn client_family_tiers(
        &self,
        client_number: i64,
        family_code: &str,
    ) -> Result<Option<DiscountTiers>, StoreError> {
        if self.discount_lookups_fail.load(Ordering::SeqCst) {
            return Err(StoreError::MalformedRow("discount lookup failed".to_string()));
        }
        Ok(self
            .family_tiers
            .lock()
            .unwrap()
            .get(&(client_number, family_code.to_string()))
            .cloned())
    }
}

#[async_trait]
impl RequestStore for FakeStore {
    async fn budget_exists(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self
            .requests
            .lock()
            .unwrap()
            .iter()
            .any(|r| text_of(r, "ID").as_deref() == Some(id) && r.get("TYPE") == Some(&json!("budget"))))
    }

    async fn insert_request(&self, row: &Row) -> Result<(), StoreError> {
        self.check_writes()?;
        let mut requests = self.requests.lock().unwrap();
        let id = text_of(row, "ID");
        if self.duplicate_ids_rejected.load(Ordering::SeqCst)
            && id.is_some()
            && requests.iter().any(|r| text_of(r, "ID") == id)
        {
            return Err(StoreError::MalformedRow("duplicate key".to_string()));
        }
        requests.push(row.clone());
        Ok(())
    }

    async fn update_request(&self, id: &str, row: &Row) -> Result<(), StoreError> {
        self.check_writes()?;
        let mut requests = self.requests.lock().unwrap();
        for existing in requests.iter_mut() {
            if text_of(existing, "ID").as_deref() == Some(id) {
                *existing = row.clone();
            }
        }
        Ok(())
    }
}

#[async_trait]
impl FieldMappingSource for FakeStore {
    async fn field_mappings(&self, field_ids: &[String]) -> Result<Vec<FieldMapping>, StoreError> {
        Ok(self
            .mappings
            .lock()
            .unwrap()
            .iter()
            .filter(|m| field_ids.contains(&m.field_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AwningPriceSource for FakeStore {
    async fn tarp_rate_class(&self, tarp_article: &str) -> Result<Option<String>, StoreError> {
        Ok(self.tarp_classes.lock().unwrap().get(tarp_article).cloned())
    }

    async fn closest_awning(
        &self,
        model: &str,
        rate_class: &str,
        line: i64,
        exit: i64,
    ) -> Result<Option<Row>, StoreError> {
        let rate = self
            .awning_rates
            .lock()
            .unwrap()
            .get(&(model.to_string(), rate_class.to_string()))
            .cloned();
        Ok(rate.map(|rate| {
            let row = json!({
                "MODEL": model,
                "TARP": rate_class,
                "LINE": line,
                "EXIT": exit,
                "RATE": rate.to_string(),
            });
            row.as_object().cloned().unwrap_or_default()
        }))
    }

    async fn awning_rate(
        &self,
        model: &str,
        rate_class: &str,
        _line: i64,
        _exit: i64,
    ) -> Result<Option<BigDecimal>, StoreError> {
        Ok(self
            .awning_rates
            .lock()
            .unwrap()
            .get(&(model.to_string(), rate_class.to_string()))
            .cloned())
    }

    async fn color_surcharge(&self, model: &str, color: &str) -> Result<Option<BigDecimal>, StoreError> {
        Ok(self
            .surcharges
            .lock()
            .unwrap()
            .get(&(model.to_string(), color.to_string()))
            .cloned())
    }
}

#[async_trait]
impl ConfigLinkStore for FakeStore {
    async fn link_config(&self, awning_id: &Value, config_id: &Value) -> Result<(), StoreError> {
        if self.links_fail.load(Ordering::SeqCst) {
            return Err(StoreError::MalformedRow("link rejected".to_string()));
        }
        self.links.lock().unwrap().push((key(awning_id), key(config_id)));
        Ok(())
    }

    async fn unlink_config(&self, awning_id: &Value, config_id: &Value) -> Result<(), StoreError> {
        let config_id = key(config_id);
        if self.failing_unlinks.lock().unwrap().contains(&config_id) {
            return Err(StoreError::MalformedRow(format!("unlink of {} rejected", config_id)));
        }
        let awning_id = key(awning_id);
        self.links
            .lock()
            .unwrap()
            .retain(|(a, c)| !(a == &awning_id && c == &config_id));
        Ok(())
    }

    async fn subconfig_ids(&self, config_id: &Value) -> Result<Vec<String>, StoreError> {
        let config_id = key(config_id);
        Ok(self
            .subconfigs
            .lock()
            .unwrap()
            .iter()
            .filter(|r| text_of(r, "FIELD_CONFIG_ID").as_deref() == Some(config_id.as_str()))
            .filter_map(|r| text_of(r, "ID"))
            .collect())
    }

    async fn insert_subconfig(&self, row: Row) -> Result<(), StoreError> {
        let mut rows = self.subconfigs.lock().unwrap();
        let id = text_of(&row, "ID");
        if id.is_some() && rows.iter().any(|r| text_of(r, "ID") == id) {
            return Err(StoreError::MalformedRow("duplicate key".to_string()));
        }
        rows.push(row);
        Ok(())
    }

    async fn update_subconfig(&self, id: &Value, row: &Row) -> Result<(), StoreError> {
        let id = key(id);
        let mut rows = self.subconfigs.lock().unwrap();
        for existing in rows.iter_mut() {
            if text_of(existing, "ID").as_deref() == Some(id.as_str()) {
                existing.extend(row.clone());
            }
        }
        Ok(())
    }

    async fn delete_subconfig(&self, id: &str) -> Result<(), StoreError> {
        self.subconfigs
            .lock()
            .unwrap()
            .retain(|r| text_of(r, "ID").as_deref() != Some(id));
        self.deleted_subconfigs.lock().unwrap().push(id.to_string());
        Ok(())
    }
}

/// 记录转发的订单
#[derive(Default)]
pub struct RecordingForwarder {
    pub orders: Vec<Value>,
    fail: bool,
}

impl RecordingForwarder {
    pub fn failing() -> Self {
        RecordingForwarder {
            orders: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl OrderForwarder for RecordingForwarder {
    async fn forward_order(&mut self, order: &Value) -> Result<Value, DelfosError> {
        if self.fail {
            return Err(DelfosError::Status {
                status: 500,
                body: "pedido rechazado".to_string(),
            });
        }
        self.orders.push(order.clone());
        Ok(json!({ "ok": true }))
    }
}

/// 令牌 -> 用户 的内存认证服务
#[derive(Default)]
pub struct FakeAuth {
    users: Vec<AuthUser>,
    sessions: Mutex<HashMap<String, AuthUser>>,
    passwords: Mutex<HashMap<String, String>>,
    listing_fails: AtomicBool,
    list_calls: AtomicUsize,
}

impl FakeAuth {
    pub fn with_users(users: Vec<AuthUser>) -> Self {
        FakeAuth {
            users,
            ..Default::default()
        }
    }

    pub fn with_session(self, token: &str, user: AuthUser) -> Self {
        self.sessions.lock().unwrap().insert(token.to_string(), user);
        self
    }

    pub fn with_password(self, email: &str, password: &str) -> Self {
        self.passwords
            .lock()
            .unwrap()
            .insert(email.to_string(), password.to_string());
        self
    }

    pub fn fail_listing(&self) {
        self.listing_fails.store(true, Ordering::SeqCst);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthProvider for FakeAuth {
    async fn get_user(&self, access_token: &str) -> Result<AuthUser, AuthError> {
        self.sessions
            .lock()
            .unwrap()
            .get(access_token)
            .cloned()
            .ok_or_else(|| AuthError::InvalidCredentials("invalid JWT".to_string()))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let known = self.passwords.lock().unwrap().get(email).cloned();
        if known.as_deref() != Some(password) {
            return Err(AuthError::InvalidCredentials("Invalid login credentials".to_string()));
        }
        let user = auth_user("signed-in", "lonper_client", Some(42), "Toldos Norte");
        let token = format!("token-{}", email);
        self.sessions.lock().unwrap().insert(token.clone(), user.clone());
        Ok(AuthSession {
            access_token: token,
            expires_in: Some(3600),
            user,
        })
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        self.sessions.lock().unwrap().remove(access_token);
        Ok(())
    }

    async fn send_password_reset(&self, _email: &str) -> Result<(), AuthError> {
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<AuthUser>, AuthError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.listing_fails.load(Ordering::SeqCst) {
            return Err(AuthError::Status {
                status: 500,
                body: "admin api unavailable".to_string(),
            });
        }
        Ok(self.users.clone())
    }
}
