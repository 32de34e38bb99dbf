//! Delfos ERP 客户端
//!
//! 令牌通过 `delfos_token` cookie 在请求之间传递, 进程内不缓存.
//! 收到 401 时重新登录一次并重试一次.

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::DelfosConfig;
use crate::service::OrderForwarder;

pub const DELFOS_COOKIE: &str = "delfos_token";
pub const DELFOS_COOKIE_MAX_AGE: u64 = 60 * 60;

/// 订单接口路径
const ORDERS_PATH: &str = "pedidos";

#[derive(Error, Debug)]
pub enum DelfosError {
    #[error("Delfos rejected credentials: {0}")]
    InvalidCredentials(String),

    #[error("Delfos returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Delfos session still unauthorized after re-login")]
    Unauthorized,

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid Delfos response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    usuario: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Deserialize)]
struct LoginErrorResponse {
    #[serde(default)]
    error: Option<String>,
}

#[derive(Clone)]
pub struct DelfosClient {
    client: reqwest::Client,
    base_url: String,
    user: String,
    password: String,
}

impl DelfosClient {
    pub fn new(config: &DelfosConfig) -> Self {
        DelfosClient {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            user: config.user.clone(),
            password: config.password.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn login(&self) -> Result<String, DelfosError> {
        let response = self
            .client
            .post(self.url("login"))
            .json(&LoginRequest {
                usuario: &self.user,
                password: &self.password,
            })
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(response.json::<LoginResponse>().await?.token),
            StatusCode::UNAUTHORIZED => {
                let message = response
                    .json::<LoginErrorResponse>()
                    .await
                    .ok()
                    .and_then(|body| body.error)
                    .unwrap_or_else(|| "Invalid credentials".to_string());
                Err(DelfosError::InvalidCredentials(message))
            }
            status => Err(DelfosError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }

    /// 以 cookie 中的令牌 (可能缺失) 开始一次会话
    pub fn session(&self, token: Option<String>) -> DelfosSession {
        DelfosSession {
            client: self.clone(),
            token,
            refreshed: false,
        }
    }
}

/// 单个入站请求内的 Delfos 会话
pub struct DelfosSession {
    client: DelfosClient,
    token: Option<String>,
    refreshed: bool,
}

enum Attempt {
    Done(Value),
    Unauthorized,
}

impl DelfosSession {
    pub async fn get(&mut self, path: &str) -> Result<Value, DelfosError> {
        self.send(Method::GET, path, None).await
    }

    pub async fn post(&mut self, path: &str, body: &Value) -> Result<Value, DelfosError> {
        self.send(Method::POST, path, Some(body)).await
    }

    /// 本次会话中登录得到的新令牌, 需要写回 cookie
    pub fn refreshed_token(&self) -> Option<&str> {
        if self.refreshed {
            self.token.as_deref()
        } else {
            None
        }
    }

    async fn relogin(&mut self) -> Result<String, DelfosError> {
        let token = self.client.login().await?;
        self.token = Some(token.clone());
        self.refreshed = true;
        Ok(token)
    }

    async fn send(&mut self, method: Method, path: &str, body: Option<&Value>) -> Result<Value, DelfosError> {
        let token = match self.token.clone() {
            Some(token) => token,
            None => self.relogin().await?,
        };

        if let Attempt::Done(value) = self.attempt(method.clone(), path, body, &token).await? {
            return Ok(value);
        }

        tracing::info!("Delfos token rejected for {} {}, logging in again", method, path);
        let token = self.relogin().await?;
        match self.attempt(method, path, body, &token).await? {
            Attempt::Done(value) => Ok(value),
            Attempt::Unauthorized => Err(DelfosError::Unauthorized),
        }
    }

    async fn attempt(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        token: &str,
    ) -> Result<Attempt, DelfosError> {
        let mut request = self
            .client
            .client
            .request(method, self.client.url(path))
            .bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;

        match response.status() {
            StatusCode::UNAUTHORIZED => Ok(Attempt::Unauthorized),
            status if status.is_success() => {
                let bytes = response.bytes().await?;
                if bytes.is_empty() {
                    Ok(Attempt::Done(Value::Null))
                } else {
                    Ok(Attempt::Done(serde_json::from_slice(&bytes)?))
                }
            }
            status => Err(DelfosError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }
}

#[async_trait]
impl OrderForwarder for DelfosSession {
    async fn forward_order(&mut self, order: &Value) -> Result<Value, DelfosError> {
        self.post(ORDERS_PATH, order).await
    }
}
