//! 外部认证服务 (Supabase GoTrue)

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::config::AuthConfig;
use crate::models::{AuthUser, ClientContext, Role};

/// admin 用户列表每页条数
const USERS_PER_PAGE: usize = 200;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("auth provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// 登录成功后的会话
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    pub user: AuthUser,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// 用访问令牌换取当前用户; 令牌无效返回 InvalidCredentials
    async fn get_user(&self, access_token: &str) -> Result<AuthUser, AuthError>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError>;
    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError>;
    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError>;
    /// 全部用户 (service role)
    async fn list_users(&self) -> Result<Vec<AuthUser>, AuthError>;
}

#[derive(Deserialize)]
struct UserList {
    #[serde(default)]
    users: Vec<AuthUser>,
}

#[derive(Deserialize)]
struct GoTrueError {
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl GoTrueError {
    fn into_message(self) -> Option<String> {
        self.error_description.or(self.msg).or(self.message)
    }
}

#[derive(Clone)]
pub struct SupabaseAuth {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
    service_role_key: String,
}

impl SupabaseAuth {
    pub fn new(config: &AuthConfig) -> Self {
        SupabaseAuth {
            client: reqwest::Client::new(),
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            service_role_key: config.service_role_key.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    /// 401/400/403/422 视为凭据问题, 其它非 2xx 原样上报
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, AuthError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        match status {
            StatusCode::UNAUTHORIZED
            | StatusCode::BAD_REQUEST
            | StatusCode::FORBIDDEN
            | StatusCode::UNPROCESSABLE_ENTITY => {
                let message = serde_json::from_str::<GoTrueError>(&body)
                    .ok()
                    .and_then(GoTrueError::into_message)
                    .unwrap_or(body);
                Err(AuthError::InvalidCredentials(message))
            }
            _ => Err(AuthError::Status {
                status: status.as_u16(),
                body,
            }),
        }
    }
}

#[async_trait]
impl AuthProvider for SupabaseAuth {
    async fn get_user(&self, access_token: &str) -> Result<AuthUser, AuthError> {
        let response = self
            .client
            .get(self.url("user"))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let response = self
            .client
            .post(self.url("token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let response = self
            .client
            .post(self.url("logout"))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let response = self
            .client
            .post(self.url("recover"))
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<AuthUser>, AuthError> {
        let mut users = Vec::new();
        let mut page = 1usize;
        loop {
            let response = self
                .client
                .get(self.url("admin/users"))
                .query(&[("page", page), ("per_page", USERS_PER_PAGE)])
                .header("apikey", &self.service_role_key)
                .bearer_auth(&self.service_role_key)
                .send()
                .await?;
            let batch = Self::check(response).await?.json::<UserList>().await?.users;
            let last = batch.len() < USERS_PER_PAGE;
            users.extend(batch);
            if last {
                return Ok(users);
            }
            page += 1;
        }
    }
}

/// 角色为 lonper_client 的用户
pub fn client_users(users: Vec<AuthUser>) -> impl Iterator<Item = AuthUser> {
    users.into_iter().filter(|u| u.role() == Role::Client)
}

/// 解析本次请求的客户上下文
///
/// 高级员工可以用 `clientNumber` 查询参数代某个客户操作; 找不到该客户或查询失败时
/// 使用调用者自己的商务数据.
pub async fn resolve_client_context<P>(
    provider: &P,
    user: AuthUser,
    client_number_override: Option<&str>,
) -> ClientContext
where
    P: AuthProvider + ?Sized,
{
    let own = user.commercial_data().cloned().unwrap_or_default();

    let requested = match client_number_override.map(str::trim).map(str::parse::<i64>) {
        Some(Ok(n)) if user.role() == Role::AdvancedWorker => n,
        _ => return ClientContext { user, commercial: own },
    };

    let commercial = match provider.list_users().await {
        Ok(users) => client_users(users)
            .find(|u| u.client_number() == Some(requested))
            .and_then(|u| u.user_metadata.commercial_data)
            .unwrap_or(own),
        Err(e) => {
            tracing::warn!("Failed to list users for client {}: {}", requested, e);
            own
        }
    };
    ClientContext { user, commercial }
}
