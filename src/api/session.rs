//! 会话解析与 cookie 工具

use axum::{
    extract::{FromRequestParts, Query},
    http::{header, request::Parts, HeaderMap, HeaderValue},
    response::Response,
};
use std::collections::HashMap;
use std::sync::Arc;

use crate::api::AppState;
use crate::auth::resolve_client_context;
use crate::delfos::{DelfosSession, DELFOS_COOKIE, DELFOS_COOKIE_MAX_AGE};
use crate::error::ApiError;
use crate::models::{AuthUser, ClientContext};

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const NOT_LOGGED_IN: &str = "You are not logged in.";

/// 读取 Cookie 头中的某个值
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// 访问令牌: 优先 cookie, 其次 Bearer
pub fn access_token(headers: &HeaderMap) -> Option<String> {
    cookie_value(headers, ACCESS_TOKEN_COOKIE).or_else(|| bearer_token(headers))
}

pub fn session_cookie(name: &str, value: &str, max_age: u64) -> String {
    format!("{}={}; HttpOnly; Path=/; Max-Age={}; SameSite=Lax", name, value, max_age)
}

pub fn expired_cookie(name: &str) -> String {
    format!("{}=; HttpOnly; Path=/; Max-Age=0; SameSite=Lax", name)
}

pub fn append_set_cookie(response: &mut Response, cookie: &str) {
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(e) => tracing::warn!("Dropping malformed cookie: {}", e),
    }
}

/// Delfos 令牌在本次请求中被刷新时写回 cookie
pub fn with_delfos_cookie(mut response: Response, delfos: &DelfosSession) -> Response {
    if let Some(token) = delfos.refreshed_token() {
        append_set_cookie(&mut response, &session_cookie(DELFOS_COOKIE, token, DELFOS_COOKIE_MAX_AGE));
    }
    response
}

/// 已登录用户
#[derive(Debug, Clone)]
pub struct Session {
    pub user: AuthUser,
    pub access_token: String,
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let token = access_token(&parts.headers).ok_or_else(|| ApiError::Unauthorized(NOT_LOGGED_IN.to_string()))?;
        match state.auth.get_user(&token).await {
            Ok(user) => Ok(Session {
                user,
                access_token: token,
            }),
            Err(e) => {
                tracing::debug!("Session rejected: {}", e);
                Err(ApiError::Unauthorized(NOT_LOGGED_IN.to_string()))
            }
        }
    }
}

/// 已登录用户 + 解析后的客户上下文 (`?clientNumber=` 代客操作)
#[derive(Debug, Clone)]
pub struct ClientSession(pub ClientContext);

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for ClientSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await?;
        let query = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
            .map(|Query(q)| q)
            .unwrap_or_default();
        let override_number = query.get("clientNumber").map(String::as_str);
        let ctx = resolve_client_context(state.auth.as_ref(), session.user, override_number).await;
        Ok(ClientSession(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.append(
                header::HeaderName::from_bytes(k.as_bytes()).unwrap(),
                HeaderValue::from_str(v).unwrap(),
            );
        }
        map
    }

    #[test]
    fn reads_cookie_then_bearer() {
        let h = headers(&[("cookie", "theme=dark; access_token=abc; delfos_token=xyz")]);
        assert_eq!(access_token(&h).as_deref(), Some("abc"));
        assert_eq!(cookie_value(&h, "delfos_token").as_deref(), Some("xyz"));

        let h = headers(&[("authorization", "Bearer tok")]);
        assert_eq!(access_token(&h).as_deref(), Some("tok"));

        let h = headers(&[("cookie", "access_token="), ("authorization", "Basic x")]);
        assert_eq!(access_token(&h), None);
    }

    #[test]
    fn cookie_strings() {
        assert_eq!(
            session_cookie("delfos_token", "t1", 3600),
            "delfos_token=t1; HttpOnly; Path=/; Max-Age=3600; SameSite=Lax"
        );
        assert!(expired_cookie("access_token").contains("Max-Age=0"));
    }
}
