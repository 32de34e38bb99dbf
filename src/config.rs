use serde::{Deserialize, Serialize};

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub delfos: DelfosConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// 外部认证服务 (Supabase GoTrue)
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub url: String,
    pub anon_key: String,
    pub service_role_key: String,
}

/// Delfos ERP 连接信息
#[derive(Clone, Serialize, Deserialize)]
pub struct DelfosConfig {
    pub base_url: String,
    pub user: String,
    pub password: String,
}

/// `/db-select` 允许查询的表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub tables: Vec<String>,
}

// 密钥不进日志
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("url", &self.url)
            .field("anon_key", &"***")
            .field("service_role_key", &"***")
            .finish()
    }
}

impl std::fmt::Debug for DelfosConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelfosConfig")
            .field("base_url", &self.base_url)
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: "postgres://localhost/lonper".to_string(),
                max_connections: 20,
            },
            auth: AuthConfig {
                url: "http://localhost:54321".to_string(),
                anon_key: String::new(),
                service_role_key: String::new(),
            },
            delfos: DelfosConfig {
                base_url: "http://localhost:8090".to_string(),
                user: String::new(),
                password: String::new(),
            },
            search: SearchConfig {
                tables: vec![
                    "ARTICLES".to_string(),
                    "AWNINGS_MODELS".to_string(),
                    "COLOR_SURCHAGES".to_string(),
                ],
            },
        }
    }
}

/// 传统环境变量 -> 配置键
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("SERVER_HOST", "server.host"),
    ("SERVER_PORT", "server.port"),
    ("DATABASE_URL", "database.url"),
    ("SUPABASE_URL", "auth.url"),
    ("SUPABASE_ANON_KEY", "auth.anon_key"),
    ("SUPABASE_SERVICE_ROLE_KEY", "auth.service_role_key"),
    ("DELFOS_BASE_URL", "delfos.base_url"),
    ("DELFOS_USER", "delfos.user"),
    ("DELFOS_PASSWORD", "delfos.password"),
];

impl AppConfig {
    /// 加载配置: 默认值 -> config/lonper.toml (可选) -> LONPER__* -> 传统环境变量
    pub fn load() -> Result<Self, config::ConfigError> {
        let defaults = config::Config::try_from(&AppConfig::default())?;

        let mut builder = config::Config::builder()
            .add_source(defaults)
            .add_source(config::File::with_name("config/lonper").required(false))
            .add_source(config::Environment::with_prefix("LONPER").separator("__"));

        for (var, key) in ENV_OVERRIDES {
            builder = builder.set_override_option(*key, std::env::var(var).ok())?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
