use lonper_api::auth::SupabaseAuth;
use lonper_api::db::PgStore;
use lonper_api::delfos::DelfosClient;
use lonper_api::{build_router, create_pool, AppConfig, AppState};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt::time::ChronoLocal, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 日志: 本地时间, 级别由 RUST_LOG 控制 (默认 info)
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .with_level(true)
        .init();

    // 加载配置
    let config = AppConfig::load()?;
    info!("Starting server with config: {:?}", config);

    // 创建数据库连接池
    let pool = create_pool(&config.database).await?;
    info!("Database pool created");

    let state = AppState {
        store: PgStore::new(pool),
        auth: Arc::new(SupabaseAuth::new(&config.auth)),
        delfos: DelfosClient::new(&config.delfos),
        config: config.clone(),
    };
    let app = build_router(Arc::new(state));

    // 启动服务器
    let addr = config.listen_addr();
    info!("Server listening on {}", addr);
    info!("API Endpoints: GET /health, /v3/*");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
