use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use sqlx::Executor;
use sqlx::postgres::PgPoolOptions;
use storefront::{
    AppState,
    config::Config,
    middleware::{RateLimiter, log_errors, rate_limit},
    routes::{self, auth::User},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");

    #[cfg(debug_assertions)]
    tracing::info!("Running in debug mode with permissive CORS");

    #[cfg(not(debug_assertions))]
    tracing::info!("Running in production mode, CORS origins: {:?}", config.cors_origins);

    // 设置数据库连接池
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET application_name = 'storefront';").await?;
                Ok(())
            })
        })
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to Postgres");

    // 建表与示例商品
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    // 初始化管理员账号
    if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
        match User::upsert_admin(&pool, email, password).await {
            Ok(admin) => tracing::info!("Admin account ready: {}", admin.email),
            Err(e) => tracing::error!("Failed to seed admin account: {}", e),
        }
    }

    // 设置应用状态
    let state = AppState::new(pool, config.clone());
    let app = routes::router(state).layer(axum::middleware::from_fn(log_errors));

    // 配置了 Redis 才启用限流
    let app = match RateLimiter::from_config(&config) {
        Some(limiter) => {
            tracing::info!(
                "Rate limiting enabled: {} requests per {}s",
                config.rate_limit_requests,
                config.rate_limit_window_secs
            );
            app.layer(axum::middleware::from_fn_with_state(
                Arc::new(limiter),
                rate_limit,
            ))
        }
        None => app,
    };

    // 根据编译模式决定CORS策略
    #[cfg(debug_assertions)]
    let app = app.layer(tower_http::cors::CorsLayer::very_permissive());

    #[cfg(not(debug_assertions))]
    let app = app.layer(storefront::middleware::cors_layer(&config));

    // 启动服务器
    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );
    tracing::info!("Server listening on {}{}", addr, config.api_base_uri);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Failed to start server");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
