use std::sync::Arc;
use szkolnik::api::{self, app_state::AppState};
use szkolnik::cache::spawn_sweeper;
use szkolnik::config::loader::ConfigLoader;
use szkolnik::observability::{
    AppMetrics, HealthCheckResult, ObservabilityState, create_observability_router, init_tracing,
    metrics_middleware,
};
use szkolnik::search::filter::SchoolPredicate;
use szkolnik::security::auth::JwtIdentityResolver;
use szkolnik::security::quota::SearchQuota;
use szkolnik::storage::repository::{FavoriteRepository, SchoolRepository, SearchAnalytics};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("szkolnik");

    info!("Starting Szkolnik...");

    let config = ConfigLoader::load()?;
    ConfigLoader::validate(&config)?;
    info!("Configuration loaded successfully");

    let (school_repository, favorite_repository, search_analytics) = create_storage(&config).await?;
    info!("Repositories initialized");

    // 启动期探测存储连通性，结果进入 /health
    let probe_start = std::time::Instant::now();
    let storage_check = match school_repository.count(&SchoolPredicate::default()).await {
        Ok(_) => HealthCheckResult {
            name: "storage".to_string(),
            healthy: true,
            message: "reachable".to_string(),
            latency_ms: probe_start.elapsed().as_millis() as u64,
        },
        Err(e) => HealthCheckResult {
            name: "storage".to_string(),
            healthy: false,
            message: e.to_string(),
            latency_ms: probe_start.elapsed().as_millis() as u64,
        },
    };

    let search_quota = if config.quota.enabled {
        SearchQuota::production(config.quota.daily_limit)
    } else {
        SearchQuota::development()
    };

    let identity_resolver = Box::new(JwtIdentityResolver::new(
        &config.security.jwt_secret,
        config.security.api_keys.clone(),
    ));

    let metrics = Arc::new(AppMetrics::default());

    let app_state = AppState::new(
        school_repository,
        favorite_repository,
        search_analytics,
        search_quota,
        identity_resolver,
        config.search.clone(),
        config.cache.clone(),
        &config.server,
        Arc::clone(&metrics),
    );
    info!("Application state created");

    // 后台定期清理过期缓存条目
    if config.cache.sweep_interval_seconds > 0 {
        spawn_sweeper(
            Arc::clone(&app_state.search_cache),
            config.cache.sweep_interval_seconds,
        );
        info!(
            interval = config.cache.sweep_interval_seconds,
            "Cache sweeper started"
        );
    }

    // 创建可观测性状态并集成路由（与请求层共享同一份指标）
    let observability_state = Arc::new(ObservabilityState::with_metrics(
        env!("CARGO_PKG_VERSION").to_string(),
        metrics,
    ));
    observability_state.add_health_check(storage_check).await;

    let api_router = api::create_router(app_state);
    let router = create_observability_router(Arc::clone(&observability_state))
        .merge(api_router)
        .layer(axum::middleware::from_fn_with_state(
            observability_state,
            metrics_middleware,
        ));
    info!("API router created with observability endpoints");

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// 按编译特性选择存储后端：默认 SurrealDB，关闭特性时退化为进程内存储
#[cfg(feature = "surrealdb")]
async fn create_storage(
    config: &szkolnik::config::config::AppConfig,
) -> anyhow::Result<(
    Arc<dyn SchoolRepository>,
    Arc<dyn FavoriteRepository>,
    Arc<dyn SearchAnalytics>,
)> {
    use szkolnik::storage::surreal_repository::{
        SurrealFavoriteRepository, SurrealSchoolRepository, SurrealSearchAnalytics,
    };
    use szkolnik::storage::surrealdb::SurrealPool;

    let db_pool = SurrealPool::new(config.database.clone()).await?;
    info!("Database connection pool initialized");

    Ok((
        Arc::new(SurrealSchoolRepository::new(db_pool.clone())),
        Arc::new(SurrealFavoriteRepository::new(db_pool.clone())),
        Arc::new(SurrealSearchAnalytics::new(db_pool)),
    ))
}

#[cfg(not(feature = "surrealdb"))]
async fn create_storage(
    _config: &szkolnik::config::config::AppConfig,
) -> anyhow::Result<(
    Arc<dyn SchoolRepository>,
    Arc<dyn FavoriteRepository>,
    Arc<dyn SearchAnalytics>,
)> {
    use szkolnik::storage::memory::{
        InMemoryFavoriteRepository, InMemorySchoolRepository, InMemorySearchAnalytics,
    };

    info!("SurrealDB feature disabled, using in-memory storage");

    Ok((
        Arc::new(InMemorySchoolRepository::new()),
        Arc::new(InMemoryFavoriteRepository::new()),
        Arc::new(InMemorySearchAnalytics::new()),
    ))
}
