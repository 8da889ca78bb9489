use crate::cache::CacheStore;
use crate::config::config::{CacheConfig, SearchConfig, ServerConfig};
use crate::observability::AppMetrics;
use crate::search::service::{CachedSearchPage, SearchService, create_search_service};
use crate::security::auth::{IdentityResolver, JwtIdentityResolver};
use crate::security::quota::SearchQuota;
use crate::storage::repository::{FavoriteRepository, SchoolRepository, SearchAnalytics};
use std::sync::Arc;

/// Application state containing all shared services and security components
#[derive(Clone)]
pub struct AppState {
    /// School repository for directory queries
    pub school_repository: Arc<dyn SchoolRepository>,
    /// Favorite repository for per-user favorite joins
    pub favorite_repository: Arc<dyn FavoriteRepository>,
    /// Search term analytics sink
    pub search_analytics: Arc<dyn SearchAnalytics>,
    /// Shared search result cache
    pub search_cache: Arc<CacheStore<CachedSearchPage>>,
    /// Daily search quota for non-premium callers
    pub search_quota: Arc<SearchQuota>,
    /// Identity resolver for API key and JWT credentials
    pub identity_resolver: Arc<dyn IdentityResolver>,
    /// Search orchestration service
    pub search_service: Arc<dyn SearchService>,
    /// Shared application metrics
    pub metrics: Arc<AppMetrics>,
    /// Cache configuration (TTL 回显到 Cache-Control 头)
    pub cache_config: CacheConfig,
    /// 单个搜索请求的超时上限（秒）
    pub request_timeout: u64,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("school_repository", &"Arc<dyn SchoolRepository>")
            .field("favorite_repository", &"Arc<dyn FavoriteRepository>")
            .field("search_analytics", &"Arc<dyn SearchAnalytics>")
            .field("search_cache", &self.search_cache.stats())
            .field("search_quota", &self.search_quota)
            .field("identity_resolver", &"Arc<dyn IdentityResolver>")
            .field("search_service", &"Arc<dyn SearchService>")
            .field("cache_config", &self.cache_config)
            .finish()
    }
}

impl AppState {
    /// Create new application state
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        school_repository: Arc<dyn SchoolRepository>,
        favorite_repository: Arc<dyn FavoriteRepository>,
        search_analytics: Arc<dyn SearchAnalytics>,
        search_quota: SearchQuota,
        identity_resolver: Box<dyn IdentityResolver>,
        search_config: SearchConfig,
        cache_config: CacheConfig,
        server_config: &ServerConfig,
        metrics: Arc<AppMetrics>,
    ) -> Self {
        let search_cache = Arc::new(CacheStore::new());
        let search_quota = Arc::new(search_quota);

        let search_service = Arc::from(create_search_service(
            Arc::clone(&school_repository),
            Arc::clone(&favorite_repository),
            Arc::clone(&search_analytics),
            Arc::clone(&search_cache),
            Arc::clone(&search_quota),
            search_config,
            &cache_config,
        ));

        Self {
            school_repository,
            favorite_repository,
            search_analytics,
            search_cache,
            search_quota,
            identity_resolver: Arc::from(identity_resolver),
            search_service,
            metrics,
            cache_config,
            request_timeout: server_config.request_timeout.max(1),
        }
    }

    /// Create development application state with default security components
    pub fn development(
        school_repository: Arc<dyn SchoolRepository>,
        favorite_repository: Arc<dyn FavoriteRepository>,
        search_analytics: Arc<dyn SearchAnalytics>,
    ) -> Self {
        let config = crate::config::config::AppConfig::development();

        Self::new(
            school_repository,
            favorite_repository,
            search_analytics,
            SearchQuota::development(),
            Box::new(JwtIdentityResolver::development()),
            config.search,
            config.cache,
            &config.server,
            Arc::new(AppMetrics::default()),
        )
    }
}
