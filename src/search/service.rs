//! 搜索编排服务
//!
//! 每个请求走一遍状态机，无重试（搜索只读且幂等，失败直接上抛）：
//! 归一化 → 配额 → 缓存查找 → (未命中时) 编译 + 并发取页与计数 + 富化 →
//! 缓存写入 → 排序/后置过滤 → 收藏批量联接 → 分离的分析任务 → 组装响应。
//!
//! 缓存键由规范化查询决定，不含任何调用者身份字段，一份缓存服务所有
//! 用户；收藏在缓存命中之后按身份联接。并发的重复缓存填充是无害竞争
//! （幂等重算，至多浪费一次存储查询），因此不做 single-flight 协调。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cache::CacheStore;
use crate::config::config::{CacheConfig, SearchConfig};
use crate::error::{AppError, Result};
use crate::search::enrich::{EnrichedResult, enrich_page};
use crate::search::filter::compile;
use crate::search::query::{RawSearchParams, SearchQuery, SortBy, SortOrder, normalize};
use crate::search::rank;
use crate::security::auth::CallerIdentity;
use crate::security::quota::{QuotaClient, QuotaDecision, SearchQuota};
use crate::storage::repository::{FavoriteRepository, SchoolRepository, SearchAnalytics};

/// 缓存标签
pub const TAG_SCHOOLS: &str = "schools";
pub const TAG_SEARCH: &str = "search";

/// 缓存命中情况（映射到 X-Cache 响应头）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    Hit,
    Miss,
}

impl CacheOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheOutcome::Hit => "HIT",
            CacheOutcome::Miss => "MISS",
        }
    }
}

/// 缓存载荷：富化完成、尚未联接身份字段的一页结果
///
/// 不得包含 is_favorite 等调用者相关字段（缓存中恒为 None）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedSearchPage {
    pub schools: Vec<EnrichedResult>,
    pub total_count: u64,
}

/// 分页信息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
    pub total_count: u64,
    pub total_pages: u64,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

impl Pagination {
    pub fn new(page: usize, limit: usize, total_count: u64) -> Self {
        let total_pages = total_count.div_ceil(limit as u64);
        Self {
            page,
            limit,
            total_count,
            total_pages,
            has_next_page: (page as u64) < total_pages,
            has_previous_page: page > 1,
        }
    }
}

/// 排序信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortInfo {
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
}

/// 查询回显
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchInfo {
    pub query: Option<String>,
    pub filters: SearchQuery,
    pub sort: SortInfo,
}

/// 一次搜索的完整产出
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub schools: Vec<EnrichedResult>,
    pub pagination: Pagination,
    pub search_info: SearchInfo,
    pub cache: CacheOutcome,
}

/// 由规范化查询派生确定性缓存键
///
/// SearchQuery 按构造就不含身份字段，序列化结果可直接作哈希输入。
pub fn cache_key(query: &SearchQuery) -> String {
    // 缓存是纯优化层：序列化失败退化为空输入（等价于一次未命中共享）
    let bytes = serde_json::to_vec(query).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    format!("search:{}", hex::encode(hasher.finalize()))
}

#[async_trait]
pub trait SearchService: Send + Sync {
    /// 执行一次搜索
    ///
    /// `identity` 为 None 时表示匿名调用者；`quota_client` 是配额主体
    /// （已登录取 subject，匿名取客户端 IP）。
    async fn search(
        &self,
        raw: &RawSearchParams,
        identity: Option<&CallerIdentity>,
        quota_client: &QuotaClient,
    ) -> Result<SearchOutcome>;
}

pub struct SearchServiceImpl {
    schools: Arc<dyn SchoolRepository>,
    favorites: Arc<dyn FavoriteRepository>,
    analytics: Arc<dyn SearchAnalytics>,
    cache: Arc<CacheStore<CachedSearchPage>>,
    quota: Arc<SearchQuota>,
    search_config: SearchConfig,
    cache_ttl_seconds: u64,
}

impl SearchServiceImpl {
    pub fn new(
        schools: Arc<dyn SchoolRepository>,
        favorites: Arc<dyn FavoriteRepository>,
        analytics: Arc<dyn SearchAnalytics>,
        cache: Arc<CacheStore<CachedSearchPage>>,
        quota: Arc<SearchQuota>,
        search_config: SearchConfig,
        cache_config: &CacheConfig,
    ) -> Self {
        Self {
            schools,
            favorites,
            analytics,
            cache,
            quota,
            search_config,
            cache_ttl_seconds: cache_config.ttl_seconds,
        }
    }

    async fn fetch_and_enrich(&self, query: &SearchQuery) -> Result<CachedSearchPage> {
        let (predicate, ordering) = compile(query);
        let start = (query.page - 1) * query.limit;

        // 取页与计数是相互独立的读，并发发起
        let (schools, total_count) = tokio::try_join!(
            self.schools
                .find_page(&predicate, ordering.as_ref(), query.limit, start),
            self.schools.count(&predicate),
        )?;

        Ok(CachedSearchPage {
            schools: enrich_page(schools, query.user_location),
            total_count,
        })
    }

    fn record_analytics(&self, term: String, result_count: u64) {
        // 分离任务：不阻塞响应，失败只记日志
        let analytics = Arc::clone(&self.analytics);
        tokio::spawn(async move {
            if let Err(e) = analytics.record_search(&term, result_count).await {
                warn!("search analytics recording failed: {}", e);
            }
        });
    }
}

#[async_trait]
impl SearchService for SearchServiceImpl {
    async fn search(
        &self,
        raw: &RawSearchParams,
        identity: Option<&CallerIdentity>,
        quota_client: &QuotaClient,
    ) -> Result<SearchOutcome> {
        // 1. 归一化；失败立即返回字段级验证错误，不触碰缓存与存储
        let query = normalize(raw, &self.search_config).map_err(AppError::Validation)?;

        // 2. 配额；付费身份绕过，超额时不发起任何存储查询
        let premium = identity.map(|i| i.premium).unwrap_or(false);
        if !premium {
            if let QuotaDecision::Exceeded { retry_after } =
                self.quota.check_and_record(quota_client).await
            {
                return Err(AppError::QuotaExceeded { retry_after });
            }
        }

        // 3-5. 缓存查找；未命中则查询、富化并回填
        let key = cache_key(&query);
        let (payload, cache_outcome) = match self.cache.get(&key) {
            Some(payload) => (payload, CacheOutcome::Hit),
            None => {
                let payload = self.fetch_and_enrich(&query).await?;
                self.cache.set(
                    &key,
                    payload.clone(),
                    self.cache_ttl_seconds,
                    &[TAG_SCHOOLS, TAG_SEARCH],
                );
                (payload, CacheOutcome::Miss)
            }
        };
        debug!(
            cache = cache_outcome.as_str(),
            total = payload.total_count,
            "school search"
        );

        // 6. 派生字段的后置过滤与排序
        let mut schools = rank::apply(payload.schools, &query);

        // 7. 身份存在时单次批量联接收藏，绝不 N+1
        if let Some(identity) = identity {
            let ids: Vec<String> = schools.iter().map(|r| r.school.id.clone()).collect();
            let favorites = self.favorites.find_favorites(&identity.subject, &ids).await?;
            for result in &mut schools {
                result.is_favorite = Some(favorites.contains(&result.school.id));
            }
        }

        // 8. 搜索词分析，发后即忘
        if let Some(term) = query.query.clone() {
            self.record_analytics(term, payload.total_count);
        }

        // 9. 组装响应
        let pagination = Pagination::new(query.page, query.limit, payload.total_count);
        let search_info = SearchInfo {
            query: query.query.clone(),
            sort: SortInfo {
                sort_by: query.sort_by,
                sort_order: query.sort_order,
            },
            filters: query,
        };

        Ok(SearchOutcome {
            schools,
            pagination,
            search_info,
            cache: cache_outcome,
        })
    }
}

/// 工厂函数
pub fn create_search_service(
    schools: Arc<dyn SchoolRepository>,
    favorites: Arc<dyn FavoriteRepository>,
    analytics: Arc<dyn SearchAnalytics>,
    cache: Arc<CacheStore<CachedSearchPage>>,
    quota: Arc<SearchQuota>,
    search_config: SearchConfig,
    cache_config: &CacheConfig,
) -> Box<dyn SearchService> {
    Box::new(SearchServiceImpl::new(
        schools,
        favorites,
        analytics,
        cache,
        quota,
        search_config,
        cache_config,
    ))
}
