use axum::{
    Json,
    extract::{ConnectInfo, Query, State},
    http::{HeaderMap, HeaderValue, header},
    response::IntoResponse,
};
use std::net::SocketAddr;
use tracing::debug;

use crate::{
    api::{app_state::AppState, dto::search_dto::SearchResponse},
    error::AppError,
    search::query::RawSearchParams,
    security::auth::Credentials,
    security::quota::QuotaClient,
};

/// GET /api/v1/schools/search
///
/// 匿名可访问；携带凭据时解析身份（无效凭据直接 401），
/// 响应带 X-Cache 头标注缓存命中情况。
pub async fn search_schools(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Query(params): Query<RawSearchParams>,
) -> Result<impl IntoResponse, AppError> {
    let start_time = std::time::Instant::now();

    let credentials = Credentials::from_headers(&headers);
    let identity = state.identity_resolver.resolve(&credentials).await?;

    // 配额主体：已登录按 subject，匿名按客户端 IP（代理头缺失时用对端地址）
    let quota_client = match &identity {
        Some(identity) => QuotaClient::from_subject(&identity.subject),
        None => QuotaClient::from_headers(&headers, peer.map(|ConnectInfo(addr)| addr)),
    };

    let searched = tokio::time::timeout(
        std::time::Duration::from_secs(state.request_timeout),
        state
            .search_service
            .search(&params, identity.as_ref(), &quota_client),
    )
    .await
    .unwrap_or_else(|_| Err(AppError::Upstream("search timed out".to_string())));

    let outcome = match searched {
        Ok(outcome) => outcome,
        Err(e) => {
            match &e {
                AppError::QuotaExceeded { .. } => state.metrics.record_quota_rejection(),
                AppError::Validation(_) => {}
                _ => state.metrics.record_error(),
            }
            return Err(e);
        }
    };

    let took_ms = start_time.elapsed().as_millis() as u64;
    let cache_hit = outcome.cache == crate::search::service::CacheOutcome::Hit;
    state.metrics.record_search(took_ms, cache_hit);

    debug!(
        cache = outcome.cache.as_str(),
        results = outcome.schools.len(),
        took_ms,
        "school search request"
    );

    let body = SearchResponse::from_outcome(&outcome, took_ms);
    let mut response = Json(body).into_response();

    let response_headers = response.headers_mut();
    response_headers.insert("X-Cache", HeaderValue::from_static(outcome.cache.as_str()));

    let cache_control = format!(
        "public, max-age={}, stale-while-revalidate={}",
        state.cache_config.ttl_seconds, state.cache_config.stale_while_revalidate
    );
    if let Ok(value) = HeaderValue::from_str(&cache_control) {
        response_headers.insert(header::CACHE_CONTROL, value);
    }

    Ok(response)
}
