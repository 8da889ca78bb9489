use axum::{Json, extract::State, response::IntoResponse};
use serde::Deserialize;
use tracing::info;

use crate::{
    api::app_state::AppState,
    error::AppError,
    security::auth::Credentials,
};

/// 缓存失效请求：按标签或精确键，至少给一个
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct InvalidateRequest {
    pub tag: Option<String>,
    pub key: Option<String>,
}

/// 管理端点只接受合法 API Key 或 JWT，匿名一律 401
async fn require_identity(state: &AppState, headers: &axum::http::HeaderMap) -> Result<(), AppError> {
    let credentials = Credentials::from_headers(headers);
    if credentials.is_anonymous() {
        return Err(AppError::Authentication(
            "admin endpoints require credentials".to_string(),
        ));
    }
    state.identity_resolver.resolve(&credentials).await?;
    Ok(())
}

/// GET /api/v1/admin/cache/stats
pub async fn cache_stats(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    require_identity(&state, &headers).await?;
    Ok(Json(state.search_cache.stats()))
}

/// POST /api/v1/admin/cache/invalidate
///
/// 数据导入等后台任务在学校目录变更后调用，驱逐受影响的搜索页。
pub async fn invalidate_cache(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    Json(request): Json<InvalidateRequest>,
) -> Result<impl IntoResponse, AppError> {
    require_identity(&state, &headers).await?;

    let invalidated = match (&request.tag, &request.key) {
        (Some(tag), _) => state.search_cache.invalidate_by_tag(tag),
        (None, Some(key)) => usize::from(state.search_cache.invalidate(key)),
        (None, None) => {
            return Err(AppError::validation(
                "tag",
                "either 'tag' or 'key' must be provided",
            ));
        }
    };

    info!(
        tag = request.tag.as_deref().unwrap_or(""),
        key = request.key.as_deref().unwrap_or(""),
        invalidated,
        "cache invalidation"
    );

    Ok(Json(serde_json::json!({ "invalidated": invalidated })))
}
