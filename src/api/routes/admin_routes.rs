//! Admin Routes
//!
//! 缓存管理端点，供数据导入任务与运维使用。

use crate::api::handlers::cache_handler::*;
use axum::{
    Router,
    routing::{get, post},
};

use crate::api::app_state::AppState;

/// 创建管理路由器
pub fn create_admin_router() -> Router<AppState> {
    Router::new()
        .route("/admin/cache/stats", get(cache_stats))
        .route("/admin/cache/invalidate", post(invalidate_cache))
}
