//! 仓储接口
//!
//! 搜索核心只通过这些 trait 访问外部数据，不关心底层存储。

use async_trait::async_trait;
use std::collections::HashSet;

use crate::error::Result;
use crate::models::school::SchoolRecord;
use crate::search::filter::{SchoolPredicate, StoreOrdering};

/// 学校仓储
///
/// 分页查询与计数接受同一谓词，编排器并发发起这两个独立读。
#[async_trait]
pub trait SchoolRepository: Send + Sync {
    /// 按谓词取一页记录
    ///
    /// `ordering` 为 None 时保持存储默认顺序（派生字段排序由排序器负责）。
    async fn find_page(
        &self,
        predicate: &SchoolPredicate,
        ordering: Option<&StoreOrdering>,
        limit: usize,
        start: usize,
    ) -> Result<Vec<SchoolRecord>>;

    /// 按谓词统计总数
    async fn count(&self, predicate: &SchoolPredicate) -> Result<u64>;
}

/// 收藏仓储
#[async_trait]
pub trait FavoriteRepository: Send + Sync {
    /// 批量查询调用者在给定学校集合中的收藏
    ///
    /// 单次批量查询，绝不退化为 N+1。
    async fn find_favorites(
        &self,
        caller_id: &str,
        school_ids: &[String],
    ) -> Result<HashSet<String>>;
}

/// 搜索分析
///
/// 按天和搜索词 upsert 计数并记录最新结果数。编排器以分离任务调用，
/// 失败只记日志，绝不影响响应。
#[async_trait]
pub trait SearchAnalytics: Send + Sync {
    async fn record_search(&self, term: &str, result_count: u64) -> Result<()>;
}
