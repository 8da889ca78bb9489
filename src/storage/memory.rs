//! 内存存储实现
//!
//! 在进程内直接对 `SchoolPredicate` 求值，语义与 SurrealDB 翻译保持一致。
//! 用于测试与无数据库的开发模式。

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use crate::error::Result;
use crate::models::school::SchoolRecord;
use crate::search::filter::{SchoolPredicate, StoreOrdering, StoreSortField};
use crate::search::query::SortOrder;
use crate::storage::repository::{FavoriteRepository, SchoolRepository, SearchAnalytics};

/// 内存学校仓储
#[derive(Default)]
pub struct InMemorySchoolRepository {
    schools: RwLock<Vec<SchoolRecord>>,
    queries_served: AtomicU64,
}

impl InMemorySchoolRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置记录
    pub fn insert(&self, school: SchoolRecord) {
        self.schools
            .write()
            .expect("school store lock poisoned")
            .push(school);
    }

    pub fn insert_all(&self, schools: impl IntoIterator<Item = SchoolRecord>) {
        let mut guard = self.schools.write().expect("school store lock poisoned");
        guard.extend(schools);
    }

    /// 已服务的查询次数（find_page 与 count 各计一次）
    pub fn queries_served(&self) -> u64 {
        self.queries_served.load(AtomicOrdering::Relaxed)
    }

    fn filtered(&self, predicate: &SchoolPredicate) -> Vec<SchoolRecord> {
        self.schools
            .read()
            .expect("school store lock poisoned")
            .iter()
            .filter(|s| predicate.matches(s))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl SchoolRepository for InMemorySchoolRepository {
    async fn find_page(
        &self,
        predicate: &SchoolPredicate,
        ordering: Option<&StoreOrdering>,
        limit: usize,
        start: usize,
    ) -> Result<Vec<SchoolRecord>> {
        self.queries_served.fetch_add(1, AtomicOrdering::Relaxed);

        let mut matched = self.filtered(predicate);
        if let Some(ordering) = ordering {
            sort_records(&mut matched, ordering);
        }

        Ok(matched.into_iter().skip(start).take(limit).collect())
    }

    async fn count(&self, predicate: &SchoolPredicate) -> Result<u64> {
        self.queries_served.fetch_add(1, AtomicOrdering::Relaxed);
        Ok(self.filtered(predicate).len() as u64)
    }
}

fn sort_records(records: &mut [SchoolRecord], ordering: &StoreOrdering) {
    records.sort_by(|a, b| {
        let cmp = match ordering.field {
            StoreSortField::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            StoreSortField::Type => a.school_type.as_str().cmp(b.school_type.as_str()),
            StoreSortField::StudentCount => cmp_option(a.student_count, b.student_count),
            StoreSortField::EstablishedYear => cmp_option(a.established_year, b.established_year),
            StoreSortField::CreatedAt => a.created_at.cmp(&b.created_at),
        };
        match ordering.direction {
            SortOrder::Asc => cmp,
            SortOrder::Desc => cmp.reverse(),
        }
    });
}

fn cmp_option<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// 内存收藏仓储
#[derive(Default)]
pub struct InMemoryFavoriteRepository {
    /// caller_id -> 收藏的学校 ID 集合
    favorites: DashMap<String, HashSet<String>>,
}

impl InMemoryFavoriteRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_favorite(&self, caller_id: &str, school_id: &str) {
        self.favorites
            .entry(caller_id.to_string())
            .or_default()
            .insert(school_id.to_string());
    }
}

#[async_trait]
impl FavoriteRepository for InMemoryFavoriteRepository {
    async fn find_favorites(
        &self,
        caller_id: &str,
        school_ids: &[String],
    ) -> Result<HashSet<String>> {
        let owned = self
            .favorites
            .get(caller_id)
            .map(|set| set.clone())
            .unwrap_or_default();

        Ok(school_ids
            .iter()
            .filter(|id| owned.contains(*id))
            .cloned()
            .collect())
    }
}

/// 单个搜索词的分析行
#[derive(Debug, Clone, Default)]
pub struct AnalyticsRow {
    /// 当日搜索次数
    pub searches: u64,
    /// 最近一次的结果数
    pub last_result_count: u64,
}

/// 内存搜索分析
#[derive(Default)]
pub struct InMemorySearchAnalytics {
    /// (日期, 搜索词) -> 计数行
    rows: DashMap<(String, String), AnalyticsRow>,
}

impl InMemorySearchAnalytics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 读取某搜索词今日的分析行（测试用）
    pub fn today(&self, term: &str) -> Option<AnalyticsRow> {
        let day = Utc::now().format("%Y-%m-%d").to_string();
        self.rows.get(&(day, term.to_string())).map(|r| r.clone())
    }
}

#[async_trait]
impl SearchAnalytics for InMemorySearchAnalytics {
    async fn record_search(&self, term: &str, result_count: u64) -> Result<()> {
        let day = Utc::now().format("%Y-%m-%d").to_string();
        let mut row = self.rows.entry((day, term.to_string())).or_default();
        row.searches += 1;
        row.last_result_count = result_count;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::school::SchoolType;

    fn repo_with(names: &[(&str, SchoolType)]) -> InMemorySchoolRepository {
        let repo = InMemorySchoolRepository::new();
        repo.insert_all(
            names
                .iter()
                .map(|(name, t)| SchoolRecord::new(name, *t))
                .collect::<Vec<_>>(),
        );
        repo
    }

    #[tokio::test]
    async fn test_find_page_applies_predicate_and_pagination() {
        let repo = repo_with(&[
            ("a", SchoolType::Primary),
            ("b", SchoolType::Primary),
            ("c", SchoolType::Secondary),
            ("d", SchoolType::Primary),
        ]);

        let predicate = SchoolPredicate {
            school_type: Some(SchoolType::Primary),
            ..Default::default()
        };
        let ordering = StoreOrdering {
            field: StoreSortField::Name,
            direction: SortOrder::Asc,
        };

        let page = repo
            .find_page(&predicate, Some(&ordering), 2, 1)
            .await
            .unwrap();
        let names: Vec<&str> = page.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["b", "d"]);

        assert_eq!(repo.count(&predicate).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_queries_served_counts_both_reads() {
        let repo = repo_with(&[("a", SchoolType::Primary)]);
        let predicate = SchoolPredicate::default();

        repo.find_page(&predicate, None, 10, 0).await.unwrap();
        repo.count(&predicate).await.unwrap();
        assert_eq!(repo.queries_served(), 2);
    }

    #[tokio::test]
    async fn test_favorites_batch_lookup() {
        let repo = InMemoryFavoriteRepository::new();
        repo.add_favorite("user-1", "s1");
        repo.add_favorite("user-1", "s3");
        repo.add_favorite("user-2", "s2");

        let ids = vec!["s1".to_string(), "s2".to_string()];
        let favs = repo.find_favorites("user-1", &ids).await.unwrap();
        assert!(favs.contains("s1"));
        assert!(!favs.contains("s2"));
        assert!(!favs.contains("s3"));
    }

    #[tokio::test]
    async fn test_analytics_upserts_by_day_and_term() {
        let analytics = InMemorySearchAnalytics::new();
        analytics.record_search("liceum", 10).await.unwrap();
        analytics.record_search("liceum", 7).await.unwrap();
        analytics.record_search("technikum", 3).await.unwrap();

        let row = analytics.today("liceum").unwrap();
        assert_eq!(row.searches, 2);
        assert_eq!(row.last_result_count, 7);
        assert_eq!(analytics.today("technikum").unwrap().searches, 1);
    }
}
