//! SurrealDB 仓储实现
//!
//! 将 `SchoolPredicate` 翻译为参数化的 SurrealQL 查询。
//! 所有用户输入都经由绑定参数传递，不做字符串拼接。

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;

use crate::error::{AppError, Result};
use crate::models::school::SchoolRecord;
use crate::search::filter::{SchoolPredicate, StoreOrdering, StoreSortField};
use crate::search::query::SortOrder;
use crate::storage::repository::{FavoriteRepository, SchoolRepository, SearchAnalytics};
use crate::storage::surrealdb::SurrealPool;

/// SurrealQL 查询片段与绑定参数
struct CompiledWhere {
    clause: String,
    binds: Vec<(&'static str, serde_json::Value)>,
}

/// 把谓词翻译为 WHERE 子句
///
/// 与 `SchoolPredicate::matches` 保持同一语义；
/// 距离与评分过滤不在此处（派生字段，存储中不存在）。
fn compile_where(predicate: &SchoolPredicate) -> CompiledWhere {
    let mut conditions: Vec<String> = Vec::new();
    let mut binds: Vec<(&'static str, serde_json::Value)> = Vec::new();

    if let Some(text) = &predicate.text {
        conditions.push(
            "(string::lowercase(name) CONTAINS $text \
             OR string::lowercase(address.street) CONTAINS $text \
             OR string::lowercase(address.city) CONTAINS $text \
             OR string::lowercase(address.district) CONTAINS $text)"
                .to_string(),
        );
        binds.push(("text", serde_json::json!(text)));
    }

    if let Some(school_type) = predicate.school_type {
        conditions.push("school_type = $school_type".to_string());
        binds.push(("school_type", serde_json::json!(school_type.as_str())));
    }

    if let Some(city) = &predicate.city {
        conditions.push("string::lowercase(address.city) = $city".to_string());
        binds.push(("city", serde_json::json!(city.to_lowercase())));
    }

    if let Some(voivodeship) = &predicate.voivodeship {
        conditions.push("string::lowercase(address.voivodeship) = $voivodeship".to_string());
        binds.push(("voivodeship", serde_json::json!(voivodeship.to_lowercase())));
    }

    if let Some(district) = &predicate.district {
        conditions.push("string::lowercase(address.district) = $district".to_string());
        binds.push(("district", serde_json::json!(district.to_lowercase())));
    }

    // 数组条件为“至少包含其一”
    if !predicate.languages.is_empty() {
        conditions.push("$languages ANYINSIDE languages".to_string());
        binds.push(("languages", serde_json::json!(predicate.languages)));
    }
    if !predicate.specializations.is_empty() {
        conditions.push("$specializations ANYINSIDE specializations".to_string());
        binds.push((
            "specializations",
            serde_json::json!(predicate.specializations),
        ));
    }
    if !predicate.facilities.is_empty() {
        conditions.push("$facilities ANYINSIDE facilities".to_string());
        binds.push(("facilities", serde_json::json!(predicate.facilities)));
    }

    if let Some(has_images) = predicate.has_images {
        if has_images {
            conditions.push("array::len(images) > 0".to_string());
        } else {
            conditions.push("array::len(images) = 0".to_string());
        }
    }

    if let Some(after) = predicate.established_after {
        conditions.push("established_year >= $established_after".to_string());
        binds.push(("established_after", serde_json::json!(after)));
    }
    if let Some(before) = predicate.established_before {
        conditions.push("established_year <= $established_before".to_string());
        binds.push(("established_before", serde_json::json!(before)));
    }

    if let Some(min) = predicate.min_students {
        conditions.push("student_count >= $min_students".to_string());
        binds.push(("min_students", serde_json::json!(min)));
    }
    if let Some(max) = predicate.max_students {
        conditions.push("student_count <= $max_students".to_string());
        binds.push(("max_students", serde_json::json!(max)));
    }

    let clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };

    CompiledWhere { clause, binds }
}

fn order_clause(ordering: Option<&StoreOrdering>) -> String {
    let Some(ordering) = ordering else {
        return String::new();
    };

    let field = match ordering.field {
        StoreSortField::Name => "string::lowercase(name)",
        StoreSortField::Type => "school_type",
        StoreSortField::StudentCount => "student_count",
        StoreSortField::EstablishedYear => "established_year",
        StoreSortField::CreatedAt => "created_at",
    };
    let direction = match ordering.direction {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    };
    format!(" ORDER BY {} {}", field, direction)
}

/// 学校仓储（SurrealDB）
#[derive(Clone)]
pub struct SurrealSchoolRepository {
    pool: SurrealPool,
}

impl SurrealSchoolRepository {
    pub fn new(pool: SurrealPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SchoolRepository for SurrealSchoolRepository {
    async fn find_page(
        &self,
        predicate: &SchoolPredicate,
        ordering: Option<&StoreOrdering>,
        limit: usize,
        start: usize,
    ) -> Result<Vec<SchoolRecord>> {
        let compiled = compile_where(predicate);
        let query = format!(
            "SELECT * FROM school{}{} LIMIT $limit START $start",
            compiled.clause,
            order_clause(ordering),
        );

        let db = self.pool.inner();
        let mut request = db.query(query);
        for (name, value) in compiled.binds {
            request = request.bind((name, value));
        }
        let result: Vec<SchoolRecord> = request
            .bind(("limit", limit))
            .bind(("start", start))
            .await?
            .take(0)?;
        Ok(result)
    }

    async fn count(&self, predicate: &SchoolPredicate) -> Result<u64> {
        let compiled = compile_where(predicate);
        let query = format!("SELECT count() FROM school{} GROUP ALL", compiled.clause);

        let db = self.pool.inner();
        let mut request = db.query(query);
        for (name, value) in compiled.binds {
            request = request.bind((name, value));
        }
        let result: Vec<serde_json::Value> = request.await?.take(0)?;
        Ok(result
            .first()
            .and_then(|v| v.get("count"))
            .and_then(|c| c.as_u64())
            .unwrap_or(0))
    }
}

/// 收藏仓储（SurrealDB）
#[derive(Clone)]
pub struct SurrealFavoriteRepository {
    pool: SurrealPool,
}

impl SurrealFavoriteRepository {
    pub fn new(pool: SurrealPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FavoriteRepository for SurrealFavoriteRepository {
    async fn find_favorites(
        &self,
        caller_id: &str,
        school_ids: &[String],
    ) -> Result<HashSet<String>> {
        if school_ids.is_empty() {
            return Ok(HashSet::new());
        }

        // 单次批量查询覆盖整页 ID
        let query = "
            SELECT school_id FROM favorite
            WHERE user_id = $user_id AND school_id INSIDE $school_ids
        ";
        let db = self.pool.inner();
        let rows: Vec<serde_json::Value> = db
            .query(query)
            .bind(("user_id", caller_id.to_string()))
            .bind(("school_ids", school_ids.to_vec()))
            .await?
            .take(0)?;

        Ok(rows
            .iter()
            .filter_map(|row| row.get("school_id"))
            .filter_map(|v| v.as_str())
            .map(str::to_string)
            .collect())
    }
}

/// 搜索分析（SurrealDB）
#[derive(Clone)]
pub struct SurrealSearchAnalytics {
    pool: SurrealPool,
}

impl SurrealSearchAnalytics {
    pub fn new(pool: SurrealPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SearchAnalytics for SurrealSearchAnalytics {
    async fn record_search(&self, term: &str, result_count: u64) -> Result<()> {
        let day = Utc::now().format("%Y-%m-%d").to_string();

        // 按 (日期, 搜索词) 派生确定性记录 ID，实现幂等 upsert
        let query = "
            UPSERT type::thing('search_term_stats', crypto::sha256($day + '|' + $term))
            SET day = $day,
                term = $term,
                searches += 1,
                last_result_count = $result_count
        ";
        let db = self.pool.inner();
        db.query(query)
            .bind(("day", day))
            .bind(("term", term.to_string()))
            .bind(("result_count", result_count))
            .await
            .map_err(|e| AppError::Upstream(e.to_string()))?;
        Ok(())
    }
}
