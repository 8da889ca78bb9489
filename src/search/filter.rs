//! 过滤条件编译
//!
//! 将规范化的 `SearchQuery` 编译为数据存储可执行的谓词与排序。
//!
//! 距离和评分是请求期派生字段，数据存储中不存在对应列，
//! 因此绝不编译进谓词，由排序器在富化之后做后置过滤（见 rank 模块）。

use serde::{Deserialize, Serialize};

use crate::models::school::{SchoolRecord, SchoolType};
use crate::search::query::{SearchQuery, SortBy, SortOrder};

/// 存储层可执行的排序字段
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StoreSortField {
    Name,
    Type,
    StudentCount,
    EstablishedYear,
    CreatedAt,
}

/// 存储层排序
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreOrdering {
    pub field: StoreSortField,
    pub direction: SortOrder,
}

/// 学校查询谓词
///
/// 各条件之间为 AND；数组条件（语言/特色/设施）采用
/// “至少包含其中之一”的语义。空谓词匹配全部记录。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SchoolPredicate {
    /// 自由文本，小写化；对名称与地址子字段做子串匹配
    pub text: Option<String>,
    pub school_type: Option<SchoolType>,
    pub city: Option<String>,
    pub voivodeship: Option<String>,
    pub district: Option<String>,
    /// 任一匹配
    pub languages: Vec<String>,
    /// 任一匹配
    pub specializations: Vec<String>,
    /// 任一匹配
    pub facilities: Vec<String>,
    pub has_images: Option<bool>,
    pub established_after: Option<i32>,
    pub established_before: Option<i32>,
    pub min_students: Option<u32>,
    pub max_students: Option<u32>,
}

impl SchoolPredicate {
    /// 是否为无约束谓词
    pub fn is_match_all(&self) -> bool {
        *self == SchoolPredicate::default()
    }

    /// 在内存中对单条记录求值
    ///
    /// 与存储层翻译保持同一语义，是内存仓储与测试的执行路径。
    pub fn matches(&self, school: &SchoolRecord) -> bool {
        if let Some(text) = &self.text {
            let haystacks = [
                Some(school.name.as_str()),
                school.address.street.as_deref(),
                school.address.city.as_deref(),
                school.address.district.as_deref(),
            ];
            let hit = haystacks
                .iter()
                .flatten()
                .any(|h| h.to_lowercase().contains(text));
            if !hit {
                return false;
            }
        }

        if let Some(t) = self.school_type {
            if school.school_type != t {
                return false;
            }
        }

        if !eq_ignore_case_opt(&self.city, &school.address.city) {
            return false;
        }
        if !eq_ignore_case_opt(&self.voivodeship, &school.address.voivodeship) {
            return false;
        }
        if !eq_ignore_case_opt(&self.district, &school.address.district) {
            return false;
        }

        if !contains_any(&self.languages, &school.languages) {
            return false;
        }
        if !contains_any(&self.specializations, &school.specializations) {
            return false;
        }
        if !contains_any(&self.facilities, &school.facilities) {
            return false;
        }

        if let Some(wanted) = self.has_images {
            if school.images.is_empty() == wanted {
                return false;
            }
        }

        if let Some(after) = self.established_after {
            match school.established_year {
                Some(year) if year >= after => {}
                _ => return false,
            }
        }
        if let Some(before) = self.established_before {
            match school.established_year {
                Some(year) if year <= before => {}
                _ => return false,
            }
        }

        if let Some(min) = self.min_students {
            match school.student_count {
                Some(count) if count >= min => {}
                _ => return false,
            }
        }
        if let Some(max) = self.max_students {
            match school.student_count {
                Some(count) if count <= max => {}
                _ => return false,
            }
        }

        true
    }
}

/// 编译查询为谓词与存储层排序
///
/// 永不失败：全空查询编译为匹配全部的空谓词。
/// 派生字段排序（distance / rating）返回 None，存储层保持默认顺序，
/// 由排序器在后置阶段执行——两条排序路径按 sortBy 取值互斥。
pub fn compile(query: &SearchQuery) -> (SchoolPredicate, Option<StoreOrdering>) {
    let predicate = SchoolPredicate {
        text: query.query.as_deref().map(|s| s.to_lowercase()),
        school_type: query.school_type,
        city: query.city.clone(),
        voivodeship: query.voivodeship.clone(),
        district: query.district.clone(),
        languages: query.languages.clone(),
        specializations: query.specializations.clone(),
        facilities: query.facilities.clone(),
        has_images: query.has_images,
        established_after: query.established_after,
        established_before: query.established_before,
        min_students: query.min_students,
        max_students: query.max_students,
    };

    let ordering = match query.sort_by {
        SortBy::Name => Some(StoreSortField::Name),
        SortBy::Type => Some(StoreSortField::Type),
        SortBy::StudentCount => Some(StoreSortField::StudentCount),
        SortBy::EstablishedYear => Some(StoreSortField::EstablishedYear),
        SortBy::CreatedAt => Some(StoreSortField::CreatedAt),
        SortBy::Distance | SortBy::Rating => None,
    }
    .map(|field| StoreOrdering {
        field,
        direction: query.sort_order,
    });

    (predicate, ordering)
}

fn eq_ignore_case_opt(wanted: &Option<String>, actual: &Option<String>) -> bool {
    match wanted {
        None => true,
        Some(w) => actual
            .as_deref()
            .map(|a| a.eq_ignore_ascii_case(w))
            .unwrap_or(false),
    }
}

fn contains_any(wanted: &[String], actual: &[String]) -> bool {
    if wanted.is_empty() {
        return true;
    }
    wanted
        .iter()
        .any(|w| actual.iter().any(|a| a.eq_ignore_ascii_case(w)))
}
