//! 搜索 DTO
//!
//! 定义搜索响应的外部数据结构。评分与距离在这里统一四舍五入到
//! 一位小数；内部各层始终传递全精度值。

use serde::Serialize;

use crate::models::school::{Address, Contact, GeoLocation};
use crate::search::enrich::{EnrichedResult, round1};
use crate::search::query::{SearchQuery, SortBy, SortOrder};
use crate::search::service::{Pagination, SearchOutcome};

/// 单个学校搜索结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolSearchItem {
    /// 学校 ID
    pub id: String,
    /// 名称
    pub name: String,
    /// 学校类型
    #[serde(rename = "type")]
    pub school_type: String,
    /// 地址
    pub address: Address,
    /// 联系方式
    pub contact: Contact,
    /// 地理坐标
    pub location: Option<GeoLocation>,
    /// 在校学生数
    pub student_count: Option<u32>,
    /// 教师数
    pub teacher_count: Option<u32>,
    /// 建校年份
    pub established_year: Option<i32>,
    /// 授课语言
    pub languages: Vec<String>,
    /// 特色方向
    pub specializations: Vec<String>,
    /// 设施
    pub facilities: Vec<String>,
    /// 主图 URL
    pub main_image: Option<String>,
    /// 用户平均评分（一位小数；无评分为 null，绝不为 0）
    pub avg_user_rating: Option<f64>,
    /// Google 平均评分（一位小数）
    pub avg_google_rating: Option<f64>,
    /// 综合评分（一位小数）
    pub rating: Option<f64>,
    /// 与调用者的距离（公里，一位小数；无坐标为 null）
    pub distance_km: Option<f64>,
    /// 是否已收藏（匿名调用者为 null）
    pub is_favorite: Option<bool>,
}

impl From<&EnrichedResult> for SchoolSearchItem {
    fn from(result: &EnrichedResult) -> Self {
        let school = &result.school;
        Self {
            id: school.id.clone(),
            name: school.name.clone(),
            school_type: school.school_type.as_str().to_string(),
            address: school.address.clone(),
            contact: school.contact.clone(),
            location: school.location,
            student_count: school.student_count,
            teacher_count: school.teacher_count,
            established_year: school.established_year,
            languages: school.languages.clone(),
            specializations: school.specializations.clone(),
            facilities: school.facilities.clone(),
            main_image: result.main_image_url.clone(),
            avg_user_rating: result.avg_user_rating.map(round1),
            avg_google_rating: result.avg_google_rating.map(round1),
            rating: result.blended_rating().map(round1),
            distance_km: result.distance_km.map(round1),
            is_favorite: result.is_favorite,
        }
    }
}

/// 分页信息
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationDto {
    pub page: usize,
    pub limit: usize,
    pub total_count: u64,
    pub total_pages: u64,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

impl From<&Pagination> for PaginationDto {
    fn from(p: &Pagination) -> Self {
        Self {
            page: p.page,
            limit: p.limit,
            total_count: p.total_count,
            total_pages: p.total_pages,
            has_next_page: p.has_next_page,
            has_previous_page: p.has_previous_page,
        }
    }
}

/// 排序回显
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SortInfoDto {
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
}

/// 生效过滤条件回显
///
/// 回显规范化后的值（clamp、小写化之后），而非原始请求参数。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFiltersDto {
    #[serde(rename = "type")]
    pub school_type: Option<String>,
    pub city: Option<String>,
    pub voivodeship: Option<String>,
    pub district: Option<String>,
    pub min_rating: Option<f64>,
    pub max_distance_km: Option<f64>,
    pub languages: Vec<String>,
    pub specializations: Vec<String>,
    pub facilities: Vec<String>,
    pub has_images: Option<bool>,
    pub established_after: Option<i32>,
    pub established_before: Option<i32>,
    pub min_students: Option<u32>,
    pub max_students: Option<u32>,
}

impl From<&SearchQuery> for SearchFiltersDto {
    fn from(query: &SearchQuery) -> Self {
        Self {
            school_type: query.school_type.map(|t| t.as_str().to_string()),
            city: query.city.clone(),
            voivodeship: query.voivodeship.clone(),
            district: query.district.clone(),
            min_rating: query.min_rating,
            max_distance_km: query.max_distance_km,
            languages: query.languages.clone(),
            specializations: query.specializations.clone(),
            facilities: query.facilities.clone(),
            has_images: query.has_images,
            established_after: query.established_after,
            established_before: query.established_before,
            min_students: query.min_students,
            max_students: query.max_students,
        }
    }
}

/// 查询回显
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchInfoDto {
    pub query: Option<String>,
    pub filters: SearchFiltersDto,
    pub sort: SortInfoDto,
}

/// 搜索响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    /// 结果列表
    pub schools: Vec<SchoolSearchItem>,
    /// 分页
    pub pagination: PaginationDto,
    /// 查询回显
    pub search_info: SearchInfoDto,
    /// 耗时（毫秒）
    pub took_ms: u64,
}

impl SearchResponse {
    pub fn from_outcome(outcome: &SearchOutcome, took_ms: u64) -> Self {
        Self {
            schools: outcome.schools.iter().map(SchoolSearchItem::from).collect(),
            pagination: PaginationDto::from(&outcome.pagination),
            search_info: SearchInfoDto {
                query: outcome.search_info.query.clone(),
                filters: SearchFiltersDto::from(&outcome.search_info.filters),
                sort: SortInfoDto {
                    sort_by: outcome.search_info.sort.sort_by,
                    sort_order: outcome.search_info.sort.sort_order,
                },
            },
            took_ms,
        }
    }
}
