//! 查询参数归一化
//!
//! 将 URL 查询字符串的原始参数转换为规范化的 `SearchQuery`，
//! 或返回覆盖所有问题字段的验证失败。纯函数，无副作用。

use serde::{Deserialize, Serialize};

use crate::config::config::SearchConfig;
use crate::error::FieldError;
use crate::models::school::{GeoLocation, SchoolType};

/// 评分取值范围
pub const RATING_MIN: f64 = 0.0;
pub const RATING_MAX: f64 = 5.0;

/// 排序字段
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SortBy {
    Name,
    Type,
    StudentCount,
    EstablishedYear,
    CreatedAt,
    /// 按派生的距离排序（由排序器在存储查询之后执行）
    Distance,
    /// 按派生的综合评分排序（由排序器在存储查询之后执行）
    Rating,
}

impl SortBy {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "name" => Some(SortBy::Name),
            "type" => Some(SortBy::Type),
            "studentCount" => Some(SortBy::StudentCount),
            "establishedYear" => Some(SortBy::EstablishedYear),
            "createdAt" => Some(SortBy::CreatedAt),
            "distance" => Some(SortBy::Distance),
            "rating" => Some(SortBy::Rating),
            _ => None,
        }
    }

    /// 是否为派生字段排序（不能下推到数据存储）
    pub fn is_derived(&self) -> bool {
        matches!(self, SortBy::Distance | SortBy::Rating)
    }
}

/// 排序方向
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }
}

/// URL 查询字符串的原始参数（全部可缺省，未经验证）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawSearchParams {
    pub query: Option<String>,
    #[serde(rename = "type")]
    pub school_type: Option<String>,
    pub city: Option<String>,
    pub voivodeship: Option<String>,
    pub district: Option<String>,
    pub min_rating: Option<String>,
    pub max_distance_km: Option<String>,
    pub lat: Option<String>,
    pub lng: Option<String>,
    /// 逗号分隔列表
    pub languages: Option<String>,
    /// 逗号分隔列表
    pub specializations: Option<String>,
    /// 逗号分隔列表
    pub facilities: Option<String>,
    pub has_images: Option<String>,
    pub established_after: Option<String>,
    pub established_before: Option<String>,
    pub min_students: Option<String>,
    pub max_students: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

/// 规范化后的搜索查询
///
/// 不包含任何调用者身份字段，因此其序列化结果可直接作为缓存键的输入，
/// 同一查询可被不同用户共享缓存。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchQuery {
    pub query: Option<String>,
    pub school_type: Option<SchoolType>,
    pub city: Option<String>,
    pub voivodeship: Option<String>,
    pub district: Option<String>,
    pub min_rating: Option<f64>,
    pub max_distance_km: Option<f64>,
    pub user_location: Option<GeoLocation>,
    pub languages: Vec<String>,
    pub specializations: Vec<String>,
    pub facilities: Vec<String>,
    pub has_images: Option<bool>,
    pub established_after: Option<i32>,
    pub established_before: Option<i32>,
    pub min_students: Option<u32>,
    pub max_students: Option<u32>,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
    pub page: usize,
    pub limit: usize,
}

/// 归一化原始参数
///
/// 规则：
/// - 数值字段严格解析，非数值输入是验证错误而非静默置零；
/// - `page` 缺省为 1，小于 1 报错；
/// - `limit` 缺省取配置默认值，超出上限钳制到上限（钳制而非拒绝）；
/// - 逗号分隔的数组参数去空白、丢弃空项；
/// - `minRating` 钳制到 [0, 5]；
/// - 未知的枚举取值（type / sortBy / sortOrder）一律拒绝。
pub fn normalize(
    raw: &RawSearchParams,
    config: &SearchConfig,
) -> Result<SearchQuery, Vec<FieldError>> {
    let mut errors: Vec<FieldError> = Vec::new();

    let query = raw
        .query
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let school_type = match raw.school_type.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(value) => match SchoolType::parse(value) {
            Some(t) => Some(t),
            None => {
                errors.push(FieldError::new("type", format!("未知的学校类别: {}", value)));
                None
            }
        },
    };

    let min_rating = parse_f64(&raw.min_rating, "minRating", &mut errors)
        .map(|v| v.clamp(RATING_MIN, RATING_MAX));

    let max_distance_km = parse_f64(&raw.max_distance_km, "maxDistanceKm", &mut errors);
    if let Some(d) = max_distance_km {
        if d < 0.0 {
            errors.push(FieldError::new("maxDistanceKm", "不能为负数"));
        }
    }

    let lat = parse_f64(&raw.lat, "lat", &mut errors);
    let lng = parse_f64(&raw.lng, "lng", &mut errors);
    let user_location = match (lat, lng) {
        (Some(lat), Some(lng)) => {
            if !(-90.0..=90.0).contains(&lat) {
                errors.push(FieldError::new("lat", "纬度必须在 [-90, 90] 之间"));
            }
            if !(-180.0..=180.0).contains(&lng) {
                errors.push(FieldError::new("lng", "经度必须在 [-180, 180] 之间"));
            }
            Some(GeoLocation::new(lat, lng))
        }
        (Some(_), None) => {
            errors.push(FieldError::new("lng", "提供了 lat 时必须同时提供 lng"));
            None
        }
        (None, Some(_)) => {
            errors.push(FieldError::new("lat", "提供了 lng 时必须同时提供 lat"));
            None
        }
        (None, None) => None,
    };

    let languages = split_list(&raw.languages);
    let specializations = split_list(&raw.specializations);
    let facilities = split_list(&raw.facilities);

    let has_images = match raw.has_images.as_deref().map(str::trim) {
        None | Some("") => None,
        Some("true") => Some(true),
        Some("false") => Some(false),
        Some(other) => {
            errors.push(FieldError::new(
                "hasImages",
                format!("必须是 true 或 false，收到: {}", other),
            ));
            None
        }
    };

    let established_after = parse_i32(&raw.established_after, "establishedAfter", &mut errors);
    let established_before = parse_i32(&raw.established_before, "establishedBefore", &mut errors);
    if let (Some(after), Some(before)) = (established_after, established_before) {
        if after > before {
            errors.push(FieldError::new(
                "establishedAfter",
                "不能晚于 establishedBefore",
            ));
        }
    }

    let min_students = parse_u32(&raw.min_students, "minStudents", &mut errors);
    let max_students = parse_u32(&raw.max_students, "maxStudents", &mut errors);
    if let (Some(min), Some(max)) = (min_students, max_students) {
        if min > max {
            errors.push(FieldError::new("minStudents", "不能大于 maxStudents"));
        }
    }

    let sort_by = match raw.sort_by.as_deref().map(str::trim) {
        None | Some("") => SortBy::Name,
        Some(value) => match SortBy::parse(value) {
            Some(s) => s,
            None => {
                errors.push(FieldError::new("sortBy", format!("未知的排序字段: {}", value)));
                SortBy::Name
            }
        },
    };

    let sort_order = match raw.sort_order.as_deref().map(str::trim) {
        None | Some("") => SortOrder::Asc,
        Some(value) => match SortOrder::parse(value) {
            Some(s) => s,
            None => {
                errors.push(FieldError::new(
                    "sortOrder",
                    format!("必须是 asc 或 desc，收到: {}", value),
                ));
                SortOrder::Asc
            }
        },
    };

    let page = match parse_usize(&raw.page, "page", &mut errors) {
        Some(p) if p < 1 => {
            errors.push(FieldError::new("page", "必须大于等于 1"));
            1
        }
        Some(p) => p,
        None => 1,
    };

    // limit 是调用方便利参数而非正确性约束，越界时钳制
    let limit = parse_usize(&raw.limit, "limit", &mut errors)
        .unwrap_or(config.default_limit)
        .clamp(1, config.max_limit);

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(SearchQuery {
        query,
        school_type,
        city: trimmed(&raw.city),
        voivodeship: trimmed(&raw.voivodeship),
        district: trimmed(&raw.district),
        min_rating,
        max_distance_km,
        user_location,
        languages,
        specializations,
        facilities,
        has_images,
        established_after,
        established_before,
        min_students,
        max_students,
        sort_by,
        sort_order,
        page,
        limit,
    })
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn split_list(value: &Option<String>) -> Vec<String> {
    value
        .as_deref()
        .map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn parse_f64(value: &Option<String>, field: &str, errors: &mut Vec<FieldError>) -> Option<f64> {
    parse_with(value, field, errors, |s| {
        s.parse::<f64>().ok().filter(|v| v.is_finite())
    })
}

fn parse_i32(value: &Option<String>, field: &str, errors: &mut Vec<FieldError>) -> Option<i32> {
    parse_with(value, field, errors, |s| s.parse::<i32>().ok())
}

fn parse_u32(value: &Option<String>, field: &str, errors: &mut Vec<FieldError>) -> Option<u32> {
    parse_with(value, field, errors, |s| s.parse::<u32>().ok())
}

fn parse_usize(value: &Option<String>, field: &str, errors: &mut Vec<FieldError>) -> Option<usize> {
    parse_with(value, field, errors, |s| s.parse::<usize>().ok())
}

fn parse_with<T>(
    value: &Option<String>,
    field: &str,
    errors: &mut Vec<FieldError>,
    parser: impl Fn(&str) -> Option<T>,
) -> Option<T> {
    let raw = value.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
    match parser(raw) {
        Some(v) => Some(v),
        None => {
            errors.push(FieldError::new(field, format!("数值无效: {}", raw)));
            None
        }
    }
}
