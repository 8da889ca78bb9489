//! 学校实体
//!
//! 学校记录由外部采集管线写入数据库，搜索核心对其只读。
//! 嵌套的地址/联系方式/坐标字段在上游数据中结构不稳定，
//! 因此提供从松散 JSON 提取的适配函数，提取失败时返回空值而非报错。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// 学校类别
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SchoolType {
    /// 小学
    Primary,
    /// 初中
    Secondary,
    /// 高中
    HighSchool,
    /// 技术学校
    Technical,
    /// 职业学校
    Vocational,
    /// 幼儿园
    Kindergarten,
}

impl SchoolType {
    /// 从查询参数解析类别；未知值返回 None（由调用方报验证错误）
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "primary" => Some(SchoolType::Primary),
            "secondary" => Some(SchoolType::Secondary),
            "high_school" => Some(SchoolType::HighSchool),
            "technical" => Some(SchoolType::Technical),
            "vocational" => Some(SchoolType::Vocational),
            "kindergarten" => Some(SchoolType::Kindergarten),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SchoolType::Primary => "primary",
            SchoolType::Secondary => "secondary",
            SchoolType::HighSchool => "high_school",
            SchoolType::Technical => "technical",
            SchoolType::Vocational => "vocational",
            SchoolType::Kindergarten => "kindergarten",
        }
    }
}

impl std::fmt::Display for SchoolType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 学校地址
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Address {
    /// 街道
    pub street: Option<String>,
    /// 城市
    pub city: Option<String>,
    /// 省（波兰行政区划）
    pub voivodeship: Option<String>,
    /// 区
    pub district: Option<String>,
    /// 邮政编码
    pub postal_code: Option<String>,
}

impl Address {
    /// 从松散 JSON 提取地址；字段缺失或类型不符时置空
    pub fn from_value(value: &Value) -> Self {
        Self {
            street: extract_string(value, "street"),
            city: extract_string(value, "city"),
            voivodeship: extract_string(value, "voivodeship"),
            district: extract_string(value, "district"),
            postal_code: extract_string(value, "postal_code"),
        }
    }
}

/// 联系方式
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Contact {
    /// 电话
    pub phone: Option<String>,
    /// 邮箱
    pub email: Option<String>,
    /// 网站
    pub website: Option<String>,
}

impl Contact {
    /// 从松散 JSON 提取联系方式
    pub fn from_value(value: &Value) -> Self {
        Self {
            phone: extract_string(value, "phone"),
            email: extract_string(value, "email"),
            website: extract_string(value, "website"),
        }
    }
}

/// 地理坐标
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoLocation {
    /// 纬度
    pub lat: f64,
    /// 经度
    pub lng: f64,
}

impl GeoLocation {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// 从松散 JSON 提取坐标；任一分量缺失则整体为 None
    pub fn from_value(value: &Value) -> Option<Self> {
        let lat = value.get("lat").and_then(Value::as_f64)?;
        let lng = value.get("lng").and_then(Value::as_f64)?;
        Some(Self { lat, lng })
    }
}

/// 学校图片
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct SchoolImage {
    /// 图片 URL
    pub url: String,
    /// 是否为主图
    pub is_main: bool,
}

/// 学校实体
///
/// 搜索核心的只读输入；派生字段（距离、平均评分等）不在此持久化。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchoolRecord {
    /// 学校唯一标识
    pub id: String,

    /// 学校名称
    pub name: String,

    /// 学校类别
    pub school_type: SchoolType,

    /// 地址
    pub address: Address,

    /// 联系方式
    pub contact: Contact,

    /// 地理坐标（上游数据可能缺失）
    pub location: Option<GeoLocation>,

    /// 学生数
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

    /// 图片
    pub images: Vec<SchoolImage>,

    /// 用户评分（1-5）
    pub user_ratings: Vec<f64>,

    /// 第三方地图评分（1-5）
    pub google_ratings: Vec<f64>,

    /// 入库时间
    pub created_at: DateTime<Utc>,
}

impl SchoolRecord {
    /// 创建新学校记录
    pub fn new(name: &str, school_type: SchoolType) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            school_type,
            address: Address::default(),
            contact: Contact::default(),
            location: None,
            student_count: None,
            teacher_count: None,
            established_year: None,
            languages: Vec::new(),
            specializations: Vec::new(),
            facilities: Vec::new(),
            images: Vec::new(),
            user_ratings: Vec::new(),
            google_ratings: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// 主图 URL：优先取标记为主图的，其次第一张
    pub fn main_image_url(&self) -> Option<String> {
        self.images
            .iter()
            .find(|i| i.is_main)
            .or_else(|| self.images.first())
            .map(|i| i.url.clone())
    }
}

fn extract_string(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_school_type_parse_rejects_unknown() {
        assert_eq!(SchoolType::parse("primary"), Some(SchoolType::Primary));
        assert_eq!(SchoolType::parse("montessori"), None);
        assert_eq!(SchoolType::parse(""), None);
    }

    #[test]
    fn test_address_from_value_fails_closed() {
        let loose = json!({"street": "Marszałkowska 1", "city": 42, "postal_code": "  "});
        let address = Address::from_value(&loose);
        assert_eq!(address.street.as_deref(), Some("Marszałkowska 1"));
        assert_eq!(address.city, None);
        assert_eq!(address.postal_code, None);
        assert_eq!(address.voivodeship, None);
    }

    #[test]
    fn test_geo_location_requires_both_components() {
        assert!(GeoLocation::from_value(&json!({"lat": 52.23})).is_none());
        assert!(GeoLocation::from_value(&json!({"lat": "52.23", "lng": 21.01})).is_none());
        let loc = GeoLocation::from_value(&json!({"lat": 52.23, "lng": 21.01})).unwrap();
        assert_eq!(loc.lat, 52.23);
    }

    #[test]
    fn test_main_image_prefers_flagged_image() {
        let mut school = SchoolRecord::new("SP 1", SchoolType::Primary);
        assert_eq!(school.main_image_url(), None);

        school.images.push(SchoolImage {
            url: "a.jpg".into(),
            is_main: false,
        });
        school.images.push(SchoolImage {
            url: "b.jpg".into(),
            is_main: true,
        });
        assert_eq!(school.main_image_url().as_deref(), Some("b.jpg"));
    }
}
