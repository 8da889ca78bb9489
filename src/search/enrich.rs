//! 结果富化
//!
//! 为原始学校记录附加请求期派生字段：与用户位置的大圆距离、
//! 各评分来源的平均分、主图 URL。纯计算，无 I/O。
//!
//! 派生字段只存活于单次响应，绝不回写存储。内部计算保留全精度，
//! 四舍五入推迟到对外序列化时执行，避免误差在排序比较中累积。

use serde::{Deserialize, Serialize};

use crate::models::school::{GeoLocation, SchoolRecord};

/// 地球平均半径（公里）
const EARTH_RADIUS_KM: f64 = 6371.0;

/// 附带派生字段的学校记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedResult {
    pub school: SchoolRecord,
    /// 用户评分平均值；无评分时为 None，绝不为 0
    pub avg_user_rating: Option<f64>,
    /// 第三方地图评分平均值；无评分时为 None
    pub avg_google_rating: Option<f64>,
    /// 与用户位置的距离；任一端坐标缺失时为 None
    pub distance_km: Option<f64>,
    /// 是否收藏；仅在存在调用者身份时解析，缓存中恒为 None
    pub is_favorite: Option<bool>,
    pub main_image_url: Option<String>,
}

impl EnrichedResult {
    /// 综合评分：已有平均分的算术平均；两个来源都缺失时为 None
    pub fn blended_rating(&self) -> Option<f64> {
        let present: Vec<f64> = [self.avg_user_rating, self.avg_google_rating]
            .into_iter()
            .flatten()
            .collect();
        mean(&present)
    }
}

/// 富化一页记录
pub fn enrich_page(
    schools: Vec<SchoolRecord>,
    user_location: Option<GeoLocation>,
) -> Vec<EnrichedResult> {
    schools
        .into_iter()
        .map(|school| enrich(school, user_location))
        .collect()
}

fn enrich(school: SchoolRecord, user_location: Option<GeoLocation>) -> EnrichedResult {
    let distance_km = match (user_location, school.location) {
        (Some(user), Some(school_loc)) => Some(haversine_km(user, school_loc)),
        _ => None,
    };

    EnrichedResult {
        avg_user_rating: mean(&school.user_ratings),
        avg_google_rating: mean(&school.google_ratings),
        distance_km,
        is_favorite: None,
        main_image_url: school.main_image_url(),
        school,
    }
}

/// 大圆距离（haversine 公式）
pub fn haversine_km(a: GeoLocation, b: GeoLocation) -> f64 {
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lng / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// 算术平均；空集合为 None——“未评分”与“评分为零”是不同的事实
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// 对外序列化时的一位小数舍入
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::school::SchoolType;

    #[test]
    fn test_empty_ratings_yield_none_not_zero() {
        let school = SchoolRecord::new("SP 1", SchoolType::Primary);
        let enriched = enrich(school, None);
        assert_eq!(enriched.avg_user_rating, None);
        assert_eq!(enriched.avg_google_rating, None);
        assert_eq!(enriched.blended_rating(), None);
    }

    #[test]
    fn test_rating_means_are_computed_per_source() {
        let mut school = SchoolRecord::new("SP 1", SchoolType::Primary);
        school.user_ratings = vec![4.0, 5.0];
        school.google_ratings = vec![3.0];
        let enriched = enrich(school, None);
        assert_eq!(enriched.avg_user_rating, Some(4.5));
        assert_eq!(enriched.avg_google_rating, Some(3.0));
        assert_eq!(enriched.blended_rating(), Some(3.75));
    }

    #[test]
    fn test_distance_requires_both_locations() {
        let warsaw = GeoLocation::new(52.2297, 21.0122);

        let mut with_location = SchoolRecord::new("SP 1", SchoolType::Primary);
        with_location.location = Some(GeoLocation::new(52.4064, 16.9252));

        let without_location = SchoolRecord::new("SP 2", SchoolType::Primary);

        let enriched = enrich_page(vec![with_location.clone(), without_location], Some(warsaw));
        assert!(enriched[0].distance_km.is_some());
        assert_eq!(enriched[1].distance_km, None);

        // 用户位置缺失时所有距离均为 None
        let enriched = enrich_page(vec![with_location], None);
        assert_eq!(enriched[0].distance_km, None);
    }

    #[test]
    fn test_haversine_warsaw_to_poznan() {
        // 华沙到波兹南约 279 公里
        let warsaw = GeoLocation::new(52.2297, 21.0122);
        let poznan = GeoLocation::new(52.4064, 16.9252);
        let d = haversine_km(warsaw, poznan);
        assert!((d - 279.0).abs() < 5.0, "unexpected distance: {}", d);
    }

    #[test]
    fn test_haversine_zero_for_same_point() {
        let p = GeoLocation::new(52.0, 21.0);
        assert!(haversine_km(p, p).abs() < 1e-9);
    }

    #[test]
    fn test_round1() {
        assert_eq!(round1(4.449), 4.4);
        assert_eq!(round1(4.45), 4.5);
        assert_eq!(round1(2.0), 2.0);
    }
}
