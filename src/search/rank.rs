//! 结果排序与后置过滤
//!
//! 距离与评分是富化阶段才存在的派生字段，数据存储无法过滤或排序，
//! 因此 maxDistanceKm / minRating 过滤与 distance / rating 排序都在这里
//! 执行。其余排序字段已由存储层原生排序完成，这里原样透传，
//! 避免双重排序——两条排序路径按 sortBy 取值互斥。

use crate::search::enrich::EnrichedResult;
use crate::search::query::{SearchQuery, SortBy, SortOrder};

/// 对富化后的一页结果执行后置过滤与排序
pub fn apply(results: Vec<EnrichedResult>, query: &SearchQuery) -> Vec<EnrichedResult> {
    let mut results = post_filter(results, query);

    match query.sort_by {
        SortBy::Distance => {
            sort_by_derived(&mut results, query.sort_order, |r| r.distance_km);
        }
        SortBy::Rating => {
            sort_by_derived(&mut results, query.sort_order, |r| r.blended_rating());
        }
        // 存储层已排序，保持检索顺序
        _ => {}
    }

    results
}

fn post_filter(results: Vec<EnrichedResult>, query: &SearchQuery) -> Vec<EnrichedResult> {
    results
        .into_iter()
        .filter(|r| {
            // 用户未提供位置时距离无法计算，距离过滤不生效
            if let (Some(max), Some(_)) = (query.max_distance_km, query.user_location) {
                match r.distance_km {
                    Some(d) if d <= max => {}
                    // 距离未知的记录不应出现在“X 公里以内”的结果里
                    _ => return false,
                }
            }

            if let Some(min) = query.min_rating {
                match r.blended_rating() {
                    Some(rating) if rating >= min => {}
                    // 未评分不等于零分，但也不满足最低评分门槛
                    _ => return false,
                }
            }

            true
        })
        .collect()
}

/// 按派生字段稳定排序；缺失值无论方向都排在最后
///
/// 未知距离的记录不应在“最近优先”的排序里领先，降序同理。
/// 稳定排序保证同值记录维持检索顺序，相同查询的多次响应顺序一致。
fn sort_by_derived(
    results: &mut [EnrichedResult],
    order: SortOrder,
    key: impl Fn(&EnrichedResult) -> Option<f64>,
) {
    results.sort_by(|a, b| match (key(a), key(b)) {
        (None, None) => std::cmp::Ordering::Equal,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (Some(_), None) => std::cmp::Ordering::Less,
        (Some(x), Some(y)) => {
            let cmp = x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal);
            match order {
                SortOrder::Asc => cmp,
                SortOrder::Desc => cmp.reverse(),
            }
        }
    });
}
