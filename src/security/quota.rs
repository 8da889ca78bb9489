//! Search Quota Module
//!
//! 非付费调用者的每日搜索配额：24 小时滚动窗口内最多 N 次搜索，
//! 超出返回独立的配额错误（HTTP 429 等价），以便客户端渲染升级提示。
//! 付费身份由编排器直接绕过本模块。

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// 配额检查结果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum QuotaDecision {
    /// 允许，附剩余额度
    Allowed {
        /// 本窗口剩余次数
        remaining: u32,
    },
    /// 已超额
    Exceeded {
        /// 距最早一次记录滚出窗口的秒数
        retry_after: u64,
    },
}

/// 配额主体标识
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum QuotaClient {
    /// 已登录用户
    Subject(String),
    /// 匿名调用者按 IP 计
    Ip(String),
    /// 自定义标识
    Custom(String),
}

impl QuotaClient {
    pub fn from_subject(subject: &str) -> Self {
        QuotaClient::Subject(subject.to_string())
    }

    pub fn from_ip(ip: &str) -> Self {
        QuotaClient::Ip(ip.to_string())
    }

    /// Get client identifier string
    pub fn as_str(&self) -> &str {
        match self {
            QuotaClient::Subject(s) => s.as_str(),
            QuotaClient::Ip(s) => s.as_str(),
            QuotaClient::Custom(s) => s.as_str(),
        }
    }

    /// 从请求头提取匿名调用者的 IP 标识
    ///
    /// 代理头缺失时退回到对端地址，保证直连调用者在请求之间
    /// 落在同一配额主体上；完全无法定位来源时才生成一次性标识。
    pub fn from_headers(
        headers: &axum::http::HeaderMap,
        peer: Option<std::net::SocketAddr>,
    ) -> Self {
        if let Some(ip) = headers.get("X-Forwarded-For").and_then(|v| v.to_str().ok()) {
            return QuotaClient::from_ip(ip.split(',').next().unwrap_or(ip).trim());
        }

        if let Some(ip) = headers.get("X-Real-IP").and_then(|v| v.to_str().ok()) {
            return QuotaClient::from_ip(ip);
        }

        if let Some(peer) = peer {
            return QuotaClient::from_ip(&peer.ip().to_string());
        }

        QuotaClient::Custom(format!("unknown-{}", uuid::Uuid::new_v4()))
    }
}

/// 滚动窗口配额计数器
#[derive(Debug, Clone)]
pub struct SearchQuota {
    /// 24 小时内允许的搜索次数
    daily_limit: u32,
    /// 请求历史（主体 -> 时间戳）
    history: Arc<RwLock<HashMap<String, Vec<DateTime<Utc>>>>>,
    /// 是否启用
    enabled: bool,
}

impl SearchQuota {
    pub fn new(daily_limit: u32, enabled: bool) -> Self {
        Self {
            daily_limit,
            history: Arc::new(RwLock::new(HashMap::new())),
            enabled,
        }
    }

    /// 开发环境：关闭配额
    pub fn development() -> Self {
        Self::new(50, false)
    }

    /// 生产环境
    pub fn production(daily_limit: u32) -> Self {
        Self::new(daily_limit, true)
    }

    /// 检查并记录一次搜索
    ///
    /// 通过时把本次计入窗口；拒绝时不计入。
    pub async fn check_and_record(&self, client: &QuotaClient) -> QuotaDecision {
        if !self.enabled {
            return QuotaDecision::Allowed {
                remaining: self.daily_limit,
            };
        }

        let client_id = client.as_str();
        let now = Utc::now();
        let window_start = now - Duration::hours(24);

        let mut history = self.history.write().await;
        let timestamps = history.entry(client_id.to_string()).or_default();

        // 顺带滚出窗口外的旧记录，限制内存
        timestamps.retain(|t| *t > window_start);

        if timestamps.len() >= self.daily_limit as usize {
            let oldest = timestamps.iter().min().copied().unwrap_or(now);
            let retry_after = (oldest + Duration::hours(24) - now).num_seconds().max(0) as u64;
            return QuotaDecision::Exceeded { retry_after };
        }

        timestamps.push(now);
        let remaining = self.daily_limit - timestamps.len() as u32;
        QuotaDecision::Allowed { remaining }
    }

    /// 当前窗口内已用次数
    pub async fn used(&self, client: &QuotaClient) -> u32 {
        let now = Utc::now();
        let window_start = now - Duration::hours(24);
        let history = self.history.read().await;
        history
            .get(client.as_str())
            .map(|v| v.iter().filter(|t| **t > window_start).count() as u32)
            .unwrap_or(0)
    }

    /// 清除单个主体的记录（测试/管理用）
    pub async fn clear_client(&self, client: &QuotaClient) {
        let mut history = self.history.write().await;
        history.remove(client.as_str());
    }

    /// 清除全部记录（测试用）
    pub async fn clear_all(&self) {
        let mut history = self.history.write().await;
        history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_allows_up_to_daily_limit() {
        let quota = SearchQuota::new(3, true);
        let client = QuotaClient::from_subject("user-1");

        for expected_remaining in [2u32, 1, 0] {
            match quota.check_and_record(&client).await {
                QuotaDecision::Allowed { remaining } => {
                    assert_eq!(remaining, expected_remaining)
                }
                other => panic!("unexpected decision: {:?}", other),
            }
        }

        assert!(matches!(
            quota.check_and_record(&client).await,
            QuotaDecision::Exceeded { .. }
        ));
    }

    #[tokio::test]
    async fn test_rejection_is_not_counted() {
        let quota = SearchQuota::new(1, true);
        let client = QuotaClient::from_subject("user-1");

        quota.check_and_record(&client).await;
        quota.check_and_record(&client).await;
        quota.check_and_record(&client).await;
        assert_eq!(quota.used(&client).await, 1);
    }

    #[tokio::test]
    async fn test_clients_are_isolated() {
        let quota = SearchQuota::new(1, true);
        let first = QuotaClient::from_subject("user-1");
        let second = QuotaClient::from_ip("10.0.0.7");

        assert!(matches!(
            quota.check_and_record(&first).await,
            QuotaDecision::Allowed { .. }
        ));
        assert!(matches!(
            quota.check_and_record(&second).await,
            QuotaDecision::Allowed { .. }
        ));
        assert!(matches!(
            quota.check_and_record(&first).await,
            QuotaDecision::Exceeded { .. }
        ));
    }

    #[tokio::test]
    async fn test_disabled_quota_always_allows() {
        let quota = SearchQuota::new(0, false);
        let client = QuotaClient::from_subject("user-1");
        for _ in 0..10 {
            assert!(matches!(
                quota.check_and_record(&client).await,
                QuotaDecision::Allowed { .. }
            ));
        }
    }

    #[tokio::test]
    async fn test_retry_after_is_bounded_by_window() {
        let quota = SearchQuota::new(1, true);
        let client = QuotaClient::from_subject("user-1");
        quota.check_and_record(&client).await;

        match quota.check_and_record(&client).await {
            QuotaDecision::Exceeded { retry_after } => {
                assert!(retry_after <= 24 * 3600);
            }
            other => panic!("unexpected decision: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_clear_client_resets_quota() {
        let quota = SearchQuota::new(1, true);
        let client = QuotaClient::from_subject("user-1");
        quota.check_and_record(&client).await;
        quota.clear_client(&client).await;
        assert!(matches!(
            quota.check_and_record(&client).await,
            QuotaDecision::Allowed { .. }
        ));
    }

    #[test]
    fn test_quota_client_from_forwarded_header() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert("X-Forwarded-For", "203.0.113.9, 10.0.0.1".parse().unwrap());
        let client = QuotaClient::from_headers(&headers, None);
        assert_eq!(client, QuotaClient::Ip("203.0.113.9".to_string()));
    }

    #[test]
    fn test_headerless_client_keyed_by_peer_address() {
        let headers = axum::http::HeaderMap::new();
        let peer: std::net::SocketAddr = "198.51.100.4:51823".parse().unwrap();

        let client = QuotaClient::from_headers(&headers, Some(peer));
        assert_eq!(client, QuotaClient::Ip("198.51.100.4".to_string()));

        // 同一对端的两次请求落在同一配额主体上（端口不参与）
        let other_port: std::net::SocketAddr = "198.51.100.4:40022".parse().unwrap();
        assert_eq!(client, QuotaClient::from_headers(&headers, Some(other_port)));
    }

    #[tokio::test]
    async fn test_headerless_direct_caller_cannot_bypass_quota() {
        let quota = SearchQuota::new(1, true);
        let headers = axum::http::HeaderMap::new();
        let peer: std::net::SocketAddr = "198.51.100.4:51823".parse().unwrap();

        let first = QuotaClient::from_headers(&headers, Some(peer));
        assert!(matches!(
            quota.check_and_record(&first).await,
            QuotaDecision::Allowed { .. }
        ));

        // 新连接（新端口）必须命中同一份历史
        let second_conn: std::net::SocketAddr = "198.51.100.4:40022".parse().unwrap();
        let second = QuotaClient::from_headers(&headers, Some(second_conn));
        assert!(matches!(
            quota.check_and_record(&second).await,
            QuotaDecision::Exceeded { .. }
        ));
    }
}
