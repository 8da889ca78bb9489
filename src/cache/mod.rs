//! 搜索缓存模块
//!
//! 进程内 TTL 缓存，支持按标签批量失效。实例由 main 显式构造并注入
//! AppState（测试各自构造独立实例），不使用全局单例。
//!
//! 语义约定：
//! - 过期采用惰性策略，读取时检查并顺带删除过期条目；
//! - 读写不返回错误，任何内部异常都退化为未命中；
//! - 多进程部署时各进程缓存相互独立，不做跨进程一致性。

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// 缓存条目
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    created_at: DateTime<Utc>,
    ttl_seconds: u64,
    tags: Vec<String>,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at >= Duration::seconds(self.ttl_seconds as i64)
    }
}

/// 缓存统计
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// 当前条目数
    pub entries: usize,
    /// 命中次数
    pub hits: u64,
    /// 未命中次数
    pub misses: u64,
    /// 失效删除的条目数（含过期与主动失效）
    pub evictions: u64,
}

/// 进程内 TTL + 标签缓存
#[derive(Debug)]
pub struct CacheStore<V> {
    entries: DashMap<String, CacheEntry<V>>,
    /// 标签 -> 键集合
    tag_index: DashMap<String, HashSet<String>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<V: Clone> Default for CacheStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> CacheStore<V> {
    /// 创建新缓存实例
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            tag_index: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// 写入条目
    pub fn set(&self, key: &str, value: V, ttl_seconds: u64, tags: &[&str]) {
        let entry = CacheEntry {
            value,
            created_at: Utc::now(),
            ttl_seconds,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        };

        // 覆盖旧条目时先摘除旧的标签关联
        if let Some(old) = self.entries.insert(key.to_string(), entry) {
            self.detach_tags(key, &old.tags);
        }

        for tag in tags {
            self.tag_index
                .entry(tag.to_string())
                .or_default()
                .insert(key.to_string());
        }
    }

    /// 读取条目；过期条目视为未命中并顺带删除
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Utc::now();

        let expired = match self.entries.get(key) {
            Some(entry) if entry.is_expired(now) => true,
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.value.clone());
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        if expired {
            self.invalidate(key);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// 删除单个条目
    pub fn invalidate(&self, key: &str) -> bool {
        if let Some((_, entry)) = self.entries.remove(key) {
            self.detach_tags(key, &entry.tags);
            self.evictions.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// 删除携带指定标签的所有条目，返回删除数量
    ///
    /// 复杂度 O(标签下的键数)，进程内缓存规模有界，可接受。
    pub fn invalidate_by_tag(&self, tag: &str) -> usize {
        let keys: Vec<String> = self
            .tag_index
            .remove(tag)
            .map(|(_, keys)| keys.into_iter().collect())
            .unwrap_or_default();

        let mut removed = 0;
        for key in keys {
            if let Some((_, entry)) = self.entries.remove(&key) {
                self.detach_tags(&key, &entry.tags);
                self.evictions.fetch_add(1, Ordering::Relaxed);
                removed += 1;
            }
        }
        removed
    }

    /// 清空缓存
    pub fn clear(&self) {
        let count = self.entries.len() as u64;
        self.entries.clear();
        self.tag_index.clear();
        self.evictions.fetch_add(count, Ordering::Relaxed);
    }

    /// 当前条目数（含尚未被惰性清理的过期条目）
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 缓存统计快照
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// 删除所有已过期条目，返回删除数量
    ///
    /// 正确性不依赖此清理（读路径已做惰性过期），仅用于限制内存占用。
    pub fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let expired_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.value().is_expired(now))
            .map(|e| e.key().clone())
            .collect();

        let mut removed = 0;
        for key in expired_keys {
            if self.invalidate(&key) {
                removed += 1;
            }
        }
        removed
    }

    fn detach_tags(&self, key: &str, tags: &[String]) {
        for tag in tags {
            if let Some(mut keys) = self.tag_index.get_mut(tag) {
                keys.remove(key);
            }
        }
    }
}

/// 启动后台过期清理任务
pub fn spawn_sweeper<V: Clone + Send + Sync + 'static>(
    cache: Arc<CacheStore<V>>,
    interval_seconds: u64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(interval_seconds.max(1)));
        loop {
            interval.tick().await;
            let removed = cache.sweep_expired();
            if removed > 0 {
                tracing::debug!("cache sweep removed {} expired entries", removed);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_then_get() {
        let cache: CacheStore<String> = CacheStore::new();
        cache.set("k1", "v1".to_string(), 60, &["schools"]);

        assert_eq!(cache.get("k1"), Some("v1".to_string()));
        assert_eq!(cache.get("k2"), None);
    }

    #[test]
    fn test_zero_ttl_expires_immediately() {
        let cache: CacheStore<u32> = CacheStore::new();
        cache.set("k1", 1, 0, &[]);

        assert_eq!(cache.get("k1"), None);
        // 惰性过期应已删除条目
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate_by_tag_removes_all_tagged() {
        let cache: CacheStore<u32> = CacheStore::new();
        cache.set("a", 1, 60, &["schools", "search"]);
        cache.set("b", 2, 60, &["schools"]);
        cache.set("c", 3, 60, &["other"]);

        let removed = cache.invalidate_by_tag("schools");
        assert_eq!(removed, 2);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("c"), Some(3));
    }

    #[test]
    fn test_invalidate_by_unknown_tag_is_noop() {
        let cache: CacheStore<u32> = CacheStore::new();
        cache.set("a", 1, 60, &["schools"]);
        assert_eq!(cache.invalidate_by_tag("missing"), 0);
        assert_eq!(cache.get("a"), Some(1));
    }

    #[test]
    fn test_overwrite_detaches_old_tags() {
        let cache: CacheStore<u32> = CacheStore::new();
        cache.set("a", 1, 60, &["old"]);
        cache.set("a", 2, 60, &["new"]);

        assert_eq!(cache.invalidate_by_tag("old"), 0);
        assert_eq!(cache.get("a"), Some(2));
        assert_eq!(cache.invalidate_by_tag("new"), 1);
        assert_eq!(cache.get("a"), None);
    }

    #[test]
    fn test_clear_empties_everything() {
        let cache: CacheStore<u32> = CacheStore::new();
        cache.set("a", 1, 60, &["schools"]);
        cache.set("b", 2, 60, &[]);
        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(cache.get("a"), None);
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let cache: CacheStore<u32> = CacheStore::new();
        cache.set("fresh", 1, 60, &[]);
        cache.set("stale", 2, 0, &[]);

        let removed = cache.sweep_expired();
        assert_eq!(removed, 1);
        assert_eq!(cache.get("fresh"), Some(1));
    }

    #[test]
    fn test_stats_track_hits_and_misses() {
        let cache: CacheStore<u32> = CacheStore::new();
        cache.set("a", 1, 60, &[]);
        cache.get("a");
        cache.get("a");
        cache.get("missing");

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }
}
