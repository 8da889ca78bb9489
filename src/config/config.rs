use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SurrealDB 连接地址
    pub url: String,
    /// 命名空间
    pub namespace: String,
    /// 数据库名称
    pub database: String,
    /// 用户名
    pub username: String,
    /// 密码
    pub password: String,
    /// 连接超时（秒）
    pub connection_timeout: u64,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// 服务地址
    pub host: String,
    /// 服务端口
    pub port: u16,
    /// 请求超时（秒）
    pub request_timeout: u64,
}

/// 搜索缓存配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CacheConfig {
    /// 缓存条目存活时间（秒）
    pub ttl_seconds: u64,
    /// 后台清理间隔（秒），0 表示关闭
    pub sweep_interval_seconds: u64,
    /// Cache-Control 头中的 stale-while-revalidate 窗口（秒）
    pub stale_while_revalidate: u64,
}

/// 搜索配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SearchConfig {
    /// 默认分页大小
    pub default_limit: usize,
    /// 分页大小上限（超出时钳制而非拒绝）
    pub max_limit: usize,
}

/// 搜索配额配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct QuotaConfig {
    /// 是否启用配额
    pub enabled: bool,
    /// 非付费用户 24 小时内的搜索次数上限
    pub daily_limit: u32,
}

/// 安全配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SecurityConfig {
    /// JWT 签名密钥
    pub jwt_secret: String,
    /// 允许的 API 密钥列表
    pub api_keys: Vec<String>,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: String,
    /// 结构化日志格式
    pub structured: bool,
    /// 日志文件路径
    pub log_dir: Option<PathBuf>,
}

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// 数据库配置
    pub database: DatabaseConfig,
    /// 服务器配置
    pub server: ServerConfig,
    /// 缓存配置
    pub cache: CacheConfig,
    /// 搜索配置
    pub search: SearchConfig,
    /// 配额配置
    pub quota: QuotaConfig,
    /// 安全配置
    pub security: SecurityConfig,
    /// 日志配置
    pub logging: LoggingConfig,
    /// 应用名称
    pub app_name: String,
    /// 环境
    pub environment: String,
}

impl AppConfig {
    /// 创建开发环境配置
    pub fn development() -> Self {
        Self {
            database: DatabaseConfig {
                url: "ws://localhost:8000".into(),
                namespace: "szkolnik".into(),
                database: "schools".into(),
                username: "root".into(),
                password: "root".into(),
                connection_timeout: 30,
            },
            server: ServerConfig {
                host: "0.0.0.0".into(),
                port: 8080,
                request_timeout: 30,
            },
            cache: CacheConfig {
                ttl_seconds: 300,
                sweep_interval_seconds: 60,
                stale_while_revalidate: 60,
            },
            search: SearchConfig {
                default_limit: 12,
                max_limit: 50,
            },
            quota: QuotaConfig {
                enabled: false,
                daily_limit: 50,
            },
            security: SecurityConfig {
                jwt_secret: "dev-jwt-secret-change-in-production".into(),
                api_keys: vec!["dev-api-key".into()],
            },
            logging: LoggingConfig {
                level: "debug".into(),
                structured: true,
                log_dir: Some(PathBuf::from("./logs")),
            },
            app_name: "szkolnik".into(),
            environment: "development".into(),
        }
    }

    /// 创建生产环境配置
    pub fn production() -> Self {
        let mut config = Self::development();
        config.environment = "production".into();
        config.logging.level = "info".into();
        config.quota.enabled = true;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_development_defaults() {
        let config = AppConfig::development();
        assert_eq!(config.search.default_limit, 12);
        assert_eq!(config.search.max_limit, 50);
        assert_eq!(config.cache.ttl_seconds, 300);
        assert!(!config.quota.enabled);
    }

    #[test]
    fn test_production_enables_quota() {
        let config = AppConfig::production();
        assert!(config.quota.enabled);
        assert_eq!(config.logging.level, "info");
    }
}
