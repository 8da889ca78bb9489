//! 错误处理模块
//!
//! 定义应用程序的错误类型和错误处理逻辑。

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 单个字段的验证错误
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldError {
    /// 字段名称
    pub field: String,
    /// 错误说明
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// 应用程序错误类型
#[derive(Error, Debug)]
pub enum AppError {
    /// 数据库错误
    #[error("数据库错误: {0}")]
    Database(String),

    /// 上游协作服务错误
    #[error("上游服务错误: {0}")]
    Upstream(String),

    /// 认证错误
    #[error("认证失败: {0}")]
    Authentication(String),

    /// 资源不存在
    #[error("资源不存在: {0}")]
    NotFound(String),

    /// 参数验证错误（携带字段级明细）
    #[error("参数验证失败: {} 个字段无效", .0.len())]
    Validation(Vec<FieldError>),

    /// 每日搜索配额已用完
    #[error("今日搜索配额已用完，请稍后再试")]
    QuotaExceeded {
        /// 距离配额重置的秒数
        retry_after: u64,
    },

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    Serialization(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    Internal(String),

    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(String),
}

impl AppError {
    /// 单字段验证错误的便捷构造
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation(vec![FieldError::new(field, message)])
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Serialization(e.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(e: config::ConfigError) -> Self {
        AppError::Config(e.to_string())
    }
}

#[cfg(feature = "surrealdb")]
impl From<surrealdb::Error> for AppError {
    fn from(e: surrealdb::Error) -> Self {
        AppError::Database(e.to_string())
    }
}

/// Axum response implementation for AppError
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = (&self).into();

        // 上游/数据库错误不向调用方泄漏内部细节
        let body = match &self {
            AppError::Validation(fields) => {
                ErrorResponse::new(&code, &self.to_string()).with_fields(fields.clone())
            }
            AppError::QuotaExceeded { retry_after } => {
                ErrorResponse::new(&code, &self.to_string())
                    .with_details(&format!("retry_after={}", retry_after))
            }
            AppError::Database(detail) | AppError::Upstream(detail) => {
                tracing::error!("upstream failure: {}", detail);
                ErrorResponse::new(&code, "服务暂时不可用")
            }
            _ => ErrorResponse::new(&code, &self.to_string()),
        };

        (
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Json(body),
        )
            .into_response()
    }
}

/// 错误响应
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// 错误代码
    pub code: String,
    /// 错误消息
    pub message: String,
    /// 详细信息
    pub details: Option<String>,
    /// 字段级验证明细
    pub fields: Option<Vec<FieldError>>,
    /// 请求 ID
    pub request_id: Option<String>,
}

impl ErrorResponse {
    /// 创建新错误响应
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
            details: None,
            fields: None,
            request_id: None,
        }
    }

    /// 添加详细信息
    pub fn with_details(mut self, details: &str) -> Self {
        self.details = Some(details.to_string());
        self
    }

    /// 添加字段级明细
    pub fn with_fields(mut self, fields: Vec<FieldError>) -> Self {
        self.fields = Some(fields);
        self
    }

    /// 添加请求 ID
    pub fn with_request_id(mut self, request_id: &str) -> Self {
        self.request_id = Some(request_id.to_string());
        self
    }
}

/// HTTP 状态码映射
impl From<&AppError> for (u16, String) {
    fn from(err: &AppError) -> (u16, String) {
        match err {
            AppError::NotFound(_) => (404, "NOT_FOUND".to_string()),
            AppError::Authentication(_) => (401, "UNAUTHORIZED".to_string()),
            AppError::Validation(_) => (400, "BAD_REQUEST".to_string()),
            AppError::QuotaExceeded { .. } => (429, "QUOTA_EXCEEDED".to_string()),
            AppError::Database(_) | AppError::Upstream(_) => (500, "INTERNAL_ERROR".to_string()),
            _ => (500, "INTERNAL_ERROR".to_string()),
        }
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_maps_to_400() {
        let err = AppError::validation("page", "必须大于等于 1");
        let (status, code) = (&err).into();
        assert_eq!(status, 400);
        assert_eq!(code, "BAD_REQUEST");
    }

    #[test]
    fn test_quota_error_maps_to_429() {
        let err = AppError::QuotaExceeded { retry_after: 3600 };
        let (status, code) = (&err).into();
        assert_eq!(status, 429);
        assert_eq!(code, "QUOTA_EXCEEDED");
    }

    #[test]
    fn test_upstream_error_does_not_leak_detail() {
        let err = AppError::Database("connection refused at 10.0.0.3".to_string());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
