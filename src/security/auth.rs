//! Authentication Module
//!
//! Resolves the calling user's identity from request headers:
//! - API Key (`X-API-Key` or `Authorization: ApiKey ...`)
//! - JWT (`Authorization: Bearer ...`)
//!
//! 搜索端点对匿名用户开放，缺少凭据解析为 None 而非错误；
//! 提供了凭据但无效（过期、签名不符、未知密钥）才返回认证错误。

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{AppError, Result};

/// Credentials extracted from request headers
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    /// API key (if provided)
    pub api_key: Option<String>,
    /// JWT token (if provided)
    pub jwt_token: Option<String>,
}

impl Credentials {
    pub fn new(api_key: Option<String>, jwt_token: Option<String>) -> Self {
        Self { api_key, jwt_token }
    }

    /// Try to extract credentials from headers
    pub fn from_headers(headers: &axum::http::HeaderMap) -> Self {
        if let Some(key) = headers.get("X-API-Key").and_then(|v| v.to_str().ok()) {
            return Self::new(Some(key.to_string()), None);
        }

        match headers.get("Authorization").and_then(|v| v.to_str().ok()) {
            Some(header) if header.starts_with("ApiKey ") => {
                Self::new(Some(header[7..].to_string()), None)
            }
            Some(header) if header.starts_with("Bearer ") => {
                Self::new(None, Some(header[7..].to_string()))
            }
            _ => Self::default(),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.api_key.is_none() && self.jwt_token.is_none()
    }
}

/// 已解析的调用者身份
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    /// 用户标识
    pub subject: String,
    /// 是否为付费用户（付费用户不受每日搜索配额限制）
    pub premium: bool,
}

/// JWT Claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (usually user ID)
    pub sub: String,
    /// Premium subscription flag
    #[serde(default)]
    pub premium: bool,
    /// Token expiration timestamp
    pub exp: usize,
    /// Issued at timestamp
    pub iat: usize,
}

impl Claims {
    pub fn new(sub: String, premium: bool, expiry_seconds: u64) -> Self {
        let now = chrono::Utc::now().timestamp() as usize;
        Self {
            sub,
            premium,
            exp: now + expiry_seconds as usize,
            iat: now,
        }
    }
}

/// 身份解析接口
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// 解析凭据；匿名返回 Ok(None)，凭据无效返回认证错误
    async fn resolve(&self, credentials: &Credentials) -> Result<Option<CallerIdentity>>;
}

/// JWT + API Key 身份解析器
#[derive(Clone)]
pub struct JwtIdentityResolver {
    decoding_key: DecodingKey,
    encoding_key: EncodingKey,
    validation: Validation,
    /// 合法的 API 密钥；密钥调用者视为内部服务，享有付费待遇
    api_keys: HashSet<String>,
}

impl JwtIdentityResolver {
    pub fn new(jwt_secret: &str, api_keys: impl IntoIterator<Item = String>) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(jwt_secret.as_bytes()),
            encoding_key: EncodingKey::from_secret(jwt_secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
            api_keys: api_keys.into_iter().collect(),
        }
    }

    /// 开发环境解析器
    pub fn development() -> Self {
        Self::new(
            "dev-jwt-secret-change-in-production",
            ["dev-api-key".to_string()],
        )
    }

    /// 签发令牌（开发与测试用）
    pub fn issue_token(&self, subject: &str, premium: bool, expiry_seconds: u64) -> Result<String> {
        let claims = Claims::new(subject.to_string(), premium, expiry_seconds);
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("token encoding failed: {}", e)))
    }
}

#[async_trait]
impl IdentityResolver for JwtIdentityResolver {
    async fn resolve(&self, credentials: &Credentials) -> Result<Option<CallerIdentity>> {
        if let Some(token) = &credentials.jwt_token {
            let data = decode::<Claims>(token, &self.decoding_key, &self.validation)
                .map_err(|e| AppError::Authentication(format!("invalid token: {}", e)))?;
            return Ok(Some(CallerIdentity {
                subject: data.claims.sub,
                premium: data.claims.premium,
            }));
        }

        if let Some(key) = &credentials.api_key {
            if self.api_keys.contains(key) {
                return Ok(Some(CallerIdentity {
                    subject: format!("api-key:{}", key),
                    premium: true,
                }));
            }
            return Err(AppError::Authentication("unknown API key".to_string()));
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;

    #[tokio::test]
    async fn test_anonymous_resolves_to_none() {
        let resolver = JwtIdentityResolver::development();
        let identity = resolver.resolve(&Credentials::default()).await.unwrap();
        assert!(identity.is_none());
    }

    #[tokio::test]
    async fn test_valid_jwt_resolves_identity() {
        let resolver = JwtIdentityResolver::development();
        let token = resolver.issue_token("user-42", true, 3600).unwrap();

        let credentials = Credentials::new(None, Some(token));
        let identity = resolver.resolve(&credentials).await.unwrap().unwrap();
        assert_eq!(identity.subject, "user-42");
        assert!(identity.premium);
    }

    #[tokio::test]
    async fn test_expired_jwt_is_rejected() {
        let resolver = JwtIdentityResolver::development();

        // 手工构造一小时前就过期的 claims
        let now = chrono::Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: "user-42".to_string(),
            premium: false,
            exp: now - 3600,
            iat: now - 7200,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &resolver.encoding_key,
        )
        .unwrap();

        let credentials = Credentials::new(None, Some(token));
        let result = resolver.resolve(&credentials).await;
        assert!(matches!(result, Err(AppError::Authentication(_))));
    }

    #[tokio::test]
    async fn test_unknown_api_key_is_rejected() {
        let resolver = JwtIdentityResolver::development();
        let credentials = Credentials::new(Some("wrong-key".to_string()), None);
        assert!(matches!(
            resolver.resolve(&credentials).await,
            Err(AppError::Authentication(_))
        ));
    }

    #[tokio::test]
    async fn test_known_api_key_is_premium() {
        let resolver = JwtIdentityResolver::development();
        let credentials = Credentials::new(Some("dev-api-key".to_string()), None);
        let identity = resolver.resolve(&credentials).await.unwrap().unwrap();
        assert!(identity.premium);
    }

    #[test]
    fn test_credentials_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", "Bearer abc.def.ghi".parse().unwrap());
        let credentials = Credentials::from_headers(&headers);
        assert_eq!(credentials.jwt_token.as_deref(), Some("abc.def.ghi"));

        let mut headers = HeaderMap::new();
        headers.insert("X-API-Key", "k1".parse().unwrap());
        let credentials = Credentials::from_headers(&headers);
        assert_eq!(credentials.api_key.as_deref(), Some("k1"));

        assert!(Credentials::from_headers(&HeaderMap::new()).is_anonymous());
    }
}
