//! 调用方身份提取
//!
//! 认证由上游身份网关完成，请求到达时携带 `x-user-id` 头（UUID）。
//! 需要身份的端点用 `Identity` 提取器（缺头即 401）。

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::ApiError;

const USER_ID_HEADER: &str = "x-user-id";

/// 已验证的调用方身份
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity(pub Uuid);

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("缺少 x-user-id 请求头".to_string()))?;

        let user_id = Uuid::parse_str(raw)
            .map_err(|_| ApiError::Unauthorized("x-user-id 不是合法的 UUID".to_string()))?;

        Ok(Identity(user_id))
    }
}
