//! API 错误类型定义

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rule_engine::RuleError;
use serde_json::json;
use uuid::Uuid;

/// CRM 服务错误类型
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    // 规则错误：结构畸形或条件非法，来自规则解析/编译
    #[error("规则无效: {0}")]
    InvalidRule(#[from] RuleError),

    // 验证错误
    #[error("参数验证失败: {0}")]
    Validation(String),

    // 身份错误
    #[error("未授权: {0}")]
    Unauthorized(String),
    #[error("禁止访问: {0}")]
    Forbidden(String),

    // 资源不存在
    #[error("客户不存在: {0}")]
    CustomerNotFound(Uuid),
    #[error("客群不存在: {0}")]
    SegmentNotFound(Uuid),
    #[error("活动不存在: {0}")]
    CampaignNotFound(Uuid),
    #[error("消息不存在: {0}")]
    MessageNotFound(String),

    // 业务错误
    #[error("活动当前状态为 {status}，不能发送")]
    CampaignNotSendable { status: String },
    #[error("客群没有匹配的客户，无法发送")]
    EmptySegment,
    #[error("邮箱已被占用: {0}")]
    DuplicateEmail(String),

    // 系统错误
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),
    #[error("内部错误: {0}")]
    Internal(String),
}

impl ApiError {
    /// 返回对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRule(_) | Self::Validation(_) | Self::EmptySegment => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::CustomerNotFound(_)
            | Self::SegmentNotFound(_)
            | Self::CampaignNotFound(_)
            | Self::MessageNotFound(_) => StatusCode::NOT_FOUND,
            Self::CampaignNotSendable { .. } | Self::DuplicateEmail(_) => StatusCode::CONFLICT,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 返回错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidRule(_) => "INVALID_RULE",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::CustomerNotFound(_) => "CUSTOMER_NOT_FOUND",
            Self::SegmentNotFound(_) => "SEGMENT_NOT_FOUND",
            Self::CampaignNotFound(_) => "CAMPAIGN_NOT_FOUND",
            Self::MessageNotFound(_) => "MESSAGE_NOT_FOUND",
            Self::CampaignNotSendable { .. } => "CAMPAIGN_NOT_SENDABLE",
            Self::EmptySegment => "EMPTY_SEGMENT",
            Self::DuplicateEmail(_) => "DUPLICATE_EMAIL",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 系统级错误只返回通用提示，详细信息仅记录日志，防止信息泄露
        let message = match &self {
            Self::Database(e) => {
                tracing::error!(error = %e, "database operation failed");
                "服务内部错误，请稍后重试".to_string()
            }
            Self::Internal(e) => {
                tracing::error!(error = %e, "internal error");
                "服务内部错误，请稍后重试".to_string()
            }
            other => other.to_string(),
        };

        let body = json!({
            "success": false,
            "code": self.error_code(),
            "message": message,
            "data": serde_json::Value::Null
        });

        (status, axum::Json(body)).into_response()
    }
}

/// 从 validator 错误转换
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

/// 服务层 Result 类型别名
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    /// 构造所有可简单构造的错误变体及其期望的 (StatusCode, error_code) 映射。
    /// 表驱动方式保证新增变体时只需在一处维护。
    fn all_error_variants() -> Vec<(ApiError, StatusCode, &'static str)> {
        let id = Uuid::nil();
        vec![
            (
                ApiError::InvalidRule(RuleError::Malformed("未知逻辑操作符 'XOR'".into())),
                StatusCode::BAD_REQUEST,
                "INVALID_RULE",
            ),
            (
                ApiError::Validation("name is required".into()),
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
            ),
            (
                ApiError::Unauthorized("missing x-user-id".into()),
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
            ),
            (
                ApiError::Forbidden("not the creator".into()),
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
            ),
            (ApiError::CustomerNotFound(id), StatusCode::NOT_FOUND, "CUSTOMER_NOT_FOUND"),
            (ApiError::SegmentNotFound(id), StatusCode::NOT_FOUND, "SEGMENT_NOT_FOUND"),
            (ApiError::CampaignNotFound(id), StatusCode::NOT_FOUND, "CAMPAIGN_NOT_FOUND"),
            (
                ApiError::MessageNotFound("msg_123".into()),
                StatusCode::NOT_FOUND,
                "MESSAGE_NOT_FOUND",
            ),
            (
                ApiError::CampaignNotSendable { status: "completed".into() },
                StatusCode::CONFLICT,
                "CAMPAIGN_NOT_SENDABLE",
            ),
            (ApiError::EmptySegment, StatusCode::BAD_REQUEST, "EMPTY_SEGMENT"),
            (
                ApiError::DuplicateEmail("a@b.com".into()),
                StatusCode::CONFLICT,
                "DUPLICATE_EMAIL",
            ),
            (
                ApiError::Internal("unexpected state".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
            ),
        ]
    }

    /// 状态码是 API 契约的一部分，前端依赖它做条件分支，必须逐一锁定
    #[test]
    fn test_all_variants_status_code() {
        for (error, expected_status, label) in all_error_variants() {
            assert_eq!(
                error.status_code(),
                expected_status,
                "状态码不匹配: variant={label}"
            );
        }
    }

    #[test]
    fn test_all_variants_error_code() {
        for (error, _status, expected_code) in all_error_variants() {
            assert_eq!(
                error.error_code(),
                expected_code,
                "错误码不匹配: expected={expected_code}"
            );
        }
    }

    /// 规则错误必须把问题条件的字段/操作符带给调用方
    #[test]
    fn test_invalid_rule_message_names_condition() {
        let rule_err = RuleError::InvalidCondition {
            field: "totalSpend".into(),
            operator: ">".into(),
            reason: "数值字段要求数值类型的 value".into(),
        };
        let err = ApiError::from(rule_err);
        let msg = err.to_string();
        assert!(msg.contains("totalSpend"), "错误信息应指明字段: {msg}");
        assert!(msg.contains('>'), "错误信息应指明操作符: {msg}");
    }

    /// IntoResponse 的响应体必须带全 success/code/message/data 四字段
    #[tokio::test]
    async fn test_into_response_body_structure() {
        for (error, expected_status, expected_code) in all_error_variants() {
            let label = format!("{:?}", error);
            let response = error.into_response();

            assert_eq!(response.status(), expected_status, "响应状态码不匹配: {label}");

            let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .expect("读取响应体失败");
            let body: serde_json::Value =
                serde_json::from_slice(&body_bytes).expect("响应体不是合法 JSON");

            assert_eq!(body["success"], json!(false), "success 应为 false: {label}");
            assert_eq!(body["code"], json!(expected_code), "code 不匹配: {label}");
            assert!(
                !body["message"].as_str().unwrap_or("").is_empty(),
                "message 不应为空: {label}"
            );
            assert!(body["data"].is_null(), "data 应为 null: {label}");
        }
    }

    /// 系统级错误的响应消息不应泄露内部细节
    #[tokio::test]
    async fn test_system_errors_hide_internal_details() {
        let error = ApiError::Internal("stack overflow at module X".into());
        let response = error.into_response();
        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("读取响应体失败");
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        let message = body["message"].as_str().unwrap();

        assert!(!message.contains("stack overflow"), "泄露了内部细节: {message}");
        assert!(message.contains("服务内部错误"), "应返回通用提示: {message}");
    }

    #[test]
    fn test_from_validation_errors() {
        use validator::{ValidationError, ValidationErrors};

        let mut errors = ValidationErrors::new();
        let mut field_error = ValidationError::new("length");
        field_error.message = Some("名称不能为空".into());
        errors.add("name", field_error);

        let err: ApiError = errors.into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn test_from_sqlx_error() {
        let err = ApiError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, ApiError::Database(_)));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
