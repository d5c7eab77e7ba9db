//! 规则引擎错误类型

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    /// 规则结构错误：未知逻辑操作符、叶子缺少 field/operator/value 等
    #[error("规则结构错误: {0}")]
    Malformed(String),

    /// 条件非法：操作符与值/字段类型不兼容
    #[error("条件非法: 字段 '{field}' 操作符 '{operator}' - {reason}")]
    InvalidCondition {
        field: String,
        operator: String,
        reason: String,
    },

    /// 字段不在客户属性白名单中
    #[error("未知字段: '{0}' 不是合法的规则目标")]
    UnknownField(String),

    #[error("JSON 解析错误: {0}")]
    Json(#[from] serde_json::Error),
}

impl RuleError {
    pub(crate) fn invalid(
        field: impl Into<String>,
        operator: impl std::fmt::Display,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidCondition {
            field: field.into(),
            operator: operator.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RuleError>;
