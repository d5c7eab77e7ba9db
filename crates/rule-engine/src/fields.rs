//! 客户字段注册表
//!
//! 规则条件只能引用这里列出的客户属性。封闭的字段集合既是规范要求
//! （规则只对已知属性生效），也是编译到 SQL 时列名白名单的来源。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 字段类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// 数值字段（消费额、访问次数）
    Numeric,
    /// 文本字段（姓名、邮箱、电话）
    Text,
    /// 标签集合（成员检查，不关心顺序）
    Tags,
    /// 时间戳字段
    Timestamp,
}

/// 合法的规则目标字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CustomerField {
    #[serde(rename = "totalSpend")]
    TotalSpend,
    #[serde(rename = "visits")]
    Visits,
    #[serde(rename = "name")]
    Name,
    #[serde(rename = "email")]
    Email,
    #[serde(rename = "phone")]
    Phone,
    #[serde(rename = "tags")]
    Tags,
    #[serde(rename = "lastActive")]
    LastActive,
    #[serde(rename = "createdAt")]
    CreatedAt,
}

impl CustomerField {
    /// 从线上字段名解析
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "totalSpend" => Some(Self::TotalSpend),
            "visits" => Some(Self::Visits),
            "name" => Some(Self::Name),
            "email" => Some(Self::Email),
            "phone" => Some(Self::Phone),
            "tags" => Some(Self::Tags),
            "lastActive" => Some(Self::LastActive),
            "createdAt" => Some(Self::CreatedAt),
            _ => None,
        }
    }

    /// 线上字段名（camelCase）
    pub fn name(&self) -> &'static str {
        match self {
            Self::TotalSpend => "totalSpend",
            Self::Visits => "visits",
            Self::Name => "name",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Tags => "tags",
            Self::LastActive => "lastActive",
            Self::CreatedAt => "createdAt",
        }
    }

    /// 数据库列名（snake_case）
    ///
    /// 编译产物只会引用这里返回的列名，规则 JSON 中的字段字符串
    /// 永远不会直接拼进 SQL。
    pub fn column(&self) -> &'static str {
        match self {
            Self::TotalSpend => "total_spend",
            Self::Visits => "visits",
            Self::Name => "name",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Tags => "tags",
            Self::LastActive => "last_active",
            Self::CreatedAt => "created_at",
        }
    }

    /// 字段类型
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::TotalSpend | Self::Visits => FieldKind::Numeric,
            Self::Name | Self::Email | Self::Phone => FieldKind::Text,
            Self::Tags => FieldKind::Tags,
            Self::LastActive | Self::CreatedAt => FieldKind::Timestamp,
        }
    }
}

impl fmt::Display for CustomerField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
