//! 客群模型

use chrono::{DateTime, Utc};
use rule_engine::RuleGroup;
use serde::Serialize;
use sqlx::types::Json;
use uuid::Uuid;

/// 客群：一份命名的规则定义加上缓存的命中人数
///
/// `customer_count` 是按需重算的非规范化缓存，允许过期。
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// 规则 JSON，读写均精确往返
    pub rules: Json<RuleGroup>,
    pub created_by: Option<Uuid>,
    pub customer_count: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 待持久化的客群
#[derive(Debug, Clone)]
pub struct NewSegment {
    pub name: String,
    pub description: Option<String>,
    pub rules: RuleGroup,
    pub created_by: Option<Uuid>,
}
