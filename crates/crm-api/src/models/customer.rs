//! 客户模型
//!
//! 客户是规则条件的目标记录：`FieldAccess` 实现定义了每个规则字段
//! 在客户上的取值方式，与数据库列的语义保持一致（None 即 NULL）。

use chrono::{DateTime, Utc};
use rule_engine::{CustomerField, FieldAccess};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

/// 单笔消费记录（purchase_history JSONB 的元素）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub amount: f64,
    pub date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<String>,
}

/// 客户记录
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    /// 累计消费额，追加消费记录时由 purchase_history 重新汇总
    pub total_spend: f64,
    pub visits: i32,
    pub last_active: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub purchase_history: Json<Vec<Purchase>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// 按消费历史重新汇总累计消费额
    pub fn total_from_history(purchases: &[Purchase]) -> f64 {
        purchases.iter().map(|p| p.amount).sum()
    }
}

impl FieldAccess for Customer {
    fn numeric(&self, field: CustomerField) -> Option<f64> {
        match field {
            CustomerField::TotalSpend => Some(self.total_spend),
            CustomerField::Visits => Some(f64::from(self.visits)),
            _ => None,
        }
    }

    fn text(&self, field: CustomerField) -> Option<&str> {
        match field {
            CustomerField::Name => Some(&self.name),
            CustomerField::Email => Some(&self.email),
            CustomerField::Phone => self.phone.as_deref(),
            _ => None,
        }
    }

    fn tags(&self, field: CustomerField) -> Option<&[String]> {
        match field {
            CustomerField::Tags => Some(&self.tags),
            _ => None,
        }
    }

    fn time(&self, field: CustomerField) -> Option<DateTime<Utc>> {
        match field {
            CustomerField::LastActive => self.last_active,
            CustomerField::CreatedAt => Some(self.created_at),
            _ => None,
        }
    }
}
