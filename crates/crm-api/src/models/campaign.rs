//! 营销活动模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// 活动状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "campaign_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Draft,
    Scheduled,
    Running,
    Completed,
    Failed,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Scheduled => "scheduled",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 营销活动
///
/// 统计计数器随触达事件逐一递增（原子 +1），从不整体覆盖。
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub segment_id: Uuid,
    pub message_subject: Option<String>,
    pub message_content: Option<String>,
    pub message_template: Option<String>,
    pub status: CampaignStatus,
    pub stats_total_recipients: i64,
    pub stats_sent: i64,
    pub stats_delivered: i64,
    pub stats_failed: i64,
    pub stats_opened: i64,
    pub stats_clicked: i64,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    /// 只有草稿可以发送，发送中/已结束的活动不允许重复触发
    pub fn is_sendable(&self) -> bool {
        self.status == CampaignStatus::Draft
    }
}
