//! REST API 响应体结构

use serde::Serialize;
use uuid::Uuid;

use crate::models::{Campaign, CampaignStatus, Customer, Segment};

/// API 统一响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// 创建成功响应
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            code: "SUCCESS".to_string(),
            message: "操作成功".to_string(),
            data: Some(data),
        }
    }

    /// 创建成功响应（无数据）
    pub fn success_empty() -> ApiResponse<()> {
        ApiResponse {
            success: true,
            code: "SUCCESS".to_string(),
            message: "操作成功".to_string(),
            data: None,
        }
    }

    /// 创建成功响应（自定义消息）
    pub fn success_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            code: "SUCCESS".to_string(),
            message: message.into(),
            data: Some(data),
        }
    }
}

/// 分页响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}

impl<T> PageResponse<T> {
    pub fn new(items: Vec<T>, total: i64, page: i64, page_size: i64) -> Self {
        let total_pages = if page_size > 0 {
            (total + page_size - 1) / page_size
        } else {
            0
        };

        Self {
            items,
            total,
            page,
            page_size,
            total_pages,
        }
    }
}

/// 客户分页信封（圈选列表与搜索列表共用的线上契约）
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerPage {
    pub customers: Vec<Customer>,
    pub current_page: i64,
    pub total_pages: i64,
    pub total_customers: i64,
}

impl CustomerPage {
    pub fn new(customers: Vec<Customer>, total: i64, page: i64, page_size: i64) -> Self {
        let total_pages = if page_size > 0 {
            (total + page_size - 1) / page_size
        } else {
            0
        };

        Self {
            customers,
            current_page: page,
            total_pages,
            total_customers: total,
        }
    }
}

/// 规则预览响应
#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub count: i64,
}

/// 建群响应：客群与随之派生的活动
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentWithCampaign {
    pub segment: Segment,
    pub campaign: Campaign,
}

/// 活动统计
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignStatsDto {
    pub campaign_id: Uuid,
    pub name: String,
    pub status: CampaignStatus,
    pub total_recipients: i64,
    pub sent: i64,
    pub delivered: i64,
    pub failed: i64,
    pub opened: i64,
    pub clicked: i64,
    /// delivered / sent，发送为 0 时为 0
    pub delivery_rate: f64,
}

impl CampaignStatsDto {
    pub fn from_campaign(campaign: &Campaign) -> Self {
        let delivery_rate = if campaign.stats_sent > 0 {
            campaign.stats_delivered as f64 / campaign.stats_sent as f64
        } else {
            0.0
        };

        Self {
            campaign_id: campaign.id,
            name: campaign.name.clone(),
            status: campaign.status,
            total_recipients: campaign.stats_total_recipients,
            sent: campaign.stats_sent,
            delivered: campaign.stats_delivered,
            failed: campaign.stats_failed,
            opened: campaign.stats_opened,
            clicked: campaign.stats_clicked,
            delivery_rate,
        }
    }
}

/// 消息投递状态查询响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageStatusDto {
    pub message_id: String,
    pub status: crate::models::DeliveryStatus,
    pub sent_at: Option<chrono::DateTime<chrono::Utc>>,
    pub delivered_at: Option<chrono::DateTime<chrono::Utc>>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}
