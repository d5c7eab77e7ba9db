//! REST API 请求参数与请求体结构
//!
//! 规则在请求体里以原始 JSON 传入，由 handler 走规则解析入口转换，
//! 保证畸形规则的报错带上具体的字段和操作符。

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// 分页查询参数（page 从 1 起，limit 上限 100）
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationParams {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    20
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
        }
    }
}

impl PaginationParams {
    /// 计算数据库查询的 offset
    pub fn offset(&self) -> i64 {
        (self.page - 1).max(0) * self.limit()
    }

    /// 获取限制条数（1..=100）
    pub fn limit(&self) -> i64 {
        self.limit.clamp(1, 100)
    }
}

/// 客户列表查询：自由文本搜索 + 分页
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerListQuery {
    /// 对姓名/邮箱做不区分大小写的子串匹配
    pub search: Option<String>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

impl CustomerListQuery {
    pub fn pagination(&self) -> PaginationParams {
        PaginationParams {
            page: self.page,
            limit: self.limit,
        }
    }
}

/// 创建客户请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCustomerRequest {
    #[validate(length(min = 1, max = 100, message = "客户姓名长度必须在1-100个字符之间"))]
    pub name: String,
    #[validate(email(message = "邮箱格式无效"))]
    pub email: String,
    pub phone: Option<String>,
    pub total_spend: Option<f64>,
    pub visits: Option<i32>,
    pub last_active: Option<DateTime<Utc>>,
    pub tags: Option<Vec<String>>,
}

/// 更新客户请求（缺省字段保持原值）
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCustomerRequest {
    #[validate(length(min = 1, max = 100, message = "客户姓名长度必须在1-100个字符之间"))]
    pub name: Option<String>,
    #[validate(email(message = "邮箱格式无效"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub visits: Option<i32>,
    pub last_active: Option<DateTime<Utc>>,
    pub tags: Option<Vec<String>>,
}

/// 追加消费记录请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddPurchaseRequest {
    #[validate(range(min = 0.0, message = "消费金额不能为负数"))]
    pub amount: f64,
    pub date: Option<DateTime<Utc>>,
    pub item: Option<String>,
}

/// 替换客户标签请求
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTagsRequest {
    pub tags: Vec<String>,
}

/// 规则预览请求（不持久化）
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewSegmentRequest {
    pub rules: serde_json::Value,
}

/// 创建客群请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSegmentRequest {
    #[validate(length(min = 1, max = 100, message = "客群名称长度必须在1-100个字符之间"))]
    pub name: String,
    #[validate(length(max = 500, message = "客群描述不超过500个字符"))]
    pub description: Option<String>,
    pub rules: serde_json::Value,
}

/// 更新客群请求（规则全量替换）
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSegmentRequest {
    #[validate(length(min = 1, max = 100, message = "客群名称长度必须在1-100个字符之间"))]
    pub name: String,
    #[validate(length(max = 500, message = "客群描述不超过500个字符"))]
    pub description: Option<String>,
    pub rules: serde_json::Value,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// 创建活动请求（初始为草稿，发送需单独触发）
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCampaignRequest {
    #[validate(length(min = 1, max = 100, message = "活动名称长度必须在1-100个字符之间"))]
    pub name: String,
    pub description: Option<String>,
    pub segment_id: Uuid,
    pub message_subject: Option<String>,
    pub message_content: Option<String>,
    pub message_template: Option<String>,
}

/// 更新活动请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCampaignRequest {
    #[validate(length(min = 1, max = 100, message = "活动名称长度必须在1-100个字符之间"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub message_subject: Option<String>,
    pub message_content: Option<String>,
    pub message_template: Option<String>,
}

/// 厂商投递回执
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReceiptRequest {
    pub message_id: String,
    /// delivered / failed / opened / clicked
    pub status: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

/// 触达日志查询
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogListQuery {
    pub campaign_id: Option<Uuid>,
    pub status: Option<String>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

impl LogListQuery {
    pub fn pagination(&self) -> PaginationParams {
        PaginationParams {
            page: self.page,
            limit: self.limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_defaults() {
        let params = PaginationParams::default();
        assert_eq!(params.page, 1);
        assert_eq!(params.limit, 20);
        assert_eq!(params.offset(), 0);
    }

    #[test]
    fn test_pagination_offset_and_clamp() {
        let params = PaginationParams { page: 3, limit: 10 };
        assert_eq!(params.offset(), 20);

        // 非法页码不产生负 offset
        let params = PaginationParams { page: 0, limit: 10 };
        assert_eq!(params.offset(), 0);

        // limit 超上限时按 100 截断
        let params = PaginationParams { page: 2, limit: 500 };
        assert_eq!(params.limit(), 100);
        assert_eq!(params.offset(), 100);
    }

    #[test]
    fn test_create_segment_request_validation() {
        let valid = CreateSegmentRequest {
            name: "高价值客户".to_string(),
            description: None,
            rules: serde_json::json!({"operator": "AND", "conditions": []}),
        };
        assert!(valid.validate().is_ok());

        let invalid = CreateSegmentRequest {
            name: String::new(),
            description: None,
            rules: serde_json::json!({}),
        };
        assert!(invalid.validate().is_err());
    }

    #[test]
    fn test_create_customer_request_validation() {
        let invalid = CreateCustomerRequest {
            name: "张伟".to_string(),
            email: "not-an-email".to_string(),
            phone: None,
            total_spend: None,
            visits: None,
            last_active: None,
            tags: None,
        };
        assert!(invalid.validate().is_err());
    }

    #[test]
    fn test_query_deserializes_with_defaults() {
        let query: CustomerListQuery = serde_json::from_str(r#"{"search": "zhang"}"#).unwrap();
        assert_eq!(query.search.as_deref(), Some("zhang"));
        assert_eq!(query.page, 1);
        assert_eq!(query.limit, 20);
    }
}
