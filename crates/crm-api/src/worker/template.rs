//! 消息模板渲染
//!
//! 支持 `{{name}}` / `{{email}}` / `{{phone}}` / `{{discount}}` 占位符。
//! 客户字段缺失时回退到占位默认值，空模板回退到默认优惠文案。

use crate::models::{Campaign, Customer};

/// 默认优惠文案（活动未配置任何消息内容时使用）
pub const DEFAULT_OFFER_TEMPLATE: &str = "Hi {{name}}, here's 10% off on your next order!";

const DEFAULT_DISCOUNT: &str = "10";

/// 按客户渲染模板
pub fn render(template: &str, customer: &Customer) -> String {
    template
        .replace("{{name}}", &customer.name)
        .replace("{{email}}", &customer.email)
        .replace("{{phone}}", customer.phone.as_deref().unwrap_or(""))
        .replace("{{discount}}", DEFAULT_DISCOUNT)
}

/// 为一次投递确定消息正文
///
/// 优先用模板，其次用固定内容，二者皆空时回退默认文案。
pub fn message_for(campaign: &Campaign, customer: &Customer) -> String {
    let template = campaign
        .message_template
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| {
            campaign
                .message_content
                .as_deref()
                .filter(|s| !s.trim().is_empty())
        })
        .unwrap_or(DEFAULT_OFFER_TEMPLATE);

    render(template, customer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sqlx::types::Json;
    use uuid::Uuid;

    fn customer(phone: Option<&str>) -> Customer {
        Customer {
            id: Uuid::nil(),
            name: "张伟".to_string(),
            email: "zhangwei@example.com".to_string(),
            phone: phone.map(str::to_string),
            total_spend: 0.0,
            visits: 0,
            last_active: None,
            tags: vec![],
            purchase_history: Json(vec![]),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn campaign(template: Option<&str>, content: Option<&str>) -> Campaign {
        Campaign {
            id: Uuid::nil(),
            name: "活动".to_string(),
            description: None,
            segment_id: Uuid::nil(),
            message_subject: None,
            message_content: content.map(str::to_string),
            message_template: template.map(str::to_string),
            status: crate::models::CampaignStatus::Draft,
            stats_total_recipients: 0,
            stats_sent: 0,
            stats_delivered: 0,
            stats_failed: 0,
            stats_opened: 0,
            stats_clicked: 0,
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_render_replaces_placeholders() {
        let rendered = render(
            "你好 {{name}}（{{email}}），尊享 {{discount}}% 折扣",
            &customer(None),
        );
        assert_eq!(
            rendered,
            "你好 张伟（zhangwei@example.com），尊享 10% 折扣"
        );
    }

    #[test]
    fn test_missing_phone_falls_back_to_empty() {
        assert_eq!(render("电话: {{phone}}", &customer(None)), "电话: ");
        assert_eq!(
            render("电话: {{phone}}", &customer(Some("13800138000"))),
            "电话: 13800138000"
        );
    }

    #[test]
    fn test_message_for_prefers_template() {
        let c = campaign(Some("模板 {{name}}"), Some("内容 {{name}}"));
        assert_eq!(message_for(&c, &customer(None)), "模板 张伟");
    }

    #[test]
    fn test_message_for_falls_back_to_content_then_default() {
        let c = campaign(None, Some("内容 {{name}}"));
        assert_eq!(message_for(&c, &customer(None)), "内容 张伟");

        // 空白模板视同未配置
        let c = campaign(Some("   "), None);
        assert_eq!(
            message_for(&c, &customer(None)),
            "Hi 张伟, here's 10% off on your next order!"
        );
    }
}
