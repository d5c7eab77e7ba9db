//! 客群服务
//!
//! 规则编译与客户存储之间的业务编排：预览计数、分页圈选、
//! 建群并立即物化命中人数。规则编译失败以 INVALID_RULE 上抛，
//! 绝不让非法谓词落到全量客户数据上执行。

use std::sync::Arc;

use rule_engine::{RuleCompiler, RuleGroup};
use tracing::info;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Customer, NewSegment, Segment};
use crate::store::{CustomerStore, SegmentStore};

/// 客群圈选与持久化编排
#[derive(Clone)]
pub struct SegmentService {
    customers: Arc<dyn CustomerStore>,
    segments: Arc<dyn SegmentStore>,
}

impl SegmentService {
    pub fn new(customers: Arc<dyn CustomerStore>, segments: Arc<dyn SegmentStore>) -> Self {
        Self { customers, segments }
    }

    pub fn segments(&self) -> &Arc<dyn SegmentStore> {
        &self.segments
    }

    pub fn customers(&self) -> &Arc<dyn CustomerStore> {
        &self.customers
    }

    /// 预览规则的命中人数（纯读，不落任何数据）
    pub async fn preview_count(&self, rules: &RuleGroup) -> Result<i64> {
        let predicate = RuleCompiler::compile(rules)?;
        self.customers.count(&predicate).await
    }

    /// 分页返回命中规则的客户
    ///
    /// page 从 1 起，page_size 限制在 1..=100；总数独立于切片统计，
    /// 并发写入下两者允许出现短暂偏差。
    pub async fn list_matching(
        &self,
        rules: &RuleGroup,
        page: i64,
        page_size: i64,
    ) -> Result<(Vec<Customer>, i64)> {
        let predicate = RuleCompiler::compile(rules)?;

        let page = page.max(1);
        let page_size = page_size.clamp(1, 100);
        let offset = (page - 1) * page_size;

        let total = self.customers.count(&predicate).await?;
        let customers = self.customers.list(&predicate, page_size, offset).await?;
        Ok((customers, total))
    }

    /// 创建客群并立即物化：持久化定义、回填命中人数、
    /// 返回完整命中客户集（供活动投递扇出使用）
    pub async fn create_and_materialize(
        &self,
        name: String,
        description: Option<String>,
        rules: RuleGroup,
        created_by: Option<Uuid>,
    ) -> Result<(Segment, Vec<Customer>)> {
        // 先编译：规则非法时不产生任何写入
        let predicate = RuleCompiler::compile(&rules)?;

        let mut segment = self
            .segments
            .insert(NewSegment {
                name,
                description,
                rules,
                created_by,
            })
            .await?;

        let customers = self.customers.list_all(&predicate).await?;
        let count = customers.len() as i64;
        self.segments.set_customer_count(segment.id, count).await?;
        segment.customer_count = count;

        info!(
            segment_id = %segment.id,
            customer_count = count,
            "segment created and materialized"
        );

        Ok((segment, customers))
    }

    /// 全量替换客群定义并刷新命中人数
    pub async fn update_and_refresh(
        &self,
        id: Uuid,
        name: String,
        description: Option<String>,
        rules: RuleGroup,
        is_active: bool,
    ) -> Result<Option<Segment>> {
        let predicate = RuleCompiler::compile(&rules)?;

        let updated = self
            .segments
            .update(
                id,
                NewSegment {
                    name,
                    description,
                    rules,
                    created_by: None,
                },
                is_active,
            )
            .await?;

        let Some(mut segment) = updated else {
            return Ok(None);
        };

        let count = self.customers.count(&predicate).await?;
        self.segments.set_customer_count(id, count).await?;
        segment.customer_count = count;
        Ok(Some(segment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Purchase;
    use crate::store::MemoryStore;
    use chrono::{Duration, Utc};
    use serde_json::json;
    use sqlx::types::Json;

    fn customer(name: &str, spend: f64, visits: i32, tags: &[&str], age_days: i64) -> Customer {
        let created = Utc::now() - Duration::days(age_days);
        Customer {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            phone: None,
            total_spend: spend,
            visits,
            last_active: Some(created),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            purchase_history: Json(vec![Purchase {
                amount: spend,
                date: created,
                item: None,
            }]),
            created_at: created,
            updated_at: created,
        }
    }

    fn service_with(customers: Vec<Customer>) -> SegmentService {
        let store = Arc::new(MemoryStore::with_customers(customers));
        SegmentService::new(store.clone(), store)
    }

    fn vip_rules() -> RuleGroup {
        RuleGroup::from_value(&json!({
            "operator": "AND",
            "conditions": [
                {"field": "totalSpend", "operator": ">=", "value": 5000},
                {
                    "operator": "OR",
                    "conditions": [
                        {"field": "tags", "operator": "contains", "value": ["VIP"]},
                        {"field": "visits", "operator": ">=", "value": 10}
                    ]
                }
            ]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_preview_count() {
        let service = service_with(vec![
            customer("Zhang", 12000.0, 15, &["VIP"], 1),
            customer("Li", 800.0, 2, &[], 2),
            customer("Wang", 6000.0, 30, &[], 3),
        ]);

        let count = service.preview_count(&vip_rules()).await.unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_preview_invalid_rule_is_explicit_error() {
        let service = service_with(vec![]);
        let rules = RuleGroup::from_value(&json!({
            "operator": "AND",
            "conditions": [{"field": "totalSpend", "operator": ">", "value": "很多"}]
        }))
        .unwrap();

        // 编译失败必须是显式错误，不能退化成 0 或 500
        let err = service.preview_count(&rules).await.unwrap_err();
        assert_eq!(err.error_code(), "INVALID_RULE");
    }

    #[tokio::test]
    async fn test_list_matching_pagination() {
        // 10 个客户全部命中，验证 1 起始分页与独立总数
        let customers: Vec<Customer> = (0..10)
            .map(|i| customer(&format!("C{i}"), 6000.0, 20, &["VIP"], i))
            .collect();
        let service = service_with(customers);

        let (page1, total) = service.list_matching(&vip_rules(), 1, 3).await.unwrap();
        assert_eq!(total, 10);
        assert_eq!(page1.len(), 3);

        let (page4, total) = service.list_matching(&vip_rules(), 4, 3).await.unwrap();
        assert_eq!(total, 10, "总数独立于切片长度");
        assert_eq!(page4.len(), 1);

        // 越界页返回空切片，总数不变
        let (page9, total) = service.list_matching(&vip_rules(), 9, 3).await.unwrap();
        assert_eq!(total, 10);
        assert!(page9.is_empty());

        // 创建时间倒序：第一页是最新创建的客户
        assert_eq!(page1[0].name, "C0");
    }

    #[tokio::test]
    async fn test_list_matching_clamps_page_size() {
        let customers: Vec<Customer> = (0..5)
            .map(|i| customer(&format!("C{i}"), 6000.0, 20, &["VIP"], i))
            .collect();
        let service = service_with(customers);

        // page_size 为 0 时修正为 1
        let (items, _) = service.list_matching(&vip_rules(), 1, 0).await.unwrap();
        assert_eq!(items.len(), 1);

        // 超过上限修正为 100（数据不足时返回全部）
        let (items, _) = service.list_matching(&vip_rules(), 1, 9999).await.unwrap();
        assert_eq!(items.len(), 5);
    }

    #[tokio::test]
    async fn test_create_and_materialize() {
        let service = service_with(vec![
            customer("Zhang", 12000.0, 15, &["VIP"], 1),
            customer("Li", 800.0, 2, &[], 2),
        ]);

        let creator = Uuid::new_v4();
        let (segment, matched) = service
            .create_and_materialize(
                "高价值客户".to_string(),
                Some("VIP 或高频".to_string()),
                vip_rules(),
                Some(creator),
            )
            .await
            .unwrap();

        assert_eq!(segment.customer_count, 1);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].name, "Zhang");
        assert_eq!(segment.created_by, Some(creator));

        // 持久化的记录同样带上了物化的人数
        let stored = service.segments().get(segment.id).await.unwrap().unwrap();
        assert_eq!(stored.customer_count, 1);
    }

    #[tokio::test]
    async fn test_create_with_invalid_rule_persists_nothing() {
        let service = service_with(vec![]);
        let rules = RuleGroup::from_value(&json!({
            "operator": "AND",
            "conditions": [{"field": "tags", "operator": "contains", "value": 42}]
        }))
        .unwrap();

        let result = service
            .create_and_materialize("坏规则".to_string(), None, rules, None)
            .await;
        assert!(result.is_err());

        // 编译失败发生在持久化之前，不留半成品客群
        assert!(service.segments().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_and_refresh_replaces_rules() {
        let service = service_with(vec![
            customer("Zhang", 12000.0, 15, &["VIP"], 1),
            customer("Li", 800.0, 2, &[], 2),
        ]);

        let (segment, _) = service
            .create_and_materialize("初版".to_string(), None, vip_rules(), None)
            .await
            .unwrap();
        assert_eq!(segment.customer_count, 1);

        // 放宽规则后命中人数随之刷新
        let relaxed = RuleGroup::from_value(&json!({
            "operator": "AND",
            "conditions": [{"field": "totalSpend", "operator": ">=", "value": 100}]
        }))
        .unwrap();

        let updated = service
            .update_and_refresh(segment.id, "放宽版".to_string(), None, relaxed, true)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.name, "放宽版");
        assert_eq!(updated.customer_count, 2);
    }

    #[tokio::test]
    async fn test_update_missing_segment_returns_none() {
        let service = service_with(vec![]);
        let result = service
            .update_and_refresh(Uuid::new_v4(), "无".to_string(), None, vip_rules(), true)
            .await
            .unwrap();
        assert!(result.is_none());
    }
}
