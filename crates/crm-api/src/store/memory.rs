//! 内存存储实现
//!
//! 基于谓词匹配器后端，与 Postgres 实现共享同一棵谓词树。
//! 服务层测试和等价性验证用它替代数据库。

use async_trait::async_trait;
use chrono::Utc;
use rule_engine::Predicate;
use sqlx::types::Json;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Customer, NewSegment, Segment};
use crate::store::{CustomerStore, SegmentStore};

/// 内存存储（客户 + 客群）
#[derive(Default)]
pub struct MemoryStore {
    customers: Mutex<Vec<Customer>>,
    segments: Mutex<HashMap<Uuid, Segment>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_customers(customers: Vec<Customer>) -> Self {
        Self {
            customers: Mutex::new(customers),
            segments: Mutex::new(HashMap::new()),
        }
    }

    fn matching(&self, predicate: &Predicate) -> Vec<Customer> {
        let guard = self.customers.lock().expect("customers 锁中毒");
        let mut matched: Vec<Customer> = guard
            .iter()
            .filter(|c| predicate.matches(*c))
            .cloned()
            .collect();
        // 与 Postgres 实现一致：创建时间倒序
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matched
    }
}

#[async_trait]
impl CustomerStore for MemoryStore {
    async fn count(&self, predicate: &Predicate) -> Result<i64> {
        Ok(self.matching(predicate).len() as i64)
    }

    async fn list(&self, predicate: &Predicate, limit: i64, offset: i64) -> Result<Vec<Customer>> {
        let matched = self.matching(predicate);
        Ok(matched
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn list_all(&self, predicate: &Predicate) -> Result<Vec<Customer>> {
        Ok(self.matching(predicate))
    }
}

#[async_trait]
impl SegmentStore for MemoryStore {
    async fn insert(&self, segment: NewSegment) -> Result<Segment> {
        let now = Utc::now();
        let created = Segment {
            id: Uuid::new_v4(),
            name: segment.name,
            description: segment.description,
            rules: Json(segment.rules),
            created_by: segment.created_by,
            customer_count: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        self.segments
            .lock()
            .expect("segments 锁中毒")
            .insert(created.id, created.clone());
        Ok(created)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Segment>> {
        Ok(self.segments.lock().expect("segments 锁中毒").get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Segment>> {
        let guard = self.segments.lock().expect("segments 锁中毒");
        let mut segments: Vec<Segment> = guard.values().cloned().collect();
        segments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(segments)
    }

    async fn update(
        &self,
        id: Uuid,
        segment: NewSegment,
        is_active: bool,
    ) -> Result<Option<Segment>> {
        let mut guard = self.segments.lock().expect("segments 锁中毒");
        let Some(existing) = guard.get_mut(&id) else {
            return Ok(None);
        };

        existing.name = segment.name;
        existing.description = segment.description;
        existing.rules = Json(segment.rules);
        existing.is_active = is_active;
        existing.updated_at = Utc::now();
        Ok(Some(existing.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self
            .segments
            .lock()
            .expect("segments 锁中毒")
            .remove(&id)
            .is_some())
    }

    async fn set_customer_count(&self, id: Uuid, count: i64) -> Result<()> {
        if let Some(segment) = self.segments.lock().expect("segments 锁中毒").get_mut(&id) {
            segment.customer_count = count;
        }
        Ok(())
    }
}
