//! 存储抽象
//!
//! 客户与客群的读写走 trait 抽象：生产实现基于 Postgres，
//! 内存实现基于谓词匹配器，供服务层测试和两条执行路径的等价性验证使用。

pub mod memory;
pub mod pg;

use async_trait::async_trait;
use rule_engine::Predicate;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Customer, NewSegment, Segment};

pub use memory::MemoryStore;
pub use pg::{PgCustomerStore, PgSegmentStore};

/// 按编译谓词读取客户
#[async_trait]
pub trait CustomerStore: Send + Sync {
    /// 统计命中谓词的客户数
    async fn count(&self, predicate: &Predicate) -> Result<i64>;

    /// 按创建时间倒序返回命中谓词的一页客户
    async fn list(&self, predicate: &Predicate, limit: i64, offset: i64) -> Result<Vec<Customer>>;

    /// 返回命中谓词的全部客户（活动投递的收件人集合）
    async fn list_all(&self, predicate: &Predicate) -> Result<Vec<Customer>>;
}

/// 客群持久化
#[async_trait]
pub trait SegmentStore: Send + Sync {
    async fn insert(&self, segment: NewSegment) -> Result<Segment>;

    async fn get(&self, id: Uuid) -> Result<Option<Segment>>;

    async fn list(&self) -> Result<Vec<Segment>>;

    /// 全量替换客群定义（规则整体覆盖，不做增量合并）
    async fn update(&self, id: Uuid, segment: NewSegment, is_active: bool)
    -> Result<Option<Segment>>;

    /// 删除客群，返回是否确有删除
    async fn delete(&self, id: Uuid) -> Result<bool>;

    /// 刷新缓存的命中人数
    async fn set_customer_count(&self, id: Uuid, count: i64) -> Result<()>;
}
