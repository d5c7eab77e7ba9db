//! Postgres 存储实现
//!
//! 编译谓词渲染为参数化 WHERE 子句后拼入固定的查询骨架。
//! 列名来自字段白名单，值全部走绑定参数。

use async_trait::async_trait;
use rule_engine::{Predicate, SqlBind};
use sqlx::PgPool;
use sqlx::postgres::PgArguments;
use sqlx::query::QueryAs;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Customer, NewSegment, Segment};
use crate::store::{CustomerStore, SegmentStore};

/// 把谓词的绑定参数依次挂到查询上
fn bind_predicate<'q, O>(
    mut query: QueryAs<'q, sqlx::Postgres, O, PgArguments>,
    binds: &'q [SqlBind],
) -> QueryAs<'q, sqlx::Postgres, O, PgArguments> {
    for bind in binds {
        query = match bind {
            SqlBind::Number(n) => query.bind(n),
            SqlBind::Text(s) => query.bind(s),
            SqlBind::TextArray(items) => query.bind(items),
            SqlBind::Timestamp(ts) => query.bind(ts),
        };
    }
    query
}

/// 基于编译谓词的客户查询
#[derive(Clone)]
pub struct PgCustomerStore {
    pool: PgPool,
}

impl PgCustomerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CustomerStore for PgCustomerStore {
    async fn count(&self, predicate: &Predicate) -> Result<i64> {
        let compiled = predicate.to_sql();
        let sql = format!(
            "SELECT COUNT(*) FROM customers WHERE {}",
            compiled.where_clause
        );

        let row: (i64,) = bind_predicate(sqlx::query_as(&sql), &compiled.binds)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.0)
    }

    async fn list(&self, predicate: &Predicate, limit: i64, offset: i64) -> Result<Vec<Customer>> {
        let compiled = predicate.to_sql();
        // 分页参数接在谓词参数之后编号
        let sql = format!(
            "SELECT * FROM customers WHERE {} ORDER BY created_at DESC LIMIT ${} OFFSET ${}",
            compiled.where_clause,
            compiled.binds.len() + 1,
            compiled.binds.len() + 2,
        );

        let customers = bind_predicate(sqlx::query_as::<_, Customer>(&sql), &compiled.binds)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(customers)
    }

    async fn list_all(&self, predicate: &Predicate) -> Result<Vec<Customer>> {
        let compiled = predicate.to_sql();
        let sql = format!(
            "SELECT * FROM customers WHERE {} ORDER BY created_at DESC",
            compiled.where_clause
        );

        let customers = bind_predicate(sqlx::query_as::<_, Customer>(&sql), &compiled.binds)
            .fetch_all(&self.pool)
            .await?;

        Ok(customers)
    }
}

/// 客群持久化
#[derive(Clone)]
pub struct PgSegmentStore {
    pool: PgPool,
}

impl PgSegmentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SegmentStore for PgSegmentStore {
    async fn insert(&self, segment: NewSegment) -> Result<Segment> {
        let created = sqlx::query_as::<_, Segment>(
            r#"
            INSERT INTO segments (name, description, rules, created_by)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&segment.name)
        .bind(&segment.description)
        .bind(sqlx::types::Json(&segment.rules))
        .bind(segment.created_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Segment>> {
        let segment = sqlx::query_as::<_, Segment>("SELECT * FROM segments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(segment)
    }

    async fn list(&self) -> Result<Vec<Segment>> {
        let segments =
            sqlx::query_as::<_, Segment>("SELECT * FROM segments ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await?;

        Ok(segments)
    }

    async fn update(
        &self,
        id: Uuid,
        segment: NewSegment,
        is_active: bool,
    ) -> Result<Option<Segment>> {
        let updated = sqlx::query_as::<_, Segment>(
            r#"
            UPDATE segments
            SET name = $2,
                description = $3,
                rules = $4,
                is_active = $5,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&segment.name)
        .bind(&segment.description)
        .bind(sqlx::types::Json(&segment.rules))
        .bind(is_active)
        .fetch_optional(&self.pool)
        .await?;

        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM segments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_customer_count(&self, id: Uuid, count: i64) -> Result<()> {
        sqlx::query("UPDATE segments SET customer_count = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(count)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
