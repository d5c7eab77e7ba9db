//! 客户管理处理器

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::dto::request::{
    AddPurchaseRequest, CreateCustomerRequest, CustomerListQuery, UpdateCustomerRequest,
    UpdateTagsRequest,
};
use crate::dto::response::{ApiResponse, CustomerPage};
use crate::error::{ApiError, Result};
use crate::models::{Customer, Purchase};
use crate::state::AppState;

/// 把唯一约束冲突翻译成邮箱占用错误
fn map_insert_error(e: sqlx::Error, email: &str) -> ApiError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.code().as_deref() == Some("23505") {
            return ApiError::DuplicateEmail(email.to_string());
        }
    }
    ApiError::Database(e)
}

async fn fetch_customer(pool: &sqlx::PgPool, id: Uuid) -> Result<Customer> {
    sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(ApiError::CustomerNotFound(id))
}

/// GET /api/customers：自由文本搜索 + 分页
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<CustomerListQuery>,
) -> Result<Json<CustomerPage>> {
    let pagination = query.pagination();
    let page = pagination.page.max(1);
    let limit = pagination.limit();
    let offset = (page - 1) * limit;

    // 搜索词对姓名/邮箱做不区分大小写的子串匹配
    let pattern = query
        .search
        .as_deref()
        .map(|s| format!("%{}%", s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")));

    let (total, customers) = match &pattern {
        Some(p) => {
            let (total,): (i64,) = sqlx::query_as(
                r"SELECT COUNT(*) FROM customers
                  WHERE name ILIKE $1 ESCAPE '\' OR email ILIKE $1 ESCAPE '\'",
            )
            .bind(p)
            .fetch_one(&state.pool)
            .await?;

            let customers = sqlx::query_as::<_, Customer>(
                r"SELECT * FROM customers
                  WHERE name ILIKE $1 ESCAPE '\' OR email ILIKE $1 ESCAPE '\'
                  ORDER BY created_at DESC LIMIT $2 OFFSET $3",
            )
            .bind(p)
            .bind(limit)
            .bind(offset)
            .fetch_all(&state.pool)
            .await?;

            (total, customers)
        }
        None => {
            let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM customers")
                .fetch_one(&state.pool)
                .await?;

            let customers = sqlx::query_as::<_, Customer>(
                "SELECT * FROM customers ORDER BY created_at DESC LIMIT $1 OFFSET $2",
            )
            .bind(limit)
            .bind(offset)
            .fetch_all(&state.pool)
            .await?;

            (total, customers)
        }
    };

    Ok(Json(CustomerPage::new(customers, total, page, limit)))
}

/// POST /api/customers
pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreateCustomerRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Customer>>)> {
    req.validate()?;

    let customer = sqlx::query_as::<_, Customer>(
        r#"
        INSERT INTO customers (name, email, phone, total_spend, visits, last_active, tags)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(&req.name)
    .bind(&req.email)
    .bind(&req.phone)
    .bind(req.total_spend.unwrap_or(0.0))
    .bind(req.visits.unwrap_or(0))
    .bind(req.last_active)
    .bind(req.tags.unwrap_or_default())
    .fetch_one(&state.pool)
    .await
    .map_err(|e| map_insert_error(e, &req.email))?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(customer))))
}

/// GET /api/customers/{id}
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Customer>>> {
    let customer = fetch_customer(&state.pool, id).await?;
    Ok(Json(ApiResponse::success(customer)))
}

/// PUT /api/customers/{id}：缺省字段保持原值
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCustomerRequest>,
) -> Result<Json<ApiResponse<Customer>>> {
    req.validate()?;

    let existing = fetch_customer(&state.pool, id).await?;

    let email = req.email.unwrap_or(existing.email);
    let updated = sqlx::query_as::<_, Customer>(
        r#"
        UPDATE customers
        SET name = $2,
            email = $3,
            phone = $4,
            visits = $5,
            last_active = $6,
            tags = $7,
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(req.name.unwrap_or(existing.name))
    .bind(&email)
    .bind(req.phone.or(existing.phone))
    .bind(req.visits.unwrap_or(existing.visits))
    .bind(req.last_active.or(existing.last_active))
    .bind(req.tags.unwrap_or(existing.tags))
    .fetch_one(&state.pool)
    .await
    .map_err(|e| map_insert_error(e, &email))?;

    Ok(Json(ApiResponse::success(updated)))
}

/// DELETE /api/customers/{id}
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>> {
    let result = sqlx::query("DELETE FROM customers WHERE id = $1")
        .bind(id)
        .execute(&state.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::CustomerNotFound(id));
    }

    Ok(Json(ApiResponse::<()>::success_empty()))
}

/// POST /api/customers/{id}/purchases：追加消费记录
///
/// total_spend 由完整消费历史重新汇总而不是简单累加，
/// 保证与 purchase_history 永远一致；同时推进 last_active。
pub async fn add_purchase(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AddPurchaseRequest>,
) -> Result<Json<ApiResponse<Customer>>> {
    req.validate()?;

    let existing = fetch_customer(&state.pool, id).await?;

    let purchase = Purchase {
        amount: req.amount,
        date: req.date.unwrap_or_else(Utc::now),
        item: req.item,
    };

    let mut history = existing.purchase_history.0;
    let last_active = Some(purchase.date);
    history.push(purchase);
    let total = Customer::total_from_history(&history);

    let updated = sqlx::query_as::<_, Customer>(
        r#"
        UPDATE customers
        SET purchase_history = $2,
            total_spend = $3,
            visits = visits + 1,
            last_active = $4,
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(sqlx::types::Json(&history))
    .bind(total)
    .bind(last_active)
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(ApiResponse::success(updated)))
}

/// PATCH /api/customers/{id}/tags：全量替换标签
pub async fn update_tags(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTagsRequest>,
) -> Result<Json<ApiResponse<Customer>>> {
    let updated = sqlx::query_as::<_, Customer>(
        "UPDATE customers SET tags = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(&req.tags)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(ApiError::CustomerNotFound(id))?;

    Ok(Json(ApiResponse::success(updated)))
}
