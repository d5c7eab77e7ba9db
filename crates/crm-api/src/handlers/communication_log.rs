//! 触达日志处理器

use axum::Json;
use axum::extract::{Query, State};

use crate::dto::request::LogListQuery;
use crate::dto::response::{ApiResponse, PageResponse};
use crate::error::{ApiError, Result};
use crate::models::{CommunicationLog, DeliveryStatus};
use crate::state::AppState;

/// GET /api/communication-logs：按活动/状态过滤的分页查询
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<LogListQuery>,
) -> Result<Json<ApiResponse<PageResponse<CommunicationLog>>>> {
    let status = match query.status.as_deref() {
        Some(raw) => Some(
            DeliveryStatus::from_str(raw)
                .ok_or_else(|| ApiError::Validation(format!("未知投递状态: {raw}")))?,
        ),
        None => None,
    };

    let pagination = query.pagination();
    let page = pagination.page.max(1);
    let limit = pagination.limit();
    let offset = (page - 1) * limit;

    let (total,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM communication_logs
        WHERE ($1::uuid IS NULL OR campaign_id = $1)
          AND ($2::delivery_status IS NULL OR status = $2)
        "#,
    )
    .bind(query.campaign_id)
    .bind(status)
    .fetch_one(&state.pool)
    .await?;

    let items = sqlx::query_as::<_, CommunicationLog>(
        r#"
        SELECT * FROM communication_logs
        WHERE ($1::uuid IS NULL OR campaign_id = $1)
          AND ($2::delivery_status IS NULL OR status = $2)
        ORDER BY created_at DESC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(query.campaign_id)
    .bind(status)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(ApiResponse::success(PageResponse::new(
        items, total, page, limit,
    ))))
}
