//! 厂商回执处理器
//!
//! 厂商异步回报消息的最终投递与互动状态。回执按状态机守卫推进，
//! 非法迁移（如已点击的消息又报失败）直接拒绝，保证统计不被回退。

use axum::Json;
use axum::extract::{Path, State};
use chrono::Utc;
use tracing::info;

use crate::dto::request::DeliveryReceiptRequest;
use crate::dto::response::{ApiResponse, MessageStatusDto};
use crate::error::{ApiError, Result};
use crate::models::{CommunicationLog, DeliveryStatus};
use crate::state::AppState;

async fn fetch_log(pool: &sqlx::PgPool, message_id: &str) -> Result<CommunicationLog> {
    sqlx::query_as::<_, CommunicationLog>("SELECT * FROM communication_logs WHERE message_id = $1")
        .bind(message_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::MessageNotFound(message_id.to_string()))
}

fn status_dto(log: CommunicationLog) -> MessageStatusDto {
    MessageStatusDto {
        message_id: log.message_id,
        status: log.status,
        sent_at: log.sent_at,
        delivered_at: log.delivered_at,
        error_code: log.error_code,
        error_message: log.error_message,
    }
}

/// POST /api/vendor/delivery-receipt
pub async fn delivery_receipt(
    State(state): State<AppState>,
    Json(req): Json<DeliveryReceiptRequest>,
) -> Result<Json<ApiResponse<MessageStatusDto>>> {
    let next = DeliveryStatus::from_str(&req.status)
        .ok_or_else(|| ApiError::Validation(format!("未知投递状态: {}", req.status)))?;
    if next == DeliveryStatus::Sent {
        return Err(ApiError::Validation("回执不能把消息置回 sent".to_string()));
    }

    let log = fetch_log(&state.pool, &req.message_id).await?;

    if !log.status.can_transition_to(next) {
        return Err(ApiError::Validation(format!(
            "非法状态迁移: {} -> {next}",
            log.status
        )));
    }

    let delivered_at = if next == DeliveryStatus::Delivered {
        Some(req.timestamp.unwrap_or_else(Utc::now))
    } else {
        log.delivered_at
    };

    // 迁移守卫带在 WHERE 里，防止与延迟投递任务并发时双写
    let result = sqlx::query(
        r#"
        UPDATE communication_logs
        SET status = $2, delivered_at = $3, error_code = $4, error_message = $5
        WHERE message_id = $1 AND status = $6
        "#,
    )
    .bind(&req.message_id)
    .bind(next)
    .bind(delivered_at)
    .bind(req.error_code.as_deref())
    .bind(req.error_message.as_deref())
    .bind(log.status)
    .execute(&state.pool)
    .await?;

    if result.rows_affected() > 0 {
        let column = match next {
            DeliveryStatus::Delivered => "stats_delivered",
            DeliveryStatus::Failed => "stats_failed",
            DeliveryStatus::Opened => "stats_opened",
            DeliveryStatus::Clicked => "stats_clicked",
            DeliveryStatus::Sent => unreachable!("sent 已在入口拒绝"),
        };
        let sql = format!(
            "UPDATE campaigns SET {column} = {column} + 1, updated_at = NOW() WHERE id = $1"
        );
        sqlx::query(&sql)
            .bind(log.campaign_id)
            .execute(&state.pool)
            .await?;

        info!(
            message_id = %req.message_id,
            from = %log.status,
            to = %next,
            "delivery receipt applied"
        );
    }

    let log = fetch_log(&state.pool, &req.message_id).await?;
    Ok(Json(ApiResponse::success(status_dto(log))))
}

/// GET /api/vendor/message-status/{message_id}
pub async fn message_status(
    State(state): State<AppState>,
    Path(message_id): Path<String>,
) -> Result<Json<ApiResponse<MessageStatusDto>>> {
    let log = fetch_log(&state.pool, &message_id).await?;
    Ok(Json(ApiResponse::success(status_dto(log))))
}
