//! 营销活动处理器
//!
//! 活动独立于建群时派生的那一个：可以对既有客群创建草稿活动，
//! 再单独触发发送。发送只接受草稿状态，空客群发送置活动为失败。

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use rule_engine::RuleCompiler;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::dto::request::{CreateCampaignRequest, PaginationParams, UpdateCampaignRequest};
use crate::dto::response::{ApiResponse, CampaignStatsDto, PageResponse};
use crate::error::{ApiError, Result};
use crate::middleware::Identity;
use crate::models::{Campaign, CampaignStatus, CommunicationLog};
use crate::state::AppState;

pub(crate) async fn fetch_campaign(pool: &sqlx::PgPool, id: Uuid) -> Result<Campaign> {
    sqlx::query_as::<_, Campaign>("SELECT * FROM campaigns WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(ApiError::CampaignNotFound(id))
}

/// GET /api/campaigns
pub async fn list(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<Campaign>>>> {
    let campaigns =
        sqlx::query_as::<_, Campaign>("SELECT * FROM campaigns ORDER BY created_at DESC")
            .fetch_all(&state.pool)
            .await?;
    Ok(Json(ApiResponse::success(campaigns)))
}

/// POST /api/campaigns：创建草稿活动
pub async fn create(
    State(state): State<AppState>,
    Identity(user): Identity,
    Json(req): Json<CreateCampaignRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Campaign>>)> {
    req.validate()?;

    // 先确认目标客群存在
    state
        .segments
        .segments()
        .get(req.segment_id)
        .await?
        .ok_or(ApiError::SegmentNotFound(req.segment_id))?;

    let campaign = sqlx::query_as::<_, Campaign>(
        r#"
        INSERT INTO campaigns
            (name, description, segment_id, message_subject, message_content,
             message_template, created_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(&req.name)
    .bind(&req.description)
    .bind(req.segment_id)
    .bind(&req.message_subject)
    .bind(&req.message_content)
    .bind(&req.message_template)
    .bind(user)
    .fetch_one(&state.pool)
    .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(campaign))))
}

/// GET /api/campaigns/{id}
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Campaign>>> {
    let campaign = fetch_campaign(&state.pool, id).await?;
    Ok(Json(ApiResponse::success(campaign)))
}

/// PUT /api/campaigns/{id}：更新元信息（缺省字段保持原值）
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCampaignRequest>,
) -> Result<Json<ApiResponse<Campaign>>> {
    req.validate()?;

    let existing = fetch_campaign(&state.pool, id).await?;

    let updated = sqlx::query_as::<_, Campaign>(
        r#"
        UPDATE campaigns
        SET name = $2,
            description = $3,
            message_subject = $4,
            message_content = $5,
            message_template = $6,
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(req.name.unwrap_or(existing.name))
    .bind(req.description.or(existing.description))
    .bind(req.message_subject.or(existing.message_subject))
    .bind(req.message_content.or(existing.message_content))
    .bind(req.message_template.or(existing.message_template))
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(ApiResponse::success(updated)))
}

/// DELETE /api/campaigns/{id}
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>> {
    let result = sqlx::query("DELETE FROM campaigns WHERE id = $1")
        .bind(id)
        .execute(&state.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::CampaignNotFound(id));
    }

    Ok(Json(ApiResponse::<()>::success_empty()))
}

/// POST /api/campaigns/{id}/send：触发发送
///
/// 仅草稿可发送；受众在发送时按客群规则实时圈出，不使用历史快照。
pub async fn send(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Campaign>>> {
    let campaign = fetch_campaign(&state.pool, id).await?;

    if !campaign.is_sendable() {
        return Err(ApiError::CampaignNotSendable {
            status: campaign.status.to_string(),
        });
    }

    let segment = state
        .segments
        .segments()
        .get(campaign.segment_id)
        .await?
        .ok_or(ApiError::SegmentNotFound(campaign.segment_id))?;

    let predicate = RuleCompiler::compile(&segment.rules.0)?;
    let customers = state.segments.customers().list_all(&predicate).await?;

    if customers.is_empty() {
        sqlx::query("UPDATE campaigns SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(CampaignStatus::Failed)
            .bind(id)
            .execute(&state.pool)
            .await?;
        return Err(ApiError::EmptySegment);
    }

    let summary = state.dispatcher.run_campaign(&campaign, &customers).await?;
    info!(
        campaign_id = %id,
        accepted = summary.accepted,
        rejected = summary.rejected,
        "campaign send triggered"
    );

    let campaign = fetch_campaign(&state.pool, id).await?;
    Ok(Json(ApiResponse::success_with_message(
        campaign,
        "活动已发送",
    )))
}

/// GET /api/campaigns/{id}/stats
pub async fn stats(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<CampaignStatsDto>>> {
    let campaign = fetch_campaign(&state.pool, id).await?;
    Ok(Json(ApiResponse::success(CampaignStatsDto::from_campaign(
        &campaign,
    ))))
}

/// GET /api/campaigns/{id}/logs：按活动分页查触达日志
pub async fn logs(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<ApiResponse<PageResponse<CommunicationLog>>>> {
    // 活动不存在时报 404 而不是空列表
    fetch_campaign(&state.pool, id).await?;

    let page = pagination.page.max(1);
    let limit = pagination.limit();
    let offset = (page - 1) * limit;

    let (total,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM communication_logs WHERE campaign_id = $1")
            .bind(id)
            .fetch_one(&state.pool)
            .await?;

    let items = sqlx::query_as::<_, CommunicationLog>(
        r#"
        SELECT * FROM communication_logs
        WHERE campaign_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(ApiResponse::success(PageResponse::new(
        items, total, page, limit,
    ))))
}
