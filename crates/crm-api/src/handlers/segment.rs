//! 客群处理器
//!
//! 预览走规则编译 + 数据库计数；建群在持久化客群的同时派生一个
//! 营销活动并立即对命中客户扇出投递。

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use rule_engine::RuleGroup;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::dto::request::{
    CreateSegmentRequest, PaginationParams, PreviewSegmentRequest, UpdateSegmentRequest,
};
use crate::dto::response::{ApiResponse, CustomerPage, PreviewResponse, SegmentWithCampaign};
use crate::error::{ApiError, Result};
use crate::handlers::campaign::fetch_campaign;
use crate::models::{Campaign, CampaignStatus, Segment};
use crate::middleware::Identity;
use crate::state::AppState;

/// POST /api/segments/preview：规则命中人数（不落任何数据）
pub async fn preview(
    State(state): State<AppState>,
    Json(req): Json<PreviewSegmentRequest>,
) -> Result<Json<PreviewResponse>> {
    let rules = RuleGroup::from_value(&req.rules)?;
    let count = state.segments.preview_count(&rules).await?;
    Ok(Json(PreviewResponse { count }))
}

/// GET /api/segments/{id}/customers：分页列出客群命中的客户
///
/// 按当前客户数据实时圈选，不读历史快照。
pub async fn customers(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<CustomerPage>> {
    let segment = state
        .segments
        .segments()
        .get(id)
        .await?
        .ok_or(ApiError::SegmentNotFound(id))?;

    let page = pagination.page.max(1);
    let limit = pagination.limit();

    let (customers, total) = state
        .segments
        .list_matching(&segment.rules.0, page, limit)
        .await?;
    Ok(Json(CustomerPage::new(customers, total, page, limit)))
}

/// POST /api/segments：建群 + 派生活动 + 立即扇出投递
pub async fn create(
    State(state): State<AppState>,
    Identity(user): Identity,
    Json(req): Json<CreateSegmentRequest>,
) -> Result<(StatusCode, Json<SegmentWithCampaign>)> {
    req.validate()?;
    let rules = RuleGroup::from_value(&req.rules)?;

    let (segment, customers) = state
        .segments
        .create_and_materialize(req.name, req.description, rules, Some(user))
        .await?;

    // 派生活动，承接本次圈选的触达
    let campaign = sqlx::query_as::<_, Campaign>(
        r#"
        INSERT INTO campaigns (name, segment_id, created_by)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(format!("Campaign for {}", segment.name))
    .bind(segment.id)
    .bind(user)
    .fetch_one(&state.pool)
    .await?;

    let campaign = if customers.is_empty() {
        // 空客群无事可投，活动直接置为失败
        sqlx::query("UPDATE campaigns SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(CampaignStatus::Failed)
            .bind(campaign.id)
            .execute(&state.pool)
            .await?;
        info!(segment_id = %segment.id, campaign_id = %campaign.id, "segment is empty, campaign marked failed");
        fetch_campaign(&state.pool, campaign.id).await?
    } else {
        let summary = state.dispatcher.run_campaign(&campaign, &customers).await?;
        info!(
            segment_id = %segment.id,
            campaign_id = %campaign.id,
            accepted = summary.accepted,
            rejected = summary.rejected,
            "derived campaign dispatched"
        );
        fetch_campaign(&state.pool, campaign.id).await?
    };

    Ok((StatusCode::CREATED, Json(SegmentWithCampaign { segment, campaign })))
}

/// GET /api/segments
pub async fn list(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<Segment>>>> {
    let segments = state.segments.segments().list().await?;
    Ok(Json(ApiResponse::success(segments)))
}

/// GET /api/segments/{id}：返回前按当前客户数据实时刷新命中人数
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Segment>>> {
    let mut segment = state
        .segments
        .segments()
        .get(id)
        .await?
        .ok_or(ApiError::SegmentNotFound(id))?;

    let count = state.segments.preview_count(&segment.rules.0).await?;
    if count != segment.customer_count {
        state.segments.segments().set_customer_count(id, count).await?;
        segment.customer_count = count;
    }

    Ok(Json(ApiResponse::success(segment)))
}

/// PUT /api/segments/{id}：全量替换定义并刷新命中人数
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateSegmentRequest>,
) -> Result<Json<ApiResponse<Segment>>> {
    req.validate()?;
    let rules = RuleGroup::from_value(&req.rules)?;

    let segment = state
        .segments
        .update_and_refresh(id, req.name, req.description, rules, req.is_active)
        .await?
        .ok_or(ApiError::SegmentNotFound(id))?;

    Ok(Json(ApiResponse::success(segment)))
}

/// DELETE /api/segments/{id}：仅创建者可删除
pub async fn remove(
    State(state): State<AppState>,
    Identity(user): Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>> {
    let segment = state
        .segments
        .segments()
        .get(id)
        .await?
        .ok_or(ApiError::SegmentNotFound(id))?;

    if let Some(owner) = segment.created_by {
        if owner != user {
            return Err(ApiError::Forbidden("只有创建者可以删除客群".to_string()));
        }
    }

    state.segments.segments().delete(id).await?;
    Ok(Json(ApiResponse::<()>::success_empty()))
}
