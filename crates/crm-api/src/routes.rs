//! 路由定义

use axum::Router;
use axum::routing::{get, patch, post};

use crate::handlers::{campaign, communication_log, customer, segment, vendor};
use crate::state::AppState;

/// /api 下的全部业务路由
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // 客户管理
        .route("/customers", get(customer::list).post(customer::create))
        .route(
            "/customers/{id}",
            get(customer::get)
                .put(customer::update)
                .delete(customer::remove),
        )
        .route("/customers/{id}/purchases", post(customer::add_purchase))
        .route("/customers/{id}/tags", patch(customer::update_tags))
        // 客群圈选
        .route("/segments/preview", post(segment::preview))
        .route("/segments", get(segment::list).post(segment::create))
        .route(
            "/segments/{id}",
            get(segment::get)
                .put(segment::update)
                .delete(segment::remove),
        )
        .route("/segments/{id}/customers", get(segment::customers))
        // 营销活动
        .route("/campaigns", get(campaign::list).post(campaign::create))
        .route(
            "/campaigns/{id}",
            get(campaign::get)
                .put(campaign::update)
                .delete(campaign::remove),
        )
        .route("/campaigns/{id}/send", post(campaign::send))
        .route("/campaigns/{id}/stats", get(campaign::stats))
        .route("/campaigns/{id}/logs", get(campaign::logs))
        // 触达日志
        .route("/communication-logs", get(communication_log::list))
        // 厂商回执
        .route("/vendor/delivery-receipt", post(vendor::delivery_receipt))
        .route(
            "/vendor/message-status/{message_id}",
            get(vendor::message_status),
        )
}
