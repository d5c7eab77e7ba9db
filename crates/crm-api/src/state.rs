//! 应用状态

use std::sync::Arc;

use sqlx::PgPool;

use crate::service::SegmentService;
use crate::store::{PgCustomerStore, PgSegmentStore};
use crate::worker::{CampaignDispatcher, SimulatedVendor};

/// 路由共享的应用状态
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub segments: SegmentService,
    pub dispatcher: CampaignDispatcher,
}

impl AppState {
    pub fn new(pool: PgPool, vendor: SimulatedVendor) -> Self {
        let segments = SegmentService::new(
            Arc::new(PgCustomerStore::new(pool.clone())),
            Arc::new(PgSegmentStore::new(pool.clone())),
        );
        let dispatcher = CampaignDispatcher::new(pool.clone(), vendor);

        Self {
            pool,
            segments,
            dispatcher,
        }
    }
}
