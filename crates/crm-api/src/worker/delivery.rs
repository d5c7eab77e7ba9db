//! 活动消息分发
//!
//! 对受众中的每位客户并发发起一次投递尝试：渲染消息、掷厂商受理判定、
//! 落一条投递日志并原子累加活动统计。受理成功的消息再由后台任务在
//! 模拟延迟后补记最终投递结果（delivered / failed），补记以
//! `status = 'sent'` 为守卫，保证与回执上报幂等共存。

use std::sync::Arc;

use serde::Serialize;
use sqlx::PgPool;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Campaign, CampaignStatus, Customer, DeliveryStatus};
use crate::worker::template;
use crate::worker::vendor::SimulatedVendor;

/// 一次分发的受理结果汇总
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DispatchSummary {
    pub accepted: usize,
    pub rejected: usize,
}

impl DispatchSummary {
    pub fn total(&self) -> usize {
        self.accepted + self.rejected
    }
}

/// 活动分发器
#[derive(Clone)]
pub struct CampaignDispatcher {
    pool: PgPool,
    vendor: Arc<SimulatedVendor>,
}

impl CampaignDispatcher {
    pub fn new(pool: PgPool, vendor: SimulatedVendor) -> Self {
        Self {
            pool,
            vendor: Arc::new(vendor),
        }
    }

    /// 执行一次完整的活动发送：置 running、分发、置 completed
    ///
    /// 受众为空的校验由调用方负责，这里假定 `customers` 非空。
    pub async fn run_campaign(
        &self,
        campaign: &Campaign,
        customers: &[Customer],
    ) -> Result<DispatchSummary> {
        self.mark_status(campaign.id, CampaignStatus::Running, customers.len() as i64)
            .await?;

        let summary = self.dispatch(campaign, customers).await;

        sqlx::query("UPDATE campaigns SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(CampaignStatus::Completed)
            .bind(campaign.id)
            .execute(&self.pool)
            .await?;

        Ok(summary)
    }

    /// 并发向受众发起投递尝试
    pub async fn dispatch(&self, campaign: &Campaign, customers: &[Customer]) -> DispatchSummary {
        let attempts = customers
            .iter()
            .map(|customer| self.attempt(campaign, customer));
        let results = futures::future::join_all(attempts).await;

        let mut summary = DispatchSummary::default();
        for (customer, result) in customers.iter().zip(results) {
            match result {
                Ok(true) => summary.accepted += 1,
                Ok(false) => summary.rejected += 1,
                Err(e) => {
                    // 单条失败不影响其余投递
                    summary.rejected += 1;
                    warn!(
                        campaign_id = %campaign.id,
                        customer_id = %customer.id,
                        error = %e,
                        "delivery attempt failed"
                    );
                }
            }
        }

        info!(
            campaign_id = %campaign.id,
            total = summary.total(),
            accepted = summary.accepted,
            rejected = summary.rejected,
            "campaign dispatched"
        );
        summary
    }

    /// 单客户投递尝试，返回厂商是否受理
    async fn attempt(&self, campaign: &Campaign, customer: &Customer) -> Result<bool> {
        let message = template::message_for(campaign, customer);
        let message_id = SimulatedVendor::new_message_id();
        let accepted = self.vendor.roll_acceptance();

        if accepted {
            sqlx::query(
                "INSERT INTO communication_logs \
                 (message_id, customer_id, campaign_id, message, status, sent_at) \
                 VALUES ($1, $2, $3, $4, $5, NOW())",
            )
            .bind(&message_id)
            .bind(customer.id)
            .bind(campaign.id)
            .bind(&message)
            .bind(DeliveryStatus::Sent)
            .execute(&self.pool)
            .await?;

            self.bump_stat(campaign.id, "stats_sent").await?;
            self.schedule_final_delivery(message_id, campaign.id);
        } else {
            sqlx::query(
                "INSERT INTO communication_logs \
                 (message_id, customer_id, campaign_id, message, status, error_code, error_message) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(&message_id)
            .bind(customer.id)
            .bind(campaign.id)
            .bind(&message)
            .bind(DeliveryStatus::Failed)
            .bind("VENDOR_REJECTED")
            .bind("厂商拒绝受理")
            .execute(&self.pool)
            .await?;

            self.bump_stat(campaign.id, "stats_failed").await?;
        }

        Ok(accepted)
    }

    /// 在模拟延迟后补记最终投递结果
    fn schedule_final_delivery(&self, message_id: String, campaign_id: Uuid) {
        let pool = self.pool.clone();
        let delay = self.vendor.delivery_delay();
        let delivered = self.vendor.roll_delivery();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = finalize_delivery(&pool, &message_id, campaign_id, delivered).await {
                error!(
                    message_id = %message_id,
                    campaign_id = %campaign_id,
                    error = %e,
                    "failed to finalize delivery"
                );
            }
        });
    }

    async fn mark_status(
        &self,
        campaign_id: Uuid,
        status: CampaignStatus,
        recipients: i64,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE campaigns \
             SET status = $1, stats_total_recipients = $2, updated_at = NOW() \
             WHERE id = $3",
        )
        .bind(status)
        .bind(recipients)
        .bind(campaign_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn bump_stat(&self, campaign_id: Uuid, column: &'static str) -> Result<()> {
        // column 只来自本模块的固定字符串，不拼接外部输入
        let sql = format!(
            "UPDATE campaigns SET {column} = {column} + 1, updated_at = NOW() WHERE id = $1"
        );
        sqlx::query(&sql).bind(campaign_id).execute(&self.pool).await?;
        Ok(())
    }
}

/// 将一条 sent 状态的日志推进到最终状态并同步活动统计
///
/// `status = 'sent'` 守卫保证：若厂商回执已先一步推进了该消息，
/// 这里不会覆盖，也不会重复计数。
async fn finalize_delivery(
    pool: &PgPool,
    message_id: &str,
    campaign_id: Uuid,
    delivered: bool,
) -> Result<()> {
    let result = if delivered {
        sqlx::query(
            "UPDATE communication_logs \
             SET status = $1, delivered_at = NOW() \
             WHERE message_id = $2 AND status = 'sent'",
        )
        .bind(DeliveryStatus::Delivered)
        .bind(message_id)
        .execute(pool)
        .await?
    } else {
        sqlx::query(
            "UPDATE communication_logs \
             SET status = $1, error_code = $2, error_message = $3 \
             WHERE message_id = $4 AND status = 'sent'",
        )
        .bind(DeliveryStatus::Failed)
        .bind("DELIVERY_FAILED")
        .bind("消息投递失败")
        .bind(message_id)
        .execute(pool)
        .await?
    };

    if result.rows_affected() > 0 {
        let column = if delivered {
            "stats_delivered"
        } else {
            "stats_failed"
        };
        let sql = format!(
            "UPDATE campaigns SET {column} = {column} + 1, updated_at = NOW() WHERE id = $1"
        );
        sqlx::query(&sql).bind(campaign_id).execute(pool).await?;
    }

    Ok(())
}
