//! 模拟消息厂商
//!
//! 以可配置的概率模拟厂商受理与投递结果，以及投递延迟。
//! 生产环境中替换为真实厂商 SDK 调用时只需保持同样的判定接口。

use rand::Rng;
use std::time::Duration;
use uuid::Uuid;

use crm_shared::config::VendorConfig;

/// 模拟厂商
#[derive(Debug, Clone)]
pub struct SimulatedVendor {
    accept_rate: f64,
    delivery_success_rate: f64,
    min_delay_ms: u64,
    max_delay_ms: u64,
}

impl SimulatedVendor {
    pub fn new(
        accept_rate: f64,
        delivery_success_rate: f64,
        min_delay_ms: u64,
        max_delay_ms: u64,
    ) -> Self {
        Self {
            accept_rate,
            delivery_success_rate,
            min_delay_ms,
            max_delay_ms,
        }
    }

    pub fn from_config(config: &VendorConfig) -> Self {
        Self::new(
            config.accept_rate,
            config.delivery_success_rate,
            config.min_delay_ms,
            config.max_delay_ms,
        )
    }

    /// 全部受理、全部送达、零延迟（测试用）
    pub fn always_delivers() -> Self {
        Self::new(1.0, 1.0, 0, 0)
    }

    /// 全部拒绝（测试用）
    pub fn always_rejects() -> Self {
        Self::new(0.0, 0.0, 0, 0)
    }

    /// 掷受理判定
    pub fn roll_acceptance(&self) -> bool {
        rand::rng().random::<f64>() < self.accept_rate
    }

    /// 掷投递结果判定
    pub fn roll_delivery(&self) -> bool {
        rand::rng().random::<f64>() < self.delivery_success_rate
    }

    /// 取一个投递延迟（均匀分布于配置区间）
    pub fn delivery_delay(&self) -> Duration {
        if self.max_delay_ms <= self.min_delay_ms {
            return Duration::from_millis(self.min_delay_ms);
        }
        let ms = rand::rng().random_range(self.min_delay_ms..=self.max_delay_ms);
        Duration::from_millis(ms)
    }

    /// 生成厂商侧消息标识
    pub fn new_message_id() -> String {
        format!("msg_{}", Uuid::now_v7().simple())
    }
}
