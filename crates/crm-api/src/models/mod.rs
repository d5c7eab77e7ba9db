//! 领域模型定义

pub mod campaign;
pub mod communication_log;
pub mod customer;
pub mod segment;

pub use campaign::{Campaign, CampaignStatus};
pub use communication_log::{CommunicationLog, DeliveryStatus};
pub use customer::{Customer, Purchase};
pub use segment::{NewSegment, Segment};
