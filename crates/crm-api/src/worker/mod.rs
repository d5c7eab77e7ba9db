//! 活动投递

pub mod delivery;
pub mod template;
pub mod vendor;

pub use delivery::{CampaignDispatcher, DispatchSummary};
pub use vendor::SimulatedVendor;
