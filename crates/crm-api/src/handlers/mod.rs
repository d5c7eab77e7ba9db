//! HTTP 处理器

pub mod campaign;
pub mod communication_log;
pub mod customer;
pub mod segment;
pub mod vendor;
