//! 请求中间件与提取器

pub mod identity;

pub use identity::Identity;
