//! CRM 客群与触达服务
//!
//! 提供客户管理、客群圈选（规则引擎）、营销活动与触达日志的 REST API。

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod service;
pub mod state;
pub mod store;
pub mod worker;

pub use error::{ApiError, Result};
