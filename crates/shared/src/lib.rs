//! 共享库
//!
//! 包含配置加载、数据库连接池和日志初始化等基础设施代码。

pub mod config;
pub mod database;
pub mod observability;
