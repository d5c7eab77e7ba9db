//! 客群规则引擎
//!
//! 提供客群圈选规则的统一中间表示和两种执行后端：
//! - JSON 规则定义和解析（与线上规则 JSON 精确往返）
//! - 内存求值器（宽松，用于实时预览）
//! - 存储谓词编译器（严格校验，用于数据库圈选）

pub mod compiler;
pub mod error;
pub mod evaluator;
pub mod fields;
pub mod models;
pub mod operators;
pub mod predicate;

pub use compiler::RuleCompiler;
pub use error::{Result, RuleError};
pub use evaluator::RuleEvaluator;
pub use fields::{CustomerField, FieldKind};
pub use models::{Condition, RuleGroup, RuleNode};
pub use operators::{LogicalOperator, Operator};
pub use predicate::{FieldAccess, Predicate, SqlBind, SqlQuery};
