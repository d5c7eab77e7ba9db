//! 编译后的存储谓词
//!
//! 谓词是规则编译的产物：字段已解析成白名单列、值已完成类型校验。
//! 同一棵谓词树有两个消费端——内存匹配器（用于等价性验证和测试）
//! 和参数化 SQL 渲染器（用于数据库圈选），两端语义必须一致。

use chrono::{DateTime, Utc};
use std::fmt::Write as _;

use crate::fields::CustomerField;

/// 排序比较操作符（谓词内部只保留排序四种，相等走独立变体）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CmpOp {
    fn sql(&self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
        }
    }

    fn apply<T: PartialOrd>(&self, lhs: T, rhs: T) -> bool {
        match self {
            Self::Gt => lhs > rhs,
            Self::Gte => lhs >= rhs,
            Self::Lt => lhs < rhs,
            Self::Lte => lhs <= rhs,
        }
    }
}

/// 编译后的谓词树
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// 匹配一切记录（空条件组的编译产物）
    All,
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    /// 数值排序比较
    NumericCmp {
        field: CustomerField,
        op: CmpOp,
        value: f64,
    },
    /// 时间戳排序比较
    TimeCmp {
        field: CustomerField,
        op: CmpOp,
        value: DateTime<Utc>,
    },
    /// 数值相等 / 不等
    NumericEq {
        field: CustomerField,
        value: f64,
        negate: bool,
    },
    /// 文本相等 / 不等（区分大小写）
    TextEq {
        field: CustomerField,
        value: String,
        negate: bool,
    },
    /// 时间戳相等 / 不等
    TimeEq {
        field: CustomerField,
        value: DateTime<Utc>,
        negate: bool,
    },
    /// 标签子集：记录的标签必须包含 tags 中的全部元素
    TagsContainsAll {
        field: CustomerField,
        tags: Vec<String>,
    },
    /// 不区分大小写的前缀匹配
    PrefixI {
        field: CustomerField,
        value: String,
    },
    /// 不区分大小写的后缀匹配
    SuffixI {
        field: CustomerField,
        value: String,
    },
}

/// 谓词匹配所需的记录字段访问
///
/// 存储层和测试替身各自实现；字段缺失以 None 表达，匹配器对缺失
/// 字段的行为与 SQL 的 NULL 语义保持一致（不命中，`!=` 也不例外）。
pub trait FieldAccess {
    fn numeric(&self, field: CustomerField) -> Option<f64>;
    fn text(&self, field: CustomerField) -> Option<&str>;
    fn tags(&self, field: CustomerField) -> Option<&[String]>;
    fn time(&self, field: CustomerField) -> Option<DateTime<Utc>>;
}

/// SQL 绑定参数
#[derive(Debug, Clone, PartialEq)]
pub enum SqlBind {
    Number(f64),
    Text(String),
    TextArray(Vec<String>),
    Timestamp(DateTime<Utc>),
}

/// 参数化 WHERE 子句及其绑定参数
///
/// 占位符按从左到右的出现顺序编号，binds 与之一一对应。
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    pub where_clause: String,
    pub binds: Vec<SqlBind>,
}

impl Predicate {
    /// 对一条记录做内存匹配
    pub fn matches<R: FieldAccess>(&self, record: &R) -> bool {
        match self {
            Self::All => true,
            Self::And(children) => children.iter().all(|p| p.matches(record)),
            Self::Or(children) => {
                !children.is_empty() && children.iter().any(|p| p.matches(record))
            }
            Self::NumericCmp { field, op, value } => record
                .numeric(*field)
                .is_some_and(|actual| op.apply(actual, *value)),
            Self::TimeCmp { field, op, value } => record
                .time(*field)
                .is_some_and(|actual| op.apply(actual, *value)),
            Self::NumericEq {
                field,
                value,
                negate,
            } => record
                .numeric(*field)
                .is_some_and(|actual| (actual == *value) != *negate),
            Self::TextEq {
                field,
                value,
                negate,
            } => record
                .text(*field)
                .is_some_and(|actual| (actual == value) != *negate),
            Self::TimeEq {
                field,
                value,
                negate,
            } => record
                .time(*field)
                .is_some_and(|actual| (actual == *value) != *negate),
            Self::TagsContainsAll { field, tags } => {
                if tags.is_empty() {
                    return true;
                }
                let stored = record.tags(*field).unwrap_or(&[]);
                tags.iter().all(|tag| stored.contains(tag))
            }
            Self::PrefixI { field, value } => record.text(*field).is_some_and(|actual| {
                actual.to_lowercase().starts_with(&value.to_lowercase())
            }),
            Self::SuffixI { field, value } => record
                .text(*field)
                .is_some_and(|actual| actual.to_lowercase().ends_with(&value.to_lowercase())),
        }
    }

    /// 渲染为参数化 Postgres WHERE 子句
    ///
    /// 列名只来自字段白名单，值全部走绑定参数，规则内容不拼接进 SQL 文本。
    pub fn to_sql(&self) -> SqlQuery {
        let mut clause = String::new();
        let mut binds = Vec::new();
        self.render(&mut clause, &mut binds);
        SqlQuery {
            where_clause: clause,
            binds,
        }
    }

    fn render(&self, out: &mut String, binds: &mut Vec<SqlBind>) {
        match self {
            Self::All => out.push_str("TRUE"),
            Self::And(children) | Self::Or(children) => {
                if children.is_empty() {
                    // 空组不应出现在编译产物里，保守按全匹配渲染
                    out.push_str(if matches!(self, Self::And(_)) {
                        "TRUE"
                    } else {
                        "FALSE"
                    });
                    return;
                }
                let joiner = if matches!(self, Self::And(_)) {
                    " AND "
                } else {
                    " OR "
                };
                out.push('(');
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        out.push_str(joiner);
                    }
                    child.render(out, binds);
                }
                out.push(')');
            }
            Self::NumericCmp { field, op, value } => {
                binds.push(SqlBind::Number(*value));
                let _ = write!(out, "{} {} ${}", field.column(), op.sql(), binds.len());
            }
            Self::TimeCmp { field, op, value } => {
                binds.push(SqlBind::Timestamp(*value));
                let _ = write!(out, "{} {} ${}", field.column(), op.sql(), binds.len());
            }
            Self::NumericEq {
                field,
                value,
                negate,
            } => {
                binds.push(SqlBind::Number(*value));
                let op = if *negate { "<>" } else { "=" };
                let _ = write!(out, "{} {} ${}", field.column(), op, binds.len());
            }
            Self::TextEq {
                field,
                value,
                negate,
            } => {
                binds.push(SqlBind::Text(value.clone()));
                let op = if *negate { "<>" } else { "=" };
                let _ = write!(out, "{} {} ${}", field.column(), op, binds.len());
            }
            Self::TimeEq {
                field,
                value,
                negate,
            } => {
                binds.push(SqlBind::Timestamp(*value));
                let op = if *negate { "<>" } else { "=" };
                let _ = write!(out, "{} {} ${}", field.column(), op, binds.len());
            }
            Self::TagsContainsAll { field, tags } => {
                if tags.is_empty() {
                    out.push_str("TRUE");
                    return;
                }
                binds.push(SqlBind::TextArray(tags.clone()));
                // COALESCE 把 NULL 标签列当空数组，空集子集检查才能空泛成立
                let _ = write!(
                    out,
                    "COALESCE({}, '{{}}') @> ${}",
                    field.column(),
                    binds.len()
                );
            }
            Self::PrefixI { field, value } => {
                binds.push(SqlBind::Text(format!("{}%", escape_like(value))));
                let _ = write!(
                    out,
                    "{} ILIKE ${} ESCAPE '\\'",
                    field.column(),
                    binds.len()
                );
            }
            Self::SuffixI { field, value } => {
                binds.push(SqlBind::Text(format!("%{}", escape_like(value))));
                let _ = write!(
                    out,
                    "{} ILIKE ${} ESCAPE '\\'",
                    field.column(),
                    binds.len()
                );
            }
        }
    }
}

/// 转义 LIKE 模式中的元字符，用户输入只做字面匹配
fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
