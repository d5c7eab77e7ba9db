//! 规则编译器
//!
//! 把规则树编译成存储谓词。与求值器不同，编译器是严格路径：
//! 未知字段、操作符与字段类型不兼容、值类型错误都同步报错，
//! 非法谓词绝不允许落到全量客户数据上执行。

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::{Result, RuleError};
use crate::fields::{CustomerField, FieldKind};
use crate::models::{Condition, RuleGroup, RuleNode};
use crate::operators::{LogicalOperator, Operator};
use crate::predicate::{CmpOp, Predicate};

/// 严格编译器
pub struct RuleCompiler;

impl RuleCompiler {
    /// 编译整棵规则树
    ///
    /// 空条件组编译为全匹配谓词，与求值器的空泛 true 规则一致。
    pub fn compile(group: &RuleGroup) -> Result<Predicate> {
        if group.conditions.is_empty() {
            return Ok(Predicate::All);
        }

        let children = group
            .conditions
            .iter()
            .map(Self::compile_node)
            .collect::<Result<Vec<_>>>()?;

        Ok(match group.operator {
            LogicalOperator::And => Predicate::And(children),
            LogicalOperator::Or => Predicate::Or(children),
        })
    }

    fn compile_node(node: &RuleNode) -> Result<Predicate> {
        match node {
            RuleNode::Group(group) => Self::compile(group),
            RuleNode::Condition(cond) => Self::compile_condition(cond),
        }
    }

    /// 编译单个叶子条件
    ///
    /// 字段必须在白名单内，操作符必须与字段类型兼容，值类型必须匹配。
    fn compile_condition(cond: &Condition) -> Result<Predicate> {
        let field = CustomerField::from_name(&cond.field)
            .ok_or_else(|| RuleError::UnknownField(cond.field.clone()))?;

        match field.kind() {
            FieldKind::Numeric => Self::compile_numeric(field, cond),
            FieldKind::Text => Self::compile_text(field, cond),
            FieldKind::Tags => Self::compile_tags(field, cond),
            FieldKind::Timestamp => Self::compile_timestamp(field, cond),
        }
    }

    fn compile_numeric(field: CustomerField, cond: &Condition) -> Result<Predicate> {
        let value = cond.value.as_f64().ok_or_else(|| {
            RuleError::invalid(
                field.name(),
                cond.operator,
                format!("数值字段要求数值类型的 value，实际为 {}", type_name(&cond.value)),
            )
        })?;

        match cond.operator {
            Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
                Ok(Predicate::NumericCmp {
                    field,
                    op: cmp_op(cond.operator),
                    value,
                })
            }
            Operator::Eq | Operator::Neq => Ok(Predicate::NumericEq {
                field,
                value,
                negate: cond.operator == Operator::Neq,
            }),
            op => Err(RuleError::invalid(
                field.name(),
                op,
                "数值字段只支持 > < >= <= == !=",
            )),
        }
    }

    fn compile_text(field: CustomerField, cond: &Condition) -> Result<Predicate> {
        let value = cond.value.as_str().ok_or_else(|| {
            RuleError::invalid(
                field.name(),
                cond.operator,
                format!("文本字段要求字符串类型的 value，实际为 {}", type_name(&cond.value)),
            )
        })?;

        match cond.operator {
            Operator::Eq | Operator::Neq => Ok(Predicate::TextEq {
                field,
                value: value.to_string(),
                negate: cond.operator == Operator::Neq,
            }),
            Operator::StartsWith => Ok(Predicate::PrefixI {
                field,
                value: value.to_string(),
            }),
            Operator::EndsWith => Ok(Predicate::SuffixI {
                field,
                value: value.to_string(),
            }),
            op => Err(RuleError::invalid(
                field.name(),
                op,
                "文本字段只支持 == != startsWith endsWith",
            )),
        }
    }

    fn compile_tags(field: CustomerField, cond: &Condition) -> Result<Predicate> {
        if cond.operator != Operator::Contains {
            return Err(RuleError::invalid(
                field.name(),
                cond.operator,
                "标签字段只支持 contains",
            ));
        }

        let tags = match &cond.value {
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        RuleError::invalid(
                            field.name(),
                            cond.operator,
                            "contains 的 value 数组元素必须全部是字符串",
                        )
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            other => {
                return Err(RuleError::invalid(
                    field.name(),
                    cond.operator,
                    format!(
                        "contains 要求字符串数组类型的 value，实际为 {}",
                        type_name(other)
                    ),
                ));
            }
        };

        Ok(Predicate::TagsContainsAll { field, tags })
    }

    fn compile_timestamp(field: CustomerField, cond: &Condition) -> Result<Predicate> {
        let value = parse_timestamp(&cond.value).ok_or_else(|| {
            RuleError::invalid(
                field.name(),
                cond.operator,
                "时间字段要求 RFC 3339 格式的时间字符串",
            )
        })?;

        match cond.operator {
            Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
                Ok(Predicate::TimeCmp {
                    field,
                    op: cmp_op(cond.operator),
                    value,
                })
            }
            Operator::Eq | Operator::Neq => Ok(Predicate::TimeEq {
                field,
                value,
                negate: cond.operator == Operator::Neq,
            }),
            op => Err(RuleError::invalid(
                field.name(),
                op,
                "时间字段只支持 > < >= <= == !=",
            )),
        }
    }
}

fn cmp_op(op: Operator) -> CmpOp {
    match op {
        Operator::Gt => CmpOp::Gt,
        Operator::Gte => CmpOp::Gte,
        Operator::Lt => CmpOp::Lt,
        // 调用方已保证只传排序操作符
        _ => CmpOp::Lte,
    }
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "布尔",
        Value::Number(_) => "数值",
        Value::String(_) => "字符串",
        Value::Array(_) => "数组",
        Value::Object(_) => "对象",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rules(value: Value) -> RuleGroup {
        RuleGroup::from_value(&value).unwrap()
    }

    #[test]
    fn test_compile_nested_rule() {
        let group = rules(json!({
            "operator": "AND",
            "conditions": [
                {"field": "totalSpend", "operator": ">=", "value": 5000},
                {
                    "operator": "OR",
                    "conditions": [
                        {"field": "tags", "operator": "contains", "value": ["VIP"]},
                        {"field": "visits", "operator": ">=", "value": 10}
                    ]
                }
            ]
        }));

        let pred = RuleCompiler::compile(&group).unwrap();
        let sql = pred.to_sql();
        assert_eq!(
            sql.where_clause,
            "(total_spend >= $1 AND (COALESCE(tags, '{}') @> $2 OR visits >= $3))"
        );
    }

    #[test]
    fn test_empty_group_compiles_to_all() {
        let group = rules(json!({"operator": "AND", "conditions": []}));
        assert_eq!(RuleCompiler::compile(&group).unwrap(), Predicate::All);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let group = rules(json!({
            "operator": "AND",
            "conditions": [{"field": "purchaseHistory", "operator": ">=", "value": 1}]
        }));

        let err = RuleCompiler::compile(&group).unwrap_err();
        assert!(matches!(err, RuleError::UnknownField(ref f) if f == "purchaseHistory"));
    }

    #[test]
    fn test_numeric_operator_with_string_value_rejected() {
        // 严格路径：类型不匹配同步报错，而不是像求值器那样降级为 false
        let group = rules(json!({
            "operator": "AND",
            "conditions": [{"field": "totalSpend", "operator": ">", "value": "很多"}]
        }));

        let err = RuleCompiler::compile(&group).unwrap_err();
        assert!(matches!(err, RuleError::InvalidCondition { ref field, .. } if field == "totalSpend"));
    }

    #[test]
    fn test_incompatible_operator_for_field_kind() {
        for (field, op, value) in [
            ("email", "contains", json!(["x"])),
            ("tags", "==", json!(["VIP"])),
            ("name", ">", json!("a")),
            ("lastActive", "startsWith", json!("2025")),
        ] {
            let group = rules(json!({
                "operator": "AND",
                "conditions": [{"field": field, "operator": op, "value": value}]
            }));
            assert!(
                RuleCompiler::compile(&group).is_err(),
                "{field} {op} 应被拒绝"
            );
        }
    }

    #[test]
    fn test_tags_value_must_be_string_array() {
        let group = rules(json!({
            "operator": "AND",
            "conditions": [{"field": "tags", "operator": "contains", "value": ["VIP", 3]}]
        }));
        assert!(RuleCompiler::compile(&group).is_err());

        let group = rules(json!({
            "operator": "AND",
            "conditions": [{"field": "tags", "operator": "contains", "value": ["VIP"]}]
        }));
        let pred = RuleCompiler::compile(&group).unwrap();
        assert_eq!(
            pred,
            Predicate::And(vec![Predicate::TagsContainsAll {
                field: CustomerField::Tags,
                tags: vec!["VIP".to_string()],
            }])
        );
    }

    #[test]
    fn test_tags_contains_rejects_plain_string() {
        // 严格路径不做单字符串到单元素集合的降级，求值器才允许这种宽容
        let group = rules(json!({
            "operator": "AND",
            "conditions": [{"field": "tags", "operator": "contains", "value": "VIP"}]
        }));

        let err = RuleCompiler::compile(&group).unwrap_err();
        assert!(matches!(err, RuleError::InvalidCondition { ref field, .. } if field == "tags"));
    }

    #[test]
    fn test_timestamp_requires_rfc3339() {
        let group = rules(json!({
            "operator": "AND",
            "conditions": [{"field": "lastActive", "operator": ">", "value": "昨天"}]
        }));
        assert!(RuleCompiler::compile(&group).is_err());

        let group = rules(json!({
            "operator": "AND",
            "conditions": [
                {"field": "lastActive", "operator": ">", "value": "2025-01-01T00:00:00Z"}
            ]
        }));
        let pred = RuleCompiler::compile(&group).unwrap();
        assert_eq!(pred.to_sql().where_clause, "(last_active > $1)");
    }
}
