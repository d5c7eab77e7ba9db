//! 规则领域模型
//!
//! 规则在内存中是显式的标签联合（叶子条件 / 逻辑组），消除了线上 JSON
//! 靠形状猜测节点类型的歧义。判别规则只有一条：对象携带 AND/OR 的
//! `operator` 且 `conditions` 为数组时是逻辑组，否则必须是合法的叶子条件。

use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::Value;

use crate::error::{Result, RuleError};
use crate::operators::{LogicalOperator, Operator};

/// 叶子条件
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    pub value: Value,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    /// 从 JSON 对象构建叶子条件
    ///
    /// field / operator / value 三者必须齐全；value 不允许为 null
    /// （数据缺失是校验错误，不是空条件）。
    fn from_value(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| RuleError::Malformed("条件节点必须是 JSON 对象".to_string()))?;

        let field = obj
            .get("field")
            .and_then(Value::as_str)
            .ok_or_else(|| RuleError::Malformed("条件缺少 field 字段".to_string()))?;

        let op_str = obj
            .get("operator")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                RuleError::Malformed(format!("条件 '{}' 缺少 operator 字段", field))
            })?;

        let operator = Operator::from_symbol(op_str).ok_or_else(|| {
            RuleError::invalid(
                field,
                op_str,
                "不支持的操作符，合法操作符为 > < >= <= == != contains startsWith endsWith",
            )
        })?;

        let cond_value = match obj.get("value") {
            None | Some(Value::Null) => {
                return Err(RuleError::Malformed(format!(
                    "条件 '{}' 缺少 value 字段",
                    field
                )));
            }
            Some(v) => v.clone(),
        };

        Ok(Self {
            field: field.to_string(),
            operator,
            value: cond_value,
        })
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Condition::from_value(&value).map_err(de::Error::custom)
    }
}

/// 规则节点：叶子条件或嵌套逻辑组
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RuleNode {
    Group(RuleGroup),
    Condition(Condition),
}

impl RuleNode {
    /// 从 JSON 值构建规则节点（唯一的节点判别入口）
    pub fn from_value(value: &Value) -> Result<Self> {
        if let Some(obj) = value.as_object() {
            // 判别规则：operator 取值为 AND/OR 且 conditions 为数组时才是逻辑组。
            // 叶子条件的 operator 永远不会是 AND/OR，因此不存在歧义。
            let is_group = obj
                .get("operator")
                .and_then(Value::as_str)
                .and_then(LogicalOperator::from_symbol)
                .is_some()
                && obj.get("conditions").is_some_and(Value::is_array);

            if is_group {
                return RuleGroup::from_value(value).map(RuleNode::Group);
            }
        }

        Condition::from_value(value).map(RuleNode::Condition)
    }
}

impl<'de> Deserialize<'de> for RuleNode {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        RuleNode::from_value(&value).map_err(de::Error::custom)
    }
}

/// 逻辑组节点
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleGroup {
    pub operator: LogicalOperator,
    pub conditions: Vec<RuleNode>,
}

impl RuleGroup {
    pub fn new(operator: LogicalOperator, conditions: Vec<RuleNode>) -> Self {
        Self {
            operator,
            conditions,
        }
    }

    pub fn and(conditions: Vec<RuleNode>) -> Self {
        Self::new(LogicalOperator::And, conditions)
    }

    pub fn or(conditions: Vec<RuleNode>) -> Self {
        Self::new(LogicalOperator::Or, conditions)
    }

    /// 从 JSON 值构建规则组（API 边界的解析入口）
    ///
    /// 顶层必须是逻辑组；未知的顶层操作符在这里报错，
    /// 保证畸形的客群定义不会进入求值或编译路径。
    pub fn from_value(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| RuleError::Malformed("规则必须是 JSON 对象".to_string()))?;

        let op_str = obj
            .get("operator")
            .and_then(Value::as_str)
            .ok_or_else(|| RuleError::Malformed("规则缺少 operator 字段".to_string()))?;

        let operator = LogicalOperator::from_symbol(op_str).ok_or_else(|| {
            RuleError::Malformed(format!(
                "未知的逻辑操作符 '{}'，只支持 AND / OR",
                op_str
            ))
        })?;

        let conditions = obj
            .get("conditions")
            .and_then(Value::as_array)
            .ok_or_else(|| RuleError::Malformed("规则缺少 conditions 数组".to_string()))?
            .iter()
            .map(RuleNode::from_value)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            operator,
            conditions,
        })
    }
}

impl<'de> Deserialize<'de> for RuleGroup {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        RuleGroup::from_value(&value).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_rules() -> Value {
        json!({
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
        })
    }

    #[test]
    fn test_parse_nested_group() {
        let group = RuleGroup::from_value(&sample_rules()).unwrap();
        assert_eq!(group.operator, LogicalOperator::And);
        assert_eq!(group.conditions.len(), 2);

        match &group.conditions[0] {
            RuleNode::Condition(cond) => {
                assert_eq!(cond.field, "totalSpend");
                assert_eq!(cond.operator, Operator::Gte);
            }
            other => panic!("期望叶子条件，实际: {:?}", other),
        }

        match &group.conditions[1] {
            RuleNode::Group(nested) => {
                assert_eq!(nested.operator, LogicalOperator::Or);
                assert_eq!(nested.conditions.len(), 2);
            }
            other => panic!("期望嵌套逻辑组，实际: {:?}", other),
        }
    }

    #[test]
    fn test_wire_roundtrip() {
        // 规则 JSON 必须精确往返：序列化结果与输入完全一致
        let original = sample_rules();
        let group = RuleGroup::from_value(&original).unwrap();
        let serialized = serde_json::to_value(&group).unwrap();
        assert_eq!(serialized, original);
    }

    #[test]
    fn test_unknown_leaf_operator_rejected() {
        let value = json!({
            "operator": "AND",
            "conditions": [
                {"field": "email", "operator": "regex", "value": ".*@example.com"}
            ]
        });

        let err = RuleGroup::from_value(&value).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("regex"), "错误信息应指明非法操作符: {msg}");
        assert!(msg.contains("email"), "错误信息应指明所在字段: {msg}");
    }

    #[test]
    fn test_unknown_top_level_operator_rejected() {
        let value = json!({
            "operator": "XOR",
            "conditions": []
        });

        let err = RuleGroup::from_value(&value).unwrap_err();
        assert!(err.to_string().contains("XOR"));
    }

    #[test]
    fn test_missing_value_rejected() {
        // value 缺失与 null 都是校验错误，不是合法的空条件
        for leaf in [
            json!({"field": "visits", "operator": ">="}),
            json!({"field": "visits", "operator": ">=", "value": null}),
        ] {
            let value = json!({"operator": "AND", "conditions": [leaf]});
            assert!(RuleGroup::from_value(&value).is_err());
        }
    }

    #[test]
    fn test_leaf_field_named_operator_not_misclassified() {
        // 字段名恰好叫 "operator" 的叶子不会被误判为逻辑组：
        // 它的 operator 取值是比较符号而非 AND/OR
        let value = json!({
            "operator": "AND",
            "conditions": [
                {"field": "operator", "operator": "==", "value": "AND"}
            ]
        });

        let group = RuleGroup::from_value(&value).unwrap();
        assert!(matches!(&group.conditions[0], RuleNode::Condition(c) if c.field == "operator"));
    }

    #[test]
    fn test_group_requires_conditions_array() {
        // 有 AND 操作符但 conditions 不是数组：按叶子条件解析并报错
        let value = json!({"operator": "AND", "conditions": "oops"});
        assert!(RuleGroup::from_value(&value).is_err());
    }

    #[test]
    fn test_empty_group_parses() {
        let value = json!({"operator": "OR", "conditions": []});
        let group = RuleGroup::from_value(&value).unwrap();
        assert!(group.conditions.is_empty());
    }

    #[test]
    fn test_deserialize_via_serde() {
        let group: RuleGroup = serde_json::from_value(sample_rules()).unwrap();
        assert_eq!(group.conditions.len(), 2);

        // serde 路径与 from_value 路径必须给出相同结果
        let direct = RuleGroup::from_value(&sample_rules()).unwrap();
        assert_eq!(group, direct);
    }
}
