//! 内存规则求值器
//!
//! 针对单条客户记录（扁平 JSON 对象）递归求值规则树，服务于实时预览。
//! 求值器是宽松路径：字段缺失、类型不匹配一律按不命中处理而不报错，
//! 保证编辑到一半的规则也能渲染出预览结果。严格校验在编译器一侧做。

use chrono::{DateTime, FixedOffset};
use serde_json::Value;

use crate::models::{Condition, RuleGroup, RuleNode};
use crate::operators::{LogicalOperator, Operator};

/// 宽松求值器
///
/// 无状态、无 I/O，可在任意请求间并发调用。
pub struct RuleEvaluator;

impl RuleEvaluator {
    /// 对一条客户记录求值整棵规则树
    ///
    /// 空条件组匹配一切记录（AND 与 OR 均是）。AND 在首个 false 处
    /// 短路，OR 在首个 true 处短路。
    pub fn evaluate(record: &Value, group: &RuleGroup) -> bool {
        if group.conditions.is_empty() {
            return true;
        }

        match group.operator {
            LogicalOperator::And => group
                .conditions
                .iter()
                .all(|node| Self::evaluate_node(record, node)),
            LogicalOperator::Or => group
                .conditions
                .iter()
                .any(|node| Self::evaluate_node(record, node)),
        }
    }

    fn evaluate_node(record: &Value, node: &RuleNode) -> bool {
        match node {
            RuleNode::Group(group) => Self::evaluate(record, group),
            RuleNode::Condition(cond) => Self::evaluate_condition(record, cond),
        }
    }

    /// 对单个叶子条件求值
    ///
    /// 字段缺失（不存在或为 null）时除 contains 空值的空泛匹配外
    /// 一律不命中，`!=` 也不例外。
    pub fn evaluate_condition(record: &Value, cond: &Condition) -> bool {
        let actual = record.get(&cond.field).filter(|v| !v.is_null());

        match cond.operator {
            Operator::Contains => Self::eval_contains(actual, &cond.value),
            Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => actual
                .map(|a| Self::eval_ordering(a, cond.operator, &cond.value))
                .unwrap_or(false),
            Operator::Eq => actual.map(|a| strict_eq(a, &cond.value)).unwrap_or(false),
            Operator::Neq => actual.map(|a| !strict_eq(a, &cond.value)).unwrap_or(false),
            Operator::StartsWith => actual
                .map(|a| Self::eval_affix(a, &cond.value, true))
                .unwrap_or(false),
            Operator::EndsWith => actual
                .map(|a| Self::eval_affix(a, &cond.value, false))
                .unwrap_or(false),
        }
    }

    /// 标签子集检查：value 中的每个元素都必须出现在记录的数组字段里
    ///
    /// value 为空集时空泛命中，即使记录根本没有该字段。
    fn eval_contains(actual: Option<&Value>, value: &Value) -> bool {
        let required = required_tags(value);
        if required.is_empty() {
            return true;
        }

        match actual.and_then(Value::as_array) {
            Some(items) => required
                .iter()
                .all(|tag| items.iter().any(|item| item.as_str() == Some(tag))),
            None => false,
        }
    }

    /// 排序比较：优先按时间戳比较，否则做数值比较（含字符串清洗）
    fn eval_ordering(actual: &Value, op: Operator, value: &Value) -> bool {
        if let (Some(lhs), Some(rhs)) = (parse_timestamp(actual), parse_timestamp(value)) {
            return apply_ordering(op, lhs, rhs);
        }

        match (coerce_number(actual), coerce_number(value)) {
            (Some(lhs), Some(rhs)) => apply_ordering(op, lhs, rhs),
            _ => false,
        }
    }

    fn eval_affix(actual: &Value, value: &Value, prefix: bool) -> bool {
        let (Some(actual), Some(value)) = (actual.as_str(), value.as_str()) else {
            return false;
        };

        let actual = actual.to_lowercase();
        let value = value.to_lowercase();
        if prefix {
            actual.starts_with(&value)
        } else {
            actual.ends_with(&value)
        }
    }
}

/// 严格相等：类型与值都一致才算相等，数值按数学意义比较
fn strict_eq(actual: &Value, value: &Value) -> bool {
    match (actual.as_f64(), value.as_f64()) {
        (Some(lhs), Some(rhs)) => lhs == rhs,
        _ => actual == value,
    }
}

fn apply_ordering<T: PartialOrd>(op: Operator, lhs: T, rhs: T) -> bool {
    match op {
        Operator::Gt => lhs > rhs,
        Operator::Gte => lhs >= rhs,
        Operator::Lt => lhs < rhs,
        Operator::Lte => lhs <= rhs,
        _ => false,
    }
}

/// 数值清洗：字符串剥掉非数字/小数点/负号字符后按浮点解析
///
/// 带货币符号和千分位的输入（如 "₹1,200"）由此变成可比较的数值；
/// 清洗后仍解析失败的按不可比较处理。
fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            cleaned.parse::<f64>().ok()
        }
        _ => None,
    }
}

fn parse_timestamp(value: &Value) -> Option<DateTime<FixedOffset>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
}

fn required_tags(value: &Value) -> Vec<&str> {
    match value {
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        Value::String(s) if !s.is_empty() => vec![s.as_str()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vip_customer() -> Value {
        json!({
            "name": "张伟",
            "email": "zhangwei@example.com",
            "phone": "13800138000",
            "totalSpend": 12000,
            "visits": 15,
            "tags": ["VIP", "华东"],
            "lastActive": "2025-06-01T10:00:00Z"
        })
    }

    fn rules(value: serde_json::Value) -> RuleGroup {
        RuleGroup::from_value(&value).unwrap()
    }

    #[test]
    fn test_numeric_comparison() {
        let group = rules(json!({
            "operator": "AND",
            "conditions": [{"field": "totalSpend", "operator": ">=", "value": 10000}]
        }));
        assert!(RuleEvaluator::evaluate(&vip_customer(), &group));

        let group = rules(json!({
            "operator": "AND",
            "conditions": [{"field": "totalSpend", "operator": "<", "value": 10000}]
        }));
        assert!(!RuleEvaluator::evaluate(&vip_customer(), &group));
    }

    #[test]
    fn test_numeric_string_coercion() {
        // 货币符号与千分位被清洗后参与数值比较
        let record = json!({"totalSpend": "₹1,200"});
        let group = rules(json!({
            "operator": "AND",
            "conditions": [{"field": "totalSpend", "operator": ">=", "value": 1000}]
        }));
        assert!(RuleEvaluator::evaluate(&record, &group));

        // 清洗后仍无法解析的字符串按不命中处理，不报错
        let record = json!({"totalSpend": "unknown"});
        assert!(!RuleEvaluator::evaluate(&record, &group));
    }

    #[test]
    fn test_missing_field_never_matches() {
        let record = json!({"name": "李娜"});

        for (op, value) in [
            (">=", json!(0)),
            ("==", json!("x")),
            ("!=", json!("x")),
            ("startsWith", json!("a")),
        ] {
            let group = rules(json!({
                "operator": "AND",
                "conditions": [{"field": "email", "operator": op, "value": value}]
            }));
            assert!(
                !RuleEvaluator::evaluate(&record, &group),
                "字段缺失时 {op} 不应命中"
            );
        }
    }

    #[test]
    fn test_contains_subset_semantics() {
        // 子集检查：value 中全部标签都在记录里才命中
        let group = rules(json!({
            "operator": "AND",
            "conditions": [{"field": "tags", "operator": "contains", "value": ["VIP"]}]
        }));
        assert!(RuleEvaluator::evaluate(&vip_customer(), &group));

        let group = rules(json!({
            "operator": "AND",
            "conditions": [{"field": "tags", "operator": "contains", "value": ["VIP", "华北"]}]
        }));
        assert!(!RuleEvaluator::evaluate(&vip_customer(), &group));
    }

    #[test]
    fn test_contains_empty_value_vacuous_match() {
        // 空集的子集检查空泛成立，字段缺失也一样
        let group = rules(json!({
            "operator": "AND",
            "conditions": [{"field": "tags", "operator": "contains", "value": []}]
        }));
        assert!(RuleEvaluator::evaluate(&vip_customer(), &group));
        assert!(RuleEvaluator::evaluate(&json!({"name": "无标签"}), &group));
    }

    #[test]
    fn test_affix_case_insensitive() {
        let record = json!({"email": "VAT123@Example.COM"});

        let group = rules(json!({
            "operator": "AND",
            "conditions": [{"field": "email", "operator": "startsWith", "value": "vat"}]
        }));
        assert!(RuleEvaluator::evaluate(&record, &group));

        let group = rules(json!({
            "operator": "AND",
            "conditions": [{"field": "email", "operator": "endsWith", "value": "@example.com"}]
        }));
        assert!(RuleEvaluator::evaluate(&record, &group));
    }

    #[test]
    fn test_strict_equality() {
        let record = json!({"visits": 5, "name": "王芳"});

        let group = rules(json!({
            "operator": "AND",
            "conditions": [{"field": "visits", "operator": "==", "value": 5}]
        }));
        assert!(RuleEvaluator::evaluate(&record, &group));

        // 严格相等不做跨类型比较："5" 不等于 5
        let group = rules(json!({
            "operator": "AND",
            "conditions": [{"field": "visits", "operator": "==", "value": "5"}]
        }));
        assert!(!RuleEvaluator::evaluate(&record, &group));

        let group = rules(json!({
            "operator": "AND",
            "conditions": [{"field": "name", "operator": "!=", "value": "李娜"}]
        }));
        assert!(RuleEvaluator::evaluate(&record, &group));
    }

    #[test]
    fn test_timestamp_ordering() {
        let group = rules(json!({
            "operator": "AND",
            "conditions": [
                {"field": "lastActive", "operator": ">", "value": "2025-01-01T00:00:00Z"}
            ]
        }));
        assert!(RuleEvaluator::evaluate(&vip_customer(), &group));

        let group = rules(json!({
            "operator": "AND",
            "conditions": [
                {"field": "lastActive", "operator": "<", "value": "2025-01-01T00:00:00Z"}
            ]
        }));
        assert!(!RuleEvaluator::evaluate(&vip_customer(), &group));
    }

    #[test]
    fn test_nested_groups_short_circuit() {
        // AND(totalSpend >= 5000, OR(tags contains [VIP], visits >= 100))
        let group = rules(json!({
            "operator": "AND",
            "conditions": [
                {"field": "totalSpend", "operator": ">=", "value": 5000},
                {
                    "operator": "OR",
                    "conditions": [
                        {"field": "tags", "operator": "contains", "value": ["VIP"]},
                        {"field": "visits", "operator": ">=", "value": 100}
                    ]
                }
            ]
        }));

        assert!(RuleEvaluator::evaluate(&vip_customer(), &group));

        let casual = json!({"totalSpend": 8000, "visits": 2, "tags": ["新客"]});
        assert!(!RuleEvaluator::evaluate(&casual, &group));
    }

    #[test]
    fn test_empty_group_matches_everything() {
        for op in ["AND", "OR"] {
            let group = rules(json!({"operator": op, "conditions": []}));
            assert!(RuleEvaluator::evaluate(&json!({}), &group));
        }
    }

    #[test]
    fn test_type_mismatch_degrades_to_false() {
        // 数值操作符配非数值 value：宽松路径按不命中处理而不报错
        let record = json!({"visits": 3});
        let group = rules(json!({
            "operator": "AND",
            "conditions": [{"field": "visits", "operator": ">", "value": ["oops"]}]
        }));
        assert!(!RuleEvaluator::evaluate(&record, &group));
    }
}
