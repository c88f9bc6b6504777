// Condition filters over task and column attributes

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

use super::board::{Column, Task};
use super::values::Priority;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    Ne,
    Contains,
    NotContains,
    Gt,
    Lt,
    In,
    NotIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LogicalOperator {
    #[default]
    #[serde(rename = "AND", alias = "and")]
    And,
    #[serde(rename = "OR", alias = "or")]
    Or,
    /// Anything else; the group passes.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConditionGroup {
    #[serde(default)]
    pub operator: LogicalOperator,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl Condition {
    pub fn new(field: &str, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            operator,
            value: value.into(),
        }
    }

    /// Unresolvable fields make the condition false whatever the operator.
    pub fn evaluate(&self, task: &Task, column: Option<&Column>) -> bool {
        let Some(actual) = self.resolve(task, column) else {
            return false;
        };
        match self.operator {
            Operator::Eq => values_equal(&actual, &self.value),
            Operator::Ne => !values_equal(&actual, &self.value),
            Operator::Contains => contains(&actual, &self.value),
            Operator::NotContains => !contains(&actual, &self.value),
            Operator::Gt => self.compare(&actual) == Some(Ordering::Greater),
            Operator::Lt => self.compare(&actual) == Some(Ordering::Less),
            Operator::In => one_of(&actual, &self.value),
            Operator::NotIn => match &self.value {
                Value::Array(_) => !one_of(&actual, &self.value),
                _ => false,
            },
        }
    }

    fn resolve(&self, task: &Task, column: Option<&Column>) -> Option<Value> {
        let value = match self.field.as_str() {
            "priority" => Value::from(task.priority.as_str()),
            "status" => Value::from(task.status.as_str()),
            "column" => Value::from(column?.name.as_str()),
            "tags" => Value::from(task.tags.clone()),
            "has_due_date" => Value::from(task.due_date.is_some()),
            "is_overdue" => Value::from(task.is_overdue()),
            other => Value::from(task.metadata.get(other)?.as_str()),
        };
        Some(value)
    }

    fn compare(&self, actual: &Value) -> Option<Ordering> {
        if self.field == "priority" {
            let lhs: Priority = actual.as_str()?.parse().ok()?;
            let rhs: Priority = self.value.as_str()?.parse().ok()?;
            return Some(lhs.rank().cmp(&rhs.rank()));
        }
        let lhs = as_number(actual)?;
        let rhs = as_number(&self.value)?;
        lhs.partial_cmp(&rhs)
    }
}

impl ConditionGroup {
    pub fn new(operator: LogicalOperator, conditions: Vec<Condition>) -> Self {
        Self {
            operator,
            conditions,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn evaluate(&self, task: &Task, column: Option<&Column>) -> bool {
        self.evaluate_with(|condition| condition.evaluate(task, column))
    }

    /// Combine conditions with the group operator, short-circuiting.
    pub fn evaluate_with<F>(&self, mut check: F) -> bool
    where
        F: FnMut(&Condition) -> bool,
    {
        if self.conditions.is_empty() {
            return true;
        }
        match self.operator {
            LogicalOperator::And => self.conditions.iter().all(|c| check(c)),
            LogicalOperator::Or => self.conditions.iter().any(|c| check(c)),
            LogicalOperator::Unknown => true,
        }
    }
}

fn values_equal(actual: &Value, expected: &Value) -> bool {
    match (as_number(actual), as_number(expected)) {
        (Some(a), Some(b)) if actual.is_number() && expected.is_number() => a == b,
        _ => actual == expected,
    }
}

/// Membership for lists, substring for strings.
fn contains(actual: &Value, expected: &Value) -> bool {
    match actual {
        Value::Array(items) => items.iter().any(|item| values_equal(item, expected)),
        Value::String(haystack) => expected
            .as_str()
            .map(|needle| haystack.contains(needle))
            .unwrap_or(false),
        _ => false,
    }
}

fn one_of(actual: &Value, expected: &Value) -> bool {
    match expected {
        Value::Array(options) => options.iter().any(|option| values_equal(actual, option)),
        _ => false,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::task_id::TaskId;
    use crate::domain::values::Status;
    use serde_json::json;

    fn task() -> Task {
        let id = TaskId::new("ABC", 1, "t").unwrap();
        let mut task = Task::new(id, "t", "", Priority::High, Status::InProgress).unwrap();
        task.add_tag("backend");
        task.add_tag("urgent");
        task.set_metadata("estimate", "5");
        task.set_metadata("owner", "sam");
        task
    }

    fn column() -> Column {
        Column::new("Review", "", 0, 0, "").unwrap()
    }

    #[test]
    fn test_fixed_fields() {
        let task = task();
        let col = column();
        assert!(Condition::new("priority", Operator::Eq, "high").evaluate(&task, Some(&col)));
        assert!(Condition::new("status", Operator::Ne, "done").evaluate(&task, None));
        assert!(Condition::new("column", Operator::Eq, "Review").evaluate(&task, Some(&col)));
        assert!(Condition::new("has_due_date", Operator::Eq, false).evaluate(&task, None));
        assert!(Condition::new("is_overdue", Operator::Eq, false).evaluate(&task, None));
    }

    #[test]
    fn test_missing_column_and_unknown_field_are_false() {
        let task = task();
        assert!(!Condition::new("column", Operator::Eq, "Review").evaluate(&task, None));
        assert!(!Condition::new("column", Operator::Ne, "Review").evaluate(&task, None));
        assert!(!Condition::new("sprint", Operator::Ne, "x").evaluate(&task, None));
    }

    #[test]
    fn test_contains_branches_on_shape() {
        let task = task();
        assert!(Condition::new("tags", Operator::Contains, "urgent").evaluate(&task, None));
        assert!(Condition::new("tags", Operator::NotContains, "frontend").evaluate(&task, None));
        assert!(Condition::new("owner", Operator::Contains, "am").evaluate(&task, None));
        assert!(!Condition::new("owner", Operator::Contains, "bob").evaluate(&task, None));
    }

    #[test]
    fn test_in_and_not_in() {
        let task = task();
        assert!(Condition::new("priority", Operator::In, json!(["high", "critical"])).evaluate(&task, None));
        assert!(Condition::new("status", Operator::NotIn, json!(["done", "blocked"])).evaluate(&task, None));
        assert!(!Condition::new("status", Operator::In, "in_progress").evaluate(&task, None));
    }

    #[test]
    fn test_ordering_operators() {
        let task = task();
        assert!(Condition::new("priority", Operator::Gt, "medium").evaluate(&task, None));
        assert!(Condition::new("priority", Operator::Lt, "critical").evaluate(&task, None));
        assert!(Condition::new("estimate", Operator::Gt, 3).evaluate(&task, None));
        assert!(!Condition::new("owner", Operator::Gt, "a").evaluate(&task, None));
    }

    #[test]
    fn test_empty_group_is_true() {
        let task = task();
        for op in [LogicalOperator::And, LogicalOperator::Or] {
            assert!(ConditionGroup::new(op, vec![]).evaluate(&task, None));
        }
    }

    #[test]
    fn test_short_circuit() {
        let group = ConditionGroup::new(
            LogicalOperator::And,
            vec![
                Condition::new("a", Operator::Eq, false),
                Condition::new("b", Operator::Eq, true),
            ],
        );
        let mut calls = 0;
        let result = group.evaluate_with(|c| {
            calls += 1;
            c.value == json!(true)
        });
        assert!(!result);
        assert_eq!(calls, 1);

        let group = ConditionGroup::new(LogicalOperator::Or, group.conditions.into_iter().rev().collect());
        let mut calls = 0;
        assert!(group.evaluate_with(|c| {
            calls += 1;
            c.value == json!(true)
        }));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_group_wire_shape() {
        let group: ConditionGroup = serde_json::from_value(json!({
            "operator": "OR",
            "conditions": [{"field": "priority", "operator": "eq", "value": "low"}]
        }))
        .unwrap();
        assert_eq!(group.operator, LogicalOperator::Or);

        let odd: ConditionGroup = serde_json::from_value(json!({"operator": "XOR", "conditions": [
            {"field": "priority", "operator": "eq", "value": "low"}
        ]}))
        .unwrap();
        assert!(odd.evaluate(&task(), None));
    }
}
