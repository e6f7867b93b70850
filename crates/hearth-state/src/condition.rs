//! Write preconditions.
//!
//! A [`Condition`] is a boolean expression over the existence of an item and
//! the values of its attributes. The store evaluates it against the stored
//! JSON inside the write transaction that performs the write.
//!
//! Attribute paths are dotted (`status.lastRequest`). A comparison against a
//! missing attribute is false; `AttributeNotExists` is true when the whole
//! item is missing.

use std::cmp::Ordering;

use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    ItemExists,
    ItemNotExists,
    AttributeExists(String),
    AttributeNotExists(String),
    Equals(String, Value),
    NotEquals(String, Value),
    LessThan(String, Value),
    And(Vec<Condition>),
    Or(Vec<Condition>),
}

impl Condition {
    pub fn attribute_exists(path: &str) -> Self {
        Condition::AttributeExists(path.to_string())
    }

    pub fn attribute_not_exists(path: &str) -> Self {
        Condition::AttributeNotExists(path.to_string())
    }

    pub fn equals(path: &str, value: impl Into<Value>) -> Self {
        Condition::Equals(path.to_string(), value.into())
    }

    pub fn not_equals(path: &str, value: impl Into<Value>) -> Self {
        Condition::NotEquals(path.to_string(), value.into())
    }

    pub fn less_than(path: &str, value: impl Into<Value>) -> Self {
        Condition::LessThan(path.to_string(), value.into())
    }

    pub fn and(self, other: Condition) -> Self {
        match self {
            Condition::And(mut all) => {
                all.push(other);
                Condition::And(all)
            }
            first => Condition::And(vec![first, other]),
        }
    }

    pub fn or(self, other: Condition) -> Self {
        match self {
            Condition::Or(mut any) => {
                any.push(other);
                Condition::Or(any)
            }
            first => Condition::Or(vec![first, other]),
        }
    }

    /// Evaluate against the currently stored item, if any.
    pub fn evaluate(&self, item: Option<&Value>) -> bool {
        match self {
            Condition::ItemExists => item.is_some(),
            Condition::ItemNotExists => item.is_none(),
            Condition::AttributeExists(path) => lookup(item, path).is_some(),
            Condition::AttributeNotExists(path) => lookup(item, path).is_none(),
            Condition::Equals(path, expected) => lookup(item, path) == Some(expected),
            Condition::NotEquals(path, expected) => {
                lookup(item, path).is_some_and(|actual| actual != expected)
            }
            Condition::LessThan(path, bound) => lookup(item, path)
                .and_then(|actual| compare(actual, bound))
                .is_some_and(|ord| ord == Ordering::Less),
            Condition::And(all) => all.iter().all(|c| c.evaluate(item)),
            Condition::Or(any) => any.iter().any(|c| c.evaluate(item)),
        }
    }
}

/// Resolve a dotted path. JSON `null` counts as absent.
fn lookup<'a>(item: Option<&'a Value>, path: &str) -> Option<&'a Value> {
    let mut current = item?;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    (!current.is_null()).then_some(current)
}

fn compare(actual: &Value, bound: &Value) -> Option<Ordering> {
    match (actual, bound) {
        (Value::Number(a), Value::Number(b)) => match (a.as_u64(), b.as_u64()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
        },
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}
