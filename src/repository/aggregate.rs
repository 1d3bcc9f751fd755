//! Aggregate computations over materialized entities.

use crate::error::{RepositoryError, Result};
use crate::expr::{FieldAccess, Selector, Value};

/// Selector values of every entity, in order.
pub fn project<T: FieldAccess>(entities: &[T], selector: &Selector) -> Result<Vec<Value>> {
    entities.iter().map(|e| selector.evaluate(e)).collect()
}

/// Sum of numeric values; `Int` while every value is an integer, `Float` otherwise.
///
/// Nulls are skipped and an empty input sums to `Int(0)`.
pub fn sum(values: &[Value]) -> Result<Value> {
    let mut int_total: Option<i64> = Some(0);
    let mut float_total = 0.0;
    for value in values {
        match value {
            Value::Null => {}
            Value::Int(i) => {
                int_total = int_total.and_then(|t| t.checked_add(*i));
                float_total += *i as f64;
            }
            Value::Float(f) => {
                int_total = None;
                float_total += f;
            }
            other => {
                return Err(RepositoryError::Evaluation(format!(
                    "cannot sum {} values",
                    other.type_name()
                )))
            }
        }
    }
    Ok(match int_total {
        Some(total) => Value::Int(total),
        None => Value::Float(float_total),
    })
}

/// Mean of the non-null numeric values; `None` when there are none.
pub fn average(values: &[Value]) -> Result<Option<f64>> {
    let mut total = 0.0;
    let mut count = 0usize;
    for value in values.iter().filter(|v| !v.is_null()) {
        let number = value.as_f64().ok_or_else(|| {
            RepositoryError::Evaluation(format!("cannot average {} values", value.type_name()))
        })?;
        total += number;
        count += 1;
    }
    Ok((count > 0).then(|| total / count as f64))
}

pub fn min(values: Vec<Value>) -> Option<Value> {
    values.into_iter().filter(|v| !v.is_null()).min()
}

pub fn max(values: Vec<Value>) -> Option<Value> {
    values.into_iter().filter(|v| !v.is_null()).max()
}

/// Entities grouped by selector value, groups in key order, members in input order.
pub fn group_items<T: FieldAccess>(entities: Vec<T>, key_selector: &Selector) -> Result<Vec<(Value, Vec<T>)>> {
    let mut groups: Vec<(Value, Vec<T>)> = Vec::new();
    for entity in entities {
        let key = key_selector.evaluate(&entity)?;
        match groups.binary_search_by(|(k, _)| k.cmp(&key)) {
            Ok(index) => groups[index].1.push(entity),
            Err(index) => groups.insert(index, (key, vec![entity])),
        }
    }
    Ok(groups)
}

pub fn group_counts<T: FieldAccess>(entities: Vec<T>, key_selector: &Selector) -> Result<Vec<(Value, usize)>> {
    Ok(group_items(entities, key_selector)?
        .into_iter()
        .map(|(key, items)| (key, items.len()))
        .collect())
}
