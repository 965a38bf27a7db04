//! Conversion of live variables into controller-facing snapshots

use std::sync::Arc;

use super::value::{ListHandle, StringGenerator, Value, VarAccessor};
use crate::common::{Error, Result};
use crate::message::{ListSlice, ListVariable, ScalarVariable, SymbolId, Variable};

/// Snapshot of one variable. Lists report their length only.
pub fn describe(var: &dyn VarAccessor, to_str: &StringGenerator) -> Variable {
    let id = var.id();
    match var.get() {
        Value::List(list) => Variable::List(ListVariable {
            id,
            length: list.read().len(),
            slices: Vec::new(),
        }),
        value => Variable::Scalar(ScalarVariable {
            id,
            value: to_str(&value),
        }),
    }
}

pub fn describe_all(vars: &[Arc<dyn VarAccessor>], to_str: &StringGenerator) -> Vec<Variable> {
    vars.iter().map(|var| describe(var.as_ref(), to_str)).collect()
}

/// Find the accessor for `id` in `vars`
pub fn find_accessor<'a>(
    vars: &'a [Arc<dyn VarAccessor>],
    id: &SymbolId,
) -> Result<&'a Arc<dyn VarAccessor>> {
    vars.iter()
        .find(|var| &var.id() == id)
        .ok_or_else(|| Error::NoSuchSymbol(id.to_string()))
}

/// Resolve `id` to a list variable and read a slice of it
pub fn list_values(
    vars: &[Arc<dyn VarAccessor>],
    id: &SymbolId,
    start_idx: i64,
    length: i64,
    to_str: &StringGenerator,
) -> Result<ListVariable> {
    match find_accessor(vars, id)?.get() {
        Value::List(list) => Ok(list_slice(id, &list, start_idx, length, to_str)),
        _ => Err(Error::NoSuchSymbol(format!("{} is not a list", id))),
    }
}

/// Read `length` values of `list` starting at `start_idx`.
///
/// A negative `start_idx` counts from the end of the list. A negative
/// `length` counts backward: the slice starts at `start_idx + length + 1`
/// and holds `-length` values. A zero `length` only reports the list length.
/// Elements are read one at a time and the slice stops at the first index
/// that no longer exists, since other threads may shrink the list meanwhile.
pub fn list_slice(
    id: &SymbolId,
    list: &ListHandle,
    start_idx: i64,
    length: i64,
    to_str: &StringGenerator,
) -> ListVariable {
    let len = list.read().len();
    if length == 0 {
        return ListVariable {
            id: id.clone(),
            length: len,
            slices: Vec::new(),
        };
    }

    let (start, length) = slice_bounds(start_idx, length, len);
    let mut values = Vec::new();
    for idx in start..start.saturating_add(length) {
        let Ok(idx) = usize::try_from(idx) else {
            break;
        };
        let value = match list.read().get(idx) {
            Some(value) => value.clone(),
            None => break,
        };
        values.push(to_str(&value));
    }

    ListVariable {
        id: id.clone(),
        length: list.read().len(),
        slices: vec![ListSlice {
            start_idx: start,
            values,
        }],
    }
}

/// First index and count of a slice request, saturating at the `i64` range.
/// A saturated request lies entirely outside the list and reads nothing.
fn slice_bounds(start_idx: i64, length: i64, len: usize) -> (i64, i64) {
    let len = i64::try_from(len).unwrap_or(i64::MAX);
    let start = if start_idx < 0 {
        start_idx.saturating_add(len)
    } else {
        start_idx
    };
    if length < 0 {
        let count = length.checked_neg().unwrap_or(i64::MAX);
        (start.saturating_add(length).saturating_add(1), count)
    } else {
        (start, length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debugger::value::{ListVar, ScalarVar};

    fn to_str() -> StringGenerator {
        Arc::new(|v: &Value| v.to_string())
    }

    fn numbers(n: usize) -> ListHandle {
        match Value::new_list((0..n).map(|i| Value::Number(i as f64)).collect()) {
            Value::List(list) => list,
            _ => unreachable!(),
        }
    }

    fn slice_of(list: &ListHandle, start: i64, length: i64) -> (i64, Vec<String>) {
        let var = list_slice(&"xs".into(), list, start, length, &to_str());
        let slice = var.slices.into_iter().next().unwrap();
        (slice.start_idx, slice.values)
    }

    #[test]
    fn test_negative_slice_matches_positive() {
        let list = numbers(10);
        let backward = slice_of(&list, -2, -3);
        let forward = slice_of(&list, 6, 3);
        assert_eq!(backward, forward);
        assert_eq!(forward, (6, vec!["6".into(), "7".into(), "8".into()]));
    }

    #[test]
    fn test_negative_length_from_positive_start() {
        let list = numbers(10);
        assert_eq!(slice_of(&list, 4, -2), (3, vec!["3".into(), "4".into()]));
    }

    #[test]
    fn test_zero_length_reports_only_length() {
        let list = numbers(4);
        let var = list_slice(&"xs".into(), &list, 0, 0, &to_str());
        assert_eq!(var.length, 4);
        assert!(var.slices.is_empty());
    }

    #[test]
    fn test_slice_truncates_past_end() {
        let list = numbers(5);
        assert_eq!(slice_of(&list, 3, 10), (3, vec!["3".into(), "4".into()]));
        assert_eq!(slice_of(&list, 9, 2), (9, vec![]));
        assert_eq!(slice_of(&list, 1, -4), (-2, vec![]));
    }

    #[test]
    fn test_extreme_bounds_read_nothing() {
        let list = numbers(10);
        assert_eq!(slice_of(&list, 0, i64::MIN).1, Vec::<String>::new());
        assert_eq!(slice_of(&list, i64::MIN + 5, -100).1, Vec::<String>::new());
        assert_eq!(slice_of(&list, i64::MIN, 3).1, Vec::<String>::new());
        assert_eq!(slice_of(&list, i64::MAX, i64::MAX).1, Vec::<String>::new());
        assert_eq!(
            slice_of(&list, 8, i64::MAX),
            (8, vec!["8".into(), "9".into()])
        );
    }

    #[test]
    fn test_list_values_requires_list() {
        let vars: Vec<Arc<dyn VarAccessor>> = vec![
            ScalarVar::new("n", Value::Number(1.0)),
            ListVar::new("xs", vec![Value::Text("a".into())]),
        ];

        let var = list_values(&vars, &"xs".into(), 0, 1, &to_str()).unwrap();
        assert_eq!(var.slices[0].values, vec!["a".to_string()]);

        assert!(matches!(
            list_values(&vars, &"n".into(), 0, 1, &to_str()),
            Err(Error::NoSuchSymbol(_))
        ));
        assert!(matches!(
            list_values(&vars, &"missing".into(), 0, 1, &to_str()),
            Err(Error::NoSuchSymbol(_))
        ));
    }

    #[test]
    fn test_describe_uses_string_generator() {
        let quoted: StringGenerator = Arc::new(|v: &Value| format!("<{}>", v));
        let vars: Vec<Arc<dyn VarAccessor>> = vec![
            ScalarVar::new("n", Value::Number(2.0)),
            ListVar::new("xs", vec![Value::Null, Value::Null]),
        ];
        let described = describe_all(&vars, &quoted);
        assert_eq!(
            described[0],
            Variable::Scalar(ScalarVariable {
                id: "n".into(),
                value: "<2>".into()
            })
        );
        match &described[1] {
            Variable::List(list) => assert_eq!(list.length, 2),
            other => panic!("Expected list, got {other:?}"),
        }
    }
}
