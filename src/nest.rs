//! Nested-structure utilities and array conversions.
//!
//! Nests are `List`, `Tuple`, `Dict` and [`Container`](crate::container::Container) values; everything
//! else is a leaf. These helpers are what the adapters use to move whole
//! argument sets between unified and native array representations and to
//! locate arrays or containers inside them.

use crate::array::Array;
use crate::value::{CallArgs, Value};

/// One step of a path into a nest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NestIndex {
    /// Position in a list or tuple.
    Position(usize),
    /// Key in a dict or container.
    Key(String),
}

/// Whether `x` is a unified or native array.
#[must_use]
pub const fn is_array(x: &Value) -> bool {
    matches!(x, Value::Array(_) | Value::Native(_))
}

/// Whether `x` is a unified array.
#[must_use]
pub const fn is_unified_array(x: &Value) -> bool {
    matches!(x, Value::Array(_))
}

/// Whether `x` is a backend-native array.
#[must_use]
pub const fn is_native_array(x: &Value) -> bool {
    matches!(x, Value::Native(_))
}

/// Whether `x` is a container.
#[must_use]
pub const fn is_container(x: &Value) -> bool {
    matches!(x, Value::Container(_))
}

/// Whether any leaf of `nest` satisfies `pred`.
///
/// With `check_nests`, nests themselves are tested as well, after their
/// children.
pub fn nested_any(nest: &Value, pred: &dyn Fn(&Value) -> bool, check_nests: bool) -> bool {
    let children: Box<dyn Iterator<Item = &Value> + '_> = match nest {
        Value::List(xs) | Value::Tuple(xs) => Box::new(xs.iter()),
        Value::Dict(map) => Box::new(map.values()),
        Value::Container(c) => Box::new(c.iter().map(|(_, v)| v)),
        leaf => return pred(leaf),
    };
    for child in children {
        if nested_any(child, pred, check_nests) {
            return true;
        }
    }
    check_nests && pred(nest)
}

/// Paths to every leaf of `nest` satisfying `pred`, in depth-first order.
pub fn nested_indices_where(nest: &Value, pred: &dyn Fn(&Value) -> bool) -> Vec<Vec<NestIndex>> {
    let mut found = Vec::new();
    let mut path = Vec::new();
    collect_indices(nest, pred, &mut path, &mut found);
    found
}

fn collect_indices(
    nest: &Value,
    pred: &dyn Fn(&Value) -> bool,
    path: &mut Vec<NestIndex>,
    found: &mut Vec<Vec<NestIndex>>,
) {
    let children: Vec<(NestIndex, &Value)> = match nest {
        Value::List(xs) | Value::Tuple(xs) => xs
            .iter()
            .enumerate()
            .map(|(i, x)| (NestIndex::Position(i), x))
            .collect(),
        Value::Dict(map) => map.iter().map(|(k, v)| (NestIndex::Key(k.clone()), v)).collect(),
        Value::Container(c) => c.iter().map(|(k, v)| (NestIndex::Key(k.clone()), v)).collect(),
        leaf => {
            if pred(leaf) {
                found.push(path.clone());
            }
            return;
        }
    };
    for (idx, child) in children {
        path.push(idx);
        collect_indices(child, pred, path, found);
        path.pop();
    }
}

/// Follows `index` into `nest`.
#[must_use]
pub fn index_nest<'a>(nest: &'a Value, index: &[NestIndex]) -> Option<&'a Value> {
    index.iter().try_fold(nest, |node, idx| match (node, idx) {
        (Value::List(xs) | Value::Tuple(xs), NestIndex::Position(i)) => xs.get(*i),
        (Value::Dict(map), NestIndex::Key(k)) => map.get(k),
        (Value::Container(c), NestIndex::Key(k)) => c.get(k),
        _ => None,
    })
}

/// The first array among the arguments: positional arguments first,
/// depth-first through their nests, then keyword arguments.
#[must_use]
pub fn first_array(call: &CallArgs) -> Option<Value> {
    call.args
        .iter()
        .chain(call.kwargs.values())
        .find_map(|arg| {
            let idxs = nested_indices_where(arg, &is_array);
            idxs.first().and_then(|idx| index_nest(arg, idx)).cloned()
        })
}

/// Whether any positional or keyword argument contains a container.
#[must_use]
pub fn args_contain_container(call: &CallArgs) -> bool {
    call.args
        .iter()
        .chain(call.kwargs.values())
        .any(|v| nested_any(v, &is_container, true))
}

fn map_nest(x: &Value, nested: bool, include_tuples: bool, leaf: &dyn Fn(&Value) -> Value) -> Value {
    if !nested {
        return leaf(x);
    }
    let recurse = |v: &Value| map_nest(v, nested, include_tuples, leaf);
    match x {
        Value::List(xs) => Value::List(xs.iter().map(recurse).collect()),
        Value::Tuple(xs) if include_tuples => Value::Tuple(xs.iter().map(recurse).collect()),
        Value::Dict(map) => Value::Dict(map.iter().map(|(k, v)| (k.clone(), recurse(v))).collect()),
        Value::Container(c) => Value::Container(c.map_values(recurse)),
        other => leaf(other),
    }
}

/// Converts unified arrays in `x` to their native handles.
///
/// With `nested`, descends into lists, dicts, containers, and (when
/// `include_tuples`) tuples.
#[must_use]
pub fn to_native(x: &Value, nested: bool, include_tuples: bool) -> Value {
    map_nest(x, nested, include_tuples, &|v: &Value| match v {
        Value::Array(a) => Value::Native(a.data()),
        other => other.clone(),
    })
}

/// Converts native arrays in `x` to unified arrays.
///
/// With `nested`, descends into lists, dicts, containers, and (when
/// `include_tuples`) tuples.
#[must_use]
pub fn to_unified(x: &Value, nested: bool, include_tuples: bool) -> Value {
    map_nest(x, nested, include_tuples, &|v: &Value| match v {
        Value::Native(n) => Value::Array(Array::new(n.clone())),
        other => other.clone(),
    })
}

/// Converts a whole argument set to native arrays, descending into nests.
#[must_use]
pub fn args_to_native(call: &CallArgs, include_tuples: bool) -> CallArgs {
    CallArgs {
        args: call.args.iter().map(|v| to_native(v, true, include_tuples)).collect(),
        kwargs: call
            .kwargs
            .iter()
            .map(|(k, v)| (k.clone(), to_native(v, true, include_tuples)))
            .collect(),
    }
}

/// Converts a whole argument set to unified arrays, descending into nests.
#[must_use]
pub fn args_to_unified(call: &CallArgs, include_tuples: bool) -> CallArgs {
    CallArgs {
        args: call.args.iter().map(|v| to_unified(v, true, include_tuples)).collect(),
        kwargs: call
            .kwargs
            .iter()
            .map(|(k, v)| (k.clone(), to_unified(v, true, include_tuples)))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::NativeArray;
    use crate::container::Container;
    use std::collections::BTreeMap;

    fn nest_fixture() -> (Value, NativeArray) {
        let native = NativeArray::scalar(3.0);
        let nest = Value::List(vec![
            Value::Int(1),
            Value::Tuple(vec![Value::Str("x".into()), Value::Native(native.clone())]),
        ]);
        (nest, native)
    }

    #[test]
    fn indices_point_at_matching_leaves() {
        let (nest, native) = nest_fixture();
        let idxs = nested_indices_where(&nest, &is_array);
        assert_eq!(idxs, vec![vec![NestIndex::Position(1), NestIndex::Position(1)]]);
        let found = index_nest(&nest, &idxs[0]).and_then(Value::as_native).unwrap();
        assert!(found.ptr_eq(&native));
    }

    #[test]
    fn index_nest_rejects_mismatched_steps() {
        let (nest, _) = nest_fixture();
        assert!(index_nest(&nest, &[NestIndex::Key("a".into())]).is_none());
        assert!(index_nest(&nest, &[NestIndex::Position(7)]).is_none());
    }

    #[test]
    fn nested_any_checks_nests_only_when_asked() {
        let empty = Value::Container(Container::new());
        assert!(!nested_any(&empty, &is_container, false));
        assert!(nested_any(&empty, &is_container, true));
        let deep = Value::List(vec![Value::List(vec![Value::Container(Container::new())])]);
        assert!(nested_any(&deep, &is_container, true));
    }

    #[test]
    fn first_array_prefers_positional_over_keyword() {
        let kw = Array::scalar(1.0);
        let pos = NativeArray::scalar(2.0);
        let call = CallArgs::new()
            .with_arg(Value::List(vec![Value::Int(0), Value::Native(pos.clone())]))
            .with_kwarg("x", kw.clone());
        let found = first_array(&call).unwrap();
        assert!(found.as_native().unwrap().ptr_eq(&pos));

        let only_kw = CallArgs::new().with_arg(5_i64).with_kwarg("x", kw.clone());
        assert!(first_array(&only_kw).unwrap().as_array().unwrap().ptr_eq(&kw));
        assert!(first_array(&CallArgs::new()).is_none());
    }

    #[test]
    fn tuples_are_converted_only_when_included() {
        let a = Array::scalar(1.0);
        let tup = Value::Tuple(vec![Value::Array(a.clone())]);
        assert!(matches!(&to_native(&tup, true, false), Value::Tuple(xs) if is_unified_array(&xs[0])));
        assert!(matches!(&to_native(&tup, true, true), Value::Tuple(xs) if is_native_array(&xs[0])));
    }

    #[test]
    fn conversion_preserves_native_identity() {
        let a = Array::scalar(4.0);
        let mut kwargs = BTreeMap::new();
        kwargs.insert("k".to_owned(), Value::Array(a.clone()));
        let call = CallArgs { args: vec![Value::Dict(kwargs)], kwargs: BTreeMap::new() };
        let native = args_to_native(&call, true);
        let Value::Dict(map) = &native.args[0] else { panic!("expected dict") };
        assert!(map["k"].as_native().unwrap().ptr_eq(&a.data()));

        let back = to_unified(&map["k"], false, false);
        assert!(back.as_array().unwrap().data().ptr_eq(&a.data()));
    }

    #[test]
    fn unified_conversion_wraps_every_native_leaf() {
        let pos = NativeArray::scalar(1.0);
        let kw = NativeArray::scalar(2.0);
        let call = CallArgs::new()
            .with_arg(Value::List(vec![Value::Native(pos.clone()), Value::Int(3)]))
            .with_kwarg("out", kw.clone());
        let unified = args_to_unified(&call, false);
        let Value::List(items) = &unified.args[0] else { panic!("expected list") };
        assert!(items[0].as_array().unwrap().data().ptr_eq(&pos));
        assert_eq!(items[1], Value::Int(3));
        assert!(unified.kwargs["out"].as_array().unwrap().data().ptr_eq(&kw));
        assert!(!nested_any(&Value::List(unified.args.clone()), &is_native_array, true));
    }
}
