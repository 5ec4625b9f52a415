//! The nested container type and its static dispatch table.
//!
//! A [`Container`] is a string-keyed tree whose leaves are usually arrays.
//! For every unified function it supports, the container type exposes a
//! `static_<name>` dispatch method; adapters redirect to that method whenever
//! a container shows up among the arguments.
//!
//! Methods are registered at runtime, mirroring how a backend registers its
//! functions:
//!
//! ```rust
//! use arraybridge::container::Container;
//! use arraybridge::value::{CallArgs, Value};
//! use std::sync::Arc;
//!
//! Container::register_method("doc_example_len", Arc::new(|_args: CallArgs| Ok(Value::Int(0))));
//! assert!(Container::has_method("doc_example_len"));
//! assert!(Container::static_method("doc_example_len").is_some());
//! ```

use crate::error::{Result, WrapError};
use crate::function::Function;
use crate::value::{CallArgs, Value};
use lazy_static::lazy_static;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// A container's static dispatch method.
pub type StaticMethod = Arc<dyn Fn(CallArgs) -> Result<Value> + Send + Sync>;

lazy_static! {
    /// Registered `static_<name>` methods, keyed by their full name.
    static ref STATIC_METHODS: RwLock<HashMap<String, StaticMethod>> = RwLock::new(HashMap::new());
}

fn static_key(name: &str) -> String {
    format!("static_{name}")
}

/// A string-keyed nest of values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Container {
    entries: BTreeMap<String, Value>,
}

impl Container {
    /// An empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts or replaces an entry.
    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.entries.insert(key.to_owned(), value.into());
    }

    /// Entry `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    /// Number of top-level entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the container has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rebuilds the container by mapping every top-level entry.
    #[must_use]
    pub fn map_values(&self, mut f: impl FnMut(&Value) -> Value) -> Self {
        Self {
            entries: self.entries.iter().map(|(k, v)| (k.clone(), f(v))).collect(),
        }
    }

    /// Registers the container equivalent of unified function `name`,
    /// making `static_<name>` available for dispatch.
    pub fn register_method(name: &str, method: StaticMethod) {
        STATIC_METHODS.write().insert(static_key(name), method);
    }

    /// Removes the container equivalent of `name`.
    pub fn unregister_method(name: &str) {
        STATIC_METHODS.write().remove(&static_key(name));
    }

    /// Whether the container type defines an equivalent of `name`.
    #[must_use]
    pub fn has_method(name: &str) -> bool {
        STATIC_METHODS.read().contains_key(&static_key(name))
    }

    /// The `static_<name>` dispatch method.
    #[must_use]
    pub fn static_method(name: &str) -> Option<StaticMethod> {
        STATIC_METHODS.read().get(&static_key(name)).cloned()
    }

    /// A static method that calls `f` once per key of the container
    /// arguments.
    ///
    /// Every top-level container argument is replaced by its entry under the
    /// current key; other arguments are passed to each call unchanged. The
    /// results are collected into a container with the keys of the first
    /// container argument.
    #[must_use]
    pub fn leafwise(f: Function) -> StaticMethod {
        Arc::new(move |call: CallArgs| {
            let keys: Vec<String> = call
                .args
                .iter()
                .chain(call.kwargs.values())
                .find_map(|v| match v {
                    Value::Container(c) => Some(c.entries.keys().cloned().collect()),
                    _ => None,
                })
                .ok_or_else(|| WrapError::InvalidArgument("no container argument".into()))?;

            let mut out = Self::new();
            for key in keys {
                let pick = |v: &Value| -> Result<Value> {
                    match v {
                        Value::Container(c) => c.get(&key).cloned().ok_or_else(|| {
                            WrapError::InvalidArgument(format!("container is missing key `{key}`"))
                        }),
                        other => Ok(other.clone()),
                    }
                };
                let args = call.args.iter().map(pick).collect::<Result<Vec<_>>>()?;
                let kwargs = call
                    .kwargs
                    .iter()
                    .map(|(k, v)| -> Result<(String, Value)> { Ok((k.clone(), pick(v)?)) })
                    .collect::<Result<BTreeMap<_, _>>>()?;
                let ret = f.call(CallArgs { args, kwargs })?;
                out.entries.insert(key, ret);
            }
            Ok(Value::Container(out))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_methods_are_no_longer_dispatched() {
        Container::register_method("scratch_fill", Arc::new(|_: CallArgs| Ok(Value::Int(1))));
        assert!(Container::has_method("scratch_fill"));
        assert!(Container::static_method("scratch_fill").is_some());

        Container::unregister_method("scratch_fill");
        assert!(!Container::has_method("scratch_fill"));
        assert!(Container::static_method("scratch_fill").is_none());
    }

    #[test]
    fn leafwise_methods_report_missing_keys() {
        let per_leaf = Function::anonymous()
            .build(|call: CallArgs| Ok(call.require(0, "x")?.clone()))
            .unwrap();
        let method = Container::leafwise(per_leaf);
        let a = Container::new().with("w", 1.0).with("b", 2.0);
        let b = Container::new().with("w", 3.0);
        let err = method(CallArgs::new().with_arg(a).with_arg(b)).unwrap_err();
        assert!(matches!(err, WrapError::InvalidArgument(_)));
    }
}
