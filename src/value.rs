//! Dynamic argument and return values.
//!
//! Backend functions are registered with a uniform calling convention: a
//! [`CallArgs`] set of positional and keyword [`Value`]s in, one [`Value`]
//! out. Nests (`List`, `Tuple`, `Dict`, [`Container`]) may hold arrays at any
//! depth.

use crate::array::{Array, DType, Device, NativeArray};
use crate::container::Container;
use crate::error::{Result, WrapError};
use std::collections::BTreeMap;

/// A dynamically typed argument or result.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// Absent value.
    #[default]
    None,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Float.
    Float(f64),
    /// String.
    Str(String),
    /// Element type.
    Dtype(DType),
    /// Placement.
    Device(Device),
    /// Unified array.
    Array(Array),
    /// Backend-native array.
    Native(NativeArray),
    /// Nested container of values.
    Container(Container),
    /// Ordered list.
    List(Vec<Value>),
    /// Ordered tuple.
    Tuple(Vec<Value>),
    /// String-keyed mapping.
    Dict(BTreeMap<String, Value>),
}

impl Value {
    /// Whether this is [`Value::None`].
    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Short name of the variant, used in error messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::Dtype(_) => "dtype",
            Self::Device(_) => "device",
            Self::Array(_) => "array",
            Self::Native(_) => "native array",
            Self::Container(_) => "container",
            Self::List(_) => "list",
            Self::Tuple(_) => "tuple",
            Self::Dict(_) => "dict",
        }
    }

    /// The unified array, if this is one.
    #[must_use]
    pub const fn as_array(&self) -> Option<&Array> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    /// The native array, if this is one.
    #[must_use]
    pub const fn as_native(&self) -> Option<&NativeArray> {
        match self {
            Self::Native(n) => Some(n),
            _ => None,
        }
    }

    /// The native storage of either array kind.
    #[must_use]
    pub fn array_data(&self) -> Option<NativeArray> {
        match self {
            Self::Array(a) => Some(a.data()),
            Self::Native(n) => Some(n.clone()),
            _ => None,
        }
    }

    /// Numeric scalar value of `Int`, `Float` or `Bool`.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            #[allow(clippy::cast_precision_loss)]
            Self::Int(i) => Some(*i as f64),
            Self::Float(x) => Some(*x),
            Self::Bool(b) => Some(f64::from(u8::from(*b))),
            _ => None,
        }
    }

    /// Requires a native array.
    ///
    /// # Errors
    /// Returns [`WrapError::TypeMismatch`] for any other variant.
    pub fn expect_native(&self) -> Result<&NativeArray> {
        self.as_native().ok_or(WrapError::TypeMismatch {
            expected: "native array",
            got: self.kind(),
        })
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<i64> for Value {
    fn from(x: i64) -> Self {
        Self::Int(x)
    }
}

impl From<bool> for Value {
    fn from(x: bool) -> Self {
        Self::Bool(x)
    }
}

impl From<&str> for Value {
    fn from(x: &str) -> Self {
        Self::Str(x.to_owned())
    }
}

impl From<DType> for Value {
    fn from(x: DType) -> Self {
        Self::Dtype(x)
    }
}

impl From<Device> for Value {
    fn from(x: Device) -> Self {
        Self::Device(x)
    }
}

impl From<Array> for Value {
    fn from(x: Array) -> Self {
        Self::Array(x)
    }
}

impl From<NativeArray> for Value {
    fn from(x: NativeArray) -> Self {
        Self::Native(x)
    }
}

impl From<Container> for Value {
    fn from(x: Container) -> Self {
        Self::Container(x)
    }
}

impl From<Vec<Value>> for Value {
    fn from(x: Vec<Value>) -> Self {
        Self::List(x)
    }
}

/// Positional and keyword arguments of one call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    /// Positional arguments, in order.
    pub args: Vec<Value>,
    /// Keyword arguments.
    pub kwargs: BTreeMap<String, Value>,
}

impl CallArgs {
    /// An empty argument set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Positional arguments only.
    #[must_use]
    pub fn positional(args: Vec<Value>) -> Self {
        Self {
            args,
            kwargs: BTreeMap::new(),
        }
    }

    /// Appends a positional argument.
    #[must_use]
    pub fn with_arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Sets a keyword argument.
    #[must_use]
    pub fn with_kwarg(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.kwargs.insert(name.to_owned(), value.into());
        self
    }

    /// Positional argument `i`.
    #[must_use]
    pub fn get(&self, i: usize) -> Option<&Value> {
        self.args.get(i)
    }

    /// Keyword argument `name`.
    #[must_use]
    pub fn get_kwarg(&self, name: &str) -> Option<&Value> {
        self.kwargs.get(name)
    }

    /// Removes and returns keyword argument `name`.
    pub fn take_kwarg(&mut self, name: &str) -> Option<Value> {
        self.kwargs.remove(name)
    }

    /// Positional argument `i`, falling back to keyword `name`.
    #[must_use]
    pub fn param(&self, i: usize, name: &str) -> Option<&Value> {
        self.get(i).or_else(|| self.get_kwarg(name))
    }

    /// Like [`CallArgs::param`] but required.
    ///
    /// # Errors
    /// Returns [`WrapError::MissingArgument`] when neither is present.
    pub fn require(&self, i: usize, name: &str) -> Result<&Value> {
        self.param(i, name)
            .ok_or_else(|| WrapError::MissingArgument(name.to_owned()))
    }
}
