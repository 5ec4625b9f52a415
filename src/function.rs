//! Function handles and their registered descriptors.
//!
//! Backends register every function up front with a [`Signature`] listing
//! its declared parameters, its module provenance and optional metadata.
//! Adapters built by [`crate::wrapper::wrap_function`] are functions too:
//! they carry the wrapped marker, the original as `inner_fn`, and the
//! [`AdapterFlags`] discovered from the signature at wrap time.
//!
//! # Example
//!
//! ```rust
//! use arraybridge::function::Function;
//! use arraybridge::value::Value;
//!
//! let abs = Function::builder("abs")
//!     .module("numpy.core.umath")
//!     .params(["x", "out"])
//!     .build(|_call| Ok(Value::None))
//!     .unwrap();
//! assert!(abs.signature().has("out"));
//! assert!(!abs.is_wrapped());
//! ```

use crate::error::{Result, WrapError};
use crate::value::{CallArgs, Value};
use briny::prelude::*;
use core::fmt;
use std::sync::Arc;

/// The body of a callable: positional and keyword values in, one value out.
pub type Body = Arc<dyn Fn(CallArgs) -> Result<Value> + Send + Sync>;

/// Declared parameter names of a function.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
    params: Vec<String>,
}

impl Signature {
    /// A signature with the given parameters.
    pub fn new<S: Into<String>>(params: impl IntoIterator<Item = S>) -> Self {
        Self {
            params: params.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether `name` is a declared parameter.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.params.iter().any(|p| p == name)
    }

    /// Declared parameters, in order.
    #[must_use]
    pub fn params(&self) -> &[String] {
        &self.params
    }
}

/// Which parameters of a function hold arrays, and their expected dtypes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArraySpec {
    /// Names of array-valued parameters.
    pub array_params: Vec<String>,
}

/// Reduction a function performs, for callers that combine partial results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduce {
    /// Partial results are summed.
    Sum,
    /// Partial results are multiplied.
    Prod,
    /// The maximum partial result is kept.
    Max,
    /// The minimum partial result is kept.
    Min,
}

/// Per-adapter metadata discovered from the inner function's signature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdapterFlags {
    /// The backend writes `out` itself.
    pub handle_out_with_backend: bool,
    /// `dtype` is declared and gets defaulted.
    pub handle_dtype: bool,
    /// `device` is declared and gets defaulted.
    pub handle_dev: bool,
}

impl AdapterFlags {
    /// Reads the flags off a signature.
    #[must_use]
    pub fn from_signature(sig: &Signature) -> Self {
        Self {
            handle_out_with_backend: sig.has("out"),
            handle_dtype: sig.has("dtype"),
            handle_dev: sig.has("device"),
        }
    }
}

enum Kind {
    Native,
    Wrapped { inner_fn: Function, flags: AdapterFlags },
}

struct Descriptor {
    name: Option<String>,
    module: Option<String>,
    signature: Signature,
    ufunc: bool,
    array_spec: Option<ArraySpec>,
    reduce: Option<Reduce>,
}

impl Validate for Descriptor {
    fn validate(&self) -> core::result::Result<(), ValidationError> {
        if let Some(name) = &self.name {
            if name.is_empty() || name.chars().any(char::is_whitespace) {
                return Err(ValidationError);
            }
        }
        let params = self.signature.params();
        for (i, p) in params.iter().enumerate() {
            if p.is_empty() || params[..i].contains(p) {
                return Err(ValidationError);
            }
        }
        Ok(())
    }
}

struct Inner {
    desc: Descriptor,
    kind: Kind,
    body: Body,
}

/// A shared handle to a backend function or an adapter.
///
/// Clones are the same function; [`Function::ptr_eq`] tests identity.
#[derive(Clone)]
pub struct Function(Arc<Inner>);

impl Function {
    /// Starts describing a named function.
    #[must_use]
    pub fn builder(name: &str) -> FunctionBuilder {
        FunctionBuilder {
            name: Some(name.to_owned()),
            ..FunctionBuilder::default()
        }
    }

    /// Starts describing a function without a name.
    #[must_use]
    pub fn anonymous() -> FunctionBuilder {
        FunctionBuilder::default()
    }

    /// Builds an adapter around `inner_fn`.
    pub(crate) fn adapter(inner_fn: &Self, flags: AdapterFlags, body: Body) -> Self {
        let desc = &inner_fn.0.desc;
        Self(Arc::new(Inner {
            desc: Descriptor {
                name: desc.name.clone(),
                module: Some(module_path!().to_owned()),
                signature: desc.signature.clone(),
                ufunc: false,
                array_spec: desc.array_spec.clone(),
                reduce: desc.reduce,
            },
            kind: Kind::Wrapped {
                inner_fn: inner_fn.clone(),
                flags,
            },
            body,
        }))
    }

    /// Calls the function.
    ///
    /// # Errors
    /// Propagates whatever the body returns.
    pub fn call(&self, args: CallArgs) -> Result<Value> {
        (self.0.body)(args)
    }

    /// The function's name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.0.desc.name.as_deref()
    }

    /// Module path the function was defined in.
    #[must_use]
    pub fn module(&self) -> Option<&str> {
        self.0.desc.module.as_deref()
    }

    /// Declared parameters.
    #[must_use]
    pub fn signature(&self) -> &Signature {
        &self.0.desc.signature
    }

    /// Whether this is a universal elementwise primitive.
    #[must_use]
    pub fn is_ufunc(&self) -> bool {
        self.0.desc.ufunc
    }

    /// Array-specification metadata.
    #[must_use]
    pub fn array_spec(&self) -> Option<&ArraySpec> {
        self.0.desc.array_spec.as_ref()
    }

    /// Reduction metadata.
    #[must_use]
    pub fn reduce(&self) -> Option<Reduce> {
        self.0.desc.reduce
    }

    /// Whether this is an adapter.
    #[must_use]
    pub fn is_wrapped(&self) -> bool {
        matches!(self.0.kind, Kind::Wrapped { .. })
    }

    /// The function an adapter wraps.
    #[must_use]
    pub fn inner_fn(&self) -> Option<&Self> {
        match &self.0.kind {
            Kind::Wrapped { inner_fn, .. } => Some(inner_fn),
            Kind::Native => None,
        }
    }

    /// The flags an adapter was built with.
    #[must_use]
    pub fn adapter_flags(&self) -> Option<AdapterFlags> {
        match &self.0.kind {
            Kind::Wrapped { flags, .. } => Some(*flags),
            Kind::Native => None,
        }
    }

    /// Whether both handles are the same function.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name())
            .field("module", &self.module())
            .field("wrapped", &self.is_wrapped())
            .finish_non_exhaustive()
    }
}

/// Describes a backend function before registering it.
#[derive(Debug, Default)]
pub struct FunctionBuilder {
    name: Option<String>,
    module: Option<String>,
    params: Vec<String>,
    ufunc: bool,
    array_spec: Option<ArraySpec>,
    reduce: Option<Reduce>,
}

impl FunctionBuilder {
    /// Module path the function is defined in.
    #[must_use]
    pub fn module(mut self, module: &str) -> Self {
        self.module = Some(module.to_owned());
        self
    }

    /// Declared parameters, in order.
    #[must_use]
    pub fn params<S: Into<String>>(mut self, params: impl IntoIterator<Item = S>) -> Self {
        self.params.extend(params.into_iter().map(Into::into));
        self
    }

    /// Marks a universal elementwise primitive.
    #[must_use]
    pub const fn ufunc(mut self) -> Self {
        self.ufunc = true;
        self
    }

    /// Attaches array-specification metadata.
    #[must_use]
    pub fn array_spec(mut self, spec: ArraySpec) -> Self {
        self.array_spec = Some(spec);
        self
    }

    /// Attaches reduction metadata.
    #[must_use]
    pub const fn reduce(mut self, reduce: Reduce) -> Self {
        self.reduce = Some(reduce);
        self
    }

    /// Validates the descriptor and registers `body` as the function.
    ///
    /// # Errors
    /// Returns [`WrapError::InvalidDescriptor`] for an empty or whitespace
    /// name, or empty or duplicate parameter names.
    pub fn build(
        self,
        body: impl Fn(CallArgs) -> Result<Value> + Send + Sync + 'static,
    ) -> Result<Function> {
        let desc = Descriptor {
            name: self.name,
            module: self.module,
            signature: Signature::new(self.params),
            ufunc: self.ufunc,
            array_spec: self.array_spec,
            reduce: self.reduce,
        };
        let desc = TrustedData::new(desc)
            .map_err(|_| WrapError::InvalidDescriptor)?
            .into_inner();
        Ok(Function(Arc::new(Inner {
            desc,
            kind: Kind::Native,
            body: Arc::new(body),
        })))
    }
}
