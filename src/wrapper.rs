//! Single-function wrapping and unwrapping.
//!
//! # Adapter Chain
//!
//! [`wrap_function`] composes three layers around a backend function,
//! innermost first:
//!
//! 1. **Arrays and `out`**: converts every argument to native arrays, calls
//!    the backend, and converts the result back to unified arrays. An `out`
//!    destination is either passed through (backend declares `out`) or
//!    emulated with an explicit in-place update.
//! 2. **Dtype and device**: fills unset `dtype`/`device` parameters from the
//!    first array argument or the configured defaults.
//! 3. **Container dispatch**: redirects to the container type's
//!    `static_<name>` method whenever a container appears among the
//!    arguments.
//!
//! Errors raised by the backend pass through every layer unchanged.
//!
//! # Example
//!
//! ```rust
//! use arraybridge::array::Array;
//! use arraybridge::function::Function;
//! use arraybridge::value::{CallArgs, Value};
//! use arraybridge::wrapper::{unwrap_function, wrap_function};
//!
//! let neg = Function::builder("negative")
//!     .module("arraybridge.functional.backends.numpy")
//!     .params(["x"])
//!     .build(|call| {
//!         let x = call.require(0, "x")?.expect_native()?;
//!         Ok(Value::Native(arraybridge::array::NativeArray::from_vec(
//!             x.to_vec().iter().map(|v| -v).collect(),
//!         )))
//!     })
//!     .unwrap();
//!
//! let wrapped = wrap_function(&neg);
//! let out = wrapped.call(CallArgs::new().with_arg(Array::from_vec(vec![1.0, -2.0]))).unwrap();
//! assert_eq!(out.as_array().unwrap().to_vec(), vec![-1.0, 2.0]);
//! assert!(unwrap_function(&wrapped).ptr_eq(&neg));
//! ```

use crate::array::inplace_update;
use crate::container::Container;
use crate::defaults::{default_device, default_dtype};
use crate::error::{Result, WrapError};
use crate::exclusions;
use crate::function::{AdapterFlags, Body, Function};
use crate::nest::{args_contain_container, args_to_native, first_array, to_native, to_unified};
use crate::value::{CallArgs, Value};
use log::trace;
use std::sync::Arc;

/// Whether `name` follows the private naming convention.
#[must_use]
pub fn is_private(name: &str) -> bool {
    name.starts_with('_')
}

/// Builds the unified adapter for `f`.
///
/// Returns `f` itself when it is private, listed in
/// [`exclusions::NON_WRAPPED_FUNCTIONS`], or already an adapter.
#[must_use]
pub fn wrap_function(f: &Function) -> Function {
    if f
        .name()
        .is_some_and(|name| is_private(name) || exclusions::is_non_wrapped(name))
    {
        return f.clone();
    }
    if f.is_wrapped() {
        return f.clone();
    }

    let flags = AdapterFlags::from_signature(f.signature());
    let arrays_n_out = arrays_n_out_handled(f.clone(), flags);
    let dtype_n_dev = dtype_n_dev_handled(f.name().map(str::to_owned), flags, arrays_n_out);
    let dispatched = containers_handled(f.name().map(str::to_owned), dtype_n_dev);

    trace!("wrapped `{}` ({flags:?})", f.name().unwrap_or("<anonymous>"));
    Function::adapter(f, flags, dispatched)
}

/// Recovers the backend function behind an adapter.
///
/// Functions that are not adapters are returned unchanged.
#[must_use]
pub fn unwrap_function(f: &Function) -> Function {
    match f.inner_fn() {
        Some(inner) => {
            trace!("unwrapped `{}`", f.name().unwrap_or("<anonymous>"));
            inner.clone()
        }
        None => f.clone(),
    }
}

/// Points an `out` handle at the computed native result.
fn write_out(out: &Value, ret: &Value) -> Result<()> {
    let native_ret = to_native(ret, false, false);
    let native_ret = native_ret.expect_native()?;
    match out {
        Value::Array(a) => {
            a.set_data(native_ret.clone());
            Ok(())
        }
        Value::Native(n) => {
            inplace_update(n, native_ret);
            Ok(())
        }
        other => Err(WrapError::TypeMismatch {
            expected: "array for `out`",
            got: other.kind(),
        }),
    }
}

fn arrays_n_out_handled(f: Function, flags: AdapterFlags) -> Body {
    let raw_return = f.name().is_some_and(exclusions::returns_raw);
    Arc::new(move |mut call: CallArgs| {
        let out = call.take_kwarg("out").filter(|v| !v.is_none());
        let mut native = args_to_native(&call, true);

        let ret = match &out {
            Some(out) => {
                let native_out = to_native(out, false, false);
                if flags.handle_out_with_backend {
                    native.kwargs.insert("out".to_owned(), native_out);
                    f.call(native)?
                } else {
                    let ret = f.call(native)?;
                    let dst = native_out.expect_native()?;
                    let src = to_native(&ret, false, false);
                    Value::Native(inplace_update(dst, src.expect_native()?))
                }
            }
            None => f.call(native)?,
        };

        if raw_return {
            return Ok(ret);
        }
        if let Some(out) = out {
            write_out(&out, &ret)?;
            return Ok(out);
        }
        Ok(to_unified(&ret, true, true))
    })
}

fn dtype_n_dev_handled(name: Option<String>, flags: AdapterFlags, next: Body) -> Body {
    let default_dtypes = !name.as_deref().is_some_and(exclusions::skips_dtype);
    let default_devices = !name.as_deref().is_some_and(exclusions::skips_device);
    Arc::new(move |mut call: CallArgs| {
        let dtype = call.take_kwarg("dtype");
        let device = call.take_kwarg("device");
        if flags.handle_dtype || flags.handle_dev {
            let hint = first_array(&call);
            if flags.handle_dtype {
                let dtype = if default_dtypes {
                    default_dtype(dtype.as_ref(), hint.as_ref())
                } else {
                    dtype.unwrap_or_default()
                };
                call.kwargs.insert("dtype".to_owned(), dtype);
            }
            if flags.handle_dev {
                let device = if default_devices {
                    default_device(device.as_ref(), hint.as_ref())
                } else {
                    device.unwrap_or_default()
                };
                call.kwargs.insert("device".to_owned(), device);
            }
        }
        next(call)
    })
}

fn containers_handled(name: Option<String>, next: Body) -> Body {
    Arc::new(move |call: CallArgs| {
        let Some(name) = name.as_deref() else {
            return next(call);
        };
        if !Container::has_method(name) || exclusions::has_container_support(name) {
            return next(call);
        }
        if args_contain_container(&call) {
            let method = Container::static_method(name)
                .ok_or_else(|| WrapError::MissingContainerMethod(name.to_owned()))?;
            trace!("dispatching `{name}` to static_{name}");
            return method(call);
        }
        next(call)
    })
}
