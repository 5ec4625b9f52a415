//! Reference CPU backend.
//!
//! Provides a small unified layer and a native backend namespace whose
//! functions compute on the CPU. Elementwise kernels and reductions run in
//! parallel through [`rayon`](https://docs.rs/rayon).
//!
//! ## Layer functions
//!
//! - `add`: elementwise sum, writes `out` itself
//! - `multiply`: elementwise product
//! - `full`, `zeros`: constructors taking `dtype` and `device`
//! - `sum`: total reduction
//! - `unstack`, `split`: return lists of arrays along the first axis
//! - `to_list`, `to_scalar`: return plain values
//! - `_helper`: private identity, never wrapped
//!
//! Bodies take native arrays, or the plain scalars and shapes their
//! parameters name. Size-one operands broadcast.

use crate::array::{inplace_update, DType, Device, NativeArray};
use crate::backend::Backend;
use crate::container::Container;
use crate::defaults::{default_float_dtype, default_int_dtype};
use crate::error::{Result, WrapError};
use crate::function::{ArraySpec, Function, Reduce};
use crate::namespace::Namespace;
use crate::value::{CallArgs, Value};
use rayon::prelude::*;

/// Module path of the layer's backend functions for `backend`.
#[must_use]
pub fn layer_module_path(backend: Backend) -> String {
    format!("arraybridge.functional.backends.{backend}")
}

fn operand(v: &Value) -> Result<NativeArray> {
    match v {
        Value::Native(n) => Ok(n.clone()),
        Value::Array(a) => Ok(a.data()),
        other => other.as_f64().map(NativeArray::scalar).ok_or(WrapError::TypeMismatch {
            expected: "array or number",
            got: other.kind(),
        }),
    }
}

fn shape_arg(v: &Value) -> Result<Vec<usize>> {
    let dim = |v: &Value| match v {
        Value::Int(n) => usize::try_from(*n)
            .map_err(|_| WrapError::InvalidArgument(format!("negative dimension {n}"))),
        other => Err(WrapError::TypeMismatch {
            expected: "int",
            got: other.kind(),
        }),
    };
    match v {
        Value::Int(_) => Ok(vec![dim(v)?]),
        Value::List(items) | Value::Tuple(items) => items.iter().map(dim).collect(),
        other => Err(WrapError::TypeMismatch {
            expected: "shape",
            got: other.kind(),
        }),
    }
}

fn dtype_arg(v: Option<&Value>) -> Result<Option<DType>> {
    match v {
        None | Some(Value::None) => Ok(None),
        Some(Value::Dtype(d)) => Ok(Some(*d)),
        Some(Value::Str(s)) => DType::parse(s)
            .map(Some)
            .ok_or_else(|| WrapError::InvalidArgument(format!("unknown dtype `{s}`"))),
        Some(other) => Err(WrapError::TypeMismatch {
            expected: "dtype",
            got: other.kind(),
        }),
    }
}

fn device_arg(v: Option<&Value>) -> Result<Device> {
    match v {
        None | Some(Value::None) => Ok(Device::Cpu),
        Some(Value::Device(d)) => Ok(*d),
        Some(Value::Str(s)) => {
            Device::parse(s).ok_or_else(|| WrapError::InvalidArgument(format!("unknown device `{s}`")))
        }
        Some(other) => Err(WrapError::TypeMismatch {
            expected: "device",
            got: other.kind(),
        }),
    }
}

fn axis_zero(call: &CallArgs, i: usize) -> Result<()> {
    match call.param(i, "axis") {
        None | Some(Value::None | Value::Int(0)) => Ok(()),
        Some(other) => Err(WrapError::InvalidArgument(format!(
            "only axis 0 is supported, got {other:?}"
        ))),
    }
}

fn promote(a: DType, b: DType) -> DType {
    if b.is_float() && !a.is_float() { b } else { a }
}

/// Applies `op` elementwise, broadcasting size-one operands.
fn zip_with(a: &NativeArray, b: &NativeArray, op: fn(f64, f64) -> f64) -> Result<NativeArray> {
    let (x, y) = (a.to_vec(), b.to_vec());
    let dtype = promote(a.dtype(), b.dtype());
    let (shape, data): (Vec<usize>, Vec<f64>) = if a.shape() == b.shape() {
        (a.shape(), x.par_iter().zip(y.par_iter()).map(|(&p, &q)| op(p, q)).collect())
    } else if y.len() == 1 {
        (a.shape(), x.par_iter().map(|&p| op(p, y[0])).collect())
    } else if x.len() == 1 {
        (b.shape(), y.par_iter().map(|&q| op(x[0], q)).collect())
    } else {
        return Err(WrapError::ShapeMismatch(a.shape(), b.shape()));
    };
    let data = data.into_par_iter().map(|v| dtype.cast(v)).collect();
    Ok(NativeArray::from_parts(shape, data, dtype, a.device()))
}

fn binary(call: &CallArgs, op: fn(f64, f64) -> f64) -> Result<NativeArray> {
    let x1 = operand(call.require(0, "x1")?)?;
    let x2 = operand(call.require(1, "x2")?)?;
    zip_with(&x1, &x2, op)
}

fn add(call: CallArgs) -> Result<Value> {
    let ret = binary(&call, |a, b| a + b)?;
    match call.param(2, "out") {
        Some(Value::Native(out)) => Ok(Value::Native(inplace_update(out, &ret))),
        _ => Ok(Value::Native(ret)),
    }
}

fn multiply(call: CallArgs) -> Result<Value> {
    binary(&call, |a, b| a * b).map(Value::Native)
}

/// Number of elements of `shape`.
fn element_count(shape: &[usize]) -> Result<usize> {
    shape
        .iter()
        .try_fold(1usize, |n, &dim| n.checked_mul(dim))
        .ok_or_else(|| WrapError::InvalidArgument(format!("shape {shape:?} is too large")))
}

fn full(call: CallArgs) -> Result<Value> {
    let shape = shape_arg(call.require(0, "shape")?)?;
    let fill = call.require(1, "fill_value")?;
    let value = fill.as_f64().ok_or(WrapError::TypeMismatch {
        expected: "number",
        got: fill.kind(),
    })?;
    let dtype = match dtype_arg(call.param(2, "dtype"))? {
        Some(d) => d,
        None => match fill {
            Value::Bool(_) => DType::Bool,
            Value::Int(_) => default_int_dtype(),
            _ => default_float_dtype(),
        },
    };
    let device = device_arg(call.param(3, "device"))?;
    let n = element_count(&shape)?;
    NativeArray::new(shape, vec![value; n], dtype, device).map(Value::Native)
}

fn zeros(call: CallArgs) -> Result<Value> {
    let shape = shape_arg(call.require(0, "shape")?)?;
    let dtype = dtype_arg(call.param(1, "dtype"))?.unwrap_or_else(default_float_dtype);
    let device = device_arg(call.param(2, "device"))?;
    let n = element_count(&shape)?;
    NativeArray::new(shape, vec![0.0; n], dtype, device).map(Value::Native)
}

fn sum(call: CallArgs) -> Result<Value> {
    let x = operand(call.require(0, "x")?)?;
    let dtype = dtype_arg(call.param(1, "dtype"))?.unwrap_or_else(|| x.dtype());
    let total: f64 = x.with_data(|d| d.par_iter().sum());
    NativeArray::new(Vec::new(), vec![total], dtype, x.device()).map(Value::Native)
}

/// Slices along the first axis into `parts` equal pieces.
fn chunks(x: &NativeArray, parts: usize, keep_axis: bool) -> Result<Value> {
    let shape = x.shape();
    let Some((&rows, rest)) = shape.split_first() else {
        return Err(WrapError::InvalidArgument("cannot slice a 0-d array".into()));
    };
    if parts == 0 || rows % parts != 0 {
        return Err(WrapError::InvalidArgument(format!(
            "{rows} rows cannot be split into {parts} equal parts"
        )));
    }
    let step = rows / parts * rest.iter().product::<usize>();
    let mut piece_shape = Vec::with_capacity(shape.len());
    if keep_axis {
        piece_shape.push(rows / parts);
    }
    piece_shape.extend_from_slice(rest);
    let (dtype, device) = (x.dtype(), x.device());
    let pieces = x.with_data(|d| {
        (0..parts)
            .map(|i| {
                let piece = d[i * step..(i + 1) * step].to_vec();
                Value::Native(NativeArray::from_parts(piece_shape.clone(), piece, dtype, device))
            })
            .collect()
    });
    Ok(Value::List(pieces))
}

fn unstack(call: CallArgs) -> Result<Value> {
    let x = operand(call.require(0, "x")?)?;
    axis_zero(&call, 1)?;
    let rows = x.shape().first().copied().unwrap_or_default();
    if rows == 0 {
        return Ok(Value::List(Vec::new()));
    }
    chunks(&x, rows, false)
}

fn split(call: CallArgs) -> Result<Value> {
    let x = operand(call.require(0, "x")?)?;
    axis_zero(&call, 2)?;
    let rows = x.shape().first().copied().unwrap_or_default();
    let parts = match call.param(1, "num_or_size_splits") {
        None | Some(Value::None) => rows,
        Some(Value::Int(n)) => usize::try_from(*n)
            .map_err(|_| WrapError::InvalidArgument(format!("cannot split into {n} parts")))?,
        Some(other) => {
            return Err(WrapError::TypeMismatch {
                expected: "int",
                got: other.kind(),
            });
        }
    };
    chunks(&x, parts, true)
}

#[allow(clippy::cast_possible_truncation)]
fn element(x: f64, dtype: DType) -> Value {
    match dtype {
        DType::Bool => Value::Bool(x != 0.0),
        DType::Int32 | DType::Int64 => Value::Int(x as i64),
        DType::Float16 | DType::Float32 | DType::Float64 => Value::Float(x),
    }
}

fn nest_values(shape: &[usize], data: &[f64], dtype: DType) -> Value {
    match shape.split_first() {
        None => data.first().map_or(Value::None, |&x| element(x, dtype)),
        Some((&n, rest)) => {
            let step = rest.iter().product::<usize>();
            Value::List(
                (0..n)
                    .map(|i| nest_values(rest, &data[i * step..(i + 1) * step], dtype))
                    .collect(),
            )
        }
    }
}

fn to_list(call: CallArgs) -> Result<Value> {
    let x = operand(call.require(0, "x")?)?;
    let (shape, dtype) = (x.shape(), x.dtype());
    Ok(x.with_data(|d| nest_values(&shape, d, dtype)))
}

fn to_scalar(call: CallArgs) -> Result<Value> {
    let x = operand(call.require(0, "x")?)?;
    if x.len() != 1 {
        return Err(WrapError::InvalidArgument(format!(
            "only size-1 arrays convert to scalars, got shape {:?}",
            x.shape()
        )));
    }
    let dtype = x.dtype();
    Ok(x.with_data(|d| element(d[0], dtype)))
}

fn helper(call: CallArgs) -> Result<Value> {
    call.require(0, "x").cloned()
}

/// Builds the unified layer namespace for `backend`.
///
/// The root module carries the layer's functions plus a `backend_handler`
/// submodule; none of them are wrapped yet.
///
/// # Errors
/// Propagates descriptor validation failures.
pub fn cpu_layer(backend: Backend) -> Result<Namespace> {
    let module = layer_module_path(backend);
    let def = |name: &str, params: &[&str]| Function::builder(name).module(&module).params(params.iter().copied());
    let binary_spec = || ArraySpec {
        array_params: vec!["x1".into(), "x2".into()],
    };

    let handler_module = format!("arraybridge.backend_handler.{backend}");
    let handler = Namespace::module("backend_handler", Some("arraybridge/src/backend_handler.rs")).with(
        "active_backend",
        Function::builder("active_backend")
            .module(&handler_module)
            .build(move |_| Ok(Value::Str(backend.as_str().to_owned())))?,
    );

    Ok(Namespace::module("arraybridge", Some("arraybridge/src/lib.rs"))
        .with("add", def("add", &["x1", "x2", "out"]).array_spec(binary_spec()).build(add)?)
        .with("multiply", def("multiply", &["x1", "x2"]).array_spec(binary_spec()).build(multiply)?)
        .with("full", def("full", &["shape", "fill_value", "dtype", "device"]).build(full)?)
        .with("zeros", def("zeros", &["shape", "dtype", "device"]).build(zeros)?)
        .with("sum", def("sum", &["x", "dtype"]).reduce(Reduce::Sum).build(sum)?)
        .with("unstack", def("unstack", &["x", "axis"]).build(unstack)?)
        .with("split", def("split", &["x", "num_or_size_splits", "axis"]).build(split)?)
        .with("to_list", def("to_list", &["x"]).build(to_list)?)
        .with("to_scalar", def("to_scalar", &["x"]).build(to_scalar)?)
        .with("_helper", def("_helper", &["x"]).build(helper)?)
        .with("backend_handler", handler))
}

/// Builds a backend's own namespace, as loaded from `vendor/<backend>/`.
///
/// # Errors
/// Propagates descriptor validation failures.
pub fn native_module(backend: Backend) -> Result<Namespace> {
    let module = backend.as_str();
    let def = |name: &str, params: &[&str]| Function::builder(name).module(module).params(params.iter().copied());
    let file = format!("vendor/{backend}/lib.rs");
    Ok(Namespace::module(module, Some(&file))
        .with("add", def("add", &["x1", "x2", "out"]).ufunc().build(add)?)
        .with("multiply", def("multiply", &["x1", "x2"]).ufunc().build(multiply)?)
        .with("sum", def("sum", &["x", "dtype"]).reduce(Reduce::Sum).build(sum)?)
        .with("_internal", def("_internal", &["x"]).build(helper)?))
}

/// The `numpy` namespace.
///
/// # Errors
/// Propagates descriptor validation failures.
pub fn numpy_module() -> Result<Namespace> {
    native_module(Backend::Numpy)
}

/// Registers leafwise container equivalents of the layer's binary functions.
///
/// Each dispatch method looks the function up in `layer` at call time, so
/// it reaches the adapter once the layer is wrapped.
///
/// # Errors
/// Propagates descriptor validation failures.
pub fn register_container_methods(layer: &Namespace) -> Result<()> {
    for name in ["add", "multiply"] {
        let layer = layer.clone();
        let per_leaf = Function::anonymous().build(move |call| layer.call(name, call))?;
        Container::register_method(name, Container::leafwise(per_leaf));
    }
    Ok(())
}
