//! Unified and backend-native array handles.
//!
//! # Representation
//!
//! - [`NativeArray`] is a shared handle onto one backend storage buffer.
//!   Cloning the handle aliases the storage; [`inplace_update`] writes through
//!   every alias.
//! - [`Array`] is the unified array. It owns a replaceable reference to a
//!   native handle, so an `out` destination can be pointed at a freshly
//!   computed result while keeping its own identity.
//!
//! Element values are kept as `f64` in row-major order regardless of
//! [`DType`]; the dtype is a label the backends honour when creating arrays.
//!
//! ## Example
//!
//! ```rust
//! use arraybridge::array::{Array, NativeArray};
//! let native = NativeArray::from_vec(vec![1.0, 2.0, 3.0]);
//! let unified = Array::new(native.clone());
//! assert!(unified.data().ptr_eq(&native));
//! assert_eq!(unified.to_vec(), vec![1.0, 2.0, 3.0]);
//! ```

use crate::backend::Backend;
use crate::error::{Result, WrapError};
use core::fmt;
use parking_lot::RwLock;
use std::sync::Arc;

/// Element type labels understood by every backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DType {
    /// Boolean.
    Bool,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 16-bit float.
    Float16,
    /// 32-bit float (default).
    #[default]
    Float32,
    /// 64-bit float.
    Float64,
}

impl DType {
    /// Every dtype.
    pub const ALL: [Self; 6] = [
        Self::Bool,
        Self::Int32,
        Self::Int64,
        Self::Float16,
        Self::Float32,
        Self::Float64,
    ];

    /// Backend-neutral name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Float16 => "float16",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        }
    }

    /// Whether this is a floating point dtype.
    #[must_use]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::Float16 | Self::Float32 | Self::Float64)
    }

    /// The spelling a backend uses for this dtype.
    #[must_use]
    pub fn native_name(self, backend: Backend) -> String {
        match backend {
            Backend::Torch => format!("torch.{}", self.as_str()),
            Backend::TensorFlow => format!("tf.{}", self.as_str()),
            Backend::Jax => format!("jnp.{}", self.as_str()),
            Backend::Numpy | Backend::MxNet => self.as_str().to_owned(),
        }
    }

    /// Parses either the neutral name or any backend spelling.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let bare = name.rsplit('.').next().unwrap_or(name);
        Self::ALL.into_iter().find(|d| d.as_str() == bare)
    }

    /// Casts a value into this dtype's value domain.
    #[must_use]
    pub fn cast(self, x: f64) -> f64 {
        match self {
            Self::Bool => f64::from(u8::from(x != 0.0)),
            Self::Int32 | Self::Int64 => x.trunc(),
            Self::Float16 | Self::Float32 | Self::Float64 => x,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Placement of an array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Device {
    /// Host memory (default).
    #[default]
    Cpu,
    /// Accelerator with the given ordinal.
    Gpu(u32),
}

impl Device {
    /// Parses `cpu`, `gpu:N`, `cuda:N` or `/GPU:N`.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let lower = name.trim_start_matches('/').to_ascii_lowercase();
        if lower == "cpu" || lower == "cpu:0" {
            return Some(Self::Cpu);
        }
        let (kind, idx) = lower.split_once(':')?;
        match kind {
            "gpu" | "cuda" => idx.parse().ok().map(Self::Gpu),
            _ => None,
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => f.write_str("cpu"),
            Self::Gpu(i) => write!(f, "gpu:{i}"),
        }
    }
}

/// Backend storage behind a [`NativeArray`].
#[derive(Debug, Clone, PartialEq)]
struct Buffer {
    shape: Vec<usize>,
    data: Vec<f64>,
    dtype: DType,
    device: Device,
}

/// A backend-native array handle.
///
/// Clones share storage; equality compares contents.
#[derive(Clone)]
pub struct NativeArray {
    buf: Arc<RwLock<Buffer>>,
}

impl NativeArray {
    /// Creates a native array.
    ///
    /// # Errors
    /// Returns [`WrapError::InvalidArgument`] if the shape product does not
    /// match the number of elements.
    pub fn new(shape: Vec<usize>, data: Vec<f64>, dtype: DType, device: Device) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(WrapError::InvalidArgument(format!(
                "shape {shape:?} is incompatible with {} data elements",
                data.len()
            )));
        }
        let data = data.into_iter().map(|x| dtype.cast(x)).collect();
        Ok(Self {
            buf: Arc::new(RwLock::new(Buffer {
                shape,
                data,
                dtype,
                device,
            })),
        })
    }

    /// A one-dimensional `float32` array on the CPU.
    #[must_use]
    pub fn from_vec(data: Vec<f64>) -> Self {
        let shape = vec![data.len()];
        Self::from_parts(shape, data, DType::Float32, Device::Cpu)
    }

    /// A zero-dimensional `float32` array on the CPU.
    #[must_use]
    pub fn scalar(x: f64) -> Self {
        Self::from_parts(Vec::new(), vec![x], DType::Float32, Device::Cpu)
    }

    /// Builds an array whose shape is already known to match `data`.
    pub(crate) fn from_parts(shape: Vec<usize>, data: Vec<f64>, dtype: DType, device: Device) -> Self {
        debug_assert_eq!(shape.iter().product::<usize>(), data.len());
        Self {
            buf: Arc::new(RwLock::new(Buffer {
                shape,
                data,
                dtype,
                device,
            })),
        }
    }

    /// Dimensions of the array.
    #[must_use]
    pub fn shape(&self) -> Vec<usize> {
        self.buf.read().shape.clone()
    }

    /// Copy of the element values.
    #[must_use]
    pub fn to_vec(&self) -> Vec<f64> {
        self.buf.read().data.clone()
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.read().data.len()
    }

    /// Whether the array holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element type label.
    #[must_use]
    pub fn dtype(&self) -> DType {
        self.buf.read().dtype
    }

    /// Placement.
    #[must_use]
    pub fn device(&self) -> Device {
        self.buf.read().device
    }

    /// Runs `f` over the element data without copying it.
    pub fn with_data<R>(&self, f: impl FnOnce(&[f64]) -> R) -> R {
        f(&self.buf.read().data)
    }

    /// Whether both handles alias the same storage.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.buf, &other.buf)
    }
}

impl PartialEq for NativeArray {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || *self.buf.read() == *other.buf.read()
    }
}

impl fmt::Debug for NativeArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let buf = self.buf.read();
        f.debug_struct("NativeArray")
            .field("shape", &buf.shape)
            .field("data", &buf.data)
            .field("dtype", &buf.dtype)
            .field("device", &buf.device)
            .finish()
    }
}

/// Writes `src`'s values into `dst`'s storage in place.
///
/// Every handle aliasing `dst` observes the new contents. Returns `dst`.
pub fn inplace_update(dst: &NativeArray, src: &NativeArray) -> NativeArray {
    if !dst.ptr_eq(src) {
        let values = src.buf.read().clone();
        *dst.buf.write() = values;
    }
    dst.clone()
}

/// The unified array type.
///
/// Clones share identity: pointing one clone at new native storage through
/// [`Array::set_data`] is visible from all of them.
#[derive(Clone)]
pub struct Array {
    native: Arc<RwLock<NativeArray>>,
}

impl Array {
    /// Wraps a native handle.
    #[must_use]
    pub fn new(native: NativeArray) -> Self {
        Self {
            native: Arc::new(RwLock::new(native)),
        }
    }

    /// A one-dimensional `float32` array on the CPU.
    #[must_use]
    pub fn from_vec(data: Vec<f64>) -> Self {
        Self::new(NativeArray::from_vec(data))
    }

    /// A zero-dimensional `float32` array on the CPU.
    #[must_use]
    pub fn scalar(x: f64) -> Self {
        Self::new(NativeArray::scalar(x))
    }

    /// The underlying native handle.
    #[must_use]
    pub fn data(&self) -> NativeArray {
        self.native.read().clone()
    }

    /// Points this array at different native storage.
    pub fn set_data(&self, native: NativeArray) {
        *self.native.write() = native;
    }

    /// Dimensions of the array.
    #[must_use]
    pub fn shape(&self) -> Vec<usize> {
        self.data().shape()
    }

    /// Copy of the element values.
    #[must_use]
    pub fn to_vec(&self) -> Vec<f64> {
        self.data().to_vec()
    }

    /// Element type label.
    #[must_use]
    pub fn dtype(&self) -> DType {
        self.data().dtype()
    }

    /// Placement.
    #[must_use]
    pub fn device(&self) -> Device {
        self.data().device()
    }

    /// Whether both handles are the same unified array.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.native, &other.native)
    }
}

impl PartialEq for Array {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.data() == other.data()
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Array").field(&self.data()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inplace_update_is_visible_through_aliases() {
        let dst = NativeArray::from_vec(vec![0.0, 0.0]);
        let alias = dst.clone();
        let src = NativeArray::from_vec(vec![4.0, 5.0]);
        let ret = inplace_update(&dst, &src);
        assert!(ret.ptr_eq(&dst));
        assert_eq!(alias.to_vec(), vec![4.0, 5.0]);
        assert!(!alias.ptr_eq(&src));
    }

    #[test]
    fn inplace_update_onto_itself_does_not_deadlock() {
        let a = NativeArray::scalar(1.0);
        let ret = inplace_update(&a, &a.clone());
        assert_eq!(ret.to_vec(), vec![1.0]);
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let err = NativeArray::new(vec![2, 2], vec![1.0; 3], DType::Float32, Device::Cpu);
        assert!(matches!(err, Err(WrapError::InvalidArgument(_))));
    }

    #[test]
    fn integer_dtypes_truncate() {
        let a = NativeArray::new(vec![2], vec![1.7, -2.5], DType::Int64, Device::Cpu).unwrap();
        assert_eq!(a.to_vec(), vec![1.0, -2.0]);
    }

    #[test]
    fn dtype_and_device_parse_backend_spellings() {
        assert_eq!(DType::parse("torch.float64"), Some(DType::Float64));
        assert_eq!(DType::parse("int32"), Some(DType::Int32));
        assert_eq!(DType::Float16.native_name(Backend::TensorFlow), "tf.float16");
        assert_eq!(Device::parse("cuda:1"), Some(Device::Gpu(1)));
        assert_eq!(Device::parse("/GPU:0"), Some(Device::Gpu(0)));
        assert_eq!(Device::parse("cpu"), Some(Device::Cpu));
        assert_eq!(Device::parse("tpu"), None);
    }

    #[test]
    fn set_data_keeps_identity() {
        let a = Array::scalar(1.0);
        let b = a.clone();
        a.set_data(NativeArray::scalar(2.0));
        assert!(a.ptr_eq(&b));
        assert_eq!(b.to_vec(), vec![2.0]);
    }
}
