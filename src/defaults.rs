//! Default dtype and device resolution.
//!
//! Adapters for functions that declare `dtype` or `device` fill unset values
//! from, in order: the explicit request, the first array among the
//! arguments, and the process-wide defaults configured here.

use crate::array::{DType, Device};
use crate::value::Value;
use core::sync::atomic::{AtomicU8, Ordering};
use lazy_static::lazy_static;
use parking_lot::RwLock;

/// Marks "no default dtype configured".
const UNSET: u8 = u8::MAX;

static DEFAULT_DTYPE: AtomicU8 = AtomicU8::new(UNSET);

lazy_static! {
    static ref DEFAULT_DEVICE: RwLock<Option<Device>> = RwLock::new(None);
}

/// The float dtype used when nothing else decides.
#[must_use]
pub const fn default_float_dtype() -> DType {
    DType::Float32
}

/// The integer dtype inferred for integer scalars.
#[must_use]
pub const fn default_int_dtype() -> DType {
    DType::Int64
}

/// Overrides the process-wide default dtype.
pub fn set_default_dtype(dtype: DType) {
    let idx = DType::ALL.iter().position(|d| *d == dtype).unwrap_or_default();
    #[allow(clippy::cast_possible_truncation)]
    DEFAULT_DTYPE.store(idx as u8, Ordering::Relaxed);
}

/// Clears the process-wide default dtype.
pub fn unset_default_dtype() {
    DEFAULT_DTYPE.store(UNSET, Ordering::Relaxed);
}

/// The configured default dtype, or [`default_float_dtype`].
#[must_use]
pub fn configured_dtype() -> DType {
    DType::ALL
        .get(usize::from(DEFAULT_DTYPE.load(Ordering::Relaxed)))
        .copied()
        .unwrap_or_else(default_float_dtype)
}

/// Overrides the process-wide default device.
pub fn set_default_device(device: Device) {
    *DEFAULT_DEVICE.write() = Some(device);
}

/// Clears the process-wide default device.
pub fn unset_default_device() {
    *DEFAULT_DEVICE.write() = None;
}

/// The configured default device, or the CPU.
#[must_use]
pub fn configured_device() -> Device {
    DEFAULT_DEVICE.read().unwrap_or_default()
}

/// Resolves the dtype to hand a backend function.
///
/// A present `requested` value wins; dtype names are parsed into
/// [`Value::Dtype`]. Otherwise the dtype is inferred from `item` (an array
/// or a numeric scalar), falling back to [`configured_dtype`].
#[must_use]
pub fn default_dtype(requested: Option<&Value>, item: Option<&Value>) -> Value {
    match requested {
        Some(Value::None) | None => {}
        Some(Value::Str(name)) => {
            return DType::parse(name).map_or_else(|| Value::Str(name.clone()), Value::Dtype);
        }
        Some(other) => return other.clone(),
    }
    let inferred = match item {
        Some(Value::Array(a)) => a.dtype(),
        Some(Value::Native(n)) => n.dtype(),
        Some(Value::Int(_)) => default_int_dtype(),
        Some(Value::Bool(_)) => DType::Bool,
        _ => configured_dtype(),
    };
    Value::Dtype(inferred)
}

/// Resolves the device to hand a backend function.
///
/// Same precedence as [`default_dtype`]: request, then `item`'s device,
/// then [`configured_device`].
#[must_use]
pub fn default_device(requested: Option<&Value>, item: Option<&Value>) -> Value {
    match requested {
        Some(Value::None) | None => {}
        Some(Value::Str(name)) => {
            return Device::parse(name).map_or_else(|| Value::Str(name.clone()), Value::Device);
        }
        Some(other) => return other.clone(),
    }
    let inferred = match item {
        Some(Value::Array(a)) => a.device(),
        Some(Value::Native(n)) => n.device(),
        _ => configured_device(),
    };
    Value::Device(inferred)
}
