//! Backend selection module.
//!
//! This module defines the array backends the unified layer can sit on top of
//! and provides functions to set and get the current backend.
//!
//! # Supported Backends
//!
//! - `Numpy`: CPU array library (default).
//! - `Jax`: Automatic-differentiation framework.
//! - `TensorFlow`: Automatic-differentiation framework.
//! - `Torch`: Deep-learning framework.
//! - `MxNet`: Legacy tensor library.
//!
//! The backend is stored globally using an `AtomicU8`, enabling fast
//! switching between backends at runtime. Each backend also carries two static
//! tables used while wrapping: extra module keywords that identify its internal
//! submodules, and native attribute names that must never be touched.

use core::convert::TryFrom;
use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};

/// Enumeration of supported array backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Backend {
    /// CPU array library (default).
    #[default]
    Numpy = 0,
    /// `jax` automatic-differentiation framework.
    Jax = 1,
    /// `tensorflow` automatic-differentiation framework.
    TensorFlow = 2,
    /// `torch` deep-learning framework.
    Torch = 3,
    /// `mxnet` legacy tensor library.
    MxNet = 4,
}

impl TryFrom<u8> for Backend {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Numpy),
            1 => Ok(Self::Jax),
            2 => Ok(Self::TensorFlow),
            3 => Ok(Self::Torch),
            4 => Ok(Self::MxNet),
            _ => Err(()),
        }
    }
}

/// Native `torch` attributes that corrupt the framework when replaced.
const TORCH_KEYS_TO_SKIP: &[&str] = &[
    "classes",
    "torch",
    "is_grad_enabled",
    "get_default_dtype",
    "numel",
    "clone",
    "cpu",
    "set_",
    "type",
    "requires_grad_",
];

impl Backend {
    /// Every backend, in discriminant order.
    pub const ALL: [Self; 5] = [
        Self::Numpy,
        Self::Jax,
        Self::TensorFlow,
        Self::Torch,
        Self::MxNet,
    ];

    /// The identifier string of this backend.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Numpy => "numpy",
            Self::Jax => "jax",
            Self::TensorFlow => "tensorflow",
            Self::Torch => "torch",
            Self::MxNet => "mxnet",
        }
    }

    /// Parses a backend identifier string.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.as_str() == name)
    }

    /// Additional module keywords recognizing this backend's internal submodules.
    #[must_use]
    pub const fn fn_keywords(self) -> &'static [&'static str] {
        match self {
            Self::MxNet => &["ndarray"],
            Self::Numpy | Self::Jax | Self::TensorFlow | Self::Torch => &[],
        }
    }

    /// Native attribute names that are never touched in native-mode walks.
    #[must_use]
    pub const fn native_keys_to_skip(self) -> &'static [&'static str] {
        match self {
            Self::Torch => TORCH_KEYS_TO_SKIP,
            Self::Numpy | Self::Jax | Self::TensorFlow | Self::MxNet => &[],
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discriminant of the active [`Backend`]. Always read and written with `Ordering::Relaxed`.
static GLOBAL_DEFAULT_BACKEND: AtomicU8 = AtomicU8::new(Backend::Numpy as u8);

/// Sets the active backend.
///
/// # Example
/// ```
/// use arraybridge::backend::{set_backend, get_backend, Backend};
/// set_backend(Backend::Torch);
/// assert_eq!(get_backend(), Backend::Torch);
/// ```
pub fn set_backend(b: Backend) {
    GLOBAL_DEFAULT_BACKEND.store(b as u8, Ordering::Relaxed);
}

/// Restores the default backend.
pub fn unset_backend() {
    set_backend(Backend::default());
}

/// Returns the currently active backend.
///
/// If the stored value is invalid, defaults to `Backend::Numpy`.
///
/// # Example
/// ```
/// use arraybridge::backend::get_backend;
/// let backend = get_backend();
/// ```
pub fn get_backend() -> Backend {
    Backend::try_from(GLOBAL_DEFAULT_BACKEND.load(Ordering::Relaxed)).unwrap_or_default()
}

/// Returns the identifier string of the active backend.
pub fn current_backend_str() -> &'static str {
    get_backend().as_str()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_from_name() {
        for b in Backend::ALL {
            assert_eq!(Backend::from_name(b.as_str()), Some(b));
        }
        assert_eq!(Backend::from_name("caffe"), None);
    }

    #[test]
    fn only_torch_and_mxnet_carry_tables() {
        assert!(Backend::Torch.native_keys_to_skip().contains(&"clone"));
        assert!(Backend::Numpy.native_keys_to_skip().is_empty());
        assert_eq!(Backend::MxNet.fn_keywords(), &["ndarray"]);
        assert!(Backend::Jax.fn_keywords().is_empty());
    }

    #[test]
    fn invalid_discriminant_is_rejected() {
        assert!(Backend::try_from(9).is_err());
        assert_eq!(Backend::try_from(3), Ok(Backend::Torch));
    }
}
