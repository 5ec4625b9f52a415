//! # `arraybridge`
//!
//! Backend-agnostic function wrapping for a unified array layer.
//!
//! Backends register plain functions that operate on their native arrays.
//! This crate turns each of them into an adapter that accepts unified arrays,
//! converts arguments, fills in default `dtype` and `device` values, handles
//! `out` destinations and redirects container arguments to the container
//! type. Whole module trees are rewritten in one pass, and every adapter can
//! be reverted to the function it wraps.
//!
//! ## Modules
//!
//! - [`wrapper`]: build and revert single adapters
//! - [`walker`]: rewrite whole module and class trees
//! - [`classify`]: decide which functions belong to the active backend
//! - [`nest`]: convert nested arguments between native and unified arrays
//! - [`reference`]: a CPU backend to wrap
//!
//! ## Example
//!
//! ```rust
//! use arraybridge::array::Array;
//! use arraybridge::backend::Backend;
//! use arraybridge::reference::cpu_layer;
//! use arraybridge::value::CallArgs;
//! use arraybridge::walker::{wrap_all_with, WalkOptions};
//!
//! let layer = cpu_layer(Backend::Numpy).unwrap();
//! wrap_all_with(&layer, WalkOptions::for_backend(Backend::Numpy));
//!
//! let args = CallArgs::new()
//!     .with_arg(Array::from_vec(vec![2.0]))
//!     .with_arg(Array::from_vec(vec![3.0]));
//! let sum = layer.call("add", args).unwrap();
//! assert_eq!(sum.as_array().unwrap().to_vec(), vec![5.0]);
//! ```

#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::cast_precision_loss,
    clippy::must_use_candidate
)]
#![deny(unsafe_code)]
#![forbid(unused_must_use)]
#![warn(missing_docs)]

pub mod array;
pub mod backend;
pub mod classify;
pub mod container;
pub mod defaults;
pub mod error;
pub mod exclusions;
pub mod function;
pub mod namespace;
pub mod nest;
pub mod reference;
pub mod value;
pub mod walker;
pub mod wrapper;

pub use array::{Array, DType, Device, NativeArray};
pub use backend::{get_backend, set_backend, Backend};
pub use container::Container;
pub use error::{Result, WrapError};
pub use function::Function;
pub use namespace::{Member, Namespace};
pub use value::{CallArgs, Value};
pub use walker::{unwrap_all, wrap_all, Walker};
pub use wrapper::{unwrap_function, wrap_function};
