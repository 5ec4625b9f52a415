//! Provenance classification of unwrapped functions.
//!
//! Attribute traversal reaches functions that belong to neither the unified
//! layer nor the active backend (re-exported helpers of third-party
//! libraries, for instance). Those must be left untouched.

use crate::backend::Backend;
use crate::function::Function;

/// Name of the unified layer, as it appears in module paths.
pub const UNIFIED_LAYER_NAME: &str = "arraybridge";

/// Whether `f` is ineligible for wrapping under `backend`.
///
/// Universal elementwise primitives are always eligible. A function without
/// module provenance is never eligible. Otherwise the module path must name
/// the unified layer, the backend, or one of the backend's extra keywords.
#[must_use]
pub fn invalid_fn(f: &Function, backend: Backend) -> bool {
    if f.is_ufunc() {
        return false;
    }
    let Some(module) = f.module().filter(|m| !m.is_empty()) else {
        return true;
    };
    let found = [UNIFIED_LAYER_NAME, backend.as_str()]
        .iter()
        .chain(backend.fn_keywords())
        .any(|kw| module.contains(kw));
    !found
}
