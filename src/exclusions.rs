//! Static exclusion lists consulted while wrapping.

use lazy_static::lazy_static;
use std::collections::HashSet;

/// Utilities of the unified layer itself; never wrapped.
pub const NON_WRAPPED_FUNCTIONS: &[&str] = &[
    "copy_nest",
    "current_backend",
    "current_backend_str",
    "set_backend",
    "get_backend",
    "unset_backend",
    "get_referrers_recursive",
    "set_debug_mode",
    "set_breakpoint_debug_mode",
    "set_exception_debug_mode",
    "unset_debug_mode",
    "debug_mode",
    "nested_map",
    "to_unified",
    "args_to_unified",
    "to_native",
    "args_to_native",
    "default",
    "exists",
    "set_min_base",
    "get_min_base",
    "set_min_denominator",
    "get_min_denominator",
    "split_func_call_across_gpus",
    "cache_fn",
    "split_func_call",
    "compile",
    "compile_graph",
    "dev",
    "as_unified_dev",
    "as_native_dev",
    "memory_on_dev",
    "gpu_is_available",
    "num_gpus",
    "tpu_is_available",
    "dtype",
    "as_unified_dtype",
    "cprint",
    "to_unified_module",
    "tree_flatten",
    "tree_unflatten",
    "start_compiling",
    "stop_compiling",
    "get_compiled",
    "index_nest",
    "set_nest_at_index",
    "map_nest_at_index",
    "multi_index_nest",
    "set_nest_at_indices",
    "map_nest_at_indices",
    "nested_indices_where",
    "map",
    "set_default_device",
    "unset_default_device",
    "closest_valid_dtype",
    "default_dtype",
    "default_device",
    "as_native_dtype",
    "is_unified_array",
    "is_container",
    "inplace_update",
    "inplace_increment",
    "inplace_decrement",
    "prune_nest_at_index",
    "prune_nest_at_indices",
    "is_array",
    "is_native_array",
    "nested_any",
    "fn_array_spec",
    "insert_into_nest_at_index",
    "insert_into_nest_at_indices",
    "vec_sig_fig",
    "native_array",
];

/// Functions that handle containers themselves; never redirected.
pub const FUNCTIONS_W_CONT_SUPPORT: &[&str] = &[
    "multi_head_attention",
    "execute_with_gradients",
    "adam_step",
    "optimizer_update",
    "gradient_descent_update",
    "lars_update",
    "adam_update",
    "lamb_update",
    "stable_divide",
    "stable_pow",
];

/// Functions returning scalars, lists or booleans; results pass through raw.
pub const ARRAYLESS_RET_FUNCTIONS: &[&str] = &[
    "to_numpy",
    "to_list",
    "to_scalar",
    "is_native_array",
    "is_unified_array",
    "is_variable",
];

/// Functions returning nests of arrays; results pass through raw.
pub const NESTED_ARRAY_RET_FUNCTIONS: &[&str] = &["unstack", "split"];

/// Functions whose `dtype` is forwarded without defaulting.
pub const NON_DTYPE_WRAPPED_FUNCTIONS: &[&str] = &["arange", "asarray", "array", "full", "prod", "sum"];

/// Functions whose `device` is forwarded without defaulting.
pub const NON_DEV_WRAPPED_FUNCTIONS: &[&str] = &[];

lazy_static! {
    static ref NON_WRAPPED: HashSet<&'static str> = NON_WRAPPED_FUNCTIONS.iter().copied().collect();
    static ref CONT_SUPPORT: HashSet<&'static str> = FUNCTIONS_W_CONT_SUPPORT.iter().copied().collect();
    static ref RAW_RETURN: HashSet<&'static str> = ARRAYLESS_RET_FUNCTIONS
        .iter()
        .chain(NESTED_ARRAY_RET_FUNCTIONS)
        .copied()
        .collect();
}

/// Whether `name` is never wrapped.
#[must_use]
pub fn is_non_wrapped(name: &str) -> bool {
    NON_WRAPPED.contains(name)
}

/// Whether `name` has built-in container support.
#[must_use]
pub fn has_container_support(name: &str) -> bool {
    CONT_SUPPORT.contains(name)
}

/// Whether results of `name` bypass array normalization.
#[must_use]
pub fn returns_raw(name: &str) -> bool {
    RAW_RETURN.contains(name)
}

/// Whether `dtype` defaulting is skipped for `name`.
#[must_use]
pub fn skips_dtype(name: &str) -> bool {
    NON_DTYPE_WRAPPED_FUNCTIONS.contains(&name)
}

/// Whether `device` defaulting is skipped for `name`.
#[must_use]
pub fn skips_device(name: &str) -> bool {
    NON_DEV_WRAPPED_FUNCTIONS.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_return_covers_both_lists() {
        assert!(returns_raw("to_list"));
        assert!(returns_raw("unstack"));
        assert!(!returns_raw("add"));
    }

    #[test]
    fn lists_do_not_overlap_wrapping_rules() {
        assert!(is_non_wrapped("inplace_update"));
        assert!(!is_non_wrapped("add"));
        assert!(has_container_support("stable_divide"));
        assert!(skips_dtype("sum") && !skips_dtype("zeros"));
        assert!(!skips_device("zeros"));
    }
}
