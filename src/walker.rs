//! Recursive wrapping and unwrapping of whole module trees.
//!
//! A [`Walker`] is one traversal session. It visits each module and each
//! designated class at most once per top-level walk, rewrites every eligible
//! attribute in place, and tolerates attributes that cannot be read or
//! assigned. The visited set lives in the session, so independent walks on
//! different threads never interfere.
//!
//! # Example
//!
//! ```rust
//! use arraybridge::backend::Backend;
//! use arraybridge::reference::cpu_layer;
//! use arraybridge::walker::{unwrap_all_with, wrap_all_with, WalkOptions};
//!
//! let layer = cpu_layer(Backend::Numpy).unwrap();
//! wrap_all_with(&layer, WalkOptions::for_backend(Backend::Numpy));
//! assert!(layer.function("add").unwrap().is_wrapped());
//! assert!(!layer.function("_helper").unwrap().is_wrapped());
//!
//! unwrap_all_with(&layer, WalkOptions::for_backend(Backend::Numpy));
//! assert!(!layer.function("add").unwrap().is_wrapped());
//! ```

use crate::backend::{get_backend, Backend};
use crate::classify::{invalid_fn, UNIFIED_LAYER_NAME};
use crate::function::Function;
use crate::namespace::{Member, Namespace};
use crate::wrapper::{is_private, unwrap_function, wrap_function};
use log::debug;
use std::collections::HashSet;

/// File-path marker of the backend-selection module, which is never rewritten.
pub const BACKEND_HANDLER_MARKER: &str = "backend_handler";

/// Transformation applied to every eligible function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// [`wrap_function`].
    Wrap,
    /// [`unwrap_function`].
    Unwrap,
}

impl Transform {
    fn apply(self, f: &Function) -> Function {
        match self {
            Self::Wrap => wrap_function(f),
            Self::Unwrap => unwrap_function(f),
        }
    }
}

/// Options of one walk.
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// Backend used for classification and file markers.
    pub backend: Backend,
    /// Classes whose attributes are walked too, by identity.
    pub classes_to_wrap: Vec<Namespace>,
    /// Walk a backend's own namespace instead of the unified layer.
    pub native: bool,
}

impl WalkOptions {
    /// Non-native options for `backend`.
    #[must_use]
    pub const fn for_backend(backend: Backend) -> Self {
        Self {
            backend,
            classes_to_wrap: Vec::new(),
            native: false,
        }
    }
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self::for_backend(get_backend())
    }
}

/// A traversal session.
#[derive(Debug)]
pub struct Walker {
    transform: Transform,
    opts: WalkOptions,
    visited: HashSet<usize>,
}

impl Walker {
    /// A session applying `transform` under `opts`.
    #[must_use]
    pub fn new(transform: Transform, opts: WalkOptions) -> Self {
        Self {
            transform,
            opts,
            visited: HashSet::new(),
        }
    }

    /// Walks `root` and returns its replacement.
    ///
    /// Namespaces are rewritten in place and returned as the same handle.
    pub fn walk(&mut self, root: Member) -> Member {
        self.visit(root, 0)
    }

    /// Number of namespaces recorded as visited; zero between walks.
    #[must_use]
    pub fn visited_len(&self) -> usize {
        self.visited.len()
    }

    fn visit(&mut self, val: Member, depth: usize) -> Member {
        if depth == 0 {
            self.visited.clear();
        }
        let out = match val {
            Member::Namespace(ns) if !ns.is_class() || self.is_designated(&ns) => {
                self.visit_namespace(&ns, depth);
                Member::Namespace(ns)
            }
            Member::Function(f) => Member::Function(self.visit_function(&f)),
            other => other,
        };
        if depth == 0 {
            self.visited.clear();
        }
        out
    }

    fn is_designated(&self, ns: &Namespace) -> bool {
        self.opts.classes_to_wrap.iter().any(|c| c.ptr_eq(ns))
    }

    fn marker(&self) -> &'static str {
        if self.opts.native {
            self.opts.backend.as_str()
        } else {
            UNIFIED_LAYER_NAME
        }
    }

    fn visit_namespace(&mut self, ns: &Namespace, depth: usize) {
        if self.visited.contains(&ns.addr()) {
            return;
        }
        if !ns.is_class() {
            let marker = self.marker();
            let eligible = ns
                .file()
                .is_some_and(|file| file.contains(marker) && !file.contains(BACKEND_HANDLER_MARKER));
            if !eligible {
                debug!("skipping module `{}` (file {:?})", ns.name(), ns.file());
                return;
            }
        }
        self.visited.insert(ns.addr());

        let skip_keys = self.opts.backend.native_keys_to_skip();
        for key in ns.attr_names() {
            if self.opts.native
                && (skip_keys.contains(&key.as_str()) || (!ns.is_class() && is_private(&key)))
            {
                continue;
            }
            let current = if ns.is_class() {
                match ns.get_attr(&key) {
                    Ok(Member::None) => continue,
                    Ok(member) => member,
                    Err(e) => {
                        debug!("`{}.{key}`: {e}", ns.name());
                        continue;
                    }
                }
            } else {
                match ns.raw_attr(&key) {
                    Some(member) => member,
                    None => continue,
                }
            };
            let replaced = if current.is_none() {
                current
            } else {
                self.visit(current, depth + 1)
            };
            if let Err(e) = ns.set_attr(&key, replaced) {
                debug!("`{}.{key}`: {e}", ns.name());
            }
        }
    }

    fn visit_function(&self, f: &Function) -> Function {
        if !self.opts.native {
            let backend = self.opts.backend;
            let inner_invalid = f.inner_fn().is_some_and(|inner| invalid_fn(inner, backend));
            if inner_invalid || invalid_fn(f, backend) {
                debug!("leaving `{}` untouched", f.name().unwrap_or("<anonymous>"));
                return f.clone();
            }
        }
        self.transform.apply(f)
    }
}

/// Applies `transform` to every eligible function reachable from `root`.
pub fn wrap_or_unwrap(transform: Transform, root: Member, opts: WalkOptions) -> Member {
    Walker::new(transform, opts).walk(root)
}

/// Wraps the unified layer for the active backend.
pub fn wrap_all(layer: &Namespace) {
    wrap_all_with(layer, WalkOptions::default());
}

/// Wraps the unified layer with explicit options.
pub fn wrap_all_with(layer: &Namespace, opts: WalkOptions) {
    wrap_or_unwrap(Transform::Wrap, Member::Namespace(layer.clone()), opts);
}

/// Unwraps the unified layer for the active backend.
pub fn unwrap_all(layer: &Namespace) {
    unwrap_all_with(layer, WalkOptions::default());
}

/// Unwraps the unified layer with explicit options.
pub fn unwrap_all_with(layer: &Namespace, opts: WalkOptions) {
    wrap_or_unwrap(Transform::Unwrap, Member::Namespace(layer.clone()), opts);
}

fn native_opts(backend: Backend, classes: &[Namespace]) -> WalkOptions {
    WalkOptions {
        backend,
        classes_to_wrap: classes.to_vec(),
        native: true,
    }
}

/// Wraps a backend's own namespace and the given classes in it.
pub fn wrap_native(module: &Namespace, backend: Backend, classes: &[Namespace]) {
    wrap_or_unwrap(
        Transform::Wrap,
        Member::Namespace(module.clone()),
        native_opts(backend, classes),
    );
}

/// Reverses [`wrap_native`].
pub fn unwrap_native(module: &Namespace, backend: Backend, classes: &[Namespace]) {
    wrap_or_unwrap(
        Transform::Unwrap,
        Member::Namespace(module.clone()),
        native_opts(backend, classes),
    );
}
