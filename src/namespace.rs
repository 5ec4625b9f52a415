//! Modules and classes as explicit attribute tables.
//!
//! A [`Namespace`] is either a module (with optional file provenance) or a
//! class. Its attributes are ordered slots holding [`Member`]s; callers look
//! functions up through the table at call time, so replacing a slot's
//! function with its adapter changes what every later lookup sees.
//!
//! Slots can be read-only, and class attributes can be computed properties
//! whose getter may fail. Both surface as errors from [`Namespace::set_attr`]
//! and [`Namespace::get_attr`].

use crate::error::{Result, WrapError};
use crate::function::Function;
use crate::value::{CallArgs, Value};
use core::fmt;
use parking_lot::RwLock;
use std::sync::Arc;

/// Getter of a computed attribute.
pub type Getter = Arc<dyn Fn() -> Result<Member> + Send + Sync>;

/// Whether a namespace is a module or a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceKind {
    /// A module, optionally backed by a source file.
    Module,
    /// A class.
    Class,
}

/// A value stored in a namespace attribute.
#[derive(Clone)]
pub enum Member {
    /// Attribute explicitly set to nothing.
    None,
    /// Plain data.
    Value(Value),
    /// A callable.
    Function(Function),
    /// A nested module or class.
    Namespace(Namespace),
    /// A computed attribute.
    Property(Getter),
}

impl Member {
    /// Whether this is [`Member::None`].
    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// The function, if this is one.
    #[must_use]
    pub const fn as_function(&self) -> Option<&Function> {
        match self {
            Self::Function(f) => Some(f),
            _ => None,
        }
    }

    /// The namespace, if this is one.
    #[must_use]
    pub const fn as_namespace(&self) -> Option<&Namespace> {
        match self {
            Self::Namespace(ns) => Some(ns),
            _ => None,
        }
    }
}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Function(func) => func.fmt(f),
            Self::Namespace(ns) => ns.fmt(f),
            Self::Property(_) => f.write_str("Property(..)"),
        }
    }
}

impl From<Function> for Member {
    fn from(f: Function) -> Self {
        Self::Function(f)
    }
}

impl From<Namespace> for Member {
    fn from(ns: Namespace) -> Self {
        Self::Namespace(ns)
    }
}

impl From<Value> for Member {
    fn from(v: Value) -> Self {
        Self::Value(v)
    }
}

struct Slot {
    name: String,
    member: Member,
    read_only: bool,
}

struct Inner {
    name: String,
    kind: NamespaceKind,
    file: Option<String>,
    slots: RwLock<Vec<Slot>>,
}

/// A shared handle to a module or class.
///
/// Clones are the same namespace; attribute graphs may contain cycles.
#[derive(Clone)]
pub struct Namespace(Arc<Inner>);

impl Namespace {
    fn make(name: &str, kind: NamespaceKind, file: Option<&str>) -> Self {
        Self(Arc::new(Inner {
            name: name.to_owned(),
            kind,
            file: file.map(str::to_owned),
            slots: RwLock::new(Vec::new()),
        }))
    }

    /// A module, with the source file it was loaded from if any.
    #[must_use]
    pub fn module(name: &str, file: Option<&str>) -> Self {
        Self::make(name, NamespaceKind::Module, file)
    }

    /// A class.
    #[must_use]
    pub fn class(name: &str) -> Self {
        Self::make(name, NamespaceKind::Class, None)
    }

    /// The namespace's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Module or class.
    #[must_use]
    pub fn kind(&self) -> NamespaceKind {
        self.0.kind
    }

    /// Whether this is a class.
    #[must_use]
    pub fn is_class(&self) -> bool {
        self.0.kind == NamespaceKind::Class
    }

    /// Source file provenance of a module.
    #[must_use]
    pub fn file(&self) -> Option<&str> {
        self.0.file.as_deref()
    }

    /// Builder-style attribute definition.
    #[must_use]
    pub fn with(self, name: &str, member: impl Into<Member>) -> Self {
        self.define(name, member);
        self
    }

    /// Defines or replaces an attribute, clearing any read-only mark.
    pub fn define(&self, name: &str, member: impl Into<Member>) {
        self.insert_slot(name, member.into(), false);
    }

    /// Defines an attribute that rejects later assignment.
    pub fn define_read_only(&self, name: &str, member: impl Into<Member>) {
        self.insert_slot(name, member.into(), true);
    }

    fn insert_slot(&self, name: &str, member: Member, read_only: bool) {
        let mut slots = self.0.slots.write();
        match slots.iter_mut().find(|s| s.name == name) {
            Some(slot) => {
                slot.member = member;
                slot.read_only = read_only;
            }
            None => slots.push(Slot {
                name: name.to_owned(),
                member,
                read_only,
            }),
        }
    }

    /// Attribute names: definition order for modules, sorted for classes.
    #[must_use]
    pub fn attr_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.0.slots.read().iter().map(|s| s.name.clone()).collect();
        if self.is_class() {
            names.sort();
        }
        names
    }

    /// The stored member without evaluating properties.
    #[must_use]
    pub fn raw_attr(&self, name: &str) -> Option<Member> {
        self.0
            .slots
            .read()
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.member.clone())
    }

    /// Reads an attribute, evaluating properties.
    ///
    /// # Errors
    /// [`WrapError::NoSuchAttribute`] if it does not exist, or
    /// [`WrapError::AttributeProbe`] if a property getter fails.
    pub fn get_attr(&self, name: &str) -> Result<Member> {
        match self.raw_attr(name) {
            Some(Member::Property(getter)) => getter().map_err(|e| WrapError::AttributeProbe {
                name: name.to_owned(),
                message: e.to_string(),
            }),
            Some(member) => Ok(member),
            None => Err(WrapError::NoSuchAttribute(name.to_owned())),
        }
    }

    /// Assigns an attribute.
    ///
    /// # Errors
    /// [`WrapError::ReadOnlyAttribute`] for read-only slots and properties.
    pub fn set_attr(&self, name: &str, member: Member) -> Result<()> {
        let mut slots = self.0.slots.write();
        match slots.iter_mut().find(|s| s.name == name) {
            Some(slot) if slot.read_only || matches!(slot.member, Member::Property(_)) => {
                Err(WrapError::ReadOnlyAttribute(name.to_owned()))
            }
            Some(slot) => {
                slot.member = member;
                Ok(())
            }
            None => {
                slots.push(Slot {
                    name: name.to_owned(),
                    member,
                    read_only: false,
                });
                Ok(())
            }
        }
    }

    /// The function stored under `name`.
    #[must_use]
    pub fn function(&self, name: &str) -> Option<Function> {
        self.raw_attr(name).and_then(|m| m.as_function().cloned())
    }

    /// Looks `name` up and calls it.
    ///
    /// # Errors
    /// [`WrapError::NoSuchAttribute`] if `name` is not a function, or
    /// whatever the function returns.
    pub fn call(&self, name: &str, args: CallArgs) -> Result<Value> {
        self.function(name)
            .ok_or_else(|| WrapError::NoSuchAttribute(name.to_owned()))?
            .call(args)
    }

    /// Whether both handles are the same namespace.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Identity key of the namespace.
    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Namespace")
            .field("name", &self.0.name)
            .field("kind", &self.0.kind)
            .field("file", &self.0.file)
            .field("attrs", &self.0.slots.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn properties_and_read_only_slots_reject_assignment() {
        let ns = Namespace::class("Cls");
        ns.define_read_only("frozen", Value::Int(1));
        ns.define("prop", Member::Property(Arc::new(|| Ok(Member::Value(Value::Int(2))))));
        assert_eq!(
            ns.set_attr("frozen", Member::None).unwrap_err(),
            WrapError::ReadOnlyAttribute("frozen".into())
        );
        assert!(ns.set_attr("prop", Member::None).is_err());
        assert!(ns.set_attr("fresh", Member::None).is_ok());
        assert!(matches!(ns.get_attr("prop"), Ok(Member::Value(Value::Int(2)))));
    }

    #[test]
    fn failing_getters_surface_as_probe_errors() {
        let ns = Namespace::class("Cls")
            .with("boom", Member::Property(Arc::new(|| Err(WrapError::backend("getter", "raised")))));
        assert!(matches!(ns.get_attr("boom"), Err(WrapError::AttributeProbe { .. })));
        assert!(matches!(ns.get_attr("missing"), Err(WrapError::NoSuchAttribute(_))));
    }

    #[test]
    fn classes_list_attributes_sorted_modules_in_order() {
        let m = Namespace::module("m", None).with("b", Value::None).with("a", Value::None);
        assert_eq!(m.attr_names(), vec!["b", "a"]);
        let c = Namespace::class("C").with("b", Value::None).with("a", Value::None);
        assert_eq!(c.attr_names(), vec!["a", "b"]);
    }
}
