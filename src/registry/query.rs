//! Type compatibility predicates
//!
//! All predicates walk the parent chain of the first type; interface maps
//! are searched recursively only when the target is a mappable interface.

use super::meta::MetaClass;
use super::Registry;
use crate::core::{Type, TypeFlags};
use std::sync::Arc;

/// Core walk shared by `check`, `derives` and `maps`.
///
/// Returns `class_checks` when `base` is found on the parent chain, and
/// true when any interface mapped along the chain is (or derives) `base`.
pub(crate) fn is_a(
    derived: &Arc<MetaClass>,
    base: &Arc<MetaClass>,
    class_checks: bool,
    iface_checks: bool,
) -> bool {
    let iface_checks = iface_checks
        && base.flags().contains(TypeFlags::INTERFACED)
        && !base.flags().contains(TypeFlags::UNMAPPABLE);

    let mut current = Some(derived);
    while let Some(meta) = current {
        if Arc::ptr_eq(meta, base) {
            return class_checks;
        }
        if iface_checks
            && meta
                .interfaces()
                .iter()
                .any(|entry| is_a(&entry.meta, base, true, true))
        {
            return true;
        }
        current = meta.parent();
    }
    false
}

pub(crate) fn check(ty: &Arc<MetaClass>, other: &Arc<MetaClass>) -> bool {
    is_a(ty, other, true, true)
}

pub(crate) fn derives(derived: &Arc<MetaClass>, base: &Arc<MetaClass>) -> bool {
    !Arc::ptr_eq(derived, base) && is_a(derived, base, true, false)
}

pub(crate) fn maps(concrete: &Arc<MetaClass>, iface: &Arc<MetaClass>) -> bool {
    is_a(concrete, iface, false, true)
}

pub(crate) fn implements(ty: &Arc<MetaClass>, super_type: &Arc<MetaClass>) -> bool {
    Arc::ptr_eq(ty, super_type) || derives(ty, super_type) || maps(ty, super_type)
}

/// First base of `other` (root first) that `ty` implements, searching
/// `other`'s interface maps along the way.
pub(crate) fn common(ty: &Arc<MetaClass>, other: &Arc<MetaClass>) -> Option<Arc<MetaClass>> {
    let interfaced = other.flags().contains(TypeFlags::INTERFACED);

    for other_base in other.levels() {
        if implements(ty, other_base) {
            if interfaced && other_base.flags().contains(TypeFlags::UNMAPPABLE) {
                return None;
            }
            return Some(other_base.clone());
        } else if !other_base.flags().contains(TypeFlags::UNMAPPABLE) {
            for entry in other_base.interfaces() {
                if let Some(found) = common(ty, &entry.meta) {
                    return Some(found);
                }
            }
        }
    }
    None
}

pub(crate) fn depends(dependent: &Arc<MetaClass>, dependency: &Arc<MetaClass>) -> bool {
    if !dependent.flags().contains(TypeFlags::DEPENDENT) {
        return false;
    }
    dependent.levels().rev().any(|ancestor| {
        ancestor
            .dependencies()
            .iter()
            .any(|dep| Arc::ptr_eq(dep, dependency) || depends(dep, dependency))
    })
}

/// Whether `ty` satisfies everything `dependent` requires of its users.
///
/// A type without dependencies is satisfied only by `check`. Otherwise
/// `ty` must check against a classed `dependent` and satisfy every
/// dependency declared anywhere on `dependent`'s ancestry.
pub(crate) fn conforms(ty: &Arc<MetaClass>, dependent: &Arc<MetaClass>) -> bool {
    if !dependent.flags().contains(TypeFlags::DEPENDENT) {
        return check(ty, dependent);
    }
    if dependent.flags().contains(TypeFlags::CLASSED) && !check(ty, dependent) {
        return false;
    }
    dependent.levels().rev().all(|ancestor| {
        ancestor
            .dependencies()
            .iter()
            .all(|dep| check(ty, dep) || conforms(ty, dep))
    })
}

impl Registry {
    /// Whether `ty` names a currently registered type
    pub fn verify(&self, ty: Type) -> bool {
        self.lookup(ty).is_some()
    }

    /// `ty` is `other`, derives from it, or implements it as an interface.
    /// Two invalid handles check true.
    pub fn check(&self, ty: Type, other: Type) -> bool {
        match (self.lookup(ty), self.lookup(other)) {
            (Some(a), Some(b)) => check(&a, &b),
            _ => !ty.is_valid() && !other.is_valid(),
        }
    }

    /// Strict derivation; a type never derives from itself
    pub fn derives(&self, derived: Type, base: Type) -> bool {
        match (self.lookup(derived), self.lookup(base)) {
            (Some(a), Some(b)) => derives(&a, &b),
            _ => false,
        }
    }

    /// `concrete` maps `iface` somewhere on its ancestry
    pub fn maps(&self, concrete: Type, iface: Type) -> bool {
        match (self.lookup(concrete), self.lookup(iface)) {
            (Some(a), Some(b)) => maps(&a, &b),
            _ => false,
        }
    }

    pub fn implements(&self, ty: Type, super_type: Type) -> bool {
        if ty == super_type {
            return true;
        }
        match (self.lookup(ty), self.lookup(super_type)) {
            (Some(a), Some(b)) => implements(&a, &b),
            _ => false,
        }
    }

    /// Shared base of two types, or `Type::INVALID` if there is none or the
    /// combination would be ambiguous
    pub fn common(&self, ty: Type, other: Type) -> Type {
        match (self.lookup(ty), self.lookup(other)) {
            (Some(a), Some(b)) => common(&a, &b).map_or(Type::INVALID, |m| m.ty()),
            _ => Type::INVALID,
        }
    }

    /// `dependent` lists `dependency` directly or transitively
    pub fn depends(&self, dependent: Type, dependency: Type) -> bool {
        match (self.lookup(dependent), self.lookup(dependency)) {
            (Some(a), Some(b)) => depends(&a, &b),
            _ => false,
        }
    }

    pub fn conforms(&self, ty: Type, dependent: Type) -> bool {
        match (self.lookup(ty), self.lookup(dependent)) {
            (Some(a), Some(b)) => conforms(&a, &b),
            _ => !ty.is_valid() && !dependent.is_valid(),
        }
    }
}
