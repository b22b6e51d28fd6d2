use super::Class;
use crate::core::{Type, TypeFlags};
use crate::errors::{MetaError, MetaResult};
use crate::logging::log_cast_failed;
use crate::registry::{MetaClass, Registry};
use std::sync::Arc;

impl Registry {
    /// Whether `class` is `ty`, derives from it, or implements it
    pub fn class_check(&self, class: &Class, ty: Type) -> bool {
        self.check(class.type_of(), ty)
    }

    /// Cast `class` to `ty`, failing with `TypeMismatch`
    pub fn class_cast(&self, class: &Arc<Class>, ty: Type) -> MetaResult<Arc<Class>> {
        self.class_try(class, ty).ok_or_else(|| {
            MetaError::type_mismatch(format!(
                "cannot cast class [{}] to [{}]",
                class.name(),
                self.name(ty).unwrap_or("<invalid>")
            ))
        })
    }

    /// Cast `class` to `ty`, returning `None` on failure
    ///
    /// Upcasts return the same class; casts to an interface return the
    /// embedded implementation; casts from an embedded implementation
    /// first back out to the owning class.
    pub fn class_try(&self, class: &Arc<Class>, ty: Type) -> Option<Arc<Class>> {
        let found = match self.lookup(ty) {
            Some(target) if class.is_valid() => cast_class(class, &target, false),
            _ => None,
        };
        if found.is_none() {
            log_cast_failed(class.name(), self.name(ty).unwrap_or("<invalid>"));
        }
        found
    }
}

fn cast_class(class: &Arc<Class>, target: &Arc<MetaClass>, recursing: bool) -> Option<Arc<Class>> {
    if class.meta().levels().any(|level| Arc::ptr_eq(level, target)) {
        return Some(class.clone());
    }

    let mut current = class.clone();
    if !recursing {
        while current.is_interface_impl() {
            match current.outer_class() {
                Some(outer) => current = outer,
                None => break,
            }
        }
    }

    let to_interface = target.flags().contains(TypeFlags::INTERFACED)
        && !target.flags().contains(TypeFlags::UNMAPPABLE);
    let meta = current.meta().clone();
    for level in (0..=meta.depth()).rev() {
        let level_meta = meta.base(level)?;
        if Arc::ptr_eq(&level_meta, target) {
            return Some(current);
        }
        if to_interface {
            for iface in current.interfaces_at(level) {
                if let Some(found) = cast_class(&iface, target, true) {
                    return Some(found);
                }
            }
        }
    }
    None
}
