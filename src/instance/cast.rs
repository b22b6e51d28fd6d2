use super::Instance;
use crate::class::Class;
use crate::core::Type;
use crate::errors::{MetaError, MetaResult};
use crate::registry::Registry;
use std::sync::Arc;

impl Registry {
    pub fn instance_check(&self, instance: &Instance, ty: Type) -> bool {
        self.class_check(instance.class(), ty)
    }

    /// The instance itself if it is compatible with `ty`, else `TypeMismatch`
    pub fn instance_cast<'a>(&self, instance: &'a Instance, ty: Type) -> MetaResult<&'a Instance> {
        self.instance_try(instance, ty).ok_or_else(|| {
            MetaError::type_mismatch(format!(
                "cannot cast instance of [{}] to [{}]",
                instance.name(),
                self.name(ty).unwrap_or("<invalid>")
            ))
        })
    }

    pub fn instance_try<'a>(&self, instance: &'a Instance, ty: Type) -> Option<&'a Instance> {
        self.class_try(instance.class(), ty).map(|_| instance)
    }

    /// The instance's class viewed as `ty`: the class itself for an
    /// ancestor type, or the embedded implementation for an interface
    pub fn instance_as(&self, instance: &Instance, ty: Type) -> Option<Arc<Class>> {
        self.class_try(instance.class(), ty)
    }
}
