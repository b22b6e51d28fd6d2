use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::class::Class;
use crate::errors::MetaResult;
use crate::instance::Instance;

/// Size of the header at the start of every class block.
pub const CLASS_HEADER_SIZE: usize = std::mem::size_of::<usize>();

/// Size of the header at the start of every interface block: a class
/// header followed by the signed offset back to the owning class.
pub const INTERFACE_HEADER_SIZE: usize = CLASS_HEADER_SIZE + std::mem::size_of::<isize>();

/// Size of the header at the start of every instance block.
pub const INSTANCE_HEADER_SIZE: usize = std::mem::size_of::<usize>();

/// Handle identifying a registered type within one registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Type(u32);

impl Type {
    pub const INVALID: Type = Type(0);

    pub const PROTOCOL: Type = Type(1);
    pub const STATIC_CLASS: Type = Type(2);
    pub const INTERFACE: Type = Type(3);
    pub const INSTANCE: Type = Type(4);

    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Type(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }

    pub(crate) fn slot(self) -> Option<usize> {
        (self.0 as usize).checked_sub(1)
    }

    pub(crate) fn from_slot(slot: usize) -> Self {
        Type(slot as u32 + 1)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "#{}", self.0)
        } else {
            f.write_str("#invalid")
        }
    }
}

/// Opaque user data handed to class callbacks.
pub type ClassData = Arc<dyn Any + Send + Sync>;

pub type ClassInitFn = Arc<dyn Fn(&Class, Option<&ClassData>) -> MetaResult<()> + Send + Sync>;
pub type ClassFinalFn = Arc<dyn Fn(&Class, Option<&ClassData>) -> MetaResult<()> + Send + Sync>;
pub type InstanceInitFn = Arc<dyn Fn(&mut Instance) -> MetaResult<()> + Send + Sync>;

/// One entry of an interface map: the interface type and the byte offset
/// of its block within the implementing class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceImpl {
    pub interface: Type,
    pub offset: usize,
}

impl InterfaceImpl {
    pub fn new(interface: Type, offset: usize) -> Self {
        Self { interface, offset }
    }
}

/// Layout and behaviour description supplied at registration.
///
/// Sizes are byte counts. `class_size` and `instance_size` cover the whole
/// public block, header included; private sizes are this level's own
/// private region only.
#[derive(Clone, Default)]
pub struct TypeInfo {
    pub class_size: usize,
    pub class_private_size: usize,
    pub instance_size: usize,
    pub instance_private_size: usize,
    pub class_init: Option<ClassInitFn>,
    pub class_final: Option<ClassFinalFn>,
    pub instance_init: Option<InstanceInitFn>,
    pub class_data: Option<ClassData>,
    pub interfaces: Vec<InterfaceImpl>,
    pub dependencies: Vec<Type>,
}

impl TypeInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_class_size(mut self, size: usize) -> Self {
        self.class_size = size;
        self
    }

    pub fn with_class_private_size(mut self, size: usize) -> Self {
        self.class_private_size = size;
        self
    }

    pub fn with_instance_size(mut self, size: usize) -> Self {
        self.instance_size = size;
        self
    }

    pub fn with_instance_private_size(mut self, size: usize) -> Self {
        self.instance_private_size = size;
        self
    }

    pub fn with_class_init<F>(mut self, f: F) -> Self
    where
        F: Fn(&Class, Option<&ClassData>) -> MetaResult<()> + Send + Sync + 'static,
    {
        self.class_init = Some(Arc::new(f));
        self
    }

    pub fn with_class_final<F>(mut self, f: F) -> Self
    where
        F: Fn(&Class, Option<&ClassData>) -> MetaResult<()> + Send + Sync + 'static,
    {
        self.class_final = Some(Arc::new(f));
        self
    }

    pub fn with_instance_init<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Instance) -> MetaResult<()> + Send + Sync + 'static,
    {
        self.instance_init = Some(Arc::new(f));
        self
    }

    pub fn with_class_data(mut self, data: ClassData) -> Self {
        self.class_data = Some(data);
        self
    }

    pub fn with_interface(mut self, interface: Type, offset: usize) -> Self {
        self.interfaces.push(InterfaceImpl::new(interface, offset));
        self
    }

    pub fn with_dependency(mut self, dependency: Type) -> Self {
        self.dependencies.push(dependency);
        self
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("class_size", &self.class_size)
            .field("class_private_size", &self.class_private_size)
            .field("instance_size", &self.instance_size)
            .field("instance_private_size", &self.instance_private_size)
            .field("class_init", &self.class_init.is_some())
            .field("class_final", &self.class_final.is_some())
            .field("instance_init", &self.instance_init.is_some())
            .field("interfaces", &self.interfaces)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_handle() {
        assert!(!Type::INVALID.is_valid());
        assert_eq!(Type::INVALID.slot(), None);
        assert_eq!(Type::from_slot(0), Type::PROTOCOL);
        assert_eq!(Type::INSTANCE.to_string(), "#4");
    }

    #[test]
    fn builder_collects_maps() {
        let info = TypeInfo::new()
            .with_class_size(64)
            .with_interface(Type::from_raw(9), 32)
            .with_dependency(Type::PROTOCOL);
        assert_eq!(info.class_size, 64);
        assert_eq!(info.interfaces, vec![InterfaceImpl::new(Type::from_raw(9), 32)]);
        assert_eq!(info.dependencies, vec![Type::PROTOCOL]);
    }

    #[test]
    fn header_sizes_nest() {
        assert!(INTERFACE_HEADER_SIZE > CLASS_HEADER_SIZE);
        assert_eq!(INSTANCE_HEADER_SIZE, CLASS_HEADER_SIZE);
    }
}
