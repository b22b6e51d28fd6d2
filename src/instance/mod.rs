//! Instances: per-object data attached to a class
//!
//! An instance owns its public block and one private block per ancestor
//! level that declares instance private data. It always holds a reference
//! on its class's type default, and may additionally own a sunk floating
//! class. Instances are created and destroyed through the
//! [`Registry`](crate::Registry).

mod cast;
mod lifecycle;

use crate::allocator::storage::Storage;
use crate::class::Class;
use crate::core::Type;
use crate::logging::log_instance_leaked;
use std::fmt;
use std::sync::Arc;

pub struct Instance {
    class: Arc<Class>,
    storage: Storage,
    live: bool,
}

impl Instance {
    pub(crate) fn new(class: Arc<Class>, storage: Storage) -> Self {
        Self {
            class,
            storage,
            live: true,
        }
    }

    pub fn type_of(&self) -> Type {
        self.class.type_of()
    }

    pub fn name(&self) -> &'static str {
        self.class.name()
    }

    /// The class this instance is attached to
    pub fn class(&self) -> &Arc<Class> {
        &self.class
    }

    pub(crate) fn replace_class(&mut self, class: Arc<Class>) -> Arc<Class> {
        std::mem::replace(&mut self.class, class)
    }

    /// Public block, header bytes included
    pub fn public(&self) -> &[u8] {
        &self.storage.public
    }

    pub fn public_mut(&mut self) -> &mut [u8] {
        &mut self.storage.public
    }

    /// Private region declared by ancestor level `ty`
    pub fn private(&self, ty: Type) -> Option<&[u8]> {
        self.storage.private(ty)
    }

    pub fn private_mut(&mut self, ty: Type) -> Option<&mut [u8]> {
        self.storage.private_mut(ty)
    }

    pub fn size(&self) -> usize {
        self.storage.public.len()
    }

    pub fn private_size(&self) -> usize {
        self.storage.private_size()
    }

    pub fn is_in_place(&self) -> bool {
        self.storage.is_in_place()
    }

    /// Detach class and storage for teardown
    pub(crate) fn into_parts(mut self) -> (Arc<Class>, Storage) {
        self.live = false;
        let storage = std::mem::take(&mut self.storage);
        (self.class.clone(), storage)
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        if self.live {
            log_instance_leaked(self.class.name());
        }
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type", &self.class.meta().ty())
            .field("name", &self.class.name())
            .field("size", &self.size())
            .field("private_size", &self.private_size())
            .field("in_place", &self.is_in_place())
            .finish()
    }
}
