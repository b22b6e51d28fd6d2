//! Embedded interface implementations
//!
//! Each interface mapped by a class is built as its own class tagged
//! `IFACE_IMPL`, linked back to the owning class. The interface type's
//! default class is referenced for as long as the implementation lives.

use super::{Class, OuterLink};
use crate::allocator::storage::Placement;
use crate::core::ClassFlags;
use crate::errors::MetaResult;
use crate::registry::meta::InterfaceEntry;
use crate::registry::Registry;
use std::sync::Arc;

impl Registry {
    pub(crate) fn construct_interface(
        &self,
        outer: &Arc<Class>,
        entry: &InterfaceEntry,
    ) -> MetaResult<Arc<Class>> {
        self.ref_default_meta(&entry.meta)?;

        let link = OuterLink {
            class: Arc::downgrade(outer),
            offset: -(entry.offset as isize),
        };
        let placement = Placement::Heap(entry.meta.info().class_size);
        match self.construct_class(&entry.meta, ClassFlags::IFACE_IMPL, placement, Some(link)) {
            Ok(iface) => Ok(iface),
            Err(err) => {
                self.release_anchor(&entry.meta);
                Err(err)
            }
        }
    }

    pub(crate) fn destruct_interface(&self, iface: &Arc<Class>) -> MetaResult<()> {
        let result = self.destruct_class(iface);
        self.free_class_storage(iface);
        let released = self.unref_default_meta(iface.meta());
        result.and(released.map(|_| ()))
    }
}
