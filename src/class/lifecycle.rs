//! Default and floating class lifecycles
//!
//! Construction walks the ancestry root to leaf: for every level, the
//! interfaces that level maps are built first, then the level's class
//! initializer runs. Destruction mirrors this leaf to root. A failing step
//! during construction unwinds everything already built before the error
//! is returned.

use super::{Class, EmbeddedInterface, OuterLink};
use crate::allocator::storage::{Placement, Storage, StorageKind};
use crate::allocator::Block;
use crate::core::{ClassFlags, Type, TypeFlags};
use crate::errors::{MetaError, MetaResult};
use crate::logging::{
    log_class_step_failed, log_default_created, log_default_destroyed, log_default_retained,
    log_floating_created, log_live_references,
};
use crate::registry::meta::DefaultSlot;
use crate::registry::{MetaClass, Registry};
use smallvec::SmallVec;
use std::sync::atomic::Ordering;
use std::sync::Arc;

impl Registry {
    /// Take a reference on `ty`'s default class, creating it if needed
    pub fn ref_default(&self, ty: Type) -> MetaResult<Arc<Class>> {
        let meta = self.meta(ty)?;
        self.ref_default_meta(&meta)
    }

    /// Release a reference taken with [`ref_default`](Self::ref_default)
    ///
    /// Returns the remaining count. At zero the class is destroyed unless
    /// its type is pinned.
    pub fn unref_default(&self, class: &Arc<Class>) -> MetaResult<i16> {
        if !class.is_default() {
            return Err(MetaError::invalid_operation(format!(
                "[{}]: cannot unref a class that is not the type's default",
                class.name()
            )));
        }
        self.unref_default_meta(class.meta())
    }

    /// The default class of `ty` without taking a reference
    pub fn weak_ref_default(&self, ty: Type) -> MetaResult<Arc<Class>> {
        let meta = self.meta(ty)?;
        match meta.peek_default() {
            Some(class) if meta.class_ref_count() > 0 || meta.flags().contains(TypeFlags::CLASS_PINNED) => {
                Ok(class)
            }
            _ => Err(MetaError::invalid_operation(format!(
                "[{}]: no default class exists",
                meta.name()
            ))),
        }
    }

    pub(crate) fn ref_default_meta(&self, meta: &Arc<MetaClass>) -> MetaResult<Arc<Class>> {
        if !meta.flags().contains(TypeFlags::CLASSED) {
            return Err(MetaError::invalid_type(format!(
                "[{}]: type is not CLASSED",
                meta.name()
            )));
        }

        let slot = meta.default_slot.lock();
        let existing = match &*slot.borrow() {
            DefaultSlot::Ready(class) => Some(class.clone()),
            DefaultSlot::Constructing => {
                return Err(MetaError::invalid_operation(format!(
                    "[{}]: default class referenced while it is being constructed",
                    meta.name()
                )))
            }
            DefaultSlot::Empty => None,
        };

        meta.acquire_class_ref()?;
        if let Some(class) = existing {
            return Ok(class);
        }

        slot.replace(DefaultSlot::Constructing);
        let placement = Placement::Heap(meta.info().class_size);
        match self.construct_class(meta, ClassFlags::empty(), placement, None) {
            Ok(class) => {
                slot.replace(DefaultSlot::Ready(class.clone()));
                log_default_created(meta.name());
                Ok(class)
            }
            Err(err) => {
                slot.replace(DefaultSlot::Empty);
                meta.class_refs().fetch_sub(1, Ordering::AcqRel);
                Err(err)
            }
        }
    }

    pub(crate) fn unref_default_meta(&self, meta: &Arc<MetaClass>) -> MetaResult<i16> {
        let slot = meta.default_slot.lock();
        let class = match &*slot.borrow() {
            DefaultSlot::Ready(class) => class.clone(),
            _ => {
                return Err(MetaError::invalid_operation(format!(
                    "[{}]: no default class to unref",
                    meta.name()
                )))
            }
        };

        if meta.class_ref_count() <= 0 {
            return Err(MetaError::invalid_operation(format!(
                "[{}]: default class has no references left",
                meta.name()
            )));
        }
        let remaining = meta.class_refs().fetch_sub(1, Ordering::AcqRel) - 1;
        if remaining > 0 {
            return Ok(remaining);
        }

        if meta.flags().contains(TypeFlags::CLASS_PINNED) {
            log_default_retained(meta.name());
            return Ok(0);
        }

        let instances = meta.instance_ref_count();
        if instances > 0 && self.config().warn_on_live_refs {
            log_live_references(meta.name(), 0, instances);
        }
        slot.replace(DefaultSlot::Empty);
        let result = self.destruct_class(&class);
        self.free_class_storage(&class);
        log_default_destroyed(meta.name());
        result.map(|()| 0)
    }

    /// Release an anchor reference on an error path, logging a secondary failure
    pub(crate) fn release_anchor(&self, meta: &Arc<MetaClass>) {
        if let Err(err) = self.unref_default_meta(meta) {
            log_class_step_failed(meta.name(), meta.name(), &err.to_string());
        }
    }

    /// Tear down a type's default class regardless of its reference count
    pub(crate) fn discard_default(&self, meta: &Arc<MetaClass>) {
        if let Some(class) = meta.take_default() {
            meta.class_refs().store(0, Ordering::Release);
            if let Err(err) = self.destruct_class(&class) {
                log_class_step_failed(meta.name(), meta.name(), &err.to_string());
            }
            self.free_class_storage(&class);
        }
    }

    /// Construct a heap-allocated floating class of `ty`
    pub fn create_floating(&self, ty: Type) -> MetaResult<Arc<Class>> {
        let meta = self.meta(ty)?;
        self.ref_default_meta(&meta)?;
        let placement = Placement::Heap(meta.info().class_size);
        match self.construct_class(&meta, ClassFlags::empty(), placement, None) {
            Ok(class) => {
                log_floating_created(meta.name(), false);
                Ok(class)
            }
            Err(err) => {
                self.release_anchor(&meta);
                Err(err)
            }
        }
    }

    /// Construct a floating class of `ty` in caller-supplied storage
    ///
    /// Types with class private data are rejected: their private regions
    /// must come from the registry's allocator.
    pub fn construct_floating(&self, ty: Type, storage: Block) -> MetaResult<Arc<Class>> {
        let meta = self.meta(ty)?;
        if storage.len() < meta.info().class_size {
            return Err(MetaError::invalid_arg(format!(
                "[{}]: storage of {} bytes is smaller than the class ({})",
                meta.name(),
                storage.len(),
                meta.info().class_size
            )));
        }
        if meta.class_private_offset() != 0 {
            return Err(MetaError::invalid_operation(format!(
                "[{}]: cannot construct a class with private data in place",
                meta.name()
            )));
        }

        self.ref_default_meta(&meta)?;
        match self.construct_class(&meta, ClassFlags::IN_PLACE, Placement::InPlace(storage), None) {
            Ok(class) => {
                log_floating_created(meta.name(), true);
                Ok(class)
            }
            Err(err) => {
                self.release_anchor(&meta);
                Err(err)
            }
        }
    }

    /// Destroy a heap-allocated floating (or owned) class
    pub fn destroy_floating(&self, class: &Arc<Class>) -> MetaResult<()> {
        self.verify_floating_teardown(class)?;
        if class.is_in_place() {
            return Err(MetaError::invalid_operation(format!(
                "[{}]: cannot destroy an in-place class, destruct it instead",
                class.name()
            )));
        }
        let result = self.destruct_class(class);
        self.free_class_storage(class);
        let released = self.unref_default_meta(class.meta());
        result.and(released.map(|_| ()))
    }

    /// Destruct an in-place floating (or owned) class, returning its storage
    pub fn destruct_floating(&self, class: &Arc<Class>) -> MetaResult<Block> {
        self.verify_floating_teardown(class)?;
        if !class.is_in_place() {
            return Err(MetaError::invalid_operation(format!(
                "[{}]: cannot destruct a heap-created class, destroy it instead",
                class.name()
            )));
        }
        let result = self.destruct_class(class);
        let storage = self.free_class_storage(class).unwrap_or_default();
        let released = self.unref_default_meta(class.meta());
        result.and(released).map(|_| storage)
    }

    fn verify_floating_teardown(&self, class: &Arc<Class>) -> MetaResult<()> {
        if !class.is_valid() {
            return Err(MetaError::invalid_operation(format!(
                "[{}]: class has already been torn down",
                class.name()
            )));
        }
        if class.is_default() {
            return Err(MetaError::invalid_operation(format!(
                "[{}]: cannot tear down a default class through the floating API",
                class.name()
            )));
        }
        if class.is_interface_impl() {
            return Err(MetaError::invalid_operation(format!(
                "[{}]: embedded interfaces are torn down with their owner",
                class.name()
            )));
        }
        Ok(())
    }

    /// Build a class of `meta`: storage, parent reference, then every level's
    /// interfaces and initializer.
    pub(crate) fn construct_class(
        &self,
        meta: &Arc<MetaClass>,
        flags: ClassFlags,
        placement: Placement,
        outer: Option<OuterLink>,
    ) -> MetaResult<Arc<Class>> {
        let storage = Storage::allocate(
            self.allocator().as_ref(),
            placement,
            &meta.class_private_levels(),
            StorageKind::Class,
        )?;
        let class = Arc::new(Class::new(meta.clone(), flags, storage, outer));

        if let Some(parent) = meta.parent() {
            if let Err(err) = self.ref_default_meta(parent) {
                class.invalidate();
                self.free_class_storage(&class);
                return Err(err);
            }
        }

        for (level, level_meta) in meta.levels().enumerate() {
            for entry in level_meta.interfaces() {
                match self.construct_interface(&class, entry) {
                    Ok(iface) => class.push_interface(EmbeddedInterface {
                        level,
                        offset: entry.offset,
                        class: iface,
                    }),
                    Err(err) => return Err(self.unwind_construct(&class, level, level_meta, err)),
                }
            }

            if let Some(init) = &level_meta.info().class_init {
                if let Err(err) = init(&*class, level_meta.info().class_data.as_ref()) {
                    return Err(self.unwind_construct(&class, level, level_meta, err));
                }
            }
        }

        Ok(class)
    }

    fn unwind_construct(
        &self,
        class: &Arc<Class>,
        failed_level: usize,
        level_meta: &MetaClass,
        err: MetaError,
    ) -> MetaError {
        log_class_step_failed(class.name(), level_meta.name(), &err.to_string());
        if let Err(unwind_err) = self.teardown(class, failed_level) {
            log_class_step_failed(class.name(), level_meta.name(), &unwind_err.to_string());
        }
        self.free_class_storage(class);
        err
    }

    /// Run every level's finalizer and release what construction acquired.
    pub(crate) fn destruct_class(&self, class: &Class) -> MetaResult<()> {
        self.teardown(class, class.meta().depth() + 1)
    }

    /// Tear down a class whose first `initialized` levels completed their
    /// initializer. Interfaces built for later levels are released too.
    /// Every step runs; the first error is returned.
    fn teardown(&self, class: &Class, initialized: usize) -> MetaResult<()> {
        if !class.invalidate() {
            return Ok(());
        }

        let meta = class.meta().clone();
        let levels: SmallVec<[&Arc<MetaClass>; 4]> = meta.levels().collect();
        let mut first_err: Option<MetaError> = None;

        for (level, level_meta) in levels.iter().enumerate().rev() {
            if level < initialized {
                if let Some(finalize) = &level_meta.info().class_final {
                    if let Err(err) = finalize(class, level_meta.info().class_data.as_ref()) {
                        log_class_step_failed(class.name(), level_meta.name(), &err.to_string());
                        first_err.get_or_insert(err);
                    }
                }
            }

            while let Some(iface) = class.pop_interface(level) {
                if let Err(err) = self.destruct_interface(&iface.class) {
                    log_class_step_failed(class.name(), iface.class.name(), &err.to_string());
                    first_err.get_or_insert(err);
                }
            }
        }

        if let Some(parent) = meta.parent() {
            if let Err(err) = self.unref_default_meta(parent) {
                first_err.get_or_insert(err);
            }
        }

        first_err.map_or(Ok(()), Err)
    }

    /// Return a class's blocks to the allocator; in-place storage is handed
    /// back to the caller instead.
    pub(crate) fn free_class_storage(&self, class: &Class) -> Option<Block> {
        class
            .take_storage()
            .release(self.allocator().as_ref(), StorageKind::Class)
    }
}
