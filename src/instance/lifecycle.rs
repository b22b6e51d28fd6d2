use super::Instance;
use crate::allocator::storage::{Placement, Storage, StorageKind};
use crate::allocator::Block;
use crate::class::Class;
use crate::core::{ClassFlags, Type, TypeFlags};
use crate::errors::{MetaError, MetaResult};
use crate::logging::{log_instance_created, log_instance_destroyed};
use crate::registry::{MetaClass, Registry};
use std::sync::atomic::Ordering;
use std::sync::Arc;

impl Registry {
    /// Create a heap instance of `ty` attached to its default class
    pub fn create_instance(&self, ty: Type) -> MetaResult<Instance> {
        self.create_instance_with(ty, None, None)
    }

    /// Create a heap instance with an explicit public `size` (at least the
    /// type's instance size) and/or an explicit class of exactly `ty`
    pub fn create_instance_with(
        &self,
        ty: Type,
        size: Option<usize>,
        class: Option<Arc<Class>>,
    ) -> MetaResult<Instance> {
        let meta = self.verify_instantiable(ty, class.as_ref())?;
        let instance_size = meta.info().instance_size;
        let size = size.unwrap_or(instance_size);
        if size < instance_size {
            return Err(MetaError::invalid_arg(format!(
                "[{}]: requested size {size} is smaller than the instance size ({instance_size})",
                meta.name()
            )));
        }
        self.init_instance(&meta, Placement::Heap(size), class)
    }

    /// Construct an instance of `ty` in caller-supplied storage
    ///
    /// Types with instance private data are rejected.
    pub fn construct_instance(
        &self,
        ty: Type,
        storage: Block,
        class: Option<Arc<Class>>,
    ) -> MetaResult<Instance> {
        let meta = self.verify_instantiable(ty, class.as_ref())?;
        if storage.len() < meta.info().instance_size {
            return Err(MetaError::invalid_arg(format!(
                "[{}]: storage of {} bytes is smaller than the instance size ({})",
                meta.name(),
                storage.len(),
                meta.info().instance_size
            )));
        }
        if meta.instance_private_offset() != 0 {
            return Err(MetaError::invalid_operation(format!(
                "[{}]: cannot construct an instance with private data in place",
                meta.name()
            )));
        }
        self.init_instance(&meta, Placement::InPlace(storage), class)
    }

    fn verify_instantiable(&self, ty: Type, class: Option<&Arc<Class>>) -> MetaResult<Arc<MetaClass>> {
        let meta = self.meta(ty)?;
        let flags = meta.flags();
        if !flags.contains(TypeFlags::INSTANTIABLE) {
            return Err(MetaError::invalid_type(format!(
                "[{}]: type is not INSTANTIABLE",
                meta.name()
            )));
        }
        if flags.contains(TypeFlags::ABSTRACT) {
            return Err(MetaError::invalid_type(format!(
                "[{}]: cannot instantiate an ABSTRACT type",
                meta.name()
            )));
        }
        if meta.info().instance_size == 0 {
            return Err(MetaError::invalid_type(format!(
                "[{}]: type has no instance size",
                meta.name()
            )));
        }
        if let Some(class) = class {
            if class.type_of() != ty {
                return Err(MetaError::type_mismatch(format!(
                    "[{}]: explicit class is of type [{}]",
                    meta.name(),
                    class.name()
                )));
            }
        }
        Ok(meta)
    }

    fn init_instance(
        &self,
        meta: &Arc<MetaClass>,
        placement: Placement,
        class: Option<Arc<Class>>,
    ) -> MetaResult<Instance> {
        let storage = Storage::allocate(
            self.allocator().as_ref(),
            placement,
            &meta.instance_private_levels(),
            StorageKind::Instance,
        )?;

        // Every instance anchors its type's default, explicit class or not
        let anchor = match self.ref_default_meta(meta) {
            Ok(anchor) => anchor,
            Err(err) => {
                storage.release(self.allocator().as_ref(), StorageKind::Instance);
                return Err(err);
            }
        };

        if let Err(err) = meta.acquire_instance_ref() {
            storage.release(self.allocator().as_ref(), StorageKind::Instance);
            self.release_anchor(meta);
            return Err(err);
        }

        let in_place = storage.is_in_place();
        let mut instance = Instance::new(class.unwrap_or(anchor), storage);
        for level_meta in meta.levels() {
            if let Some(init) = &level_meta.info().instance_init {
                if let Err(err) = init(&mut instance) {
                    let (_, storage) = instance.into_parts();
                    storage.release(self.allocator().as_ref(), StorageKind::Instance);
                    meta.instance_refs().fetch_sub(1, Ordering::AcqRel);
                    self.release_anchor(meta);
                    return Err(err);
                }
            }
        }

        log_instance_created(meta.name(), instance.size(), in_place);
        Ok(instance)
    }

    /// Tear down a heap instance and free its storage
    pub fn destroy_instance(&self, instance: Instance) -> MetaResult<()> {
        self.teardown_instance(instance).map(|_| ())
    }

    /// Tear down an in-place instance, returning the caller's storage
    ///
    /// A heap-created instance is still torn down completely, but the call
    /// reports `InvalidOperation`.
    pub fn destruct_instance(&self, instance: Instance) -> MetaResult<Block> {
        let in_place = instance.is_in_place();
        let name = instance.name();
        let storage = self.teardown_instance(instance)?;
        match storage {
            Some(block) if in_place => Ok(block),
            _ => Err(MetaError::invalid_operation(format!(
                "[{name}]: destructed a heap-created instance, destroy it instead"
            ))),
        }
    }

    fn teardown_instance(&self, instance: Instance) -> MetaResult<Option<Block>> {
        let (class, storage) = instance.into_parts();
        let meta = class.meta().clone();

        let released = self.release_instance_class(&class);
        meta.instance_refs().fetch_sub(1, Ordering::AcqRel);
        let block = storage.release(self.allocator().as_ref(), StorageKind::Instance);
        log_instance_destroyed(meta.name());
        released.map(|()| block)
    }

    /// Drop an instance's hold on `class`: an owned class is torn down,
    /// then the anchor reference on its type's default is released.
    fn release_instance_class(&self, class: &Arc<Class>) -> MetaResult<()> {
        let owned = if class.is_owned() {
            if class.is_in_place() {
                self.destruct_floating(class).map(|_| ())
            } else {
                self.destroy_floating(class)
            }
        } else {
            Ok(())
        };
        let anchor = self.unref_default_meta(class.meta());
        owned.and(anchor.map(|_| ()))
    }

    /// Replace the class of `instance` with `class`, which must be of the
    /// instance's type or derive from it
    ///
    /// The old class is released per ownership; the new one is stored
    /// unowned until [`sink_class`](Self::sink_class) is called.
    pub fn swizzle_class(&self, instance: &mut Instance, class: Arc<Class>) -> MetaResult<()> {
        if Arc::ptr_eq(instance.class(), &class) {
            return Ok(());
        }
        if !class.is_valid() || class.is_interface_impl() {
            return Err(MetaError::invalid_arg(format!(
                "[{}]: replacement class is not a live standalone class",
                class.name()
            )));
        }
        if !self.check(class.type_of(), instance.type_of()) {
            return Err(MetaError::type_mismatch(format!(
                "cannot swizzle [{}] instance to class [{}]",
                instance.name(),
                class.name()
            )));
        }

        let new_meta = class.meta().clone();
        self.ref_default_meta(&new_meta)?;
        if let Err(err) = new_meta.acquire_instance_ref() {
            self.release_anchor(&new_meta);
            return Err(err);
        }

        let old = instance.replace_class(class);
        old.meta().instance_refs().fetch_sub(1, Ordering::AcqRel);
        self.release_instance_class(&old)
    }

    /// Bind the instance's floating class to the instance's lifetime
    pub fn sink_class(&self, instance: &Instance) -> MetaResult<()> {
        let class = instance.class();
        if !class.is_floating() {
            return Err(MetaError::invalid_operation(format!(
                "[{}]: only a floating class can be sunk",
                class.name()
            )));
        }
        class.set_flags(ClassFlags::OWNED);
        Ok(())
    }

    /// Release the instance's owned class back to floating
    pub fn float_class(&self, instance: &Instance) -> MetaResult<()> {
        let class = instance.class();
        if !class.is_owned() {
            return Err(MetaError::invalid_operation(format!(
                "[{}]: only an owned class can be floated",
                class.name()
            )));
        }
        class.clear_flags(ClassFlags::OWNED);
        Ok(())
    }
}
