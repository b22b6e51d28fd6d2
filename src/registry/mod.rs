//! Type registry
//!
//! Owns every [`MetaClass`], keyed by interned name and addressed by
//! [`Type`] handle. Registration is serialized by a reentrant lock so that
//! callbacks fired during registration (default-class construction for
//! `CLASS_PREINIT` types) may themselves call back into the registry.
//! Lookups take a read lock on the type table and never block on
//! registration of unrelated types for long.

pub mod meta;
pub(crate) mod query;
pub(crate) mod validate;


pub use meta::{Extension, MetaClass};

use crate::allocator::{Allocator, HeapAllocator};
use crate::config::RegistryConfig;
use crate::core::{
    Quark, Type, TypeFlags, TypeInfo, CLASS_HEADER_SIZE, INSTANCE_HEADER_SIZE,
    INTERFACE_HEADER_SIZE,
};
use crate::errors::{MetaError, MetaResult};
use crate::logging::{
    log_live_references, log_registration_failed, log_type_layout, log_type_registered,
    log_type_unregistered,
};
use dashmap::DashMap;
use once_cell::sync::{Lazy, OnceCell};
use parking_lot::{ReentrantMutex, RwLock};
use std::borrow::Cow;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

static GLOBAL: OnceCell<Registry> = OnceCell::new();

static PROTOCOL_INFO: Lazy<TypeInfo> = Lazy::new(TypeInfo::new);
static STATIC_CLASS_INFO: Lazy<TypeInfo> =
    Lazy::new(|| TypeInfo::new().with_class_size(CLASS_HEADER_SIZE));
static INTERFACE_INFO: Lazy<TypeInfo> =
    Lazy::new(|| TypeInfo::new().with_class_size(INTERFACE_HEADER_SIZE));
static INSTANCE_INFO: Lazy<TypeInfo> = Lazy::new(|| {
    TypeInfo::new()
        .with_class_size(CLASS_HEADER_SIZE)
        .with_instance_size(INSTANCE_HEADER_SIZE)
});

/// Bootstrap progress of a registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BootstrapPhase {
    Empty = 0,
    Bootstrapping = 1,
    Ready = 2,
}

impl BootstrapPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => BootstrapPhase::Bootstrapping,
            2 => BootstrapPhase::Ready,
            _ => BootstrapPhase::Empty,
        }
    }
}

/// Registry of types and owner of their descriptors
pub struct Registry {
    phase: AtomicU8,
    lock: ReentrantMutex<()>,
    types: RwLock<Vec<Option<Arc<MetaClass>>>>,
    names: DashMap<Quark, Type>,
    builtins: RwLock<Vec<Type>>,
    allocator: Arc<dyn Allocator>,
    config: RegistryConfig,
}

impl Registry {
    /// Bootstrapped registry with default configuration and heap allocator
    pub fn new() -> MetaResult<Self> {
        Self::with_config(RegistryConfig::default(), Arc::new(HeapAllocator::new()))
    }

    pub fn with_allocator(allocator: Arc<dyn Allocator>) -> MetaResult<Self> {
        Self::with_config(RegistryConfig::default(), allocator)
    }

    pub fn with_config(config: RegistryConfig, allocator: Arc<dyn Allocator>) -> MetaResult<Self> {
        let registry = Self {
            phase: AtomicU8::new(BootstrapPhase::Empty as u8),
            lock: ReentrantMutex::new(()),
            types: RwLock::new(Vec::with_capacity(config.capacity)),
            names: DashMap::with_capacity(config.capacity),
            builtins: RwLock::new(Vec::new()),
            allocator,
            config,
        };
        registry.bootstrap()?;
        Ok(registry)
    }

    /// Process-wide registry, created on first use
    ///
    /// Configuration comes from the file named by `METATYPE_CONFIG` when set.
    pub fn global() -> MetaResult<&'static Registry> {
        GLOBAL.get_or_try_init(|| {
            let config = match RegistryConfig::from_env() {
                Ok(config) => config.unwrap_or_default(),
                Err(err) => {
                    crate::logging::warn!(target: "registry", error = %err, "ignoring unreadable config");
                    RegistryConfig::default()
                }
            };
            Registry::with_config(config, Arc::new(HeapAllocator::new()))
        })
    }

    fn bootstrap(&self) -> MetaResult<()> {
        let _guard = self.lock.lock();
        if self.phase() != BootstrapPhase::Empty {
            return Ok(());
        }
        self.phase
            .store(BootstrapPhase::Bootstrapping as u8, Ordering::Release);

        let builtins: [(&str, &'static TypeInfo, TypeFlags, Type); 4] = [
            (
                "Protocol",
                Lazy::force(&PROTOCOL_INFO),
                TypeFlags::DEPENDENT | TypeFlags::DERIVABLE,
                Type::PROTOCOL,
            ),
            (
                "StaticClass",
                Lazy::force(&STATIC_CLASS_INFO),
                TypeFlags::CLASSED | TypeFlags::DEEP_DERIVABLE | TypeFlags::CLASS_PREINIT,
                Type::STATIC_CLASS,
            ),
            (
                "Interface",
                Lazy::force(&INTERFACE_INFO),
                TypeFlags::DEPENDENT
                    | TypeFlags::INTERFACED
                    | TypeFlags::DEEP_DERIVABLE
                    | TypeFlags::ABSTRACT
                    | TypeFlags::UNMAPPABLE
                    | TypeFlags::CLASS_PREINIT,
                Type::INTERFACE,
            ),
            (
                "Instance",
                Lazy::force(&INSTANCE_INFO),
                TypeFlags::DEEP_DERIVABLE | TypeFlags::INSTANTIABLE | TypeFlags::CLASS_PREINIT,
                Type::INSTANCE,
            ),
        ];

        for (name, info, flags, expected) in builtins {
            let ty = self.register_with(
                name,
                Type::INVALID,
                Cow::Borrowed(info),
                flags | TypeFlags::BUILTIN,
            )?;
            debug_assert_eq!(ty, expected, "builtin {name} registered out of order");
            self.builtins.write().push(ty);
        }

        self.phase.store(BootstrapPhase::Ready as u8, Ordering::Release);
        Ok(())
    }

    pub fn phase(&self) -> BootstrapPhase {
        BootstrapPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn allocator(&self) -> &Arc<dyn Allocator> {
        &self.allocator
    }

    /// Register a type whose info is copied into the registry
    pub fn register(
        &self,
        name: &str,
        parent: Type,
        info: TypeInfo,
        flags: TypeFlags,
    ) -> MetaResult<Type> {
        self.register_with(name, parent, Cow::Owned(info), flags - TypeFlags::BUILTIN)
    }

    /// Register a type whose info is borrowed for the life of the process
    pub fn register_static(
        &self,
        name: &str,
        parent: Type,
        info: &'static TypeInfo,
        flags: TypeFlags,
    ) -> MetaResult<Type> {
        self.register_with(name, parent, Cow::Borrowed(info), flags - TypeFlags::BUILTIN)
    }

    fn register_with(
        &self,
        name: &str,
        parent: Type,
        info: Cow<'static, TypeInfo>,
        flags: TypeFlags,
    ) -> MetaResult<Type> {
        let _guard = self.lock.lock();
        let result = self.register_locked(name, parent, info, flags);
        if let Err(err) = &result {
            log_registration_failed(name, &err.to_string());
        }
        result
    }

    fn register_locked(
        &self,
        name: &str,
        parent: Type,
        info: Cow<'static, TypeInfo>,
        mut flags: TypeFlags,
    ) -> MetaResult<Type> {
        if name.is_empty() {
            return Err(MetaError::invalid_arg("type name must not be empty"));
        }
        let quark = Quark::from_str(name);
        if let Some(existing) = self.names.get(&quark) {
            return Err(MetaError::invalid_type(format!(
                "[{name}]: a type with this name is already registered as {}",
                *existing
            )));
        }

        let parent_meta = if parent.is_valid() {
            Some(self.meta(parent)?)
        } else {
            None
        };

        if matches!(info, Cow::Borrowed(_)) {
            flags |= TypeFlags::TYPEINFO_STATIC;
        } else {
            flags -= TypeFlags::TYPEINFO_STATIC;
        }
        let flags = validate::resolve_flags(name, parent_meta.as_ref(), &info, flags)?;
        let layout = validate::validate(self, name, parent_meta.as_ref(), &info, flags)?;

        let meta = {
            let mut types = self.types.write();
            let ty = Type::from_slot(types.len());
            let meta = Arc::new(MetaClass::new(ty, quark, parent_meta.clone(), info, layout));
            types.push(Some(meta.clone()));
            meta
        };
        let ty = meta.ty();
        self.names.insert(quark, ty);
        if let Some(parent) = &parent_meta {
            parent.add_child(ty);
        }

        log_type_registered(
            name,
            parent_meta.as_ref().map_or("", |p| p.name()),
            meta.depth(),
        );
        if self.config.log_type_info {
            log_type_layout(
                name,
                &format!("{:?}", meta.flags()),
                meta.info().class_size,
                meta.class_private_offset(),
                meta.info().instance_size,
                meta.instance_private_offset(),
                meta.interfaces().len(),
                meta.dependencies().len(),
            );
        }

        if meta.flags().contains(TypeFlags::CLASS_PREINIT) {
            if let Err(err) = self.ref_default_meta(&meta) {
                self.remove(&meta);
                return Err(err);
            }
        }
        Ok(ty)
    }

    /// Remove a type from the registry
    ///
    /// The handle becomes invalid. Classes and instances still referring to
    /// the type keep its descriptor alive but are no longer reachable by
    /// handle; callers are expected to release them first.
    pub fn unregister(&self, ty: Type) -> MetaResult<()> {
        let _guard = self.lock.lock();
        let meta = self.meta(ty)?;

        let class_refs = meta.class_ref_count();
        let instance_refs = meta.instance_ref_count();
        let pinned_only =
            meta.flags().contains(TypeFlags::CLASS_PINNED) && class_refs <= 1 && instance_refs == 0;
        if self.config.warn_on_live_refs && !pinned_only && (class_refs > 0 || instance_refs > 0) {
            log_live_references(meta.name(), class_refs, instance_refs);
        }

        self.remove(&meta);
        log_type_unregistered(meta.name());
        Ok(())
    }

    fn remove(&self, meta: &Arc<MetaClass>) {
        if let Some(parent) = meta.parent() {
            parent.remove_child(meta.ty());
        }
        self.names.remove(&meta.name_quark());
        if let Some(slot) = meta.ty().slot() {
            if let Some(entry) = self.types.write().get_mut(slot) {
                *entry = None;
            }
        }
        self.discard_default(meta);
    }

    /// Descriptor of a registered type
    pub fn meta(&self, ty: Type) -> MetaResult<Arc<MetaClass>> {
        self.lookup(ty)
            .ok_or_else(|| MetaError::invalid_type(format!("{ty} is not a registered type")))
    }

    pub(crate) fn lookup(&self, ty: Type) -> Option<Arc<MetaClass>> {
        let slot = ty.slot()?;
        self.types.read().get(slot).and_then(|entry| entry.clone())
    }

    pub fn find(&self, name: &str) -> Type {
        Quark::try_from_str(name).map_or(Type::INVALID, |q| self.find_quark(q))
    }

    pub fn find_quark(&self, name: Quark) -> Type {
        self.names.get(&name).map_or(Type::INVALID, |ty| *ty)
    }

    /// Number of registered types, builtins included
    pub fn count(&self) -> usize {
        self.names.len()
    }

    /// Registered types in registration order
    pub fn types(&self) -> Vec<Type> {
        self.types
            .read()
            .iter()
            .flatten()
            .map(|meta| meta.ty())
            .collect()
    }

    pub fn builtin(&self, index: usize) -> Type {
        self.builtins
            .read()
            .get(index)
            .copied()
            .unwrap_or(Type::INVALID)
    }

    pub fn builtin_count(&self) -> usize {
        self.builtins.read().len()
    }

    // ===== Attribute queries =====

    pub fn name(&self, ty: Type) -> Option<&'static str> {
        self.lookup(ty).map(|m| m.name())
    }

    pub fn name_quark(&self, ty: Type) -> Option<Quark> {
        self.lookup(ty).map(|m| m.name_quark())
    }

    pub fn parent(&self, ty: Type) -> Type {
        self.lookup(ty)
            .and_then(|m| m.parent().map(|p| p.ty()))
            .unwrap_or(Type::INVALID)
    }

    pub fn root(&self, ty: Type) -> Type {
        self.lookup(ty).map_or(Type::INVALID, |m| m.root().ty())
    }

    pub fn depth(&self, ty: Type) -> usize {
        self.lookup(ty).map_or(0, |m| m.depth())
    }

    /// Ancestor at `depth` counted from the root
    pub fn base(&self, ty: Type, depth: usize) -> Type {
        self.lookup(ty)
            .and_then(|m| m.base(depth))
            .map_or(Type::INVALID, |m| m.ty())
    }

    /// Ancestor `level` steps up; level 0 is `ty` itself
    pub fn ancestor(&self, ty: Type, level: usize) -> Type {
        self.lookup(ty)
            .and_then(|m| m.ancestor(level))
            .map_or(Type::INVALID, |m| m.ty())
    }

    pub fn flags(&self, ty: Type) -> TypeFlags {
        self.lookup(ty).map_or(TypeFlags::empty(), |m| m.flags())
    }

    pub fn flags_check(&self, ty: Type, mask: TypeFlags) -> bool {
        self.flags(ty).intersects(mask)
    }

    pub fn class_ref_count(&self, ty: Type) -> i16 {
        self.lookup(ty).map_or(0, |m| m.class_ref_count())
    }

    pub fn instance_ref_count(&self, ty: Type) -> i16 {
        self.lookup(ty).map_or(0, |m| m.instance_ref_count())
    }

    /// Direct children, most recently registered first
    pub fn children(&self, ty: Type) -> Vec<Type> {
        self.lookup(ty).map_or_else(Vec::new, |m| m.children())
    }

    pub fn info(&self, ty: Type) -> Option<TypeInfo> {
        self.lookup(ty).map(|m| m.info().clone())
    }

    // ===== Extensions =====

    /// Attach `value` to `ty` under `key`, returning any previous value
    pub fn set_extension(
        &self,
        ty: Type,
        key: &str,
        value: Extension,
    ) -> MetaResult<Option<Extension>> {
        let meta = self.meta(ty)?;
        Ok(meta.extensions().insert(Quark::from_str(key), value))
    }

    pub fn extension(&self, ty: Type, key: &str) -> Option<Extension> {
        let meta = self.lookup(ty)?;
        let key = Quark::try_from_str(key)?;
        meta.extensions().get(&key).map(|v| v.clone())
    }

    pub fn remove_extension(&self, ty: Type, key: &str) -> Option<Extension> {
        let meta = self.lookup(ty)?;
        let key = Quark::try_from_str(key)?;
        meta.extensions().remove(&key).map(|(_, v)| v)
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        for meta in self.types.get_mut().iter().flatten() {
            drop(meta.take_default());
        }
    }
}
