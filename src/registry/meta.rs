//! Per-type descriptor
//!
//! One `MetaClass` exists per registered type. It is immutable after
//! registration apart from its two reference counters, the default class
//! slot, the child list and the extension table.

use crate::class::Class;
use crate::core::{Quark, Type, TypeFlags, TypeInfo};
use crate::errors::{MetaError, MetaResult};
use dashmap::DashMap;
use parking_lot::{ReentrantMutex, RwLock};
use smallvec::SmallVec;
use std::any::Any;
use std::borrow::Cow;
use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicI16, Ordering};
use std::sync::Arc;

/// Value attached to a type under a named key
pub type Extension = Arc<dyn Any + Send + Sync>;

/// Resolved interface map entry
#[derive(Clone)]
pub(crate) struct InterfaceEntry {
    pub meta: Arc<MetaClass>,
    pub offset: usize,
}

/// State of a type's shared default class
pub(crate) enum DefaultSlot {
    Empty,
    Constructing,
    Ready(Arc<Class>),
}

/// Registration-time results handed to [`MetaClass::new`]
pub(crate) struct Layout {
    pub flags: TypeFlags,
    pub interfaces: Vec<InterfaceEntry>,
    pub dependencies: Vec<Arc<MetaClass>>,
    pub class_private_offset: isize,
    pub instance_private_offset: isize,
}

/// Type descriptor: layout, flags, ancestry and reference counts
pub struct MetaClass {
    ty: Type,
    name: Quark,
    flags: TypeFlags,
    parent: Option<Arc<MetaClass>>,
    /// Ancestors from the root down to the parent
    bases: SmallVec<[Arc<MetaClass>; 4]>,
    info: Cow<'static, TypeInfo>,
    interfaces: Vec<InterfaceEntry>,
    dependencies: Vec<Arc<MetaClass>>,
    class_private_offset: isize,
    instance_private_offset: isize,
    class_refs: AtomicI16,
    instance_refs: AtomicI16,
    /// Guarded by a reentrant lock so class-init callbacks running on the
    /// constructing thread can still query the slot.
    pub(crate) default_slot: ReentrantMutex<RefCell<DefaultSlot>>,
    children: RwLock<Vec<Type>>,
    extensions: DashMap<Quark, Extension>,
}

impl MetaClass {
    pub(crate) fn new(
        ty: Type,
        name: Quark,
        parent: Option<Arc<MetaClass>>,
        info: Cow<'static, TypeInfo>,
        layout: Layout,
    ) -> Self {
        let mut bases = SmallVec::new();
        if let Some(parent) = &parent {
            bases.extend(parent.bases.iter().cloned());
            bases.push(parent.clone());
        }

        Self {
            ty,
            name,
            flags: layout.flags,
            class_private_offset: layout.class_private_offset,
            instance_private_offset: layout.instance_private_offset,
            parent,
            bases,
            info,
            interfaces: layout.interfaces,
            dependencies: layout.dependencies,
            class_refs: AtomicI16::new(0),
            instance_refs: AtomicI16::new(0),
            default_slot: ReentrantMutex::new(RefCell::new(DefaultSlot::Empty)),
            children: RwLock::new(Vec::new()),
            extensions: DashMap::new(),
        }
    }

    #[inline]
    pub fn ty(&self) -> Type {
        self.ty
    }

    pub fn name(&self) -> &'static str {
        self.name.as_str()
    }

    pub fn name_quark(&self) -> Quark {
        self.name
    }

    /// Root flags inherited from the fundamental root plus this type's own
    #[inline]
    pub fn flags(&self) -> TypeFlags {
        self.flags
    }

    pub fn info(&self) -> &TypeInfo {
        &self.info
    }

    pub fn parent(&self) -> Option<&Arc<MetaClass>> {
        self.parent.as_ref()
    }

    /// Number of ancestors; zero for a fundamental root
    #[inline]
    pub fn depth(&self) -> usize {
        self.bases.len()
    }

    /// Ancestor at `depth` counted from the root; `self` at its own depth
    pub fn base(self: &Arc<Self>, depth: usize) -> Option<Arc<MetaClass>> {
        match depth.cmp(&self.depth()) {
            std::cmp::Ordering::Less => Some(self.bases[depth].clone()),
            std::cmp::Ordering::Equal => Some(self.clone()),
            std::cmp::Ordering::Greater => None,
        }
    }

    /// Ancestor `level` steps up from this type; level 0 is `self`
    pub fn ancestor(self: &Arc<Self>, level: usize) -> Option<Arc<MetaClass>> {
        self.depth()
            .checked_sub(level)
            .and_then(|depth| self.base(depth))
    }

    pub fn root(self: &Arc<Self>) -> Arc<MetaClass> {
        self.bases.first().cloned().unwrap_or_else(|| self.clone())
    }

    pub(crate) fn interfaces(&self) -> &[InterfaceEntry] {
        &self.interfaces
    }

    pub(crate) fn dependencies(&self) -> &[Arc<MetaClass>] {
        &self.dependencies
    }

    /// Cumulative class private offset (zero or negative)
    pub fn class_private_offset(&self) -> isize {
        self.class_private_offset
    }

    pub fn instance_private_offset(&self) -> isize {
        self.instance_private_offset
    }

    pub fn class_ref_count(&self) -> i16 {
        self.class_refs.load(Ordering::Acquire)
    }

    pub fn instance_ref_count(&self) -> i16 {
        self.instance_refs.load(Ordering::Acquire)
    }

    pub(crate) fn class_refs(&self) -> &AtomicI16 {
        &self.class_refs
    }

    pub(crate) fn instance_refs(&self) -> &AtomicI16 {
        &self.instance_refs
    }

    /// Bump the class counter, refusing once it reaches `i16::MAX`
    pub(crate) fn acquire_class_ref(&self) -> MetaResult<i16> {
        acquire(&self.class_refs, self.name(), "class")
    }

    /// Bump the instance counter, refusing once it reaches `i16::MAX`
    pub(crate) fn acquire_instance_ref(&self) -> MetaResult<i16> {
        acquire(&self.instance_refs, self.name(), "instance")
    }

    /// The default class, if one currently exists, without taking a reference
    pub fn peek_default(&self) -> Option<Arc<Class>> {
        let slot = self.default_slot.lock();
        let state = slot.borrow();
        match &*state {
            DefaultSlot::Ready(class) => Some(class.clone()),
            _ => None,
        }
    }

    pub(crate) fn take_default(&self) -> Option<Arc<Class>> {
        let slot = self.default_slot.lock();
        let previous = slot.replace(DefaultSlot::Empty);
        match previous {
            DefaultSlot::Ready(class) => Some(class),
            _ => None,
        }
    }

    /// Per-level class private sizes, root first, zero sizes skipped
    pub(crate) fn class_private_levels(self: &Arc<Self>) -> SmallVec<[(Type, usize); 4]> {
        self.levels()
            .filter(|m| m.info.class_private_size > 0)
            .map(|m| (m.ty, m.info.class_private_size))
            .collect()
    }

    pub(crate) fn instance_private_levels(self: &Arc<Self>) -> SmallVec<[(Type, usize); 4]> {
        self.levels()
            .filter(|m| m.info.instance_private_size > 0)
            .map(|m| (m.ty, m.info.instance_private_size))
            .collect()
    }

    /// Every level from the root down to and including `self`
    pub(crate) fn levels<'a>(self: &'a Arc<Self>) -> impl DoubleEndedIterator<Item = &'a Arc<MetaClass>> {
        self.bases.iter().chain(std::iter::once(self))
    }

    pub fn children(&self) -> Vec<Type> {
        self.children.read().clone()
    }

    pub(crate) fn add_child(&self, child: Type) {
        self.children.write().insert(0, child);
    }

    pub(crate) fn remove_child(&self, child: Type) {
        self.children.write().retain(|c| *c != child);
    }

    pub(crate) fn extensions(&self) -> &DashMap<Quark, Extension> {
        &self.extensions
    }
}

impl fmt::Debug for MetaClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaClass")
            .field("type", &self.ty)
            .field("name", &self.name.as_str())
            .field("flags", &self.flags)
            .field("depth", &self.depth())
            .field("class_private_offset", &self.class_private_offset)
            .field("instance_private_offset", &self.instance_private_offset)
            .field("class_refs", &self.class_ref_count())
            .field("instance_refs", &self.instance_ref_count())
            .finish()
    }
}

fn acquire(counter: &AtomicI16, name: &str, what: &str) -> MetaResult<i16> {
    counter
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| count.checked_add(1))
        .map(|prev| prev + 1)
        .map_err(|_| {
            MetaError::invalid_operation(format!("[{name}]: {what} reference count is saturated"))
        })
}
