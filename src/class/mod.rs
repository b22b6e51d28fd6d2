//! Classes: shared or floating blocks of per-type overridable data
//!
//! A class is created either as its type's *default* (shared and reference
//! counted through the registry), as a *floating* override owned by the
//! caller (heap or caller-supplied storage), or as an *interface
//! implementation* embedded in another class. Lifecycle operations live on
//! [`Registry`](crate::Registry); this module holds the data structure and
//! its queries.

mod cast;
mod interface;
mod lifecycle;

use crate::allocator::storage::Storage;
use crate::core::{ClassFlags, Type, TypeFlags, CLASS_HEADER_SIZE};
use crate::registry::MetaClass;
use parking_lot::{MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Weak};

/// Back-link from an embedded interface to the class that owns it
pub(crate) struct OuterLink {
    pub class: Weak<Class>,
    /// Negative byte offset of the interface block within the owner
    pub offset: isize,
}

/// Interface implementation embedded at `offset` by ancestor `level`
#[derive(Clone)]
pub(crate) struct EmbeddedInterface {
    pub level: usize,
    pub offset: usize,
    pub class: Arc<Class>,
}

pub struct Class {
    meta: Arc<MetaClass>,
    flags: AtomicU8,
    live: AtomicBool,
    outer: Option<OuterLink>,
    storage: RwLock<Storage>,
    interfaces: RwLock<Vec<EmbeddedInterface>>,
}

impl Class {
    pub(crate) fn new(
        meta: Arc<MetaClass>,
        flags: ClassFlags,
        storage: Storage,
        outer: Option<OuterLink>,
    ) -> Self {
        Self {
            meta,
            flags: AtomicU8::new(flags.bits()),
            live: AtomicBool::new(true),
            outer,
            storage: RwLock::new(storage),
            interfaces: RwLock::new(Vec::new()),
        }
    }

    /// Type of this class; `Type::INVALID` once the class has been torn down
    pub fn type_of(&self) -> Type {
        if self.is_valid() {
            self.meta.ty()
        } else {
            Type::INVALID
        }
    }

    pub fn meta(&self) -> &Arc<MetaClass> {
        &self.meta
    }

    pub fn name(&self) -> &'static str {
        self.meta.name()
    }

    pub fn is_valid(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    pub(crate) fn invalidate(&self) -> bool {
        self.live.swap(false, Ordering::AcqRel)
    }

    pub fn flags(&self) -> ClassFlags {
        ClassFlags::from_bits_truncate(self.flags.load(Ordering::Acquire))
    }

    pub(crate) fn set_flags(&self, flags: ClassFlags) {
        self.flags.fetch_or(flags.bits(), Ordering::AcqRel);
    }

    pub(crate) fn clear_flags(&self, flags: ClassFlags) {
        self.flags.fetch_and(!flags.bits(), Ordering::AcqRel);
    }

    pub fn is_default(&self) -> bool {
        self.meta
            .peek_default()
            .map_or(false, |default| std::ptr::eq(Arc::as_ptr(&default), self))
    }

    /// Neither a default, an owned class, nor an embedded interface
    pub fn is_floating(&self) -> bool {
        !self.is_owned() && !self.is_interface_impl() && !self.is_default()
    }

    pub fn is_owned(&self) -> bool {
        self.flags().contains(ClassFlags::OWNED)
    }

    pub fn is_in_place(&self) -> bool {
        self.flags().contains(ClassFlags::IN_PLACE)
    }

    pub fn is_interface_impl(&self) -> bool {
        self.flags().contains(ClassFlags::IFACE_IMPL)
    }

    /// Whether this class is of an interface type
    pub fn is_interface(&self) -> bool {
        self.meta.flags().contains(TypeFlags::INTERFACED)
    }

    /// Whether any byte past the header differs from the type's default
    /// class, embedded interfaces included.
    ///
    /// This is a raw byte comparison: two classes holding equal values with
    /// different padding bytes compare as overridden.
    pub fn is_overridden(&self) -> bool {
        let Some(default) = self.meta.peek_default() else {
            return false;
        };
        if std::ptr::eq(Arc::as_ptr(&default), self) {
            return false;
        }
        Self::bytes_differ(self, &default)
    }

    fn bytes_differ(a: &Class, b: &Class) -> bool {
        {
            let a_bytes = a.storage.read();
            let b_bytes = b.storage.read();
            let a_body = a_bytes.public.get(CLASS_HEADER_SIZE..).unwrap_or(&[]);
            let b_body = b_bytes.public.get(CLASS_HEADER_SIZE..).unwrap_or(&[]);
            if a_body != b_body {
                return true;
            }
        }
        let a_ifaces = a.interfaces();
        let b_ifaces = b.interfaces();
        a_ifaces.len() != b_ifaces.len()
            || a_ifaces
                .iter()
                .zip(b_ifaces.iter())
                .any(|(x, y)| Self::bytes_differ(x, y))
    }

    /// The type's default class, without taking a reference
    pub fn default_class(&self) -> Option<Arc<Class>> {
        self.meta.peek_default()
    }

    /// The parent type's default class, without taking a reference
    pub fn super_class(&self) -> Option<Arc<Class>> {
        self.meta.parent().and_then(|parent| parent.peek_default())
    }

    /// Class this interface implementation is embedded in
    pub fn outer_class(&self) -> Option<Arc<Class>> {
        self.outer.as_ref().and_then(|link| link.class.upgrade())
    }

    /// Outermost owner through any chain of embedded interfaces
    pub fn outer_most_class(self: &Arc<Self>) -> Arc<Class> {
        let mut current = self.clone();
        while let Some(outer) = current.outer_class() {
            current = outer;
        }
        current
    }

    /// Signed offset back to the owning class; zero when not embedded
    pub fn outer_offset(&self) -> isize {
        self.outer.as_ref().map_or(0, |link| link.offset)
    }

    /// Directly embedded interface implementation of exactly `ty`
    pub fn interface(&self, ty: Type) -> Option<Arc<Class>> {
        self.interfaces
            .read()
            .iter()
            .find(|iface| iface.class.meta.ty() == ty)
            .map(|iface| iface.class.clone())
    }

    /// Embedded interface implementations in construction order
    pub fn interfaces(&self) -> Vec<Arc<Class>> {
        self.interfaces
            .read()
            .iter()
            .map(|iface| iface.class.clone())
            .collect()
    }

    pub(crate) fn interfaces_at(&self, level: usize) -> Vec<Arc<Class>> {
        self.interfaces
            .read()
            .iter()
            .filter(|iface| iface.level == level)
            .map(|iface| iface.class.clone())
            .collect()
    }

    pub(crate) fn push_interface(&self, iface: EmbeddedInterface) {
        self.interfaces.write().push(iface);
    }

    /// Remove the most recently embedded interface if it belongs to `level`
    pub(crate) fn pop_interface(&self, level: usize) -> Option<EmbeddedInterface> {
        let mut ifaces = self.interfaces.write();
        if ifaces.last().map_or(false, |iface| iface.level == level) {
            ifaces.pop()
        } else {
            None
        }
    }

    /// Offset of an embedded interface's block, if `ty` is embedded directly
    pub fn interface_offset(&self, ty: Type) -> Option<usize> {
        self.interfaces
            .read()
            .iter()
            .find(|iface| iface.class.meta.ty() == ty)
            .map(|iface| iface.offset)
    }

    /// Public block, header bytes included
    pub fn public(&self) -> MappedRwLockReadGuard<'_, [u8]> {
        RwLockReadGuard::map(self.storage.read(), |s| &*s.public)
    }

    pub fn public_mut(&self) -> MappedRwLockWriteGuard<'_, [u8]> {
        RwLockWriteGuard::map(self.storage.write(), |s| &mut *s.public)
    }

    /// Private region declared by ancestor level `ty`
    pub fn private(&self, ty: Type) -> Option<MappedRwLockReadGuard<'_, [u8]>> {
        RwLockReadGuard::try_map(self.storage.read(), |s| s.private(ty)).ok()
    }

    pub fn private_mut(&self, ty: Type) -> Option<MappedRwLockWriteGuard<'_, [u8]>> {
        RwLockWriteGuard::try_map(self.storage.write(), |s| s.private_mut(ty)).ok()
    }

    /// Public size in bytes
    pub fn size(&self) -> usize {
        self.meta.info().class_size
    }

    /// Total private bytes across all levels
    pub fn private_size(&self) -> usize {
        self.meta.class_private_offset().unsigned_abs()
    }

    pub(crate) fn take_storage(&self) -> Storage {
        std::mem::take(&mut *self.storage.write())
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("type", &self.meta.ty())
            .field("name", &self.meta.name())
            .field("flags", &self.flags())
            .field("valid", &self.is_valid())
            .field("outer_offset", &self.outer_offset())
            .finish()
    }
}
