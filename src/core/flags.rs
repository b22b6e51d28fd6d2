//! Type and class flag sets
//!
//! Root flags describe the capabilities of a fundamental type and are
//! inherited by every type derived from it. The remaining type flags are
//! declared per type.

use bitflags::bitflags;

bitflags! {
    /// Capability and behaviour flags of a registered type.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TypeFlags: u32 {
        /// The type may declare dependencies (prerequisite types).
        const DEPENDENT       = 1 << 0;
        /// The type has class data.
        const CLASSED         = 1 << 1;
        /// The type's class can be embedded into other classes.
        const INTERFACED      = 1 << 2;
        /// The type can create instances.
        const INSTANTIABLE    = 1 << 3;
        /// The type can be derived from once.
        const DERIVABLE       = 1 << 4;
        /// Derived types can be derived from again.
        const DEEP_DERIVABLE  = 1 << 5;

        /// Registered during bootstrap.
        const BUILTIN         = 1 << 6;
        /// The type info is borrowed for the life of the process.
        const TYPEINFO_STATIC = 1 << 7;
        /// The default class is never destroyed at refcount zero.
        const CLASS_PINNED    = 1 << 8;
        /// The default class is created at registration.
        const CLASS_PREINIT   = 1 << 9;
        /// The type can never appear in an interface map.
        const UNMAPPABLE      = 1 << 10;
        /// Reserved for types still being described.
        const INCOMPLETE      = 1 << 11;
        /// The type cannot be instantiated directly.
        const ABSTRACT        = 1 << 12;
        /// The type cannot be derived from.
        const FINAL           = 1 << 13;

        const ROOT_MASK = Self::DEPENDENT.bits()
            | Self::CLASSED.bits()
            | Self::INTERFACED.bits()
            | Self::INSTANTIABLE.bits()
            | Self::DERIVABLE.bits()
            | Self::DEEP_DERIVABLE.bits();
    }
}

impl TypeFlags {
    /// Root flags only.
    #[inline]
    pub fn root(self) -> Self {
        self & Self::ROOT_MASK
    }

    /// Per-type flags only.
    #[inline]
    pub fn local(self) -> Self {
        self - Self::ROOT_MASK
    }
}

bitflags! {
    /// Per-class state flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ClassFlags: u8 {
        /// Lifetime is bound to an instance.
        const OWNED      = 1 << 0;
        /// Storage was supplied by the caller.
        const IN_PLACE   = 1 << 1;
        /// Embedded inside another class as an interface implementation.
        const IFACE_IMPL = 1 << 2;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_and_local_split() {
        let flags = TypeFlags::CLASSED | TypeFlags::FINAL | TypeFlags::DERIVABLE;
        assert_eq!(flags.root(), TypeFlags::CLASSED | TypeFlags::DERIVABLE);
        assert_eq!(flags.local(), TypeFlags::FINAL);
    }

    #[test]
    fn root_mask_covers_low_bits() {
        assert_eq!(TypeFlags::ROOT_MASK.bits(), 0b11_1111);
        assert!(!TypeFlags::ROOT_MASK.intersects(TypeFlags::BUILTIN));
    }
}
