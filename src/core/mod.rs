//! Core handles and descriptors
//!
//! Type handles, flag sets, type info and the name interner used
//! throughout the registry and object model.

pub mod flags;
pub mod intern;
pub mod types;

pub use flags::{ClassFlags, TypeFlags};
pub use intern::Quark;
pub use types::{
    ClassData, ClassFinalFn, ClassInitFn, InstanceInitFn, InterfaceImpl, Type, TypeInfo,
    CLASS_HEADER_SIZE, INSTANCE_HEADER_SIZE, INTERFACE_HEADER_SIZE,
};
