//! Dynamic meta-type runtime
//!
//! A registry of types supporting single inheritance, interface
//! composition, shared per-type class data, per-object instance data,
//! reference-counted class lifetimes and checked casting.
//!
//! ```ignore
//! use metatype::{Registry, Type, TypeFlags, TypeInfo};
//!
//! let registry = Registry::new()?;
//! let widget = registry.register(
//!     "Widget",
//!     Type::INSTANCE,
//!     TypeInfo::new().with_class_size(32).with_instance_size(16),
//!     TypeFlags::empty(),
//! )?;
//! let instance = registry.create_instance(widget)?;
//! assert!(registry.instance_check(&instance, Type::INSTANCE));
//! registry.destroy_instance(instance)?;
//! ```

pub mod allocator;
pub mod class;
pub mod config;
pub mod core;
pub mod errors;
pub mod instance;
pub mod logging;
pub mod registry;

// Re-export commonly used items
pub use allocator::{Allocator, AllocatorStats, Block, HeapAllocator};
pub use class::Class;
pub use config::{ConfigError, LogFormat, LoggingConfig, RegistryConfig};
pub use crate::core::{
    ClassData, ClassFlags, InterfaceImpl, Quark, Type, TypeFlags, TypeInfo, CLASS_HEADER_SIZE,
    INSTANCE_HEADER_SIZE, INTERFACE_HEADER_SIZE,
};
pub use errors::{ErrorKind, MetaError, MetaResult};
pub use instance::Instance;
pub use registry::{BootstrapPhase, Extension, MetaClass, Registry};
