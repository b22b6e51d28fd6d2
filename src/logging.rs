//! Logging utilities for the meta-type runtime
//!
//! Structured `tracing` events for registration, class and instance
//! lifecycles and allocation. Events carry explicit targets so they can be
//! filtered per subsystem (`registry`, `class`, `instance`, `allocator`).

// Re-export tracing macros for use throughout the crate
pub use tracing::{debug, error, info, trace, warn};

use crate::config::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// Event targets used by this crate
pub const TARGETS: [&str; 4] = ["registry", "class", "instance", "allocator"];

/// Install a fmt subscriber according to `config`
///
/// `RUST_LOG` takes precedence over the configured level. Calling this
/// more than once is harmless; only the first subscriber is installed.
pub fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::fmt;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| config_filter(config));

    let builder = fmt().with_env_filter(filter);
    let _ = match config.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

/// Filter enabling every crate target at the configured level
pub fn config_filter(config: &LoggingConfig) -> EnvFilter {
    let directives: Vec<String> = TARGETS
        .iter()
        .map(|target| format!("{target}={}", config.level))
        .collect();
    EnvFilter::new(directives.join(","))
}

/// Log an allocation event
#[inline]
pub fn log_allocation(size: usize, tag: &str) {
    trace!(target: "allocator", size, tag, "allocated block");
}

/// Log a deallocation event
#[inline]
pub fn log_deallocation(size: usize, tag: &str) {
    trace!(target: "allocator", size, tag, "freed block");
}

#[inline]
pub fn log_allocation_failure(size: usize, tag: &str) {
    warn!(target: "allocator", size, tag, "allocation failed");
}

/// Log a successful type registration
#[inline]
pub fn log_type_registered(name: &str, parent: &str, depth: usize) {
    info!(target: "registry", name, parent, depth, "registered type");
}

#[inline]
pub fn log_type_unregistered(name: &str) {
    info!(target: "registry", name, "unregistered type");
}

/// Log a rejected registration
#[inline]
pub fn log_registration_failed(name: &str, error: &str) {
    debug!(target: "registry", name, error, "registration rejected");
}

/// Log a type's layout (enabled by `log_type_info`)
#[inline]
#[allow(clippy::too_many_arguments)]
pub fn log_type_layout(
    name: &str,
    flags: &str,
    class_size: usize,
    class_private_offset: isize,
    instance_size: usize,
    instance_private_offset: isize,
    interfaces: usize,
    dependencies: usize,
) {
    debug!(
        target: "registry",
        name,
        flags,
        class_size,
        class_private_offset,
        instance_size,
        instance_private_offset,
        interfaces,
        dependencies,
        "type layout"
    );
}

/// Log a type torn down while still referenced
#[inline]
pub fn log_live_references(name: &str, class_refs: i16, instance_refs: i16) {
    warn!(
        target: "registry",
        name,
        class_refs,
        instance_refs,
        "type still has live references"
    );
}

/// Log creation of a type's default class
#[inline]
pub fn log_default_created(name: &str) {
    debug!(target: "class", name, "created default class");
}

#[inline]
pub fn log_default_destroyed(name: &str) {
    debug!(target: "class", name, "destroyed default class");
}

/// Log a pinned class kept alive at refcount zero
#[inline]
pub fn log_default_retained(name: &str) {
    debug!(target: "class", name, "retaining pinned default class");
}

#[inline]
pub fn log_floating_created(name: &str, in_place: bool) {
    trace!(target: "class", name, in_place, "created floating class");
}

/// Log a failed construct/destruct step before unwinding
#[inline]
pub fn log_class_step_failed(name: &str, level: &str, error: &str) {
    error!(target: "class", name, level, error, "class lifecycle step failed");
}

#[inline]
pub fn log_cast_failed(from: &str, to: &str) {
    trace!(target: "class", from, to, "cast failed");
}

/// Log an instance creation
#[inline]
pub fn log_instance_created(name: &str, size: usize, in_place: bool) {
    trace!(target: "instance", name, size, in_place, "created instance");
}

#[inline]
pub fn log_instance_destroyed(name: &str) {
    trace!(target: "instance", name, "destroyed instance");
}

#[inline]
pub fn log_instance_leaked(name: &str) {
    warn!(target: "instance", name, "instance dropped without being destroyed");
}
