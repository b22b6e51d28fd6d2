//! Registration-time validation
//!
//! Computes the effective flags of a new type and checks its type info
//! against them. Nothing here mutates the registry; a type that fails any
//! check is never committed.

use super::meta::{InterfaceEntry, Layout, MetaClass};
use super::query;
use super::Registry;
use crate::core::{
    TypeFlags, TypeInfo, CLASS_HEADER_SIZE, INSTANCE_HEADER_SIZE, INTERFACE_HEADER_SIZE,
};
use crate::errors::{MetaError, MetaResult};
use std::sync::Arc;

/// Effective flags: inherited root flags, root flags implied by the type
/// info of a fundamental type, and flags implied by other flags.
pub(crate) fn resolve_flags(
    name: &str,
    parent: Option<&Arc<MetaClass>>,
    info: &TypeInfo,
    requested: TypeFlags,
) -> MetaResult<TypeFlags> {
    let mut flags = match parent {
        Some(parent) => {
            if !requested.root().is_empty() {
                return Err(MetaError::invalid_type(format!(
                    "[{name}]: root flags {:?} may only be declared by a fundamental type",
                    requested.root()
                )));
            }
            parent.flags().root() | requested
        }
        None => {
            let mut flags = requested;
            if !info.dependencies.is_empty() {
                flags |= TypeFlags::DEPENDENT;
            }
            if info.class_size > 0 {
                flags |= TypeFlags::CLASSED;
            }
            if info.instance_size > 0 {
                flags |= TypeFlags::INSTANTIABLE;
            }
            flags
        }
    };

    if flags.contains(TypeFlags::CLASS_PREINIT) {
        flags |= TypeFlags::CLASS_PINNED;
    }
    if flags.contains(TypeFlags::INTERFACED) {
        flags |= TypeFlags::CLASSED | TypeFlags::DEPENDENT;
    }
    if flags.contains(TypeFlags::INSTANTIABLE) {
        flags |= TypeFlags::CLASSED;
    }
    if flags.contains(TypeFlags::DEEP_DERIVABLE) {
        flags |= TypeFlags::DERIVABLE;
    }
    Ok(flags)
}

macro_rules! ensure {
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err(MetaError::invalid_type(format!($($arg)*)));
        }
    };
}

/// Validate `info` for a type named `name` with effective `flags`, and
/// resolve its interface map and dependencies against `registry`.
pub(crate) fn validate(
    registry: &Registry,
    name: &str,
    parent: Option<&Arc<MetaClass>>,
    info: &TypeInfo,
    flags: TypeFlags,
) -> MetaResult<Layout> {
    if let Some(parent) = parent {
        let pflags = parent.flags();
        ensure!(
            pflags.contains(TypeFlags::DERIVABLE),
            "[{name}]: parent [{}] is not DERIVABLE",
            parent.name()
        );
        ensure!(
            parent.depth() == 0 || pflags.contains(TypeFlags::DEEP_DERIVABLE),
            "[{name}]: parent [{}] is already derived and not DEEP_DERIVABLE",
            parent.name()
        );
        ensure!(
            !pflags.contains(TypeFlags::FINAL),
            "[{name}]: parent [{}] is FINAL",
            parent.name()
        );
    }

    if flags.contains(TypeFlags::CLASS_PINNED) {
        ensure!(
            flags.contains(TypeFlags::CLASSED),
            "[{name}]: CLASS_PINNED requires a CLASSED type"
        );
    }

    if flags.contains(TypeFlags::CLASSED) {
        ensure!(
            info.class_size >= CLASS_HEADER_SIZE,
            "[{name}]: class size {} is smaller than the class header ({CLASS_HEADER_SIZE})",
            info.class_size
        );
    } else {
        ensure!(
            info.class_size == 0 && info.class_private_size == 0,
            "[{name}]: class data declared on a type that is not CLASSED"
        );
    }

    if flags.contains(TypeFlags::INTERFACED) {
        ensure!(
            !flags.contains(TypeFlags::INSTANTIABLE),
            "[{name}]: an INTERFACED type cannot be INSTANTIABLE"
        );
        ensure!(
            info.class_size >= INTERFACE_HEADER_SIZE,
            "[{name}]: class size {} is smaller than the interface header ({INTERFACE_HEADER_SIZE})",
            info.class_size
        );
    }

    if flags.contains(TypeFlags::INSTANTIABLE) {
        ensure!(
            info.instance_size >= INSTANCE_HEADER_SIZE,
            "[{name}]: instance size {} is smaller than the instance header ({INSTANCE_HEADER_SIZE})",
            info.instance_size
        );
        ensure!(
            flags.contains(TypeFlags::CLASSED),
            "[{name}]: an INSTANTIABLE type must be CLASSED"
        );
    } else {
        ensure!(
            info.instance_size == 0 && info.instance_private_size == 0,
            "[{name}]: instance data declared on a type that is not INSTANTIABLE"
        );
    }

    if let Some(parent) = parent {
        ensure!(
            info.class_size >= parent.info().class_size,
            "[{name}]: class size {} is smaller than parent [{}] ({})",
            info.class_size,
            parent.name(),
            parent.info().class_size
        );
        ensure!(
            info.instance_size >= parent.info().instance_size,
            "[{name}]: instance size {} is smaller than parent [{}] ({})",
            info.instance_size,
            parent.name(),
            parent.info().instance_size
        );
    }

    let (parent_class_offset, parent_instance_offset) =
        parent.map_or((0, 0), |p| (p.class_private_offset(), p.instance_private_offset()));
    let class_private_offset =
        private_offset(parent_class_offset, info.class_private_size).ok_or_else(|| {
            MetaError::invalid_type(format!(
                "[{name}]: class private size {} overflows the private region",
                info.class_private_size
            ))
        })?;
    let instance_private_offset =
        private_offset(parent_instance_offset, info.instance_private_size).ok_or_else(|| {
            MetaError::invalid_type(format!(
                "[{name}]: instance private size {} overflows the private region",
                info.instance_private_size
            ))
        })?;

    let dependencies = validate_dependencies(registry, name, info, flags)?;
    let interfaces = validate_interfaces(registry, name, parent, info, flags)?;

    Ok(Layout {
        flags,
        interfaces,
        dependencies,
        class_private_offset,
        instance_private_offset,
    })
}

/// `parent_offset - size`, or `None` if it leaves the `isize` range
fn private_offset(parent_offset: isize, size: usize) -> Option<isize> {
    isize::try_from(size)
        .ok()
        .and_then(|size| parent_offset.checked_sub(size))
}

fn validate_dependencies(
    registry: &Registry,
    name: &str,
    info: &TypeInfo,
    flags: TypeFlags,
) -> MetaResult<Vec<Arc<MetaClass>>> {
    if info.dependencies.is_empty() {
        return Ok(Vec::new());
    }
    ensure!(
        flags.contains(TypeFlags::DEPENDENT),
        "[{name}]: dependencies declared on a type that is not DEPENDENT"
    );

    let mut primary = 0usize;
    let mut resolved = Vec::with_capacity(info.dependencies.len());
    for (i, dep) in info.dependencies.iter().enumerate() {
        let Some(meta) = registry.lookup(*dep) else {
            return Err(MetaError::invalid_type(format!(
                "[{name}]: DEPENDENCY[{i}] {dep} is not a registered type"
            )));
        };
        if !meta.flags().contains(TypeFlags::DEPENDENT) {
            primary += 1;
        }
        resolved.push(meta);
    }
    ensure!(
        primary <= 1,
        "[{name}]: at most one non-DEPENDENT dependency is allowed, found {primary}"
    );
    Ok(resolved)
}

fn validate_interfaces(
    registry: &Registry,
    name: &str,
    parent: Option<&Arc<MetaClass>>,
    info: &TypeInfo,
    flags: TypeFlags,
) -> MetaResult<Vec<InterfaceEntry>> {
    if info.interfaces.is_empty() {
        return Ok(Vec::new());
    }
    ensure!(
        flags.contains(TypeFlags::CLASSED),
        "[{name}]: interface map declared on a type that is not CLASSED"
    );

    let base_region = parent.map_or(CLASS_HEADER_SIZE, |p| p.info().class_size);

    // Pass 1: each entry on its own
    let mut entries: Vec<InterfaceEntry> = Vec::with_capacity(info.interfaces.len());
    for (i, map) in info.interfaces.iter().enumerate() {
        let Some(iface) = registry.lookup(map.interface) else {
            return Err(MetaError::invalid_type(format!(
                "[{name}]: INTERFACE[{i}] {} is not a registered type",
                map.interface
            )));
        };
        ensure!(
            iface.flags().contains(TypeFlags::INTERFACED),
            "[{name}]: INTERFACE[{i}: {}] is not INTERFACED",
            iface.name()
        );
        ensure!(
            !iface.flags().contains(TypeFlags::UNMAPPABLE),
            "[{name}]: INTERFACE[{i}: {}] is UNMAPPABLE",
            iface.name()
        );
        if let Some(parent) = parent {
            if let Some(shared) = query::common(parent, &iface) {
                return Err(MetaError::invalid_type(format!(
                    "[{name}]: INTERFACE[{i}: {}] forms ambiguous type [{}] with base [{}]",
                    iface.name(),
                    shared.name(),
                    parent.name()
                )));
            }
        }
        let Some(end) = map.offset.checked_add(iface.info().class_size) else {
            return Err(MetaError::invalid_type(format!(
                "[{name}]: INTERFACE[{i}: {}] offset {} overflows the class layout",
                iface.name(),
                map.offset
            )));
        };
        ensure!(
            end <= info.class_size,
            "[{name}]: INTERFACE[{i}: {}] mapped beyond class boundary [{end} > {}]",
            iface.name(),
            info.class_size
        );
        ensure!(
            map.offset >= base_region,
            "[{name}]: INTERFACE[{i}: {}] offset {} maps within the base class region [< {base_region}]",
            iface.name(),
            map.offset
        );
        entries.push(InterfaceEntry {
            meta: iface,
            offset: map.offset,
        });
    }

    // Pass 2: entries relative to each other
    for (i, a) in entries.iter().enumerate() {
        for (j, b) in entries.iter().enumerate().skip(i + 1) {
            if let Some(shared) = query::common(&a.meta, &b.meta) {
                return Err(MetaError::invalid_type(format!(
                    "[{name}]: INTERFACE[{i}: {}] forms ambiguous type [{}] with INTERFACE[{j}: {}]",
                    a.meta.name(),
                    shared.name(),
                    b.meta.name()
                )));
            }
            // offsets were bounded by the class size in pass 1
            let a_end = a.offset + a.meta.info().class_size;
            let b_end = b.offset + b.meta.info().class_size;
            ensure!(
                a_end <= b.offset || b_end <= a.offset,
                "[{name}]: INTERFACE[{i}: {}] data overlaps INTERFACE[{j}: {}]",
                a.meta.name(),
                b.meta.name()
            );
        }
    }

    // Pass 3: interface prerequisites
    for (i, entry) in entries.iter().enumerate() {
        for prereq in entry.meta.dependencies() {
            let by_parent = parent.map_or(false, |p| query::conforms(p, prereq));
            let by_earlier = entries[..i]
                .iter()
                .any(|earlier| query::check(&earlier.meta, prereq));
            ensure!(
                by_parent || by_earlier,
                "[{name}]: INTERFACE[{i}: {}] dependency [{}] is not satisfied",
                entry.meta.name(),
                prereq.name()
            );
        }
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fundamental_flags_implied_from_sizes() {
        let info = TypeInfo::new()
            .with_class_size(CLASS_HEADER_SIZE)
            .with_instance_size(INSTANCE_HEADER_SIZE);
        let flags = resolve_flags("Root", None, &info, TypeFlags::empty()).unwrap();
        assert!(flags.contains(TypeFlags::CLASSED | TypeFlags::INSTANTIABLE));
        assert!(!flags.contains(TypeFlags::DEPENDENT));
    }

    #[test]
    fn implied_flag_chains() {
        let info = TypeInfo::new();
        let flags = resolve_flags(
            "Root",
            None,
            &info,
            TypeFlags::CLASS_PREINIT | TypeFlags::INTERFACED | TypeFlags::DEEP_DERIVABLE,
        )
        .unwrap();
        assert!(flags.contains(TypeFlags::CLASS_PINNED));
        assert!(flags.contains(TypeFlags::CLASSED | TypeFlags::DEPENDENT));
        assert!(flags.contains(TypeFlags::DERIVABLE));
    }

    #[test]
    fn derived_inherits_root_flags_only() {
        let registry = Registry::new().unwrap();
        let parent = registry.meta(crate::core::Type::INSTANCE).unwrap();
        let flags =
            resolve_flags("Child", Some(&parent), &TypeInfo::new(), TypeFlags::ABSTRACT).unwrap();
        assert!(flags.contains(TypeFlags::INSTANTIABLE | TypeFlags::CLASSED));
        assert!(flags.contains(TypeFlags::ABSTRACT));
        assert!(!flags.contains(TypeFlags::BUILTIN));
        assert!(!flags.contains(TypeFlags::CLASS_PREINIT));

        let err = resolve_flags("Child", Some(&parent), &TypeInfo::new(), TypeFlags::CLASSED)
            .unwrap_err();
        assert!(err.to_string().contains("fundamental"));
    }
}
