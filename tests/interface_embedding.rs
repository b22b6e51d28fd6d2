//! Interface embedding and interface casts

use metatype::{
    Class, ClassData, ErrorKind, MetaError, Registry, Type, TypeFlags, TypeInfo,
    CLASS_HEADER_SIZE, INSTANCE_HEADER_SIZE, INTERFACE_HEADER_SIZE,
};
use parking_lot::Mutex;
use std::sync::Arc;

const IFACE_SIZE: usize = INTERFACE_HEADER_SIZE + 8;

struct Fixture {
    registry: Registry,
    readable: Type,
    writable: Type,
    stream: Type,
}

fn interface(registry: &Registry, name: &str, info: TypeInfo) -> Type {
    registry
        .register(name, Type::INTERFACE, info, TypeFlags::empty())
        .expect("register interface")
}

/// `Stream` maps `Readable` then `Writable` back to back after its header
fn fixture() -> Fixture {
    let registry = Registry::new().unwrap();
    let readable = interface(&registry, "Readable", TypeInfo::new().with_class_size(IFACE_SIZE));
    let writable = interface(&registry, "Writable", TypeInfo::new().with_class_size(IFACE_SIZE));
    let stream = registry
        .register(
            "Stream",
            Type::INSTANCE,
            TypeInfo::new()
                .with_class_size(CLASS_HEADER_SIZE + 2 * IFACE_SIZE)
                .with_instance_size(INSTANCE_HEADER_SIZE)
                .with_interface(readable, CLASS_HEADER_SIZE)
                .with_interface(writable, CLASS_HEADER_SIZE + IFACE_SIZE),
            TypeFlags::empty(),
        )
        .unwrap();
    Fixture {
        registry,
        readable,
        writable,
        stream,
    }
}

#[test]
fn test_interfaces_embedded_in_map_order() {
    let f = fixture();
    let class = f.registry.ref_default(f.stream).unwrap();

    let embedded = class.interfaces();
    assert_eq!(embedded.len(), 2);
    assert_eq!(embedded[0].type_of(), f.readable);
    assert_eq!(embedded[1].type_of(), f.writable);
    assert_eq!(class.interface_offset(f.readable), Some(CLASS_HEADER_SIZE));
    assert_eq!(
        class.interface_offset(f.writable),
        Some(CLASS_HEADER_SIZE + IFACE_SIZE)
    );

    for iface in &embedded {
        assert!(iface.is_interface_impl());
        assert!(iface.is_interface());
        assert!(!iface.is_default());
        assert!(!iface.is_floating());
        assert!(Arc::ptr_eq(&iface.outer_most_class(), &class));
    }
    assert_eq!(f.registry.class_ref_count(f.readable), 1);
    assert_eq!(f.registry.class_ref_count(f.writable), 1);

    f.registry.unref_default(&class).unwrap();
    assert_eq!(f.registry.class_ref_count(f.readable), 0);
    assert!(embedded.iter().all(|iface| !iface.is_valid()));
}

#[test]
fn test_cast_to_interface_and_back() {
    let f = fixture();
    let class = f.registry.ref_default(f.stream).unwrap();

    let readable = f.registry.class_cast(&class, f.readable).unwrap();
    assert!(readable.is_interface_impl());
    assert!(Arc::ptr_eq(&readable.outer_class().unwrap(), &class));

    // back out to the owner, then across to a sibling interface
    let owner = f.registry.class_cast(&readable, f.stream).unwrap();
    assert!(Arc::ptr_eq(&owner, &class));
    let writable = f.registry.class_cast(&readable, f.writable).unwrap();
    assert_eq!(writable.type_of(), f.writable);
    assert!(Arc::ptr_eq(&writable.outer_class().unwrap(), &class));

    // the interface root is unmappable and never a cast target
    assert!(f.registry.class_try(&class, Type::INTERFACE).is_none());
    assert!(f.registry.class_check(&readable, Type::INTERFACE));

    f.registry.unref_default(&class).unwrap();
}

#[test]
fn test_inherited_interfaces_cast_from_derived() {
    let f = fixture();
    let file = f
        .registry
        .register(
            "File",
            f.stream,
            TypeInfo::new()
                .with_class_size(CLASS_HEADER_SIZE + 2 * IFACE_SIZE + 8)
                .with_instance_size(INSTANCE_HEADER_SIZE),
            TypeFlags::empty(),
        )
        .unwrap();

    assert!(f.registry.maps(file, f.writable));
    assert!(f.registry.check(file, f.readable));

    let class = f.registry.ref_default(file).unwrap();
    assert_eq!(class.interfaces().len(), 2);
    let writable = f.registry.class_cast(&class, f.writable).unwrap();
    assert!(Arc::ptr_eq(&writable.outer_class().unwrap(), &class));

    // the parent's default embeds its own copies
    let parent = class.super_class().unwrap();
    let parent_writable = parent.interface(f.writable).unwrap();
    assert!(!Arc::ptr_eq(&parent_writable, &writable));
    assert_eq!(f.registry.class_ref_count(f.writable), 1 + 1);

    f.registry.unref_default(&class).unwrap();
}

#[test]
fn test_interface_init_sees_owner() {
    let registry = Registry::new().unwrap();
    let seen: Arc<Mutex<Vec<bool>>> = Arc::default();
    let record = seen.clone();
    let observer = interface(
        &registry,
        "Observer",
        TypeInfo::new()
            .with_class_size(IFACE_SIZE)
            .with_class_init(move |class: &Class, _: Option<&ClassData>| {
                record.lock().push(class.outer_class().is_some());
                Ok(())
            }),
    );
    let subject = registry
        .register(
            "Subject",
            Type::INSTANCE,
            TypeInfo::new()
                .with_class_size(CLASS_HEADER_SIZE + IFACE_SIZE)
                .with_instance_size(INSTANCE_HEADER_SIZE)
                .with_interface(observer, CLASS_HEADER_SIZE),
            TypeFlags::empty(),
        )
        .unwrap();

    let class = registry.ref_default(subject).unwrap();
    // the interface's own default first, then the embedded implementation
    assert_eq!(*seen.lock(), vec![false, true]);
    registry.unref_default(&class).unwrap();
}

#[test]
fn test_failing_interface_unwinds_owner() {
    let registry = Registry::new().unwrap();
    let fragile = interface(
        &registry,
        "Fragile",
        TypeInfo::new()
            .with_class_size(IFACE_SIZE)
            .with_class_init(|class: &Class, _: Option<&ClassData>| {
                if class.is_interface_impl() {
                    Err(MetaError::invalid_operation("cannot embed"))
                } else {
                    Ok(())
                }
            }),
    );
    let steady = interface(&registry, "Steady", TypeInfo::new().with_class_size(IFACE_SIZE));
    let owner = registry
        .register(
            "Owner",
            Type::INSTANCE,
            TypeInfo::new()
                .with_class_size(CLASS_HEADER_SIZE + 2 * IFACE_SIZE)
                .with_instance_size(INSTANCE_HEADER_SIZE)
                .with_interface(steady, CLASS_HEADER_SIZE)
                .with_interface(fragile, CLASS_HEADER_SIZE + IFACE_SIZE),
            TypeFlags::empty(),
        )
        .unwrap();

    let err = registry.ref_default(owner).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    assert_eq!(registry.class_ref_count(owner), 0);
    assert_eq!(registry.class_ref_count(steady), 0);
    assert_eq!(registry.class_ref_count(fragile), 0);
    assert_eq!(registry.class_ref_count(Type::INSTANCE), 1);
}

#[test]
fn test_override_detected_inside_interface() {
    let f = fixture();
    let default = f.registry.ref_default(f.stream).unwrap();
    let floating = f.registry.create_floating(f.stream).unwrap();
    assert!(!floating.is_overridden());

    let readable = floating.interface(f.readable).unwrap();
    readable.public_mut()[INTERFACE_HEADER_SIZE] = 0x5A;
    assert!(readable.is_overridden());
    assert!(floating.is_overridden());

    f.registry.destroy_floating(&floating).unwrap();
    assert!(!readable.is_valid());
    assert_eq!(f.registry.class_ref_count(f.readable), 1);
    f.registry.unref_default(&default).unwrap();
}

#[test]
fn test_embedded_interface_cannot_be_torn_down_alone() {
    let f = fixture();
    let class = f.registry.ref_default(f.stream).unwrap();
    let readable = class.interface(f.readable).unwrap();

    let err = f.registry.destroy_floating(&readable).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    assert!(readable.is_valid());
    f.registry.unref_default(&class).unwrap();
}
