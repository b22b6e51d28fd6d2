//! Class and instance lifecycle benchmarks
//!
//! Measures registration, default class churn and instance creation.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use metatype::{Registry, Type, TypeFlags, TypeInfo, CLASS_HEADER_SIZE, INSTANCE_HEADER_SIZE};

fn object_info() -> TypeInfo {
    TypeInfo::new()
        .with_class_size(CLASS_HEADER_SIZE + 32)
        .with_instance_size(INSTANCE_HEADER_SIZE + 32)
}

fn bench_registration(c: &mut Criterion) {
    let mut group = c.benchmark_group("register");

    for count in [16, 128].iter() {
        let names: Vec<String> = (0..*count).map(|i| format!("Bench{i}")).collect();
        group.bench_with_input(BenchmarkId::new("flat", count), count, |b, _| {
            b.iter(|| {
                let registry = Registry::new().unwrap();
                for name in &names {
                    black_box(
                        registry
                            .register(name, Type::INSTANCE, object_info(), TypeFlags::empty())
                            .unwrap(),
                    );
                }
            });
        });
    }

    group.finish();
}

fn bench_default_classes(c: &mut Criterion) {
    let mut group = c.benchmark_group("default_class");
    let registry = Registry::new().unwrap();
    let ty = registry
        .register("Churn", Type::INSTANCE, object_info(), TypeFlags::empty())
        .unwrap();

    // refcount reaches zero every iteration, so the class is rebuilt each time
    group.bench_function("create_destroy", |b| {
        b.iter(|| {
            let class = registry.ref_default(ty).unwrap();
            registry.unref_default(black_box(&class)).unwrap();
        });
    });

    let held = registry.ref_default(ty).unwrap();
    group.bench_function("ref_unref_shared", |b| {
        b.iter(|| {
            let class = registry.ref_default(ty).unwrap();
            registry.unref_default(black_box(&class)).unwrap();
        });
    });
    registry.unref_default(&held).unwrap();

    group.bench_function("floating", |b| {
        b.iter(|| {
            let class = registry.create_floating(ty).unwrap();
            registry.destroy_floating(black_box(&class)).unwrap();
        });
    });

    group.finish();
}

fn bench_instances(c: &mut Criterion) {
    let mut group = c.benchmark_group("instance");
    let registry = Registry::new().unwrap();
    let plain = registry
        .register("Plain", Type::INSTANCE, object_info(), TypeFlags::empty())
        .unwrap();
    let private = registry
        .register(
            "Private",
            Type::INSTANCE,
            object_info().with_instance_private_size(16),
            TypeFlags::empty(),
        )
        .unwrap();

    // keep the defaults alive so only instance storage is measured
    let anchors = [
        registry.ref_default(plain).unwrap(),
        registry.ref_default(private).unwrap(),
    ];

    group.bench_function("heap", |b| {
        b.iter(|| {
            let instance = registry.create_instance(plain).unwrap();
            registry.destroy_instance(black_box(instance)).unwrap();
        });
    });

    group.bench_function("heap_private", |b| {
        b.iter(|| {
            let instance = registry.create_instance(private).unwrap();
            registry.destroy_instance(black_box(instance)).unwrap();
        });
    });

    group.bench_function("in_place", |b| {
        let mut storage = Some(vec![0u8; INSTANCE_HEADER_SIZE + 32].into_boxed_slice());
        b.iter(|| {
            let block = storage.take().unwrap();
            let instance = registry.construct_instance(plain, block, None).unwrap();
            storage = Some(registry.destruct_instance(black_box(instance)).unwrap());
        });
    });

    for class in &anchors {
        registry.unref_default(class).unwrap();
    }
    group.finish();
}

criterion_group!(benches, bench_registration, bench_default_classes, bench_instances);
criterion_main!(benches);
