//! Type check and cast benchmarks
//!
//! Measures predicate and cast cost against hierarchy depth and interface
//! fan-out.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use metatype::{
    Quark, Registry, Type, TypeFlags, TypeInfo, CLASS_HEADER_SIZE, INSTANCE_HEADER_SIZE,
    INTERFACE_HEADER_SIZE,
};

fn object_info(class_size: usize) -> TypeInfo {
    TypeInfo::new()
        .with_class_size(class_size)
        .with_instance_size(INSTANCE_HEADER_SIZE)
}

/// Linear chain of `depth` types below `Instance`; returns the leaf
fn build_chain(registry: &Registry, depth: usize) -> Type {
    let mut parent = Type::INSTANCE;
    for i in 0..depth {
        let name = format!("Depth{i}");
        parent = registry
            .register(&name, parent, object_info(CLASS_HEADER_SIZE), TypeFlags::empty())
            .unwrap();
    }
    parent
}

/// Type mapping `count` interfaces side by side; returns it and its last interface
fn build_fanout(registry: &Registry, count: usize) -> (Type, Type) {
    let mut info = object_info(CLASS_HEADER_SIZE + count * INTERFACE_HEADER_SIZE);
    let mut last = Type::INVALID;
    for i in 0..count {
        last = registry
            .register(
                &format!("Facet{i}"),
                Type::INTERFACE,
                TypeInfo::new().with_class_size(INTERFACE_HEADER_SIZE),
                TypeFlags::empty(),
            )
            .unwrap();
        info = info.with_interface(last, CLASS_HEADER_SIZE + i * INTERFACE_HEADER_SIZE);
    }
    let ty = registry
        .register("Faceted", Type::INSTANCE, info, TypeFlags::empty())
        .unwrap();
    (ty, last)
}

fn bench_type_checks(c: &mut Criterion) {
    let mut group = c.benchmark_group("check");

    for depth in [1, 4, 16, 64].iter() {
        let registry = Registry::new().unwrap();
        let leaf = build_chain(&registry, *depth);

        group.bench_with_input(BenchmarkId::new("to_root", depth), depth, |b, _| {
            b.iter(|| black_box(registry.check(black_box(leaf), Type::INSTANCE)));
        });
        group.bench_with_input(BenchmarkId::new("miss", depth), depth, |b, _| {
            b.iter(|| black_box(registry.check(black_box(leaf), Type::STATIC_CLASS)));
        });
    }

    group.finish();
}

fn bench_class_casts(c: &mut Criterion) {
    let mut group = c.benchmark_group("class_cast");

    for depth in [1, 4, 16].iter() {
        let registry = Registry::new().unwrap();
        let leaf = build_chain(&registry, *depth);
        let class = registry.ref_default(leaf).unwrap();

        group.bench_with_input(BenchmarkId::new("upcast", depth), depth, |b, _| {
            b.iter(|| black_box(registry.class_try(&class, Type::INSTANCE)));
        });
        registry.unref_default(&class).unwrap();
    }

    for count in [1, 4, 16].iter() {
        let registry = Registry::new().unwrap();
        let (ty, last) = build_fanout(&registry, *count);
        let class = registry.ref_default(ty).unwrap();

        group.bench_with_input(BenchmarkId::new("to_interface", count), count, |b, _| {
            b.iter(|| black_box(registry.class_try(&class, black_box(last))));
        });

        let facet = registry.class_try(&class, last).unwrap();
        group.bench_with_input(BenchmarkId::new("interface_to_owner", count), count, |b, _| {
            b.iter(|| black_box(registry.class_try(&facet, ty)));
        });
        registry.unref_default(&class).unwrap();
    }

    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup");
    let registry = Registry::new().unwrap();
    build_chain(&registry, 64);

    group.bench_function("find_by_name", |b| {
        b.iter(|| black_box(registry.find(black_box("Depth32"))));
    });

    let quark = Quark::from_str("Depth32");
    group.bench_function("find_by_quark", |b| {
        b.iter(|| black_box(registry.find_quark(black_box(quark))));
    });

    group.finish();
}

criterion_group!(benches, bench_type_checks, bench_class_casts, bench_lookup);
criterion_main!(benches);
