//! Benchmarks for rule compilation
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use logroute_rs::pipeline::{
    CompiledTree, ExprFlags, ExprNode, ObjectRegistry, Stage, StageHandle,
};

#[derive(Clone)]
struct Bench {
    label: String,
}

impl Stage for Bench {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn clone_stage(&self) -> Option<Box<dyn Stage>> {
        Some(Box::new(self.clone()))
    }
}

fn pipe(label: String) -> ExprNode {
    ExprNode::pipe(StageHandle::new(Bench { label }), None)
}

/// `rules` rules, each passing through a shared filter
/// into one of `rules` destinations.
fn wide_registry(rules: usize) -> ObjectRegistry {
    let mut registry = ObjectRegistry::new();
    let _ = registry.register(ExprNode::filter("f", vec![pipe("f".into())], None));
    for i in 0..rules {
        let name = format!("d{i}");
        let _ = registry.register(ExprNode::destination(&name, vec![pipe(name.clone())], None));
        let _ = registry.register(ExprNode::log(
            vec![
                ExprNode::filter_reference("f", None),
                ExprNode::destination_reference(&name, None),
            ],
            ExprFlags::empty(),
            None,
        ));
    }
    registry
}

/// One rule with a junction of `branches` parallel filter chains.
fn junction_registry(branches: usize) -> ObjectRegistry {
    let mut registry = ObjectRegistry::new();
    let children = (0..branches)
        .map(|i| {
            ExprNode::sequence(
                vec![pipe(format!("a{i}")), pipe(format!("b{i}"))],
                None,
            )
        })
        .collect();
    let _ = registry.register(ExprNode::log(
        vec![ExprNode::junction(children, None)],
        ExprFlags::empty(),
        None,
    ));
    registry
}

fn bench_wide_rules(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile_wide_rules");

    for size in [10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter_with_large_drop(|| {
                let mut tree = CompiledTree::new(wide_registry(size));
                tree.compile().ok();
                black_box(tree)
            });
        });
    }

    group.finish();
}

fn bench_junction(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile_junction");

    for size in [8, 64, 512].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter_with_large_drop(|| {
                let mut tree = CompiledTree::new(junction_registry(size));
                tree.compile().ok();
                black_box(tree)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_wide_rules, bench_junction);
criterion_main!(benches);
