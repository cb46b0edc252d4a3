use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use tessel_obj_model::{HandleTable, HeapLayout, HeapValue};

#[derive(Clone)]
enum Val {
    Undefined,
    Null,
    Bool(bool),
    Int(u64),
}

impl HeapValue for Val {
    fn undefined() -> Self {
        Val::Undefined
    }

    fn null() -> Self {
        Val::Null
    }

    fn boolean(value: bool) -> Self {
        Val::Bool(value)
    }
}

fn bench_allocate_get_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("handle_table");
    for size in [1024usize, 8192, 65536] {
        group.bench_with_input(
            BenchmarkId::new("allocate_get_release", size),
            &size,
            |b, &size| {
                let mut heap: HandleTable<Val> = HandleTable::new(HeapLayout::default());
                let mut handles = Vec::with_capacity(size);
                b.iter(|| {
                    for i in 0..size {
                        let handle = heap.allocate(Val::Int(i as u64));
                        black_box(heap.get(handle));
                        handles.push(handle);
                    }
                    for handle in handles.drain(..) {
                        heap.release(handle);
                    }
                });
            },
        );
    }
    group.finish();
}

fn bench_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("handle_table");
    for live in [16usize, 1024] {
        group.bench_with_input(BenchmarkId::new("take_churn", live), &live, |b, &live| {
            let mut heap: HandleTable<Val> = HandleTable::new(HeapLayout::default());
            let mut handles: Vec<_> = (0..live).map(|i| heap.allocate(Val::Int(i as u64))).collect();
            b.iter(|| {
                for slot in handles.iter_mut() {
                    let value = heap.take(*slot);
                    *slot = heap.allocate(black_box(value));
                }
            });
        });
    }
    group.finish();
}

criterion_group!(handle_table_benches, bench_allocate_get_release, bench_churn);
criterion_main!(handle_table_benches);
