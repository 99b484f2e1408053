//! Capture and diff benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use census::subjects::{Employee, Employees};
use census::{InProcessProbe, MemoryProbe, Snapshot};

fn benchmark_capture(c: &mut Criterion) {
    let employees: Vec<Employee> = (0..1_000).map(|_| Employee::new()).collect();

    c.bench_function("capture_1000_live", |b| {
        b.iter(|| black_box(Snapshot::capture()));
    });

    drop(employees);
}

fn benchmark_diff(c: &mut Criterion) {
    let probe = InProcessProbe::collecting_allocations();
    let mut employees: Vec<Employee> = (0..1_000).map(|_| Employee::new()).collect();
    let before = probe.capture();
    employees.truncate(500);
    employees.extend((0..500).map(|_| Employee::new()));
    let after = probe.capture();

    c.bench_function("diff_1000_half_replaced", |b| {
        b.iter(|| black_box(probe.diff(&before, &after)));
    });
}

fn benchmark_wasteful(c: &mut Criterion) {
    let employees = Employees::new();
    c.bench_function("wasteful_100", |b| {
        b.iter(|| employees.wasteful(black_box(100)));
    });
}

criterion_group!(benches, benchmark_capture, benchmark_diff, benchmark_wasteful);
criterion_main!(benches);
