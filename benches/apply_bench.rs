//! Benchmarks for the apply/ITE kernel: building a parity function
//! (worst case for hash-consing sharing without reordering) and a
//! bit-vector adder (the classic case sifting is supposed to help
//! with), plus the raw cost of a sifting pass.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use robdd::Manager;

fn build_parity(m: &Manager, n: usize) {
    let names: Vec<String> = (0..n).map(|i| format!("x{i}")).collect();
    let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let vars = m.declare(&name_refs).unwrap();
    let mut f = m.falsy();
    for v in vars {
        let lit = m.var(v).unwrap();
        f = m.xor(&f, &lit).unwrap();
    }
    black_box(f);
}

fn bench_parity(c: &mut Criterion) {
    let mut group = c.benchmark_group("parity");
    for n in [8usize, 16, 24] {
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("build", n), &n, |b, &n| {
            b.iter(|| {
                let m = Manager::new();
                build_parity(&m, n);
            });
        });
    }
    group.finish();
}

/// Builds a ripple-carry adder's sum and carry-out bits, the
/// textbook example where a bad initial variable interleaving blows
/// up node count and sifting recovers it.
fn build_adder(m: &Manager, bits: usize) {
    let mut names = Vec::with_capacity(bits * 2);
    for i in 0..bits {
        names.push(format!("a{i}"));
        names.push(format!("b{i}"));
    }
    let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let vars = m.declare(&name_refs).unwrap();

    let mut carry = m.falsy();
    for i in 0..bits {
        let a = m.var(vars[2 * i]).unwrap();
        let b = m.var(vars[2 * i + 1]).unwrap();
        let a_xor_b = m.xor(&a, &b).unwrap();
        let sum = m.xor(&a_xor_b, &carry).unwrap();
        let carry_a_b = m.and(&a, &b).unwrap();
        let carry_ab_c = m.and(&a_xor_b, &carry).unwrap();
        carry = m.or(&carry_a_b, &carry_ab_c).unwrap();
        black_box(sum);
    }
    black_box(carry);
}

fn bench_adder(c: &mut Criterion) {
    let mut group = c.benchmark_group("adder");
    for bits in [4usize, 8, 12] {
        group.throughput(Throughput::Elements(bits as u64));
        group.bench_with_input(BenchmarkId::new("build", bits), &bits, |b, &bits| {
            b.iter(|| {
                let m = Manager::new();
                build_adder(&m, bits);
            });
        });
    }
    group.finish();
}

fn bench_sifting(c: &mut Criterion) {
    let mut group = c.benchmark_group("sifting");
    group.bench_function("adder_16_bit_reorder_pass", |b| {
        b.iter_with_setup(
            || {
                let m = Manager::new();
                build_adder(&m, 16);
                m
            },
            |m| {
                m.reorder();
                black_box(m.statistics().n_nodes);
            },
        );
    });
    group.finish();
}

criterion_group!(benches, bench_parity, bench_adder, bench_sifting);
criterion_main!(benches);
