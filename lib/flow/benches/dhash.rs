use criterion::{black_box, criterion_group, criterion_main, Criterion};
use flow::dhash::{DHashTable, DEF_POLY, DEF_WIDTH};
use flow::rand::Rand;

fn bench_add_find_delete(c: &mut Criterion) {
    c.bench_function("dhash add/find/delete cycle", |b| {
        let mut dhash = DHashTable::new(DEF_WIDTH, &DEF_POLY);
        let (mut rand, _) = Rand::from_seed(Some(1));
        b.iter(|| {
            let key = rand.uint32();
            if dhash.add(black_box(key)).is_ok() {
                black_box(dhash.find(key));
                dhash.delete(key);
            }
        });
    });
}

fn bench_add_at_load(c: &mut Criterion) {
    c.bench_function("dhash add at 50% load", |b| {
        let mut dhash = DHashTable::new(DEF_WIDTH, &DEF_POLY);
        let (mut rand, _) = Rand::from_seed(Some(2));
        let target = dhash.capacity() / 2;
        while dhash.len() < target {
            let _ = dhash.add(rand.uint32());
        }
        b.iter(|| {
            let key = rand.uint32();
            if dhash.add(black_box(key)).is_ok() {
                dhash.delete(key);
            }
        });
    });
}

criterion_group!(benches, bench_add_find_delete, bench_add_at_load);
criterion_main!(benches);
