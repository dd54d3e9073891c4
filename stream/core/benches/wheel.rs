use criterion::{black_box, criterion_group, criterion_main, Criterion};
use flow::rand::Rand;
use streamcore::event::{EventBody, OrderEvent};
use streamcore::wheel::TimeWheel;

fn event(time: f64) -> Box<OrderEvent> {
    Box::new(OrderEvent::new(
        time,
        None,
        0,
        100,
        50,
        EventBody::Cancel { shares: 100 },
    ))
}

fn bench_insert_drain(c: &mut Criterion) {
    c.bench_function("wheel schedule and drain 10k events", |b| {
        let (mut rand, _) = Rand::from_seed(Some(3));
        let times: Vec<f64> = (0..10_000).map(|_| 10.0 * rand.uniform_open()).collect();
        b.iter(|| {
            let mut wheel = TimeWheel::with_run_time(10);
            for &t in &times {
                wheel.insert(event(t));
            }
            let mut count = 0usize;
            wheel.drain_all(&mut |ev| {
                black_box(&ev);
                count += 1;
            });
            assert_eq!(count, times.len());
        });
    });
}

fn bench_tail_insert(c: &mut Criterion) {
    c.bench_function("wheel near-tail insert", |b| {
        let (mut rand, _) = Rand::from_seed(Some(4));
        b.iter_with_setup(
            || {
                let mut wheel = TimeWheel::with_run_time(10);
                let mut t = 0.0;
                for _ in 0..1000 {
                    t += rand.exp_by_rate(1000.0);
                    wheel.insert(event(t));
                }
                (wheel, t)
            },
            |(mut wheel, t)| {
                wheel.insert(event(t + 0.001));
                black_box(wheel.len());
            },
        );
    });
}

criterion_group!(benches, bench_insert_drain, bench_tail_insert);
criterion_main!(benches);
