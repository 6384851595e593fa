/* Cost of one arbitration decision, autonomous and under override, for the proportional
servo law and the bistable stepper law. */
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use lightloop::actuation::controller::ControlArbiter;
use lightloop::link::mailbox::RemoteEvent;
use lightloop::sensing::sensor::SensorReading;
use lightloop::utils::config::ControllerConfig;

fn arbiter_bench(c: &mut Criterion) {
    let mut servo = ControlArbiter::new(&ControllerConfig::servo());
    let mut blinds = ControlArbiter::new(&ControllerConfig::blinds());
    let readings: Vec<SensorReading> = (0..64u16)
        .map(|i| {
            let v = i * 64;
            SensorReading::new(vec![v, 4095 - v], v, i as u64)
        })
        .collect();

    c.bench_function("arbitrate_proportional", |b| {
        let mut i = 0;
        b.iter(|| {
            i = (i + 1) % readings.len();
            black_box(servo.arbitrate(black_box(&readings[i]), None));
        })
    });

    c.bench_function("arbitrate_bistable", |b| {
        let mut i = 0;
        b.iter(|| {
            i = (i + 1) % readings.len();
            black_box(blinds.arbitrate(black_box(&readings[i]), None));
        })
    });

    c.bench_function("arbitrate_override_then_resume", |b| {
        b.iter(|| {
            black_box(servo.arbitrate(&readings[0], Some(RemoteEvent::Override(black_box(90)))));
            black_box(servo.arbitrate(&readings[1], Some(RemoteEvent::Resume)));
        })
    });
}

criterion_group!(benches, arbiter_bench);
criterion_main!(benches);
