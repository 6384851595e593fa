/* Frame encoding, decoding and override payload parsing on the link path. */
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use lightloop::link::{
    mailbox::{OverrideMailbox, RemoteEvent, parse_override},
    receiver::{MailboxHandler, OverrideHandler},
};
use lightloop::sensing::{sensor::SensorReading, transmitter::TelemetryEncoder};

fn telemetry_bench(c: &mut Criterion) {
    let encoder = TelemetryEncoder::new(2);
    let reading = SensorReading::new(vec![1234, 3210], 2222, 1);
    let frame = encoder.encode(&reading);

    c.bench_function("telemetry_encode", |b| {
        b.iter(|| black_box(encoder.encode(black_box(&reading))))
    });

    c.bench_function("telemetry_decode", |b| {
        b.iter(|| black_box(encoder.decode(black_box(frame.as_bytes()))))
    });

    c.bench_function("override_parse", |b| {
        b.iter(|| black_box(parse_override(black_box(&[0x34, 0x12]))))
    });

    let mailbox = std::sync::Arc::new(OverrideMailbox::new());
    let handler = MailboxHandler::new(mailbox.clone());
    c.bench_function("override_post_and_take", |b| {
        b.iter(|| {
            handler.on_override(black_box(&[45]));
            black_box(mailbox.take() == Some(RemoteEvent::Override(45)));
        })
    });
}

criterion_group!(benches, telemetry_bench);
criterion_main!(benches);
