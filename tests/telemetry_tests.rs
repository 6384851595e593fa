use lightloop::link::mailbox::{OverrideMailbox, RemoteEvent, parse_override};
use lightloop::link::receiver::{MailboxHandler, OverrideHandler, loopback};
use lightloop::sensing::sensor::{
    AdcSource, ScriptedAdc, SensorReading, SensorSampler, SimulatedLdr, composite_of,
};
use lightloop::sensing::transmitter::{TelemetryEncoder, TelemetryFrame, Transmitter};
use lightloop::utils::config::{CompositeSource, ControllerConfig};
use std::sync::Arc;

#[test]
fn frame_is_little_endian_per_channel() {
    let encoder = TelemetryEncoder::new(2);
    let frame = encoder.encode(&SensorReading::new(vec![0x0FFF, 0x0001], 0, 1));
    assert_eq!(frame.as_bytes(), &[0xFF, 0x0F, 0x01, 0x00]);
    assert_eq!(encoder.decode(frame.as_bytes()), Some(vec![0x0FFF, 0x0001]));
}

#[test]
fn frame_width_is_fixed_by_channel_count() {
    let encoder = TelemetryEncoder::new(2);
    assert_eq!(encoder.frame_len(), 4);

    let short = encoder.encode(&SensorReading::new(vec![7], 7, 1));
    assert_eq!(short.as_bytes(), &[7, 0, 0, 0]);

    let long = encoder.encode(&SensorReading::new(vec![1, 2, 3], 2, 1));
    assert_eq!(long.len(), 4);
}

#[test]
fn decode_rejects_wrong_width() {
    let encoder = TelemetryEncoder::new(2);
    assert_eq!(encoder.decode(&[]), None);
    assert_eq!(encoder.decode(&[1, 2, 3]), None);
    assert_eq!(encoder.decode(&[1, 2, 3, 4, 5, 6]), None);
}

#[test]
fn override_payloads() {
    assert_eq!(parse_override(&[]), None);
    assert_eq!(parse_override(&[90]), Some(90));
    assert_eq!(parse_override(&[0x34, 0x12]), Some(0x1234));
    assert_eq!(parse_override(&[1, 2, 3]), None);
}

#[test]
fn mailbox_keeps_latest_event() {
    let mailbox = Arc::new(OverrideMailbox::new());
    let handler = MailboxHandler::new(mailbox.clone());

    handler.on_override(&[10]);
    handler.on_override(&[20]);
    handler.on_resume();
    handler.on_override(&[]);

    assert_eq!(mailbox.take(), Some(RemoteEvent::Resume));
    assert_eq!(mailbox.take(), None);
    assert!(mailbox.is_empty());
    assert_eq!(mailbox.posted(), 3);
    assert_eq!(mailbox.superseded(), 2);
    assert_eq!(mailbox.ignored(), 1);
}

#[test]
fn handler_is_callable_from_another_thread() {
    let mailbox = Arc::new(OverrideMailbox::new());
    let handler = MailboxHandler::new(mailbox.clone());
    std::thread::spawn(move || handler.on_override(&[0xD0, 0x07]))
        .join()
        .expect("transport thread");
    assert_eq!(mailbox.take(), Some(RemoteEvent::Override(2000)));
}

#[test]
fn transmitter_counts_frames_the_link_refuses() {
    let (link, rx) = loopback(1);
    let mut tx = Transmitter::new(link);
    let frame = TelemetryFrame::from_bytes(vec![0, 0, 0, 0]);

    assert!(tx.transmit(&frame));
    assert!(!tx.transmit(&frame));
    assert_eq!(tx.sent(), 1);
    assert_eq!(tx.dropped(), 1);

    drop(rx);
    assert!(!tx.transmit(&frame));
    assert_eq!(tx.dropped(), 2);
}

#[test]
fn sampler_clamps_and_builds_composite() {
    let config = ControllerConfig::servo();
    let adc = ScriptedAdc::new(vec![vec![5000, 1000], vec![200, 400]]);
    let mut sampler = SensorSampler::new(adc, &config);

    let first = sampler.sample();
    assert_eq!(first.raw, vec![4095, 1000]);
    assert_eq!(first.filtered, first.raw);
    assert_eq!(first.composite, 2547);
    assert_eq!(first.tick, 1);

    let second = sampler.sample();
    assert_eq!(second.raw, vec![200, 400]);
    assert_eq!(second.composite, 300);
    assert_eq!(second.tick, 2);

    // Last frame repeats
    assert_eq!(sampler.sample().raw, vec![200, 400]);
    assert_eq!(sampler.ticks(), 3);
}

#[test]
fn composite_from_a_single_channel() {
    assert_eq!(composite_of(&[100, 3000], CompositeSource::Channel(1)), 3000);
    assert_eq!(composite_of(&[100], CompositeSource::Channel(4)), 0);
    assert_eq!(composite_of(&[], CompositeSource::Average), 0);
}

#[test]
fn smoothing_window_averages_each_channel() {
    let config = ControllerConfig::servo().with_smoothing_window(2);
    let adc = ScriptedAdc::new(vec![vec![1000, 0], vec![3000, 0]]);
    let mut sampler = SensorSampler::new(adc, &config);
    sampler.sample();
    let r = sampler.sample();
    assert_eq!(r.raw, vec![3000, 0]);
    assert_eq!(r.filtered, vec![2000, 0]);
    assert_eq!(r.level(0), 2000);
    assert_eq!(r.channel(0), 3000);
    assert_eq!(r.composite, 1000);
}

#[test]
fn simulated_ldr_is_reproducible_and_in_range() {
    let mut a = SimulatedLdr::new(&[4000, 50], 200, 9).with_drift(0, 150.0);
    let mut b = SimulatedLdr::new(&[4000, 50], 200, 9).with_drift(0, 150.0);
    for _ in 0..200 {
        for ch in 0..2 {
            let v = a.read(ch);
            assert_eq!(v, b.read(ch));
            assert!(v <= 4095);
        }
    }
    assert_eq!(a.read(7), 0);
}
