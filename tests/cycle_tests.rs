use std::{
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::Duration,
};

use crossbeam::channel::Receiver;
use lightloop::actuation::controller::{CommandSource, Mode};
use lightloop::actuation::multi_actuator::ActuatorBank;
use lightloop::cycle::ControlLoop;
use lightloop::link::mailbox::RemoteEvent;
use lightloop::link::receiver::{LoopbackLink, NullLink, OverrideHandler, loopback};
use lightloop::sensing::sensor::ScriptedAdc;
use lightloop::sensing::transmitter::{TelemetryEncoder, TelemetryFrame};
use lightloop::utils::config::ControllerConfig;
use lightloop::utils::error::ControlError;
use lightloop::utils::export::export_summary_csv;
use lightloop::utils::metrics::CycleRecorder;

type ServoLoop = ControlLoop<ScriptedAdc, LoopbackLink>;

fn servo_loop(level: u16, capacity: usize) -> (ServoLoop, Receiver<TelemetryFrame>) {
    let config = ControllerConfig::servo();
    let bank = ActuatorBank::simulated(&config);
    let (link, rx) = loopback(capacity);
    let control = ControlLoop::new(config, ScriptedAdc::constant(2, level), bank, link)
        .expect("servo config is valid");
    (control, rx)
}

fn scratch_dir(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("lightloop-{}-{}", name, std::process::id()));
    std::fs::create_dir_all(&dir).expect("scratch dir");
    dir
}

#[test]
fn every_cycle_pushes_one_frame() {
    let (mut control, rx) = servo_loop(2048, 8);
    let report = control.step();
    assert!(report.transmitted);
    assert_eq!(report.decision.command.position, 90);

    let frame = rx.try_recv().expect("frame on the link");
    assert_eq!(frame.as_bytes(), &[0x00, 0x08, 0x00, 0x08]);

    control.step();
    control.step();
    assert_eq!(rx.try_iter().count(), 2);
    assert_eq!(control.metrics().lock().telemetry_sent, 3);
}

#[test]
fn full_link_drops_frames_without_stalling() {
    let (mut control, _rx) = servo_loop(1000, 1);
    assert!(control.step().transmitted);
    assert!(!control.step().transmitted);
    assert_eq!(control.transmitter().dropped(), 1);
    assert_eq!(control.metrics().lock().telemetry_drops, 1);
    assert_eq!(control.metrics().lock().total_cycles, 2);
}

#[test]
fn override_from_handler_applies_on_next_cycle() {
    let (mut control, _rx) = servo_loop(4095, 16);
    assert_eq!(control.step().decision.command.position, 180);

    control.handler().on_override(&[45]);
    let report = control.step();
    assert_eq!(report.event, Some(RemoteEvent::Override(45)));
    assert_eq!(report.decision.command.position, 45);
    assert_eq!(report.decision.command.source, CommandSource::Override);
    assert_eq!(control.state().mode, Mode::Overridden);
    assert_eq!(control.bank().physical_position(), 45);

    // Still held on the following cycle
    assert_eq!(control.step().decision.command.position, 45);
    assert_eq!(control.metrics().lock().overrides_applied, 1);
}

#[test]
fn malformed_payloads_are_ignored() {
    let (mut control, _rx) = servo_loop(2048, 16);
    control.handler().on_override(&[]);
    control.handler().on_override(&[1, 2, 3]);

    let report = control.step();
    assert_eq!(report.event, None);
    assert_eq!(report.decision.command.source, CommandSource::Autonomous);
    assert_eq!(control.mailbox().ignored(), 2);
    assert_eq!(control.metrics().lock().ignored_payloads, 2);
}

#[test]
fn latest_override_wins_between_cycles() {
    let (mut control, _rx) = servo_loop(2048, 16);
    control.handler().on_override(&[10]);
    control.handler().on_override(&[20]);
    assert_eq!(control.step().decision.command.position, 20);
    assert_eq!(control.mailbox().superseded(), 1);
}

#[test]
fn resume_is_counted() {
    let (mut control, _rx) = servo_loop(2048, 16);
    control.handler().on_override(&[10]);
    control.step();
    control.handler().on_resume();
    let report = control.step();
    assert_eq!(report.state.mode, Mode::Autonomous);
    assert_eq!(report.decision.command.position, 90);
    assert_eq!(control.metrics().lock().resumes, 1);
    assert_eq!(control.metrics().lock().actuator_writes, 2);
}

#[test]
fn bank_must_match_configured_actuator() {
    let bank = ActuatorBank::simulated(&ControllerConfig::blinds());
    let adc = ScriptedAdc::constant(2, 0);
    let result = ControlLoop::new(ControllerConfig::servo(), adc, bank, NullLink);
    assert!(matches!(result, Err(ControlError::InvalidConfig(_))));

    let config = ControllerConfig::servo().with_channels(0);
    let bank = ActuatorBank::simulated(&config);
    assert!(ControlLoop::new(config, ScriptedAdc::constant(2, 0), bank, NullLink).is_err());
}

#[test]
fn run_paces_cycles_until_stopped() {
    let config = ControllerConfig::servo().with_sampling_period(Duration::from_millis(20));
    let bank = ActuatorBank::simulated(&config);
    let mut control = ControlLoop::new(config, ScriptedAdc::constant(2, 3000), bank, NullLink)
        .expect("valid config");
    let running = AtomicBool::new(true);

    let cycles = thread::scope(|s| {
        s.spawn(|| {
            thread::sleep(Duration::from_millis(300));
            running.store(false, Ordering::Release);
        });
        control.run(&running)
    });

    // 300 ms at 20 ms per cycle, with generous slack for a loaded test host
    assert!((3..=20).contains(&cycles), "cycles = {cycles}");
    let m = control.metrics();
    let m = m.lock();
    assert_eq!(m.total_cycles, cycles);
    assert_eq!(m.jitter_us.len() as u64, cycles - 1);
}

#[test]
fn recorder_exports_one_row_per_cycle() {
    let dir = scratch_dir("cycles");
    let path = dir.join("cycles.csv");
    let recorder = CycleRecorder::new();
    let exporter = recorder.start_exporter(path.clone()).expect("exporter starts");

    let (control, _rx) = servo_loop(2048, 16);
    let mut control = control.with_recorder(recorder.clone());
    for _ in 0..5 {
        control.step();
    }

    recorder.stop();
    exporter.join().expect("exporter thread");

    let mut rdr = csv::Reader::from_path(&path).expect("csv readable");
    let headers = rdr.headers().expect("header row").clone();
    assert_eq!(&headers[0], "tick");
    assert!(headers.iter().any(|h| h == "mode"));
    let rows: Vec<_> = rdr.records().collect::<Result<_, _>>().expect("rows");
    assert_eq!(rows.len(), 5);
    assert_eq!(&rows[0][0], "1");
    assert_eq!(&rows[0][2], "2048;2048");
    assert_eq!(recorder.dropped(), 0);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn exporter_reports_bad_path() {
    let recorder = CycleRecorder::new();
    let missing = std::env::temp_dir().join("lightloop-no-such-dir").join("x").join("cycles.csv");
    assert!(recorder.start_exporter(missing).is_err());
}

#[test]
fn summary_is_written_for_a_run() {
    let dir = scratch_dir("summary");
    let (mut control, _rx) = servo_loop(2048, 16);
    control.step();
    control.step();

    let path = export_summary_csv(&control.metrics(), &dir, "servo").expect("summary written");
    assert!(path.ends_with("summary_servo.csv"));
    let contents = std::fs::read_to_string(&path).expect("summary readable");
    assert!(contents.contains("total_cycles"));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn servo_is_positioned_on_the_first_cycle() {
    let config = ControllerConfig::servo().with_position_range(10, 170);
    let bank = ActuatorBank::simulated(&config);
    let mut control = ControlLoop::new(config, ScriptedAdc::constant(2, 0), bank, NullLink)
        .expect("valid config");

    let report = control.step();
    assert_eq!(report.decision.command.position, 10);
    assert!(report.drive.wrote);
    assert_eq!(control.bank().physical_position(), 10);

    control.step();
    assert!((10..=170).contains(&control.bank().physical_position()));
    assert_eq!(control.metrics().lock().actuator_writes, 1);
}

#[test]
fn smoothing_leaves_telemetry_raw() {
    let config = ControllerConfig::servo().with_smoothing_window(2);
    let bank = ActuatorBank::simulated(&config);
    let adc = ScriptedAdc::new(vec![vec![1000, 1000], vec![3000, 3000]]);
    let (link, rx) = loopback(4);
    let mut control = ControlLoop::new(config, adc, bank, link).expect("valid config");

    control.step();
    let report = control.step();
    assert_eq!(report.reading.raw, vec![3000, 3000]);
    assert_eq!(report.reading.composite, 2000);

    let frames: Vec<TelemetryFrame> = rx.try_iter().collect();
    let decoded = TelemetryEncoder::new(2).decode(frames[1].as_bytes());
    assert_eq!(decoded, Some(vec![3000, 3000]));
}
