//! # Light-Following Controller Simulation Entry Point
//!
//! Runs the control cycle against simulated light sensors and actuators, with a remote pilot
//! on the other end of a loopback link sending overrides back into the controller.
//!
//! ## Modes
//! - **Servo:** proportional angle from the average of two LDRs.
//! - **Blinds + light:** stepper closes above the outside threshold, room light switches on
//!   below the inside one.
//! - **Relay:** bistable on/off primary actuator.
//!
//! ## Threads
//! - control cycle at max OS priority, paced by `SpinSleeper`
//! - remote pilot consuming telemetry, answering through the override handler
//! - cycle exporter draining records into CSV
//!
//! ## Outputs
//! - `data/logs/cycles_<mode>.csv`: one row per control cycle
//! - `data/summary/summary_<mode>.csv`: aggregated metrics

use std::{
    fs::create_dir_all,
    io::{Write, stdin, stdout},
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use log::{error, info, warn};
use parking_lot::Mutex;
use thread_priority::{ThreadBuilderExt, ThreadPriority};

use lightloop::{
    actuation::multi_actuator::ActuatorBank,
    cycle::ControlLoop,
    link::{
        feedback::{PilotConfig, RemotePilot, spawn_peer},
        receiver::loopback,
    },
    sensing::sensor::SimulatedLdr,
    utils::{
        config::ControllerConfig,
        error::ControlError,
        export::export_summary_csv,
        metrics::{CycleRecorder, Metrics, SharedMetrics},
    },
};

const DEFAULT_SIMULATION_DURATION_SECS: u64 = 20;
const LINK_CAPACITY: usize = 64;
const SENSOR_NOISE: u16 = 25;

fn main() {
    env_logger::init();
    info!("=== LIGHTLOOP SIMULATION START ===");

    loop {
        let choice = prompt_menu();
        let (label, config, ldr) = match choice.as_str() {
            "1" | "" => (
                "servo",
                ControllerConfig::servo().with_smoothing_window(4),
                SimulatedLdr::new(&[1200, 2600], SENSOR_NOISE, 7)
                    .with_drift(0, 35.0)
                    .with_drift(1, -20.0),
            ),
            "2" => (
                "blinds",
                ControllerConfig::blinds(),
                SimulatedLdr::new(&[2300, 2100], SENSOR_NOISE, 11)
                    .with_drift(0, 12.0)
                    .with_drift(1, -9.0),
            ),
            "3" => (
                "relay",
                ControllerConfig::relay().with_deadband(100),
                SimulatedLdr::new(&[1800, 1800], SENSOR_NOISE, 23).with_drift(0, 40.0),
            ),
            "4" => {
                println!("Exiting. Goodbye!");
                info!("=== LIGHTLOOP SIMULATION FINISHED ===");
                return;
            }
            other => {
                println!("Unrecognized option '{}', please try again.", other);
                continue;
            }
        };

        match run_simulation(label, config, ldr) {
            Ok(()) => println!("\n Simulation completed. Returning to menu...\n"),
            Err(e) => error!("[Main] simulation '{}' failed: {}", label, e),
        }
    }
}

fn prompt_menu() -> String {
    println!("\n┌─────────────────────────────────────────────┐");
    println!("│     SELECT ACTUATOR SETUP                   │");
    println!("├─────────────────────────────────────────────┤");
    println!("│  1) Servo, proportional                     │");
    println!("│  2) Blinds stepper + room light relay       │");
    println!("│  3) Relay, bistable                         │");
    println!("│  4) Exit                                    │");
    println!("└─────────────────────────────────────────────┘");
    print!("Select [1/2/3/4] (default: 1): ");
    let _ = stdout().flush();

    let mut input = String::new();
    let _ = stdin().read_line(&mut input);
    input.trim().to_string()
}

fn run_simulation(
    label: &str,
    config: ControllerConfig,
    ldr: SimulatedLdr,
) -> Result<(), ControlError> {
    info!("[Experiment] Starting: {} ({:?})", label, config.law);

    let log_dir = Path::new("data/logs");
    create_dir_all(log_dir)?;
    let csv_path: PathBuf = log_dir.join(format!("cycles_{}.csv", label));

    let metrics: SharedMetrics = Arc::new(Mutex::new(Metrics::default()));
    let recorder = CycleRecorder::new();
    let exporter = recorder.start_exporter(csv_path.clone())?;

    let pilot = RemotePilot::new(PilotConfig {
        channels: config.channels,
        ..PilotConfig::default()
    });

    let (link, rx) = loopback(LINK_CAPACITY);
    let bank = ActuatorBank::simulated(&config);
    let mut control = ControlLoop::new(config, ldr, bank, link)?
        .with_metrics(metrics.clone())
        .with_recorder(recorder.clone());

    let peer = spawn_peer(rx, pilot, control.handler())?;

    let running = Arc::new(AtomicBool::new(true));
    let control_running = running.clone();
    let control_handle = thread::Builder::new()
        .name("control-cycle".into())
        .spawn_with_priority(ThreadPriority::Max, move |priority| {
            if priority.is_err() {
                warn!("[Main] could not raise control thread priority, running at default");
            }
            let cycles = control.run(&control_running);
            let state = control.state();
            info!(
                "[Main] control stopped after {} cycles: position={} mode={} physical={}",
                cycles,
                state.position,
                state.mode.name(),
                control.bank().physical_position()
            );
            // Dropping the loop closes the link and lets the pilot exit
        })?;

    info!("[Main] Running simulation for {} seconds...", DEFAULT_SIMULATION_DURATION_SECS);
    thread::sleep(Duration::from_secs(DEFAULT_SIMULATION_DURATION_SECS));

    info!("[Main] Time's up! Stopping control cycle");
    running.store(false, Ordering::Release);

    if control_handle.join().is_err() {
        error!("[Main] control thread panicked");
    }
    match peer.join() {
        Ok(stats) => info!(
            "[Main] pilot: frames={} overrides={} resumes={}",
            stats.frames, stats.overrides, stats.resumes
        ),
        Err(_) => error!("[Main] pilot thread panicked"),
    }

    recorder.stop();
    if exporter.join().is_err() {
        error!("[Main] cycle exporter panicked");
    }
    if recorder.dropped() > 0 {
        warn!("[Main] {} cycle records dropped", recorder.dropped());
    }

    export_summary_csv(&metrics, Path::new("data/summary"), label)?;

    info!("[Experiment] Completed: {}", label);
    info!("[Experiment] Cycles exported to: {:?}", csv_path);
    Ok(())
}
