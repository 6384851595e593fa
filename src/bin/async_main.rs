//! Async link simulation (async_link binary).
//!
//! The control cycle keeps its blocking, SpinSleeper-paced loop on a dedicated blocking thread;
//! telemetry goes out over a tokio channel to an async remote pilot task, which answers with
//! overrides through the controller's handler. Runs the servo setup for a fixed duration.
//!
//! **Output:**
//! - data/logs/cycles_async.csv: one row per control cycle
//! - data/summary/summary_async.csv: aggregated metrics

use std::{
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use log::{error, info, warn};
use parking_lot::Mutex;
use tokio::time::{Duration, sleep};

use lightloop::{
    actuation::multi_actuator::ActuatorBank,
    advanced::async_link::{run_remote_pilot, tokio_link},
    cycle::ControlLoop,
    link::feedback::{PilotConfig, RemotePilot},
    sensing::sensor::SimulatedLdr,
    utils::{
        config::ControllerConfig,
        error::ControlError,
        export::export_summary_csv,
        metrics::{CycleRecorder, Metrics, SharedMetrics},
    },
};

const SIMULATION_DURATION_SECS: u64 = 15;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() {
    env_logger::init();
    println!("=== ASYNC LINK START ===");

    if let Err(e) = run().await {
        error!("[AsyncMain] {}", e);
    }

    println!("=== ASYNC LINK FINISHED ===");
}

async fn run() -> Result<(), ControlError> {
    std::fs::create_dir_all("data/logs")?;
    let csv_path = Path::new("data/logs").join("cycles_async.csv");

    let metrics: SharedMetrics = Arc::new(Mutex::new(Metrics::default()));
    let recorder = CycleRecorder::new();
    let exporter = recorder.start_exporter(csv_path.clone())?;

    let config = ControllerConfig::servo().with_smoothing_window(4);
    let ldr = SimulatedLdr::new(&[900, 2400], 25, 42)
        .with_drift(0, 30.0)
        .with_drift(1, -15.0);
    let pilot = RemotePilot::new(PilotConfig {
        channels: config.channels,
        ..PilotConfig::default()
    });

    let (link, rx) = tokio_link(64);
    let bank = ActuatorBank::simulated(&config);
    let mut control = ControlLoop::new(config, ldr, bank, link)?
        .with_metrics(metrics.clone())
        .with_recorder(recorder.clone());

    let pilot_task = tokio::spawn(run_remote_pilot(rx, pilot, control.handler()));

    let running = Arc::new(AtomicBool::new(true));
    let control_running = running.clone();
    let control_task = tokio::task::spawn_blocking(move || control.run(&control_running));

    sleep(Duration::from_secs(SIMULATION_DURATION_SECS)).await;
    running.store(false, Ordering::Release);

    // The loop owns the link sender; once it returns the pilot sees the channel close.
    match control_task.await {
        Ok(cycles) => info!("[AsyncMain] control stopped after {} cycles", cycles),
        Err(e) => error!("[AsyncMain] control task failed: {}", e),
    }
    match pilot_task.await {
        Ok(stats) => info!(
            "[AsyncMain] pilot: frames={} overrides={} resumes={}",
            stats.frames, stats.overrides, stats.resumes
        ),
        Err(e) => error!("[AsyncMain] pilot task failed: {}", e),
    }

    recorder.stop();
    if exporter.join().is_err() {
        warn!("[AsyncMain] cycle exporter panicked");
    }

    export_summary_csv(&metrics, Path::new("data/summary"), "async")?;
    info!("[AsyncMain] cycles exported to {:?}", csv_path);
    Ok(())
}
