//! Metrics collection and cycle recording for the control loop.
//!
//! Two independent paths:
//! - **CycleRecorder:** lock-free queue → background CSV export, one row per control cycle.
//! - **Metrics:** shared mutex-guarded buffers and counters (bounded to 1000 points per series).

use std::{
    collections::VecDeque,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    thread,
    time::Duration,
};

use crossbeam_queue::ArrayQueue;
use log::{debug, error};
use parking_lot::Mutex;
use serde::Serialize;

use crate::utils::error::ControlError;

/// One control cycle as written to the cycle CSV.
#[derive(Debug, Clone, Serialize)]
pub struct CycleRecord {
    pub tick: u64,
    pub elapsed_ms: u64,
    /// Raw channel values joined with `;` in declaration order.
    pub channels: String,
    pub composite: u16,
    pub position: u16,
    pub source: &'static str,
    pub mode: &'static str,
    pub changed: bool,
    pub moving: bool,
    pub light: Option<bool>,
}

const RECORD_QUEUE_CAPACITY: usize = 4_096;
const EXPORTER_POLL_MS: u64 = 10;

/// Non-blocking cycle recorder with background CSV export.
///
/// `record()` never blocks the control cycle; when the queue is full the record is dropped
/// and counted.
#[derive(Clone)]
pub struct CycleRecorder {
    queue: Arc<ArrayQueue<CycleRecord>>,
    running: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
}

impl Default for CycleRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleRecorder {
    pub fn new() -> Self {
        Self {
            queue: Arc::new(ArrayQueue::new(RECORD_QUEUE_CAPACITY)),
            running: Arc::new(AtomicBool::new(false)),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    #[inline]
    pub fn record(&self, record: CycleRecord) {
        if self.queue.push(record).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Spawns the thread draining the queue into `output_csv`.
    /// The file is created before the thread starts so a bad path is reported here.
    pub fn start_exporter(
        &self,
        output_csv: PathBuf,
    ) -> Result<thread::JoinHandle<()>, ControlError> {
        let mut wtr = csv::Writer::from_path(&output_csv)?;
        let queue = self.queue.clone();
        let running = self.running.clone();
        running.store(true, Ordering::SeqCst);

        let handle = thread::Builder::new()
            .name("cycle-exporter".into())
            .spawn(move || {
                let mut written = 0u64;
                loop {
                    let mut any = false;
                    while let Some(record) = queue.pop() {
                        any = true;
                        if let Err(e) = wtr.serialize(&record) {
                            error!("[CycleRecorder] failed to write record {}: {}", record.tick, e);
                        } else {
                            written += 1;
                        }
                    }
                    if any {
                        wtr.flush().ok();
                    } else if !running.load(Ordering::SeqCst) {
                        break;
                    } else {
                        thread::sleep(Duration::from_millis(EXPORTER_POLL_MS));
                    }
                }
                wtr.flush().ok();
                debug!("[CycleRecorder] exporter exiting after {} records", written);
            })?;

        Ok(handle)
    }

    /// Signals the exporter to drain what is left and exit.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Live controller metrics: composite and position histories plus cycle counters.
#[derive(Default, Clone, Debug)]
pub struct Metrics {
    pub composite: VecDeque<f64>,
    pub position: VecDeque<f64>,

    /// Cycle execution time and release jitter (microseconds)
    pub cycle_us: VecDeque<u64>,
    pub jitter_us: VecDeque<u64>,

    pub total_cycles: u64,
    pub overrun_cycles: u64,
    pub overrides_applied: u64,
    pub resumes: u64,
    pub ignored_payloads: u64,
    pub actuator_writes: u64,
    pub light_switches: u64,
    pub telemetry_sent: u64,
    pub telemetry_drops: u64,
}

impl Metrics {
    /// A cycle finished later than its release period.
    pub fn record_overrun(&mut self) {
        self.overrun_cycles += 1;
    }
}

pub type SharedMetrics = Arc<Mutex<Metrics>>;

pub const MAX_POINTS: usize = 1_000;

/// Appends value to metrics buffer; removes oldest if at capacity (FIFO).
#[inline]
pub fn push_capped(buf: &mut VecDeque<f64>, val: f64) {
    if buf.len() >= MAX_POINTS {
        buf.pop_front();
    }
    buf.push_back(val);
}

#[inline]
pub fn push_capped_u64(buf: &mut VecDeque<u64>, val: u64) {
    if buf.len() >= MAX_POINTS {
        buf.pop_front();
    }
    buf.push_back(val);
}

/// Statistics summary for a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Stats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub count: usize,
}

/// Computes min, max, mean for float buffer.
pub fn calculate_stats(data: &VecDeque<f64>) -> Option<Stats> {
    if data.is_empty() {
        return None;
    }

    let count = data.len();
    let min = data.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = data.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let mean = data.iter().sum::<f64>() / count as f64;

    Some(Stats { min, max, mean, count })
}

/// Computes min, max, mean for u64 buffer (cast to f64).
pub fn calculate_stats_u64(data: &VecDeque<u64>) -> Option<Stats> {
    if data.is_empty() {
        return None;
    }

    let count = data.len();
    let min = data.iter().map(|&x| x as f64).fold(f64::INFINITY, f64::min);
    let max = data.iter().map(|&x| x as f64).fold(f64::NEG_INFINITY, f64::max);
    let mean = data.iter().map(|&x| x as f64).sum::<f64>() / count as f64;

    Some(Stats { min, max, mean, count })
}
