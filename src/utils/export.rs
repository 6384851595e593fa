//! Metrics summary export: one `metric,value,description` CSV per run.
//!
//! Cycle-by-cycle rows are written by `CycleRecorder`; this module only aggregates the
//! shared `Metrics` once a run is over.

use std::{
    fs::create_dir_all,
    path::{Path, PathBuf},
};

use log::info;
use serde::Serialize;

use crate::utils::{
    error::ControlError,
    metrics::{Metrics, SharedMetrics, calculate_stats, calculate_stats_u64},
};

#[derive(Debug, Serialize)]
struct SummaryRow {
    metric: &'static str,
    value: String,
    description: &'static str,
}

fn row(metric: &'static str, value: impl ToString, description: &'static str) -> SummaryRow {
    SummaryRow {
        metric,
        value: value.to_string(),
        description,
    }
}

/// Builds the summary rows from a metrics snapshot.
fn summary_rows(m: &Metrics) -> Vec<SummaryRow> {
    let mut rows = vec![
        row("total_cycles", m.total_cycles, "Control cycles executed"),
        row("overrun_cycles", m.overrun_cycles, "Cycles released after their deadline"),
        row("overrides_applied", m.overrides_applied, "Remote overrides applied"),
        row("resumes", m.resumes, "Returns to autonomous control"),
        row("ignored_payloads", m.ignored_payloads, "Override payloads that carried no command"),
        row("actuator_writes", m.actuator_writes, "Commands that changed the actuator target"),
        row("light_switches", m.light_switches, "Room-light relay transitions"),
        row("telemetry_sent", m.telemetry_sent, "Telemetry frames handed to the link"),
        row("telemetry_drops", m.telemetry_drops, "Telemetry frames dropped by the link"),
    ];

    let miss_rate = if m.total_cycles > 0 {
        (m.overrun_cycles as f64 / m.total_cycles as f64) * 100.0
    } else {
        0.0
    };
    rows.push(row(
        "overrun_rate_pct",
        format!("{:.2}", miss_rate),
        "Overrun cycles as a percentage",
    ));

    if let Some(s) = calculate_stats_u64(&m.jitter_us) {
        rows.push(row("jitter_min_us", format!("{:.2}", s.min), "Minimum release jitter"));
        rows.push(row("jitter_max_us", format!("{:.2}", s.max), "Maximum release jitter"));
        rows.push(row("jitter_avg_us", format!("{:.2}", s.mean), "Average release jitter"));
    }

    if let Some(s) = calculate_stats_u64(&m.cycle_us) {
        rows.push(row("cycle_max_us", format!("{:.2}", s.max), "Longest cycle execution"));
        rows.push(row("cycle_avg_us", format!("{:.2}", s.mean), "Average cycle execution"));
    }

    if let Some(s) = calculate_stats(&m.composite) {
        rows.push(row("composite_min", format!("{:.2}", s.min), "Minimum composite light value"));
        rows.push(row("composite_max", format!("{:.2}", s.max), "Maximum composite light value"));
        rows.push(row("composite_avg", format!("{:.2}", s.mean), "Average composite light value"));
    }

    if let Some(s) = calculate_stats(&m.position) {
        rows.push(row("position_min", format!("{:.2}", s.min), "Lowest commanded position"));
        rows.push(row("position_max", format!("{:.2}", s.max), "Highest commanded position"));
    }

    rows
}

/// Writes `summary_<label>.csv` into `dir` and returns its path.
pub fn export_summary_csv(
    metrics: &SharedMetrics,
    dir: &Path,
    label: &str,
) -> Result<PathBuf, ControlError> {
    create_dir_all(dir)?;
    let path = dir.join(format!("summary_{}.csv", label));

    // Snapshot so the lock is not held across file I/O
    let snapshot = metrics.lock().clone();

    let mut wtr = csv::Writer::from_path(&path)?;
    for r in summary_rows(&snapshot) {
        wtr.serialize(r)?;
    }
    wtr.flush()?;

    info!("Summary metrics exported to: {:?}", path);
    Ok(path)
}
