//! feedback.rs
//! Remote pilot: the external controller closing the loop over the wireless link.
//!
//! Decodes each telemetry frame, converts the watched channel to lux and, while the level is
//! outside the acceptable band, answers with a PID-computed servo angle as a one-byte
//! override. When the level comes back into the band after an override, it sends a single
//! resume so the controller falls back to its own sensors.

use std::{
    thread::{self, JoinHandle},
    time::Instant,
};

use crossbeam::channel::Receiver;
use log::{debug, info, warn};
use pidgeon::{ControllerConfig as PidConfig, PidController};

use crate::link::receiver::OverrideHandler;
use crate::sensing::{
    processor::LuxConverter,
    transmitter::{TelemetryEncoder, TelemetryFrame},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PilotConfig {
    pub channels: usize,
    /// Channel converted to lux and regulated.
    pub channel: usize,
    pub band_low_lux: f64,
    pub band_high_lux: f64,
    pub setpoint_lux: f64,
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    pub output_max: f64,
}

impl Default for PilotConfig {
    fn default() -> Self {
        Self {
            channels: 2,
            channel: 0,
            band_low_lux: 200.0,
            band_high_lux: 500.0,
            setpoint_lux: 350.0,
            kp: 0.5,
            ki: 0.05,
            kd: 0.1,
            output_max: 90.0,
        }
    }
}

/// What the pilot wants sent back over the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PilotAction {
    Override(u8),
    Resume,
}

pub struct RemotePilot {
    config: PilotConfig,
    pid: PidController,
    decoder: TelemetryEncoder,
    converter: LuxConverter,
    last_update: Option<Instant>,
    overriding: bool,
    last_lux: Option<f64>,
}

impl RemotePilot {
    pub fn new(config: PilotConfig) -> Self {
        let pid_config = PidConfig::new()
            .with_kp(config.kp)
            .with_ki(config.ki)
            .with_kd(config.kd)
            .with_output_limits(0.0, config.output_max)
            .with_anti_windup(true);

        let mut pid = PidController::new(pid_config);
        if pid.set_setpoint(config.setpoint_lux).is_err() {
            warn!("[Pilot] rejected setpoint {:.1} lux", config.setpoint_lux);
        }

        Self {
            config,
            pid,
            decoder: TelemetryEncoder::new(config.channels),
            converter: LuxConverter::default(),
            last_update: None,
            overriding: false,
            last_lux: None,
        }
    }

    /// Handles one frame, using the wall-clock time since the previous frame as the PID step.
    pub fn on_frame(&mut self, frame: &[u8]) -> Option<PilotAction> {
        let now = Instant::now();
        let dt = self
            .last_update
            .map(|prev| now.duration_since(prev).as_secs_f64())
            .unwrap_or(0.1);
        self.last_update = Some(now);
        self.on_frame_dt(frame, dt)
    }

    /// Handles one frame with an explicit time step in seconds.
    pub fn on_frame_dt(&mut self, frame: &[u8], dt: f64) -> Option<PilotAction> {
        let Some(channels) = self.decoder.decode(frame) else {
            debug!("[Pilot] unexpected frame length {}", frame.len());
            return None;
        };
        let raw = *channels.get(self.config.channel)?;
        let lux = self.converter.to_lux(raw);
        self.last_lux = Some(lux);

        if lux >= self.config.band_low_lux && lux <= self.config.band_high_lux {
            if self.overriding {
                self.overriding = false;
                return Some(PilotAction::Resume);
            }
            return None;
        }

        let output = self.pid.compute(lux, dt.clamp(1e-3, 1.0));
        let angle = output.clamp(0.0, self.config.output_max).round() as u8;
        self.overriding = true;
        Some(PilotAction::Override(angle))
    }

    pub fn last_lux(&self) -> Option<f64> {
        self.last_lux
    }

    pub fn is_overriding(&self) -> bool {
        self.overriding
    }
}

/// Counters reported by a peer thread when its link closes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PeerStats {
    pub frames: u64,
    pub overrides: u64,
    pub resumes: u64,
}

/// Applies a pilot action through the transport callbacks.
pub fn deliver<H>(handler: &H, action: PilotAction, stats: &mut PeerStats)
where
    H: OverrideHandler + ?Sized,
{
    match action {
        PilotAction::Override(angle) => {
            handler.on_override(&[angle]);
            stats.overrides += 1;
        }
        PilotAction::Resume => {
            handler.on_resume();
            stats.resumes += 1;
        }
    }
}

/// Runs the pilot on its own thread, fed by the loopback link until the controller drops it.
pub fn spawn_peer<H>(
    rx: Receiver<TelemetryFrame>,
    mut pilot: RemotePilot,
    handler: H,
) -> std::io::Result<JoinHandle<PeerStats>>
where
    H: OverrideHandler + 'static,
{
    thread::Builder::new().name("remote-pilot".into()).spawn(move || {
        let mut stats = PeerStats::default();
        while let Ok(frame) = rx.recv() {
            stats.frames += 1;
            if let Some(action) = pilot.on_frame(frame.as_bytes()) {
                debug!("[Pilot] lux={:.1} -> {:?}", pilot.last_lux().unwrap_or(0.0), action);
                deliver(&handler, action, &mut stats);
            }
        }
        info!(
            "[Pilot] link closed: frames={} overrides={} resumes={}",
            stats.frames, stats.overrides, stats.resumes
        );
        stats
    })
}
