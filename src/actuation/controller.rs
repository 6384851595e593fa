//! controller.rs
//! Control arbitration: autonomous light-following versus remote override.
//!
//! The arbiter owns the `ControlState` and is the only place where targets are clamped to
//! the actuator bounds. Each cycle it consumes at most one remote event, then produces exactly
//! one `ActuatorCommand`, flagged as changed when the target differs from the last one.
//!
//! Autonomous laws:
//! - proportional: linear map of the composite value onto the position range
//! - bistable: a threshold latch selects the closed (max) or open (min) end position
//!
//! The room-light relay is a separate `LightRule` with its own latch and channel; it does not
//! look at the arbiter's mode.

use log::{debug, warn};

use crate::link::mailbox::RemoteEvent;
use crate::sensing::sensor::SensorReading;
use crate::utils::config::{ControlLaw, ControllerConfig, RelayConfig, ResumePolicy, Trigger};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Autonomous,
    Overridden,
}

impl Mode {
    pub fn name(&self) -> &'static str {
        match self {
            Mode::Autonomous => "autonomous",
            Mode::Overridden => "overridden",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandSource {
    Autonomous,
    Override,
}

impl CommandSource {
    pub fn name(&self) -> &'static str {
        match self {
            CommandSource::Autonomous => "autonomous",
            CommandSource::Override => "override",
        }
    }
}

/// Target handed to the actuator driver for this cycle. Always within bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorCommand {
    pub position: u16,
    pub source: CommandSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlState {
    /// Last commanded target (a stepper may still be travelling towards it).
    pub position: u16,
    pub mode: Mode,
    /// Last threshold direction crossed by the bistable latch.
    pub latched: bool,
}

/// Result of one arbitration cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub command: ActuatorCommand,
    /// False when the target equals the previous one and the driver needs no new write.
    pub changed: bool,
}

/// Integer linear map, `out_min` when the input range is empty.
pub fn map_range(value: u16, in_min: u16, in_max: u16, out_min: u16, out_max: u16) -> i64 {
    let (value, in_min, in_max) = (value as i64, in_min as i64, in_max as i64);
    let (out_min, out_max) = (out_min as i64, out_max as i64);
    if in_max == in_min {
        return out_min;
    }
    (value - in_min) * (out_max - out_min) / (in_max - in_min) + out_min
}

#[inline]
pub fn clamp_position(value: i64, min: u16, max: u16) -> u16 {
    value.clamp(min as i64, max.max(min) as i64) as u16
}

/// Threshold comparator with memory of the last crossing.
///
/// With a zero deadband a single threshold decides both directions, so a value hovering at
/// the threshold toggles the latch every cycle. A non-zero deadband engages beyond
/// `threshold ± deadband` and releases only once the value is back across the other edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdLatch {
    threshold: u16,
    deadband: u16,
    trigger: Trigger,
    engaged: bool,
}

impl ThresholdLatch {
    pub fn new(threshold: u16, deadband: u16, trigger: Trigger) -> Self {
        Self {
            threshold,
            deadband,
            trigger,
            engaged: false,
        }
    }

    /// Feeds one value and returns the latch state afterwards.
    pub fn update(&mut self, value: u16) -> bool {
        let upper = self.threshold.saturating_add(self.deadband);
        let lower = self.threshold.saturating_sub(self.deadband);

        self.engaged = match (self.trigger, self.engaged) {
            (Trigger::Above, false) => value > upper,
            (Trigger::Above, true) => value > lower,
            (Trigger::Below, false) => value < lower,
            (Trigger::Below, true) => value < upper,
        };
        self.engaged
    }

    pub fn is_engaged(&self) -> bool {
        self.engaged
    }
}

pub struct ControlArbiter {
    law: ControlLaw,
    resume_policy: ResumePolicy,
    sensor_min: u16,
    sensor_max: u16,
    position_min: u16,
    position_max: u16,
    latch: ThresholdLatch,
    state: ControlState,
    idle_cycles: u32,
    /// False until the first command reached the driver; the start position is unknown.
    commanded: bool,
}

impl ControlArbiter {
    /// Starts autonomous, at the lower position bound, latch released. The first decision is
    /// always flagged as changed so the driver is positioned whatever its power-on state.
    pub fn new(config: &ControllerConfig) -> Self {
        Self {
            law: config.law,
            resume_policy: config.resume,
            sensor_min: config.sensor_min,
            sensor_max: config.sensor_max,
            position_min: config.position_min,
            position_max: config.position_max,
            latch: ThresholdLatch::new(config.threshold, config.deadband, Trigger::Above),
            state: ControlState {
                position: config.position_min,
                mode: Mode::Autonomous,
                latched: false,
            },
            idle_cycles: 0,
            commanded: false,
        }
    }

    #[inline]
    pub fn state(&self) -> ControlState {
        self.state
    }

    pub fn bounds(&self) -> (u16, u16) {
        (self.position_min, self.position_max)
    }

    #[inline]
    fn clamp(&self, value: i64) -> u16 {
        clamp_position(value, self.position_min, self.position_max)
    }

    /// One control cycle: apply the pending remote event, if any, then decide the target.
    pub fn arbitrate(&mut self, reading: &SensorReading, event: Option<RemoteEvent>) -> Decision {
        match event {
            Some(RemoteEvent::Override(value)) => return self.apply_override(value),
            Some(RemoteEvent::Resume) => {
                self.resume();
            }
            None => {}
        }

        if self.state.mode == Mode::Overridden {
            match self.resume_policy {
                ResumePolicy::AfterIdleCycles(limit) => {
                    self.idle_cycles = self.idle_cycles.saturating_add(1);
                    if self.idle_cycles < limit {
                        return self.hold();
                    }
                    debug!("[Arbiter] no override for {} cycles, resuming", self.idle_cycles);
                    self.state.mode = Mode::Autonomous;
                    self.idle_cycles = 0;
                }
                ResumePolicy::Latched | ResumePolicy::OnCommand => return self.hold(),
            }
        }

        self.autonomous(reading.composite)
    }

    /// Switches to override mode with the clamped value as target.
    pub fn apply_override(&mut self, value: u16) -> Decision {
        let target = self.clamp(value as i64);
        if target != value {
            debug!("[Arbiter] override {} clamped to {}", value, target);
        }

        let changed = self.mark_commanded(target);
        self.state.position = target;
        self.state.mode = Mode::Overridden;
        self.idle_cycles = 0;

        Decision {
            command: ActuatorCommand {
                position: target,
                source: CommandSource::Override,
            },
            changed,
        }
    }

    /// Returns to autonomous control when the policy allows it.
    /// Reports whether the mode actually changed.
    pub fn resume(&mut self) -> bool {
        if self.resume_policy == ResumePolicy::Latched {
            warn!("[Arbiter] resume ignored: overrides are latched");
            return false;
        }
        if self.state.mode != Mode::Overridden {
            return false;
        }
        self.state.mode = Mode::Autonomous;
        self.idle_cycles = 0;
        true
    }

    /// Whether `target` needs a driver write. Always true for the very first command.
    fn mark_commanded(&mut self, target: u16) -> bool {
        let first = !self.commanded;
        self.commanded = true;
        first || target != self.state.position
    }

    fn hold(&self) -> Decision {
        Decision {
            command: ActuatorCommand {
                position: self.state.position,
                source: CommandSource::Override,
            },
            changed: false,
        }
    }

    fn autonomous(&mut self, composite: u16) -> Decision {
        let target = match self.law {
            ControlLaw::Proportional => self.clamp(map_range(
                composite,
                self.sensor_min,
                self.sensor_max,
                self.position_min,
                self.position_max,
            )),
            ControlLaw::Bistable => {
                let engaged = self.latch.update(composite);
                self.state.latched = engaged;
                if engaged { self.position_max } else { self.position_min }
            }
        };

        // Compared against the last target rather than the latch edge, so a target left
        // behind by an override is corrected on the first autonomous cycle.
        let changed = self.mark_commanded(target);
        self.state.position = target;

        Decision {
            command: ActuatorCommand {
                position: target,
                source: CommandSource::Autonomous,
            },
            changed,
        }
    }
}

/// Relay switching decision for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightDecision {
    pub on: bool,
    pub changed: bool,
}

/// Independent on/off rule for the room-light relay.
pub struct LightRule {
    channel: usize,
    latch: ThresholdLatch,
    on: bool,
}

impl LightRule {
    /// Relay starts off.
    pub fn new(config: &RelayConfig) -> Self {
        Self {
            channel: config.channel,
            latch: ThresholdLatch::new(config.threshold, 0, config.trigger),
            on: false,
        }
    }

    pub fn evaluate(&mut self, reading: &SensorReading) -> LightDecision {
        let on = self.latch.update(reading.level(self.channel));
        let changed = on != self.on;
        self.on = on;
        LightDecision { on, changed }
    }

    pub fn is_on(&self) -> bool {
        self.on
    }
}
